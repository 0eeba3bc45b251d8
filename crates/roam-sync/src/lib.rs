//! Connection state synchronization for Roam clients.
//!
//! Independent surfaces (cards, profile pages, sidebars) each hold a
//! [`ConnectionViewModel`] for a counterpart. The [`ActionCoordinator`]
//! applies connect/respond/remove optimistically, confirms against the REST
//! store, and fans corrections out over the [`EventBus`] so every mounted
//! surface converges without polling.

pub mod bus;
pub mod cache;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod optimistic;
pub mod outcome;
pub mod remote;
pub mod session;
pub mod view_model;

pub use bus::{EventBus, Subscription};
pub use cache::{CacheStore, LocalCache, MemoryCacheStore};
pub use config::SyncConfig;
pub use context::SyncContext;
pub use coordinator::{ActionCoordinator, ConnectionEntry, Decision};
pub use error::{FailureKind, RemoteError, SyncError};
pub use outcome::{ActionOutcome, Notice};
pub use remote::{ConnectionApi, HttpConnectionApi};
pub use session::{Session, SessionProvider, SessionSlot};
pub use view_model::ConnectionViewModel;
