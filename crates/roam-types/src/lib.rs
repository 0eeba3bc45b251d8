pub mod api;
pub mod events;
pub mod models;
pub mod normalize;

pub use events::ConnectionEvent;
pub use models::{
    ConnectionId, ConnectionRecord, ConnectionStatus, ConnectionViewState, Direction, UserId,
    UserSummary,
};
