use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use roam_types::api::ConnectionInfo;
use roam_types::{ConnectionRecord, ConnectionStatus, ConnectionViewState, UserId};

use crate::bus::Subscription;
use crate::cache::LocalCache;
use crate::context::SyncContext;

/// Rendered connection state for one counterpart, as seen by one surface
/// (a card, a profile page, a sidebar row).
///
/// Inputs, highest precedence first: connection data handed over on mount,
/// bus notifications, and the remote listing. Clones share state.
#[derive(Clone)]
pub struct ConnectionViewModel {
    inner: Arc<ViewModelInner>,
}

struct ViewModelInner {
    viewer: Option<UserId>,
    counterpart: UserId,
    state: Mutex<ConnectionViewState>,
    /// Bumped on every local write; lets a slow fetch detect it was overtaken.
    epoch: AtomicU64,
    mounted: AtomicBool,
    busy: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
}

impl ViewModelInner {
    fn set(&self, state: ConnectionViewState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl ConnectionViewModel {
    /// Mount a view-model for `counterpart` and resolve its initial state.
    ///
    /// Viewing one's own profile, or viewing while logged out, leaves the
    /// state empty and skips the network entirely.
    pub async fn mount(
        ctx: &SyncContext,
        counterpart: UserId,
        connection_info: Option<ConnectionInfo>,
    ) -> Self {
        let viewer = ctx.session().map(|s| s.user_id);
        let vm = Self {
            inner: Arc::new(ViewModelInner {
                viewer: viewer.clone(),
                counterpart,
                state: Mutex::new(ConnectionViewState::empty()),
                epoch: AtomicU64::new(0),
                mounted: AtomicBool::new(true),
                busy: AtomicBool::new(false),
                subscription: Mutex::new(None),
            }),
        };

        let Some(viewer) = viewer else {
            debug!("Mounted view of {} without a session", vm.counterpart());
            return vm;
        };
        if &viewer == vm.counterpart() {
            debug!("Mounted own profile view for {}", viewer);
            return vm;
        }

        vm.attach(ctx, &viewer);

        match connection_info {
            Some(info) => {
                debug!("View of {} adopted joined connection data ({})", vm.counterpart(), info.status);
                vm.inner.set(info.into_view_state());
            }
            None => {
                vm.refresh(ctx).await;
            }
        }

        vm
    }

    fn attach(&self, ctx: &SyncContext, viewer: &UserId) {
        let weak = Arc::downgrade(&self.inner);
        let cache = ctx.cache.clone();

        let subscription = ctx.bus.subscribe(viewer, move |event| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if event.counterpart() != &inner.counterpart || !inner.mounted.load(Ordering::Acquire) {
                return;
            }

            let state = event.view_state();
            // Only confirmed states reach the cache.
            if !state.is_optimistic {
                mirror_to_cache(&cache, &inner.counterpart, &state);
            }
            inner.set(state);
        });

        *self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(subscription);
    }

    pub fn state(&self) -> ConnectionViewState {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn counterpart(&self) -> &UserId {
        &self.inner.counterpart
    }

    /// The local user this view was mounted for, if any.
    pub fn viewer(&self) -> Option<&UserId> {
        self.inner.viewer.as_ref()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::Acquire)
    }

    /// Stop listening and freeze the state. Idempotent.
    pub fn unmount(&self) {
        if !self.inner.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        let subscription = self
            .inner
            .subscription
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(subscription) = subscription {
            subscription.unsubscribe();
        }
        debug!("Unmounted view of {}", self.counterpart());
    }

    /// Overwrite local state. Ignored once unmounted.
    pub(crate) fn apply(&self, state: ConnectionViewState) -> bool {
        if !self.is_mounted() {
            return false;
        }
        self.inner.set(state);
        true
    }

    /// Claim the view for one mutating action. `None` while another action
    /// on the same view is still in flight.
    pub(crate) fn begin_action(&self) -> Option<ActionGuard> {
        if self.inner.busy.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(ActionGuard {
            inner: Arc::clone(&self.inner),
        })
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::Acquire)
    }

    /// Re-derive state from the remote listing, falling back to a fresh cache
    /// entry if the listing fails.
    pub async fn refresh(&self, ctx: &SyncContext) -> ConnectionViewState {
        self.resolve(ctx, true).await
    }

    /// Like [`refresh`](Self::refresh), but a failed listing resolves to the
    /// empty state instead of consulting the cache.
    pub(crate) async fn reconcile(&self, ctx: &SyncContext) -> ConnectionViewState {
        self.resolve(ctx, false).await
    }

    async fn resolve(&self, ctx: &SyncContext, use_cache: bool) -> ConnectionViewState {
        let (Some(viewer), Some(session)) = (self.viewer(), ctx.session()) else {
            return self.state();
        };
        let counterpart = self.counterpart();
        let epoch = self.inner.epoch.load(Ordering::Acquire);

        let resolved = match ctx.api.all(&session).await {
            Ok(records) => {
                let state = find_pair(&records, viewer, counterpart)
                    .map(|record| ConnectionViewState::from_record(record, viewer))
                    .unwrap_or_default();
                debug!("Resolved connection with {} from remote: {:?}", counterpart, state.status);
                state
            }
            Err(e) if use_cache => {
                warn!("Connection lookup for {} failed: {}", counterpart, e);
                match ctx.cache.load(counterpart) {
                    Some(cached) => {
                        debug!("Using cached connection state for {}", counterpart);
                        cached
                    }
                    None => ConnectionViewState::empty(),
                }
            }
            Err(e) => {
                warn!("Connection lookup for {} failed: {}", counterpart, e);
                ConnectionViewState::empty()
            }
        };

        if !self.is_mounted() {
            debug!("Dropping lookup result for unmounted view of {}", counterpart);
            return self.state();
        }
        if self.inner.epoch.load(Ordering::Acquire) != epoch {
            debug!("Lookup for {} superseded by a newer update", counterpart);
            return self.state();
        }

        self.inner.set(resolved.clone());
        resolved
    }
}

/// Held for the duration of one action; releases the view on drop.
pub(crate) struct ActionGuard {
    inner: Arc<ViewModelInner>,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.inner.busy.store(false, Ordering::Release);
    }
}

/// Prefer the active record if a stale rejected one is still listed.
pub(crate) fn find_pair<'a>(
    records: &'a [ConnectionRecord],
    a: &UserId,
    b: &UserId,
) -> Option<&'a ConnectionRecord> {
    let mut pair = records.iter().filter(|r| r.involves_pair(a, b));
    let first = pair.next()?;
    if first.status.is_active() {
        return Some(first);
    }
    Some(pair.find(|r| r.status.is_active()).unwrap_or(first))
}

/// Accepted connections are always fetched fresh, so they are not kept as
/// cache fallbacks.
pub(crate) fn mirror_to_cache(cache: &LocalCache, counterpart: &UserId, state: &ConnectionViewState) {
    match state.status {
        None | Some(ConnectionStatus::Accepted) => cache.clear(counterpart),
        Some(_) => cache.save(counterpart, state),
    }
}
