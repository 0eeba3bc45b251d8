use std::sync::Arc;
use std::time::Duration;

use crate::bus::EventBus;
use crate::cache::LocalCache;
use crate::config::DEFAULT_TRANSITION_DELAY;
use crate::remote::ConnectionApi;
use crate::session::{Session, SessionProvider};

/// Collaborators shared by every view-model and the action coordinator.
/// Built once at startup; cheap to clone.
#[derive(Clone)]
pub struct SyncContext {
    pub api: Arc<dyn ConnectionApi>,
    pub bus: EventBus,
    pub cache: LocalCache,
    pub session: Arc<dyn SessionProvider>,
    pub transition_delay: Duration,
}

impl SyncContext {
    pub fn new(
        api: Arc<dyn ConnectionApi>,
        bus: EventBus,
        cache: LocalCache,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            api,
            bus,
            cache,
            session,
            transition_delay: DEFAULT_TRANSITION_DELAY,
        }
    }

    pub fn with_transition_delay(mut self, delay: Duration) -> Self {
        self.transition_delay = delay;
        self
    }

    pub fn session(&self) -> Option<Session> {
        self.session.current()
    }
}
