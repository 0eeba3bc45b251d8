use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::trace;
use uuid::Uuid;

use roam_types::{ConnectionEvent, ConnectionId, UserId};

type Callback = Arc<dyn Fn(&ConnectionEvent) + Send + Sync>;

/// In-process relay of connection changes between UI surfaces.
///
/// Construct one per application and hand clones to every surface; clones
/// share the same registry. Delivery is synchronous and fire-and-forget: an
/// event published with no subscriber under the target user is dropped.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    /// observer user_id -> (subscription id, callback)
    subscribers: Mutex<HashMap<UserId, Vec<(Uuid, Callback)>>>,
}

impl BusInner {
    fn registry(&self) -> MutexGuard<'_, HashMap<UserId, Vec<(Uuid, Callback)>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, observer: &UserId, id: Uuid) {
        let mut registry = self.registry();
        if let Some(entries) = registry.get_mut(observer) {
            entries.retain(|(sid, _)| *sid != id);
            if entries.is_empty() {
                registry.remove(observer);
            }
        }
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events published under `observer`. The
    /// returned handle unsubscribes when dropped.
    pub fn subscribe<F>(&self, observer: &UserId, callback: F) -> Subscription
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.inner
            .registry()
            .entry(observer.clone())
            .or_default()
            .push((id, Arc::new(callback)));

        trace!("Subscription {} registered for {}", id, observer);

        Subscription {
            bus: Arc::downgrade(&self.inner),
            observer: observer.clone(),
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Deliver `event` to every subscriber of `target`. Returns how many
    /// callbacks ran.
    pub fn publish(&self, target: &UserId, event: ConnectionEvent) -> usize {
        // Snapshot so callbacks can subscribe, unsubscribe or publish re-entrantly.
        let callbacks: Vec<Callback> = self
            .inner
            .registry()
            .get(target)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        for callback in &callbacks {
            callback(&event);
        }

        trace!(
            "Published {:?} for {} to {} subscriber(s)",
            event, target, callbacks.len()
        );
        callbacks.len()
    }

    /// Tell `observer` that its connection with `counterpart` is gone.
    pub fn notify_removed(
        &self,
        observer: &UserId,
        counterpart: &UserId,
        connection_id: Option<ConnectionId>,
    ) -> usize {
        self.publish(
            observer,
            ConnectionEvent::Removed {
                counterpart_user_id: counterpart.clone(),
                connection_id,
            },
        )
    }

    pub fn subscriber_count(&self, observer: &UserId) -> usize {
        self.inner.registry().get(observer).map_or(0, Vec::len)
    }
}

/// Registration handle returned by [`EventBus::subscribe`].
pub struct Subscription {
    bus: Weak<BusInner>,
    observer: UserId,
    id: Uuid,
    active: AtomicBool,
}

impl Subscription {
    /// Idempotent; a no-op once the bus itself is gone.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.observer, self.id);
            trace!("Subscription {} removed for {}", self.id, self.observer);
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
