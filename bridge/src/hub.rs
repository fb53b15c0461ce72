//! Progress subscriptions.
//!
//! The hub fans progress events out to every live subscriber. Subscribing
//! returns a [`Subscription`]; dropping it stops delivery, so repeated
//! transfer runs never accumulate stale listeners.

use engine::ProgressEvent;
use std::sync::{Arc, Mutex, Weak};
use tracing::debug;
use uuid::Uuid;

type Listener = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Default)]
pub struct ProgressHub {
    listeners: Mutex<Vec<(Uuid, Listener)>>,
}

impl ProgressHub {
    pub fn new() -> Arc<Self> {
        Arc::new(ProgressHub::default())
    }

    /// Register a listener. Delivery stops when the returned handle drops.
    pub fn subscribe<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.lock().push((id, Arc::new(listener)));
        debug!(subscription = %id, "progress listener added");
        Subscription {
            id,
            hub: Arc::downgrade(self),
        }
    }

    /// Deliver an event to every listener.
    pub fn publish(&self, event: &ProgressEvent) {
        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener> = self.lock().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    fn unsubscribe(&self, id: Uuid) {
        self.lock().retain(|(existing, _)| *existing != id);
        debug!(subscription = %id, "progress listener removed");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(Uuid, Listener)>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle for one progress listener.
pub struct Subscription {
    id: Uuid,
    hub: Weak<ProgressHub>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.unsubscribe(self.id);
        }
    }
}
