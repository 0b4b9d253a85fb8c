//! Snapshot subscriber registry shared by the store backends.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use trafficpulse_incident_models::Incident;

use crate::SnapshotCallback;

/// Callbacks waiting for snapshots, keyed by subscription ID.
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    next_id: u64,
    callbacks: BTreeMap<u64, SnapshotCallback>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds `callback` and returns the handle that removes it.
    #[must_use]
    pub fn register(self: &Arc<Self>, callback: SnapshotCallback) -> Subscription {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = state.next_id;
        state.next_id += 1;
        state.callbacks.insert(id, callback);
        drop(state);

        log::debug!("Registered snapshot subscriber {id}");

        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .len()
    }

    /// Whether nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers `snapshot` to every subscriber.
    ///
    /// Callbacks run outside the registry lock, so a callback may drop its
    /// own subscription.
    pub fn notify(&self, snapshot: &Arc<[Incident]>) {
        let callbacks: Vec<SnapshotCallback> = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .values()
            .cloned()
            .collect();

        log::debug!(
            "Delivering snapshot of {} incidents to {} subscribers",
            snapshot.len(),
            callbacks.len()
        );

        for callback in callbacks {
            callback(Arc::clone(snapshot));
        }
    }

    fn remove(&self, id: u64) {
        let removed = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .callbacks
            .remove(&id);
        if removed.is_some() {
            log::debug!("Removed snapshot subscriber {id}");
        }
    }
}

/// Handle returned by [`crate::IncidentFeed::subscribe`].
///
/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    registry: Weak<SubscriberRegistry>,
}

impl Subscription {
    /// Stops snapshot delivery.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, SnapshotCallback) {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let callback: SnapshotCallback = Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        (calls, callback)
    }

    #[test]
    fn notifies_until_unsubscribed() {
        let registry = SubscriberRegistry::new();
        let (calls, callback) = counter();
        let subscription = registry.register(callback);
        let empty: Arc<[Incident]> = Arc::from(Vec::new());

        registry.notify(&empty);
        registry.notify(&empty);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        subscription.unsubscribe();
        assert!(registry.is_empty());
        registry.notify(&empty);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn handle_outliving_registry_is_harmless() {
        let registry = SubscriberRegistry::new();
        let (_calls, callback) = counter();
        let subscription = registry.register(callback);
        drop(registry);
        drop(subscription);
    }
}
