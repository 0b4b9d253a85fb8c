//! In-process incident store.
//!
//! Holds incidents in memory and pushes a full snapshot to subscribers
//! after every write.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use trafficpulse_incident_models::{Incident, NewIncident, sort_most_recent_first};

use crate::subscription::SubscriberRegistry;
use crate::{FeedError, IncidentFeed, IncidentStore, SnapshotCallback, Subscription};

/// A store that lives entirely in memory.
pub struct InMemoryStore {
    incidents: Mutex<Vec<Incident>>,
    subscribers: Arc<SubscriberRegistry>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_incidents(Vec::new())
    }

    /// Creates a store seeded with `incidents`.
    #[must_use]
    pub fn with_incidents(mut incidents: Vec<Incident>) -> Self {
        sort_most_recent_first(&mut incidents);
        Self {
            incidents: Mutex::new(incidents),
            subscribers: SubscriberRegistry::new(),
        }
    }

    /// Current incidents, most recent first.
    #[must_use]
    pub fn snapshot(&self) -> Arc<[Incident]> {
        let incidents = self
            .incidents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::from(incidents.as_slice())
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl IncidentFeed for InMemoryStore {
    fn subscribe(&self, on_snapshot: SnapshotCallback) -> Subscription {
        let subscription = self.subscribers.register(Arc::clone(&on_snapshot));
        on_snapshot(self.snapshot());
        subscription
    }
}

#[async_trait]
impl IncidentStore for InMemoryStore {
    async fn add(&self, incident: NewIncident) -> Result<String, FeedError> {
        incident.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let stored = incident.into_incident(id.clone(), Utc::now());

        let snapshot: Arc<[Incident]> = {
            let mut incidents = self
                .incidents
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            incidents.push(stored);
            sort_most_recent_first(&mut incidents);
            Arc::from(incidents.as_slice())
        };

        log::info!("Stored incident {id}");
        self.subscribers.notify(&snapshot);

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use trafficpulse_incident_models::{IncidentType, Location, ReportError};

    use super::*;

    fn report(user: &str) -> NewIncident {
        NewIncident::new(
            IncidentType::Construction,
            Location::new(17.385, 78.4867),
            user,
        )
    }

    fn recording() -> (Arc<Mutex<Vec<usize>>>, SnapshotCallback) {
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let callback: SnapshotCallback = Arc::new(move |snapshot: Arc<[Incident]>| {
            sink.lock().unwrap().push(snapshot.len());
        });
        (sizes, callback)
    }

    #[tokio::test]
    async fn subscribers_get_initial_and_updated_snapshots() {
        let store = InMemoryStore::new();
        let (sizes, callback) = recording();
        let subscription = store.subscribe(callback);

        store.add(report("u1")).await.unwrap();
        store.add(report("u2")).await.unwrap();
        assert_eq!(*sizes.lock().unwrap(), [0, 1, 2]);

        drop(subscription);
        assert_eq!(store.subscriber_count(), 0);
        store.add(report("u3")).await.unwrap();
        assert_eq!(*sizes.lock().unwrap(), [0, 1, 2]);
        assert_eq!(store.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn assigns_id_and_timestamp() {
        let store = InMemoryStore::new();
        let before = Utc::now();
        let id = store.add(report("u1")).await.unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot[0].id, id);
        assert_eq!(snapshot[0].user_id, "u1");
        assert!(snapshot[0].timestamp >= before);
    }

    #[tokio::test]
    async fn refuses_invalid_reports() {
        let store = InMemoryStore::new();
        let mut incident = report("u1");
        incident.location = Location::new(0.0, 0.0);

        let err = store.add(incident).await.unwrap_err();
        assert!(matches!(err, FeedError::Report(ReportError::MissingLocation)));
        assert!(store.snapshot().is_empty());
    }

    #[tokio::test]
    async fn newest_report_comes_first() {
        let store = InMemoryStore::new();
        store.add(report("first")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.add(report("second")).await.unwrap();
        assert_eq!(store.snapshot()[0].user_id, "second");
    }
}
