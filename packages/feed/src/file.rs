//! Incident store backed by a single JSON document file.
//!
//! The file holds a JSON array of store documents. Writes from one store are
//! serialized and replace the file through a uniquely named temporary
//! sibling, so readers never see a half-written list. Documents that fail
//! validation stay in the file; they are only left out of snapshots.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use trafficpulse_incident_models::{Incident, NewIncident};

use crate::snapshot::{Snapshot, decode_documents, decode_snapshot};
use crate::subscription::SubscriberRegistry;
use crate::{FeedError, IncidentFeed, IncidentStore, SnapshotCallback, Subscription};

/// A store persisted as a JSON array on disk.
pub struct JsonFileStore {
    path: PathBuf,
    subscribers: Arc<SubscriberRegistry>,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Opens the store at `path`. The file is created on first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            subscribers: SubscriberRegistry::new(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and validates the current documents. A missing file is an
    /// empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the file cannot be read or is not a JSON
    /// array.
    pub fn load(&self) -> Result<Snapshot, FeedError> {
        match std::fs::read_to_string(&self.path) {
            Ok(json) => decode_snapshot(&json),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("{} does not exist yet", self.path.display());
                Ok(Snapshot::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn read_documents(&self) -> Result<Vec<serde_json::Value>, FeedError> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&json)? {
            serde_json::Value::Array(documents) => Ok(documents),
            _ => Err(FeedError::InvalidSnapshot {
                message: format!("{} is not a JSON array", self.path.display()),
            }),
        }
    }

    async fn write_documents(&self, documents: &[serde_json::Value]) -> Result<(), FeedError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self
            .path
            .with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(documents)?).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

impl IncidentFeed for JsonFileStore {
    fn subscribe(&self, on_snapshot: SnapshotCallback) -> Subscription {
        let subscription = self.subscribers.register(Arc::clone(&on_snapshot));
        match self.load() {
            Ok(snapshot) => on_snapshot(Arc::from(snapshot.incidents)),
            Err(e) => log::error!("Failed to load {}: {e}", self.path.display()),
        }
        subscription
    }
}

#[async_trait]
impl IncidentStore for JsonFileStore {
    async fn add(&self, incident: NewIncident) -> Result<String, FeedError> {
        incident.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let stored: Incident = incident.into_incident(id.clone(), Utc::now());

        let _guard = self.write_lock.lock().await;

        let mut documents = self.read_documents().await?;
        documents.push(serde_json::to_value(&stored)?);
        self.write_documents(&documents).await?;

        log::info!(
            "Stored incident {id} in {} ({} documents)",
            self.path.display(),
            documents.len()
        );

        if !self.subscribers.is_empty() {
            let snapshot = decode_documents(serde_json::Value::Array(documents), Utc::now())?;
            self.subscribers.notify(&Arc::from(snapshot.incidents));
        }

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use trafficpulse_incident_models::{IncidentType, Location};

    use super::*;

    fn scratch_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("trafficpulse-file-{}", uuid::Uuid::new_v4()))
            .join("incidents.json")
    }

    fn report(user: &str) -> NewIncident {
        NewIncident::new(IncidentType::Accident, Location::new(17.385, 78.4867), user)
    }

    #[test]
    fn missing_file_is_empty() {
        let store = JsonFileStore::open(scratch_path());
        assert_eq!(store.load().unwrap(), Snapshot::default());
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let path = scratch_path();
        let store = JsonFileStore::open(&path);
        let id = store.add(report("u1")).await.unwrap();
        store.add(report("u2")).await.unwrap();

        let reopened = JsonFileStore::open(&path);
        let snapshot = reopened.load().unwrap();
        assert_eq!(snapshot.incidents.len(), 2);
        assert!(snapshot.incidents.iter().any(|i| i.id == id));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn keeps_unreadable_documents_in_file() {
        let path = scratch_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"[{"id": "x", "type": "pothole"}]"#).unwrap();

        let store = JsonFileStore::open(&path);
        store.add(report("u1")).await.unwrap();

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.incidents.len(), 1);
        assert_eq!(snapshot.rejected.len(), 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn concurrent_adds_all_persist() {
        let path = scratch_path();
        let store = JsonFileStore::open(&path);

        let (a, b, c, d) = tokio::join!(
            store.add(report("u1")),
            store.add(report("u2")),
            store.add(report("u3")),
            store.add(report("u4")),
        );
        let ids = [a.unwrap(), b.unwrap(), c.unwrap(), d.unwrap()];

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.incidents.len(), 4);
        for id in &ids {
            assert!(snapshot.incidents.iter().any(|i| &i.id == id));
        }

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn notifies_subscribers_after_write() {
        let path = scratch_path();
        let store = JsonFileStore::open(&path);
        let sizes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sizes);
        let _subscription = store.subscribe(Arc::new(move |snapshot: Arc<[Incident]>| {
            sink.lock().unwrap().push(snapshot.len());
        }));

        store.add(report("u1")).await.unwrap();
        assert_eq!(*sizes.lock().unwrap(), [0, 1]);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
