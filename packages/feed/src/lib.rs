#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Boundary between the incident core and the external document store.
//!
//! The store pushes complete snapshots through [`IncidentFeed`], accepts new
//! reports through [`IncidentStore`], and attached images go to a
//! [`BlobStore`]. Concrete backends live in [`memory`], [`file`] and
//! [`blob`]; [`report::report_incident`] ties a store and a blob store
//! together the way the report form does.

pub mod blob;
pub mod file;
pub mod memory;
pub mod report;
pub mod resize;
pub mod snapshot;
pub mod subscription;

use std::sync::Arc;

use async_trait::async_trait;
use trafficpulse_incident_models::{Incident, NewIncident, ReportError};

pub use subscription::Subscription;

/// Errors that can occur while talking to a store.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// JSON parsing or encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error (file read/write).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document list has the wrong shape.
    #[error("Invalid snapshot: {message}")]
    InvalidSnapshot {
        /// Description of what went wrong.
        message: String,
    },

    /// The report was refused before reaching the store.
    #[error("Invalid report: {0}")]
    Report(#[from] ReportError),

    /// An attached image could not be decoded or re-encoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Uploading an image failed.
    #[error("Failed to upload {path}: {message}")]
    Upload {
        /// Destination path in the blob store.
        path: String,
        /// Description of what went wrong.
        message: String,
    },
}

/// Called with the complete incident list, most recent first.
pub type SnapshotCallback = Arc<dyn Fn(Arc<[Incident]>) + Send + Sync>;

/// A source of complete incident snapshots.
pub trait IncidentFeed: Send + Sync {
    /// Registers `on_snapshot`. It is called once with the current snapshot
    /// and again after every change until the returned handle is
    /// unsubscribed or dropped.
    fn subscribe(&self, on_snapshot: SnapshotCallback) -> Subscription;
}

/// Persists new reports.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Validates and stores `incident`, returning the assigned ID. The store
    /// assigns the creation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if validation or the write fails.
    async fn add(&self, incident: NewIncident) -> Result<String, FeedError>;
}

/// Stores binary objects and hands back a URL for them.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads `bytes` under `path` and returns a URL that resolves to them.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError`] if the upload fails.
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, FeedError>;
}
