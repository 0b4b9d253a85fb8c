//! Submitting a user report with an optional image.

use chrono::Utc;
use trafficpulse_incident_models::NewIncident;

use crate::resize::fit_for_upload;
use crate::{BlobStore, FeedError, IncidentStore};

/// Image attached to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageAttachment {
    /// Already hosted elsewhere; stored as-is.
    Remote(String),
    /// Local image bytes that must be uploaded first.
    Local(Vec<u8>),
}

/// Blob store path for an image uploaded by `user_id` at `millis`.
#[must_use]
pub fn image_path(user_id: &str, millis: i64) -> String {
    format!("incident-images/{user_id}-{millis}")
}

/// Validates and stores `incident`, uploading `image` first when it is local.
///
/// Local images are shrunk to fit the blob store bounds before upload. An
/// image that cannot be decoded or uploaded does not fail the report: the
/// incident is stored without an image.
///
/// # Errors
///
/// Returns [`FeedError`] if validation or the store write fails.
pub async fn report_incident(
    store: &dyn IncidentStore,
    blobs: &dyn BlobStore,
    mut incident: NewIncident,
    image: Option<ImageAttachment>,
) -> Result<String, FeedError> {
    incident.validate()?;

    incident.image_url = match image {
        None => None,
        Some(ImageAttachment::Remote(url)) => Some(url).filter(|url| !url.is_empty()),
        Some(ImageAttachment::Local(bytes)) => {
            let path = image_path(&incident.user_id, Utc::now().timestamp_millis());
            match upload_resized(blobs, &path, bytes).await {
                Ok(url) => Some(url),
                Err(e) => {
                    log::error!("Image upload failed, reporting without image: {e}");
                    None
                }
            }
        }
    };

    store.add(incident).await
}

async fn upload_resized(
    blobs: &dyn BlobStore,
    path: &str,
    bytes: Vec<u8>,
) -> Result<String, FeedError> {
    let resized = fit_for_upload(bytes)?;
    blobs.upload(path, resized).await
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::ImageFormat;
    use trafficpulse_incident_models::{IncidentType, Location, ReportError};

    use super::*;
    use crate::memory::InMemoryStore;
    use crate::resize::encoded;

    struct FailingBlobs;

    #[async_trait]
    impl BlobStore for FailingBlobs {
        async fn upload(&self, path: &str, _bytes: Vec<u8>) -> Result<String, FeedError> {
            Err(FeedError::Upload {
                path: path.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    #[derive(Default)]
    struct RecordingBlobs {
        uploads: Mutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl BlobStore for RecordingBlobs {
        async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, FeedError> {
            self.uploads.lock().unwrap().push(bytes);
            Ok(format!("https://blobs.example/{path}"))
        }
    }

    fn report() -> NewIncident {
        let mut incident = NewIncident::new(
            IncidentType::Roadblock,
            Location::new(17.385, 78.4867).with_address("Tank Bund Rd"),
            "u1",
        );
        incident.details = "lane closed".to_string();
        incident
    }

    #[test]
    fn image_paths_are_per_user_and_time() {
        assert_eq!(image_path("u1", 42), "incident-images/u1-42");
    }

    #[tokio::test]
    async fn uploads_local_image() {
        let store = InMemoryStore::new();
        let blobs = RecordingBlobs::default();
        let png = encoded(40, 30, ImageFormat::Png);
        report_incident(&store, &blobs, report(), Some(ImageAttachment::Local(png.clone())))
            .await
            .unwrap();

        let url = store.snapshot()[0].image_url.clone().unwrap();
        assert!(url.starts_with("https://blobs.example/incident-images/u1-"));
        assert_eq!(*blobs.uploads.lock().unwrap(), [png]);
    }

    #[tokio::test]
    async fn large_images_are_shrunk_before_upload() {
        let store = InMemoryStore::new();
        let blobs = RecordingBlobs::default();
        let large = encoded(1600, 1200, ImageFormat::Png);
        report_incident(&store, &blobs, report(), Some(ImageAttachment::Local(large)))
            .await
            .unwrap();

        let uploads = blobs.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let stored = image::load_from_memory(&uploads[0]).unwrap();
        assert_eq!((stored.width(), stored.height()), (800, 600));
        assert!(store.snapshot()[0].image_url.is_some());
    }

    #[tokio::test]
    async fn undecodable_image_is_dropped() {
        let store = InMemoryStore::new();
        let blobs = RecordingBlobs::default();
        report_incident(&store, &blobs, report(), Some(ImageAttachment::Local(vec![7])))
            .await
            .unwrap();

        assert!(blobs.uploads.lock().unwrap().is_empty());
        assert!(store.snapshot()[0].image_url.is_none());
    }

    #[tokio::test]
    async fn keeps_remote_url() {
        let store = InMemoryStore::new();
        let url = "https://img.example/a.jpg".to_string();
        report_incident(
            &store,
            &FailingBlobs,
            report(),
            Some(ImageAttachment::Remote(url.clone())),
        )
        .await
        .unwrap();

        assert_eq!(store.snapshot()[0].image_url, Some(url));
    }

    #[tokio::test]
    async fn failed_upload_still_reports() {
        let store = InMemoryStore::new();
        let png = encoded(40, 30, ImageFormat::Png);
        report_incident(&store, &FailingBlobs, report(), Some(ImageAttachment::Local(png)))
            .await
            .unwrap();

        let stored = &store.snapshot()[0];
        assert!(stored.image_url.is_none());
        assert_eq!(stored.details, "lane closed");
    }

    #[tokio::test]
    async fn invalid_report_skips_upload() {
        let store = InMemoryStore::new();
        let mut incident = report();
        incident.user_id = String::new();

        let err = report_incident(&store, &RecordingBlobs::default(), incident, None)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Report(ReportError::MissingUser)));
    }
}
