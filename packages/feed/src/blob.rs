//! Blob store that writes objects under a local directory.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

use crate::{BlobStore, FeedError};

/// Stores uploads as files below `root` and returns `file://` URLs.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    /// Creates a store rooted at `root`. The directory is created on first
    /// upload.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves an object path below the root, refusing anything that would
    /// escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, FeedError> {
        let relative = Path::new(path);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if path.is_empty() || !is_plain {
            return Err(FeedError::Upload {
                path: path.to_string(),
                message: "object path must be relative and stay inside the store".to_string(),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<String, FeedError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let size = bytes.len();
        tokio::fs::write(&target, bytes).await?;

        let absolute = tokio::fs::canonicalize(&target).await?;
        log::info!("Uploaded {size} bytes to {}", absolute.display());

        Ok(format!("file://{}", absolute.display()))
    }
}
