//! Blob storage for uploaded profile images.
//!
//! Blobs are addressed by the relative path returned from [`BlobStore::put`],
//! e.g. `team-members/5f0c...e1.png`.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

/// Errors a blob backend raises instead of a plain "not stored" answer.
#[derive(Debug, Error)]
pub enum BlobError {
    #[error("invalid blob path {0:?}")]
    InvalidPath(String),
    #[error("blob io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Blob storage backend.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under a freshly generated path inside `namespace`.
    ///
    /// `Ok(None)` means the backend refused or failed the write.
    async fn put(
        &self,
        namespace: &str,
        bytes: &[u8],
        extension: &str,
    ) -> Result<Option<String>, BlobError>;

    /// Read a blob back. `Ok(None)` if nothing is stored at `path`.
    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError>;

    /// Delete a blob. Returns whether something was removed; a missing path is not an error.
    async fn delete(&self, path: &str) -> Result<bool, BlobError>;
}

/// Blob store on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        namespace: &str,
        bytes: &[u8],
        extension: &str,
    ) -> Result<Option<String>, BlobError> {
        let name = uuid::Uuid::new_v4().simple().to_string();
        let path = if extension.is_empty() {
            format!("{}/{}", namespace.trim_matches('/'), name)
        } else {
            format!("{}/{}.{}", namespace.trim_matches('/'), name, extension)
        };
        let target = self.resolve(&path)?;

        if let Some(parent) = target.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                tracing::warn!(path = %parent.display(), "Failed to create blob directory: {}", e);
                return Ok(None);
            }
        }

        match tokio::fs::write(&target, bytes).await {
            Ok(()) => Ok(Some(path)),
            Err(e) => {
                tracing::warn!(path = %target.display(), "Failed to write blob: {}", e);
                Ok(None)
            }
        }
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let target = self.resolve(path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool, BlobError> {
        let target = self.resolve(path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
