//! Shared fixtures for unit tests.

use async_trait::async_trait;

use crate::storage::{BlobError, BlobStore};

/// A 1x1 transparent PNG.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00,
    0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE,
    0x42, 0x60, 0x82,
];

/// Blob store whose writes always come back without a path.
pub struct RefusingBlobStore;

#[async_trait]
impl BlobStore for RefusingBlobStore {
    async fn put(&self, _: &str, _: &[u8], _: &str) -> Result<Option<String>, BlobError> {
        Ok(None)
    }

    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(None)
    }

    async fn delete(&self, _: &str) -> Result<bool, BlobError> {
        Ok(false)
    }
}

/// Blob store whose every call fails with an io error.
pub struct BrokenBlobStore;

fn unplugged() -> BlobError {
    BlobError::Io(std::io::Error::other("disk unplugged"))
}

#[async_trait]
impl BlobStore for BrokenBlobStore {
    async fn put(&self, _: &str, _: &[u8], _: &str) -> Result<Option<String>, BlobError> {
        Err(unplugged())
    }

    async fn get(&self, _: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Err(unplugged())
    }

    async fn delete(&self, _: &str) -> Result<bool, BlobError> {
        Err(unplugged())
    }
}
