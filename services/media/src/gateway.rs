//! The storage contract consumed by post and timeline mutations

use async_trait::async_trait;
use std::{future::Future, time::Duration};

use crate::error::{StorageError, StorageResult};
use crate::keys::key_from_url;

/// An uploaded file as received from the client
#[derive(Debug, Clone)]
pub struct Upload {
    /// Name of the file on the client machine
    pub file_name: String,
    /// MIME type announced by the client
    pub content_type: String,
    /// File contents
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Blob store holding post and timeline images.
///
/// Callers validate uploads with [`crate::UploadPolicy`] before calling
/// [`ObjectStorage::store`]. Releasing an object that is already gone must
/// succeed, so cleanup paths can call [`ObjectStorage::release`] blindly.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Persist an upload and return the permanent URL clients fetch it from.
    async fn store(&self, upload: &Upload) -> StorageResult<String>;

    /// Delete the object stored under `key`.
    async fn release_key(&self, key: &str) -> StorageResult<()>;

    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Map a URL returned by [`ObjectStorage::store`] back to its object key.
    fn resolve_key(&self, url: &str) -> Option<String> {
        key_from_url(url)
    }

    /// Delete the object behind a URL or a bare key.
    async fn release(&self, url_or_key: &str) -> StorageResult<()> {
        let key = self
            .resolve_key(url_or_key)
            .ok_or_else(|| StorageError::InvalidReference(url_or_key.to_string()))?;
        self.release_key(&key).await
    }
}

/// Bound a storage call so a stuck backend cannot hold a request forever.
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout { operation, timeout }),
    }
}
