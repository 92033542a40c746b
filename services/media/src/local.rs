//! Local-disk backend
//!
//! Files land in a single directory that the API serves under `/uploads`,
//! so the URL of `uploads/<name>` is simply `/uploads/<name>`.

use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::gateway::{ObjectStorage, Upload, with_timeout};
use crate::keys::{KEY_PREFIX, object_key};

/// Stores uploads as plain files below `root`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    timeout: Duration,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
        }
    }

    /// Directory holding the stored files
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `uploads/<name>` to a path inside the root, refusing anything that
    /// could escape it.
    fn path_for_key(&self, key: &str) -> StorageResult<PathBuf> {
        let name = key
            .strip_prefix(KEY_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(key);

        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return Err(StorageError::InvalidReference(key.to_string()));
        }

        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn store(&self, upload: &Upload) -> StorageResult<String> {
        let key = object_key(&upload.file_name);
        let path = self.path_for_key(&key)?;

        with_timeout("upload", self.timeout, async {
            tokio::fs::create_dir_all(&self.root).await?;
            tokio::fs::write(&path, &upload.bytes).await?;
            Ok(())
        })
        .await?;

        info!("Stored {} ({} bytes) at {}", key, upload.size(), path.display());
        Ok(format!("/{}", key))
    }

    async fn release_key(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for_key(key)?;

        with_timeout("delete", self.timeout, async {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(e) => Err(StorageError::Io(e)),
            }
        })
        .await
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &tempfile::TempDir) -> LocalStorage {
        LocalStorage::new(dir.path().join("uploads"), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_store_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        let url = storage
            .store(&Upload::new("maize.png", "image/png", b"png".to_vec()))
            .await
            .unwrap();
        assert!(url.starts_with("/uploads/"));

        let file = storage.root().join(url.trim_start_matches("/uploads/"));
        assert_eq!(std::fs::read(&file).unwrap(), b"png");

        storage.release(&url).await.unwrap();
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        storage.release("/uploads/1-2-gone.png").await.unwrap();
        storage.release("/uploads/1-2-gone.png").await.unwrap();
    }

    #[test]
    fn test_only_the_uploads_directory_prefix_is_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        assert_eq!(
            storage.path_for_key("uploads/a.png").unwrap(),
            storage.root().join("a.png")
        );
        assert_eq!(
            storage.path_for_key("uploadsfoo.png").unwrap(),
            storage.root().join("uploadsfoo.png")
        );
        assert!(storage.path_for_key("uploads//a.png").is_err());
    }

    #[tokio::test]
    async fn test_release_rejects_escaping_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir);

        let err = storage.release("/uploads/../secrets.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidReference(_)));
    }
}
