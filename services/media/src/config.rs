//! Storage backend configuration

use serde::Deserialize;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::info;

use crate::error::StorageResult;
use crate::gateway::ObjectStorage;
use crate::local::LocalStorage;
use crate::memory::MemoryStorage;
use crate::policy::UploadPolicy;
use crate::s3::S3Storage;

/// Which backend holds uploaded files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Files on local disk, served under `/uploads`
    #[default]
    Local,
    /// DigitalOcean Spaces or any S3-compatible bucket
    Spaces,
    /// Process memory, lost on restart
    Memory,
}

/// Storage settings. Field names match the environment variables they are
/// read from (`STORAGE_BACKEND`, `FILE_UPLOAD_PATH`, `SPACES_*`, ...).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_backend: StorageBackend,
    #[serde(default = "default_upload_path")]
    pub file_upload_path: PathBuf,
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_timeout_secs")]
    pub storage_timeout_secs: u64,
    #[serde(default)]
    pub spaces_endpoint: Option<String>,
    #[serde(default)]
    pub spaces_bucket: Option<String>,
    #[serde(default)]
    pub spaces_key: Option<String>,
    #[serde(default)]
    pub spaces_secret: Option<String>,
    #[serde(default)]
    pub spaces_url: Option<String>,
    #[serde(default = "default_region")]
    pub spaces_region: String,
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("./uploads")
}

fn default_max_file_size() -> u64 {
    5_000_000
}

fn default_max_files() -> usize {
    5
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_backend: StorageBackend::default(),
            file_upload_path: default_upload_path(),
            max_file_size: default_max_file_size(),
            max_files: default_max_files(),
            storage_timeout_secs: default_timeout_secs(),
            spaces_endpoint: None,
            spaces_bucket: None,
            spaces_key: None,
            spaces_secret: None,
            spaces_url: None,
            spaces_region: default_region(),
        }
    }
}

impl StorageConfig {
    pub fn policy(&self) -> UploadPolicy {
        UploadPolicy {
            max_file_size: self.max_file_size,
            max_files: self.max_files,
        }
    }

    /// Upper bound for a single storage call
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.storage_timeout_secs.max(1))
    }
}

/// Build the configured backend.
pub async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStorage>> {
    let storage: Arc<dyn ObjectStorage> = match config.storage_backend {
        StorageBackend::Local => Arc::new(LocalStorage::new(
            config.file_upload_path.clone(),
            config.timeout(),
        )),
        StorageBackend::Spaces => Arc::new(S3Storage::connect(config).await?),
        StorageBackend::Memory => Arc::new(MemoryStorage::new()),
    };

    info!("Object storage backend: {}", storage.backend());
    Ok(storage)
}
