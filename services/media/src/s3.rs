//! S3-compatible backend (DigitalOcean Spaces)

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region},
    error::DisplayErrorContext,
    primitives::ByteStream,
    types::ObjectCannedAcl,
};
use std::time::Duration;
use tracing::info;

use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use crate::gateway::{ObjectStorage, Upload, with_timeout};
use crate::keys::{key_from_url, object_key};

/// Uploads public-read objects into a bucket and serves them from a CDN URL
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_url: String,
    timeout: Duration,
}

fn required(value: &Option<String>, name: &str) -> StorageResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| StorageError::Configuration(format!("{} is not set", name)))
}

/// Key of an object served under `public_url`. URLs from elsewhere fall
/// back to their path.
fn key_under(public_url: &str, url: &str) -> Option<String> {
    let url = url.trim();
    match url
        .strip_prefix(public_url)
        .and_then(|rest| rest.strip_prefix('/'))
    {
        Some(key) if !key.is_empty() => Some(key.to_string()),
        _ => key_from_url(url),
    }
}

impl S3Storage {
    pub fn new(client: Client, bucket: String, public_url: String, timeout: Duration) -> Self {
        Self {
            client,
            bucket,
            public_url: public_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Build a client for the configured Spaces endpoint.
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let endpoint = required(&config.spaces_endpoint, "SPACES_ENDPOINT")?;
        let bucket = required(&config.spaces_bucket, "SPACES_BUCKET")?;
        let access_key = required(&config.spaces_key, "SPACES_KEY")?;
        let secret_key = required(&config.spaces_secret, "SPACES_SECRET")?;
        let public_url = required(&config.spaces_url, "SPACES_URL")?;

        let credentials = Credentials::new(access_key, secret_key, None, None, "spaces");
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.spaces_region.clone()))
            .endpoint_url(&endpoint)
            .credentials_provider(credentials)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(false)
            .build();

        info!("Object storage bucket {} at {}", bucket, endpoint);
        Ok(Self::new(
            Client::from_conf(s3_config),
            bucket,
            public_url,
            config.timeout(),
        ))
    }

    /// Public URL of a key
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn store(&self, upload: &Upload) -> StorageResult<String> {
        let key = object_key(&upload.file_name);
        info!("Uploading {} to bucket {}", key, self.bucket);

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(upload.bytes.clone()))
            .content_type(&upload.content_type)
            .acl(ObjectCannedAcl::PublicRead)
            .send();

        with_timeout("upload", self.timeout, async {
            request
                .await
                .map(|_| ())
                .map_err(|e| StorageError::Upload(DisplayErrorContext(&e).to_string()))
        })
        .await?;

        Ok(self.url_for(&key))
    }

    async fn release_key(&self, key: &str) -> StorageResult<()> {
        let request = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send();

        with_timeout("delete", self.timeout, async {
            request
                .await
                .map(|_| ())
                .map_err(|e| StorageError::Delete(DisplayErrorContext(&e).to_string()))
        })
        .await?;

        info!("Deleted {} from bucket {}", key, self.bucket);
        Ok(())
    }

    fn resolve_key(&self, url: &str) -> Option<String> {
        key_under(&self.public_url, url)
    }

    fn backend(&self) -> &'static str {
        "spaces"
    }
}
