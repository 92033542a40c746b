//! Application stores: user directory, post feed and timelines
//!
//! The stores own the read-modify-write cycles over the repositories and the
//! coupling between documents and their files in object storage.

use media::{ObjectStorage, Upload, UploadPolicy};
use tracing::warn;

use crate::error::ApiResult;

pub mod feed;
pub mod profiles;
pub mod timelines;

pub use feed::PostFeed;
pub use profiles::UserDirectory;
pub use timelines::TimelineStore;

/// Attempts of a compare-and-swap write before giving up with 409.
pub const MAX_WRITE_ATTEMPTS: usize = 3;

/// Release every file, logging failures instead of returning them.
/// Returns the number of releases that failed.
pub(crate) async fn release_best_effort(storage: &dyn ObjectStorage, urls: &[String]) -> usize {
    let mut failed = 0;
    for url in urls {
        if let Err(e) = storage.release(url).await {
            warn!("Failed to release stored file {}: {}", url, e);
            failed += 1;
        }
    }

    if failed > 0 {
        warn!("{} of {} file releases failed", failed, urls.len());
    }
    failed
}

/// Validate and store a batch of uploads. If any upload fails the files
/// already stored for the batch are released again.
pub(crate) async fn store_uploads(
    storage: &dyn ObjectStorage,
    policy: &UploadPolicy,
    uploads: &[Upload],
) -> ApiResult<Vec<String>> {
    policy.validate_all(uploads)?;

    let mut urls = Vec::with_capacity(uploads.len());
    for upload in uploads {
        match storage.store(upload).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                release_best_effort(storage, &urls).await;
                return Err(e.into());
            }
        }
    }
    Ok(urls)
}
