//! Application state shared across handlers

use media::{ObjectStorage, UploadPolicy};
use sqlx::PgPool;
use std::sync::Arc;

use crate::repositories::{
    MemoryPostRepository, MemoryTimelineRepository, MemoryUserRepository, PgPostRepository,
    PgTimelineRepository, PgUserRepository, PostRepository, TimelineRepository, UserRepository,
};
use crate::services::{PostFeed, TimelineStore, UserDirectory};

/// Room for the text fields and multipart framing around the files.
const FORM_OVERHEAD: usize = 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub profiles: UserDirectory,
    pub feed: PostFeed,
    pub timelines: TimelineStore,
    pub policy: UploadPolicy,
}

impl AppState {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        timelines: Arc<dyn TimelineRepository>,
        storage: Arc<dyn ObjectStorage>,
        policy: UploadPolicy,
    ) -> Self {
        let profiles = UserDirectory::new(users);
        Self {
            feed: PostFeed::new(posts, profiles.clone(), storage.clone(), policy),
            timelines: TimelineStore::new(timelines, profiles.clone(), storage, policy),
            profiles,
            policy,
        }
    }

    pub fn postgres(pool: PgPool, storage: Arc<dyn ObjectStorage>, policy: UploadPolicy) -> Self {
        Self::new(
            Arc::new(PgUserRepository::new(pool.clone())),
            Arc::new(PgPostRepository::new(pool.clone())),
            Arc::new(PgTimelineRepository::new(pool)),
            storage,
            policy,
        )
    }

    pub fn in_memory(storage: Arc<dyn ObjectStorage>, policy: UploadPolicy) -> Self {
        Self::new(
            Arc::new(MemoryUserRepository::new()),
            Arc::new(MemoryPostRepository::new()),
            Arc::new(MemoryTimelineRepository::new()),
            storage,
            policy,
        )
    }

    /// Largest request body accepted: a full batch of maximum-size files.
    pub fn body_limit(&self) -> usize {
        let files = usize::try_from(self.policy.max_file_size).unwrap_or(usize::MAX);
        files
            .saturating_mul(self.policy.max_files.max(1))
            .saturating_add(FORM_OVERHEAD)
    }
}
