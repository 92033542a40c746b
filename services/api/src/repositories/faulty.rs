//! Repositories that fail writes on demand, wrapping the in-memory ones

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

use crate::models::{Post, Timeline, TimelineStatus};
use crate::repositories::{
    MemoryPostRepository, MemoryTimelineRepository, PostRepository, TimelineRepository,
};

fn outage() -> DatabaseError {
    DatabaseError::Query(sqlx::Error::PoolTimedOut)
}

#[derive(Default)]
pub struct FaultyPostRepository {
    inner: MemoryPostRepository,
    fail_inserts: AtomicBool,
    fail_saves: AtomicBool,
}

impl FaultyPostRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostRepository for FaultyPostRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Post>> {
        self.inner.find_by_id(id).await
    }

    async fn list(&self, author: Option<Uuid>, offset: i64, limit: i64) -> DatabaseResult<Vec<Post>> {
        self.inner.list(author, offset, limit).await
    }

    async fn count(&self, author: Option<Uuid>) -> DatabaseResult<i64> {
        self.inner.count(author).await
    }

    async fn insert(&self, post: &Post) -> DatabaseResult<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inner.insert(post).await
    }

    async fn save(&self, post: &Post) -> DatabaseResult<Post> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(outage());
        }
        self.inner.save(post).await
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        self.inner.delete(id).await
    }
}

/// Every save loses the compare-and-swap while `conflict_saves` is set.
#[derive(Default)]
pub struct FaultyTimelineRepository {
    inner: MemoryTimelineRepository,
    conflict_saves: AtomicBool,
}

impl FaultyTimelineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conflict_saves(&self, conflict: bool) {
        self.conflict_saves.store(conflict, Ordering::SeqCst);
    }
}

#[async_trait]
impl TimelineRepository for FaultyTimelineRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Timeline>> {
        self.inner.find_by_id(id).await
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<Option<Timeline>> {
        self.inner.find_owned(id, owner).await
    }

    async fn list_by_owner(
        &self,
        owner: Uuid,
        status: Option<TimelineStatus>,
    ) -> DatabaseResult<Vec<Timeline>> {
        self.inner.list_by_owner(owner, status).await
    }

    async fn insert(&self, timeline: &Timeline) -> DatabaseResult<()> {
        self.inner.insert(timeline).await
    }

    async fn save(&self, timeline: &Timeline) -> DatabaseResult<Timeline> {
        if self.conflict_saves.load(Ordering::SeqCst) {
            return Err(DatabaseError::Conflict {
                entity: "timeline",
                id: timeline.id.to_string(),
            });
        }
        self.inner.save(timeline).await
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<bool> {
        self.inner.delete_owned(id, owner).await
    }
}
