//! Repositories for database operations
//!
//! Each aggregate (user, post, timeline) is stored as one row with its child
//! collections inline. Posts and timelines are saved with compare-and-swap on
//! their `version` column: a save whose version no longer matches the stored
//! one fails with [`DatabaseError::Conflict`] and the caller re-reads.

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Post, Timeline, TimelineStatus, User};

#[cfg(test)]
pub(crate) mod faulty;
pub mod memory;
pub mod post;
pub mod timeline;
pub mod user;

pub use memory::{MemoryPostRepository, MemoryTimelineRepository, MemoryUserRepository};
pub use post::PgPostRepository;
pub use timeline::PgTimelineRepository;
pub use user::PgUserRepository;

/// Farmer profiles
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_clerk_id(&self, clerk_id: &str) -> DatabaseResult<Option<User>>;

    /// Users with the given ids, in no particular order. Unknown ids are skipped.
    async fn find_by_ids(&self, ids: &[Uuid]) -> DatabaseResult<Vec<User>>;

    async fn insert(&self, user: &User) -> DatabaseResult<()>;

    async fn update(&self, user: &User) -> DatabaseResult<()>;
}

/// Feed posts
#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Post>>;

    /// Newest first, optionally restricted to one author.
    async fn list(&self, author: Option<Uuid>, offset: i64, limit: i64) -> DatabaseResult<Vec<Post>>;

    async fn count(&self, author: Option<Uuid>) -> DatabaseResult<i64>;

    async fn insert(&self, post: &Post) -> DatabaseResult<()>;

    /// Write `post` if the stored version still equals `post.version`.
    /// Returns the stored post with its version bumped.
    async fn save(&self, post: &Post) -> DatabaseResult<Post>;

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool>;
}

/// Crop timelines. Mutations filter on owner and id together.
#[async_trait]
pub trait TimelineRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Timeline>>;

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<Option<Timeline>>;

    /// Latest start date first.
    async fn list_by_owner(
        &self,
        owner: Uuid,
        status: Option<TimelineStatus>,
    ) -> DatabaseResult<Vec<Timeline>>;

    async fn insert(&self, timeline: &Timeline) -> DatabaseResult<()>;

    /// Compare-and-swap save, see [`PostRepository::save`].
    async fn save(&self, timeline: &Timeline) -> DatabaseResult<Timeline>;

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<bool>;
}

/// Apply the embedded migrations.
pub async fn run_migrations(pool: &PgPool) -> DatabaseResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))
}

/// Map a decode failure of a stored value into a query error.
pub(crate) fn decode_error<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}
