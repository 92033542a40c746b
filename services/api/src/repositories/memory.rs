//! In-memory repositories
//!
//! Same contracts as the PostgreSQL repositories, including unique keys on
//! users and version checks on save. Used by the test-suite and by the
//! `PERSISTENCE=memory` development mode.

use async_trait::async_trait;
use chrono::Utc;
use common::error::{DatabaseError, DatabaseResult};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Post, Timeline, TimelineStatus, User};
use crate::repositories::{PostRepository, TimelineRepository, UserRepository};

#[derive(Default)]
pub struct MemoryUserRepository {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn find_by_clerk_id(&self, clerk_id: &str) -> DatabaseResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.clerk_id == clerk_id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> DatabaseResult<Vec<User>> {
        let users = self.users.read().await;
        Ok(ids.iter().filter_map(|id| users.get(id)).cloned().collect())
    }

    async fn insert(&self, user: &User) -> DatabaseResult<()> {
        let mut users = self.users.write().await;
        if let Some(existing) = users
            .values()
            .find(|u| u.clerk_id == user.clerk_id || u.email == user.email)
        {
            let constraint = if existing.clerk_id == user.clerk_id {
                "users_clerk_id_key"
            } else {
                "users_email_key"
            };
            return Err(DatabaseError::Duplicate(constraint.to_string()));
        }

        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> DatabaseResult<()> {
        let mut users = self.users.write().await;
        if let Some(stored) = users.get_mut(&user.id) {
            *stored = user.clone();
        }
        Ok(())
    }
}

/// Posts kept in insertion order so equal timestamps still list newest first.
#[derive(Default)]
pub struct MemoryPostRepository {
    posts: RwLock<Vec<Post>>,
}

impl MemoryPostRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Post>> {
        let posts = self.posts.read().await;
        Ok(posts.iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, author: Option<Uuid>, offset: i64, limit: i64) -> DatabaseResult<Vec<Post>> {
        let posts = self.posts.read().await;
        let mut matching: Vec<&Post> = posts
            .iter()
            .rev()
            .filter(|p| author.is_none_or(|a| p.author == a))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn count(&self, author: Option<Uuid>) -> DatabaseResult<i64> {
        let posts = self.posts.read().await;
        Ok(posts
            .iter()
            .filter(|p| author.is_none_or(|a| p.author == a))
            .count() as i64)
    }

    async fn insert(&self, post: &Post) -> DatabaseResult<()> {
        self.posts.write().await.push(post.clone());
        Ok(())
    }

    async fn save(&self, post: &Post) -> DatabaseResult<Post> {
        let mut posts = self.posts.write().await;
        let stored = posts
            .iter_mut()
            .find(|p| p.id == post.id && p.version == post.version)
            .ok_or_else(|| DatabaseError::Conflict {
                entity: "post",
                id: post.id.to_string(),
            })?;

        *stored = Post {
            version: post.version + 1,
            updated_at: Utc::now(),
            ..post.clone()
        };
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let mut posts = self.posts.write().await;
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() < before)
    }
}

#[derive(Default)]
pub struct MemoryTimelineRepository {
    timelines: RwLock<HashMap<Uuid, Timeline>>,
}

impl MemoryTimelineRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TimelineRepository for MemoryTimelineRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Timeline>> {
        Ok(self.timelines.read().await.get(&id).cloned())
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<Option<Timeline>> {
        let timelines = self.timelines.read().await;
        Ok(timelines.get(&id).filter(|t| t.user == owner).cloned())
    }

    async fn list_by_owner(
        &self,
        owner: Uuid,
        status: Option<TimelineStatus>,
    ) -> DatabaseResult<Vec<Timeline>> {
        let timelines = self.timelines.read().await;
        let mut owned: Vec<Timeline> = timelines
            .values()
            .filter(|t| t.user == owner)
            .filter(|t| status.is_none_or(|s| t.status == s))
            .cloned()
            .collect();
        owned.sort_by(|a, b| {
            b.start_date
                .cmp(&a.start_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(owned)
    }

    async fn insert(&self, timeline: &Timeline) -> DatabaseResult<()> {
        self.timelines
            .write()
            .await
            .insert(timeline.id, timeline.clone());
        Ok(())
    }

    async fn save(&self, timeline: &Timeline) -> DatabaseResult<Timeline> {
        let mut timelines = self.timelines.write().await;
        let stored = timelines
            .get_mut(&timeline.id)
            .filter(|t| t.user == timeline.user && t.version == timeline.version)
            .ok_or_else(|| DatabaseError::Conflict {
                entity: "timeline",
                id: timeline.id.to_string(),
            })?;

        *stored = Timeline {
            version: timeline.version + 1,
            updated_at: Utc::now(),
            ..timeline.clone()
        };
        Ok(stored.clone())
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<bool> {
        let mut timelines = self.timelines.write().await;
        match timelines.get(&id) {
            Some(t) if t.user == owner => {
                timelines.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
