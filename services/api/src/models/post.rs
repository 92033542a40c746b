//! Feed posts with their embedded likes and comments

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::user::{User, UserSummary};

/// Comment embedded in a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Post entity. `likes`, `comments` and `retweeted_by` live inside the
/// document; `version` guards concurrent read-modify-write cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: Uuid,
    pub author: Uuid,
    pub content: String,
    pub image: Option<String>,
    pub likes: Vec<Uuid>,
    pub comments: Vec<Comment>,
    pub is_retweet: bool,
    pub original_post: Option<Uuid>,
    pub retweeted_by: Vec<Uuid>,
    pub retweet_count: i64,
    pub retweet_content: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fails unless there is text or an image to show.
pub fn require_content(content: &str, has_image: bool) -> ApiResult<()> {
    if content.trim().is_empty() && !has_image {
        return Err(ApiError::Validation(
            "Post content or an image is required".to_string(),
        ));
    }
    Ok(())
}

impl Post {
    pub fn new(author: Uuid, content: &str, image: Option<String>) -> ApiResult<Self> {
        require_content(content, image.is_some())?;

        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            author,
            content: content.trim().to_string(),
            image,
            likes: Vec::new(),
            comments: Vec::new(),
            is_retweet: false,
            original_post: None,
            retweeted_by: Vec::new(),
            retweet_count: 0,
            retweet_content: None,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// A retweet of `original` by `user`, optionally quoting it. The image is
    /// not copied so deleting the retweet never touches the original's file.
    pub fn retweet_of(original: &Post, user: Uuid, quote: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            author: user,
            content: original.content.clone(),
            image: None,
            likes: Vec::new(),
            comments: Vec::new(),
            is_retweet: true,
            original_post: Some(original.id),
            retweeted_by: Vec::new(),
            retweet_count: 0,
            retweet_content: quote
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty()),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add the like if absent, remove it if present. Returns whether the post
    /// is liked by `user` afterwards.
    pub fn toggle_like(&mut self, user: Uuid) -> bool {
        match self.likes.iter().position(|id| *id == user) {
            Some(index) => {
                self.likes.remove(index);
                false
            }
            None => {
                self.likes.push(user);
                true
            }
        }
    }

    pub fn add_comment(&mut self, user: Uuid, text: &str) -> ApiResult<&Comment> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ApiError::Validation("Comment text is required".to_string()));
        }

        self.comments.push(Comment {
            id: Uuid::new_v4(),
            user,
            text: text.to_string(),
            created_at: Utc::now(),
        });
        Ok(&self.comments[self.comments.len() - 1])
    }

    /// Remove a comment written by `user`. The list is untouched on error.
    pub fn remove_comment(&mut self, comment_id: Uuid, user: Uuid) -> ApiResult<Comment> {
        let index = self
            .comments
            .iter()
            .position(|c| c.id == comment_id)
            .ok_or_else(|| ApiError::NotFound("Comment not found".to_string()))?;

        if self.comments[index].user != user {
            return Err(ApiError::Forbidden(
                "Not authorized to delete this comment".to_string(),
            ));
        }

        Ok(self.comments.remove(index))
    }

    pub fn ensure_author(&self, user: Uuid) -> ApiResult<()> {
        if self.author != user {
            return Err(ApiError::Forbidden(
                "Not authorized to delete this post".to_string(),
            ));
        }
        Ok(())
    }

    /// Count a new retweet of this post.
    pub fn record_retweet(&mut self, user: Uuid) {
        self.retweet_count += 1;
        if !self.retweeted_by.contains(&user) {
            self.retweeted_by.push(user);
        }
    }

    /// Image owned by this post, if deleting it should release a file.
    pub fn owned_image(&self) -> Option<&str> {
        if self.is_retweet {
            None
        } else {
            self.image.as_deref()
        }
    }

    /// Every user the response needs populated.
    pub fn referenced_users(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        std::iter::once(self.author)
            .chain(self.likes.iter().copied())
            .chain(self.comments.iter().map(|c| c.user))
            .chain(self.retweeted_by.iter().copied())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Comment with its author populated
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub user: Option<UserSummary>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Post as returned by the API: author and comment users populated, likes
/// and retweeters listed by identity key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub author: Option<UserSummary>,
    pub content: String,
    pub image: Option<String>,
    pub likes: Vec<String>,
    pub comments: Vec<CommentView>,
    pub is_retweet: bool,
    pub original_post: Option<Uuid>,
    pub retweeted_by: Vec<String>,
    pub retweet_count: i64,
    pub retweet_content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PostView {
    pub fn build(post: Post, users: &HashMap<Uuid, User>) -> Self {
        let clerk_ids = |ids: &[Uuid]| -> Vec<String> {
            ids.iter()
                .filter_map(|id| users.get(id))
                .map(|u| u.clerk_id.clone())
                .collect()
        };

        Self {
            id: post.id,
            author: users.get(&post.author).map(User::summary),
            likes: clerk_ids(&post.likes),
            retweeted_by: clerk_ids(&post.retweeted_by),
            comments: post
                .comments
                .into_iter()
                .map(|c| CommentView {
                    id: c.id,
                    user: users.get(&c.user).map(User::summary),
                    text: c.text,
                    created_at: c.created_at,
                })
                .collect(),
            content: post.content,
            image: post.image,
            is_retweet: post.is_retweet,
            original_post: post.original_post,
            retweet_count: post.retweet_count,
            retweet_content: post.retweet_content,
            created_at: post.created_at,
            updated_at: post.updated_at,
        }
    }
}

/// One page of the feed
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPage {
    pub posts: Vec<PostView>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_posts: i64,
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Query string of `GET /api/posts`. Numbers are parsed leniently: anything
/// unparsable falls back to the default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub user_id: Option<String>,
}

impl PostListQuery {
    pub fn page(&self) -> u32 {
        self.page
            .as_deref()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(1)
            .max(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .as_deref()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }
}

pub fn total_pages(total: i64, limit: u32) -> u32 {
    if total <= 0 {
        return 0;
    }
    let limit = i64::from(limit.max(1));
    ((total + limit - 1) / limit) as u32
}
