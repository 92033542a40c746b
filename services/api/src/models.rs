//! Domain models, request payloads and response views

use serde::Deserialize;

pub mod patch;
pub mod post;
pub mod timeline;
pub mod user;

pub use post::{Comment, Post, PostListQuery, PostPage, PostView};
pub use timeline::{
    Activity, EntryForm, EntryPatch, NewEntry, NewTimeline, Timeline, TimelineEntry,
    TimelineListQuery, TimelinePatch, TimelineStatus,
};
pub use user::{FarmingType, ProfilePatch, ProfileSync, User, UserSummary};

/// Body carrying only the caller's identity key
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRequest {
    #[serde(alias = "clerkId")]
    pub identity_key: String,
}

/// Request for adding a comment
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRequest {
    #[serde(alias = "clerkId")]
    pub identity_key: String,
    pub text: String,
}

/// Request for retweeting a post, optionally with a quote
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetweetRequest {
    #[serde(alias = "clerkId")]
    pub identity_key: String,
    #[serde(default)]
    pub content: Option<String>,
}
