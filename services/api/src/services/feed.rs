//! Post feed: posts, likes, comments and retweets

use media::{ObjectStorage, Upload, UploadPolicy};
use std::{collections::HashSet, sync::Arc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::post::{self, require_content};
use crate::models::{Post, PostListQuery, PostPage, PostView};
use crate::repositories::PostRepository;
use crate::services::{MAX_WRITE_ATTEMPTS, UserDirectory, release_best_effort, store_uploads};

#[derive(Clone)]
pub struct PostFeed {
    posts: Arc<dyn PostRepository>,
    directory: UserDirectory,
    storage: Arc<dyn ObjectStorage>,
    policy: UploadPolicy,
}

fn post_not_found() -> ApiError {
    ApiError::NotFound("Post not found".to_string())
}

impl PostFeed {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        directory: UserDirectory,
        storage: Arc<dyn ObjectStorage>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            posts,
            directory,
            storage,
            policy,
        }
    }

    pub async fn create_post(
        &self,
        identity_key: &str,
        content: &str,
        image: Option<Upload>,
    ) -> ApiResult<PostView> {
        let author = self.directory.resolve(identity_key).await?;
        require_content(content, image.is_some())?;

        let image_url = match image {
            Some(upload) => store_uploads(self.storage.as_ref(), &self.policy, &[upload])
                .await?
                .pop(),
            None => None,
        };
        let uploaded: Vec<String> = image_url.iter().cloned().collect();

        let stored = match Post::new(author.id, content, image_url) {
            Ok(post) => self.posts.insert(&post).await.map(|_| post).map_err(ApiError::from),
            Err(e) => Err(e),
        };
        let post = match stored {
            Ok(post) => post,
            Err(e) => {
                release_best_effort(self.storage.as_ref(), &uploaded).await;
                return Err(e);
            }
        };

        info!("Post {} created by {}", post.id, author.clerk_id);
        self.populate(post).await
    }

    /// One page of the feed, newest first. An unknown author filter yields an
    /// empty page.
    pub async fn list_posts(&self, query: &PostListQuery) -> ApiResult<PostPage> {
        let page = query.page();
        let limit = query.limit();

        let author = match query.user_id.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => match self.directory.resolve(key).await {
                Ok(user) => Some(user.id),
                Err(ApiError::NotFound(_)) => {
                    return Ok(PostPage {
                        posts: Vec::new(),
                        current_page: page,
                        total_pages: 0,
                        total_posts: 0,
                    });
                }
                Err(e) => return Err(e),
            },
            _ => None,
        };

        let offset = i64::from(page - 1) * i64::from(limit);
        let posts = self.posts.list(author, offset, i64::from(limit)).await?;
        let total = self.posts.count(author).await?;

        Ok(PostPage {
            posts: self.populate_all(posts).await?,
            current_page: page,
            total_pages: post::total_pages(total, limit),
            total_posts: total,
        })
    }

    pub async fn toggle_like(&self, post_id: Uuid, identity_key: &str) -> ApiResult<PostView> {
        let user = self.directory.resolve(identity_key).await?;
        let post = self
            .mutate(post_id, |post| {
                post.toggle_like(user.id);
                Ok(())
            })
            .await?;
        self.populate(post).await
    }

    pub async fn add_comment(
        &self,
        post_id: Uuid,
        identity_key: &str,
        text: &str,
    ) -> ApiResult<PostView> {
        let user = self.directory.resolve(identity_key).await?;
        let post = self
            .mutate(post_id, |post| post.add_comment(user.id, text).map(|_| ()))
            .await?;
        self.populate(post).await
    }

    pub async fn delete_comment(
        &self,
        post_id: Uuid,
        comment_id: Uuid,
        identity_key: &str,
    ) -> ApiResult<PostView> {
        let user = self.directory.resolve(identity_key).await?;
        let post = self
            .mutate(post_id, |post| {
                post.remove_comment(comment_id, user.id).map(|_| ())
            })
            .await?;
        self.populate(post).await
    }

    /// Delete a post owned by the caller. The attached image is released
    /// first; a failed release never keeps the post alive.
    pub async fn delete_post(&self, post_id: Uuid, identity_key: &str) -> ApiResult<()> {
        let user = self.directory.resolve(identity_key).await?;
        let post = self.find(post_id).await?;
        post.ensure_author(user.id)?;

        if let Some(image) = post.owned_image() {
            release_best_effort(self.storage.as_ref(), &[image.to_string()]).await;
        }

        if !self.posts.delete(post_id).await? {
            return Err(post_not_found());
        }
        info!("Post {} deleted by {}", post_id, user.clerk_id);
        Ok(())
    }

    /// Share a post, optionally with a quote. Retweeting a retweet shares the
    /// post it points to. The counter on the shared post is bumped after the
    /// retweet is stored; failing to bump it does not fail the request.
    pub async fn retweet(
        &self,
        post_id: Uuid,
        identity_key: &str,
        quote: Option<String>,
    ) -> ApiResult<PostView> {
        let user = self.directory.resolve(identity_key).await?;
        let mut original = self.find(post_id).await?;
        if let Some(root) = original.original_post.filter(|_| original.is_retweet) {
            if let Some(root) = self.posts.find_by_id(root).await? {
                original = root;
            }
        }

        let retweet = Post::retweet_of(&original, user.id, quote);
        self.posts.insert(&retweet).await?;
        info!("Post {} retweeted by {}", original.id, user.clerk_id);

        let counted = self
            .mutate(original.id, |post| {
                post.record_retweet(user.id);
                Ok(())
            })
            .await;
        if let Err(e) = counted {
            warn!("Failed to count retweet of post {}: {}", original.id, e);
        }

        self.populate(retweet).await
    }

    async fn find(&self, post_id: Uuid) -> ApiResult<Post> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(post_not_found)
    }

    /// Read-modify-write with compare-and-swap, re-reading on conflict.
    async fn mutate<F>(&self, post_id: Uuid, mut change: F) -> ApiResult<Post>
    where
        F: FnMut(&mut Post) -> ApiResult<()> + Send,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let mut post = self.find(post_id).await?;
            change(&mut post)?;

            match self.posts.save(&post).await {
                Ok(saved) => return Ok(saved),
                Err(e) if e.is_conflict() => {
                    debug!("Post {} changed during write (attempt {})", post_id, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(ApiError::Conflict(format!(
            "Post {} is being modified concurrently, please retry",
            post_id
        )))
    }

    async fn populate(&self, post: Post) -> ApiResult<PostView> {
        let users = self.directory.users_by_ids(&post.referenced_users()).await?;
        Ok(PostView::build(post, &users))
    }

    async fn populate_all(&self, posts: Vec<Post>) -> ApiResult<Vec<PostView>> {
        let mut seen = HashSet::new();
        let ids: Vec<Uuid> = posts
            .iter()
            .flat_map(Post::referenced_users)
            .filter(|id| seen.insert(*id))
            .collect();
        let users = self.directory.users_by_ids(&ids).await?;

        Ok(posts
            .into_iter()
            .map(|post| PostView::build(post, &users))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProfileSync;
    use crate::repositories::MemoryUserRepository;
    use crate::repositories::faulty::FaultyPostRepository;
    use media::MemoryStorage;

    struct Fixture {
        feed: PostFeed,
        posts: Arc<FaultyPostRepository>,
        storage: Arc<MemoryStorage>,
    }

    async fn fixture(identities: &[&str]) -> Fixture {
        let directory = UserDirectory::new(Arc::new(MemoryUserRepository::new()));
        for key in identities {
            let sync: ProfileSync = serde_json::from_value(serde_json::json!({
                "identityKey": key,
                "email": format!("{}@farm.test", key)
            }))
            .unwrap();
            directory.upsert_profile(sync).await.unwrap();
        }

        let posts = Arc::new(FaultyPostRepository::new());
        let storage = Arc::new(MemoryStorage::new());
        let feed = PostFeed::new(
            posts.clone(),
            directory,
            storage.clone(),
            UploadPolicy::default(),
        );
        Fixture {
            feed,
            posts,
            storage,
        }
    }

    fn photo() -> Upload {
        Upload::new("field.jpg", "image/jpeg", vec![7; 64])
    }

    #[tokio::test]
    async fn test_create_post_with_image() {
        let fx = fixture(&["u1"]).await;
        let view = fx.feed.create_post("u1", "", Some(photo())).await.unwrap();

        let image = view.image.unwrap();
        assert!(fx.storage.contains(&image));
        assert_eq!(view.author.unwrap().clerk_id, "u1");
    }

    #[tokio::test]
    async fn test_create_post_needs_a_known_author() {
        let fx = fixture(&[]).await;
        let err = fx
            .feed
            .create_post("ghost", "hello", Some(photo()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "User not found"));
        assert!(fx.storage.is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_releases_the_uploaded_image() {
        let fx = fixture(&["u1"]).await;
        fx.posts.fail_inserts(true);

        let err = fx
            .feed
            .create_post("u1", "new tractor", Some(photo()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Database(_)));
        assert_eq!(fx.storage.released().len(), 1);
        assert!(fx.storage.is_empty());
    }

    #[tokio::test]
    async fn test_failed_image_upload_stores_no_post() {
        let fx = fixture(&["u1"]).await;
        fx.storage.fail_uploads(true);

        let err = fx
            .feed
            .create_post("u1", "new tractor", Some(photo()))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Storage(_)));
        let page = fx.feed.list_posts(&PostListQuery::default()).await.unwrap();
        assert_eq!(page.total_posts, 0);
    }

    #[tokio::test]
    async fn test_delete_post_releases_image_even_when_storage_fails() {
        let fx = fixture(&["u1", "u2"]).await;
        let view = fx.feed.create_post("u1", "tractor", Some(photo())).await.unwrap();

        let err = fx.feed.delete_post(view.id, "u2").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(fx.storage.released().is_empty());

        fx.storage.fail_releases(true);
        fx.feed.delete_post(view.id, "u1").await.unwrap();
        assert_eq!(fx.storage.released().len(), 1);

        let err = fx.feed.delete_post(view.id, "u1").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(ref m) if m == "Post not found"));
    }

    #[tokio::test]
    async fn test_retweet_counts_on_the_original() {
        let fx = fixture(&["u1", "u2"]).await;
        let original = fx.feed.create_post("u1", "first harvest", Some(photo())).await.unwrap();

        let retweet = fx
            .feed
            .retweet(original.id, "u2", Some("well done".to_string()))
            .await
            .unwrap();
        assert!(retweet.is_retweet);
        assert_eq!(retweet.original_post, Some(original.id));
        assert_eq!(retweet.image, None);

        // Retweeting the retweet counts on the original too.
        fx.feed.retweet(retweet.id, "u1", None).await.unwrap();

        let page = fx.feed.list_posts(&PostListQuery::default()).await.unwrap();
        let stored = page.posts.iter().find(|p| p.id == original.id).unwrap();
        assert_eq!(stored.retweet_count, 2);
        assert_eq!(stored.retweeted_by, vec!["u2", "u1"]);

        fx.feed.delete_post(retweet.id, "u2").await.unwrap();
        assert!(fx.storage.released().is_empty());
    }

    #[tokio::test]
    async fn test_retweet_succeeds_when_counting_fails() {
        let fx = fixture(&["u1", "u2"]).await;
        let original = fx.feed.create_post("u1", "mulching", None).await.unwrap();
        fx.posts.fail_saves(true);

        let retweet = fx.feed.retweet(original.id, "u2", None).await.unwrap();
        assert!(retweet.is_retweet);
        assert_eq!(retweet.original_post, Some(original.id));

        let page = fx.feed.list_posts(&PostListQuery::default()).await.unwrap();
        assert_eq!(page.total_posts, 2);
        let stored = page.posts.iter().find(|p| p.id == original.id).unwrap();
        assert_eq!(stored.retweet_count, 0);
    }

    #[tokio::test]
    async fn test_list_filters_by_author_identity() {
        let fx = fixture(&["u1", "u2"]).await;
        fx.feed.create_post("u1", "a", None).await.unwrap();
        fx.feed.create_post("u2", "b", None).await.unwrap();

        let query = PostListQuery {
            user_id: Some("u2".to_string()),
            ..PostListQuery::default()
        };
        let page = fx.feed.list_posts(&query).await.unwrap();
        assert_eq!(page.total_posts, 1);
        assert_eq!(page.posts[0].content, "b");

        let query = PostListQuery {
            user_id: Some("nobody".to_string()),
            ..PostListQuery::default()
        };
        let page = fx.feed.list_posts(&query).await.unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.total_pages, 0);
    }
}
