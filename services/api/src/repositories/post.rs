//! PostgreSQL post repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::models::{Comment, Post};
use crate::repositories::PostRepository;

const POST_COLUMNS: &str = "id, author, content, image, likes, comments, is_retweet, original_post, \
                            retweeted_by, retweet_count, retweet_content, version, created_at, \
                            updated_at";

/// Post repository for database operations
#[derive(Clone)]
pub struct PgPostRepository {
    pool: PgPool,
}

impl PgPostRepository {
    /// Create a new post repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    let comments: Json<Vec<Comment>> = row.try_get("comments")?;

    Ok(Post {
        id: row.try_get("id")?,
        author: row.try_get("author")?,
        content: row.try_get("content")?,
        image: row.try_get("image")?,
        likes: row.try_get("likes")?,
        comments: comments.0,
        is_retweet: row.try_get("is_retweet")?,
        original_post: row.try_get("original_post")?,
        retweeted_by: row.try_get("retweeted_by")?,
        retweet_count: row.try_get("retweet_count")?,
        retweet_content: row.try_get("retweet_content")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(post_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn list(&self, author: Option<Uuid>, offset: i64, limit: i64) -> DatabaseResult<Vec<Post>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM posts
            WHERE ($1::uuid IS NULL OR author = $1)
            ORDER BY created_at DESC, id
            LIMIT $2 OFFSET $3
            "#,
            POST_COLUMNS
        ))
        .bind(author)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(post_from_row)
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Query)
    }

    async fn count(&self, author: Option<Uuid>) -> DatabaseResult<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE ($1::uuid IS NULL OR author = $1)")
            .bind(author)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::Query)
    }

    async fn insert(&self, post: &Post) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author, content, image, likes, comments, is_retweet,
                               original_post, retweeted_by, retweet_count, retweet_content,
                               version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(post.id)
        .bind(post.author)
        .bind(&post.content)
        .bind(&post.image)
        .bind(&post.likes)
        .bind(Json(&post.comments))
        .bind(post.is_retweet)
        .bind(post.original_post)
        .bind(&post.retweeted_by)
        .bind(post.retweet_count)
        .bind(&post.retweet_content)
        .bind(post.version)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn save(&self, post: &Post) -> DatabaseResult<Post> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE posts
            SET content = $3, image = $4, likes = $5, comments = $6, retweeted_by = $7,
                retweet_count = $8, retweet_content = $9, version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING {}
            "#,
            POST_COLUMNS
        ))
        .bind(post.id)
        .bind(post.version)
        .bind(&post.content)
        .bind(&post.image)
        .bind(&post.likes)
        .bind(Json(&post.comments))
        .bind(&post.retweeted_by)
        .bind(post.retweet_count)
        .bind(&post.retweet_content)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        match row {
            Some(row) => post_from_row(&row).map_err(DatabaseError::Query),
            None => Err(DatabaseError::Conflict {
                entity: "post",
                id: post.id.to_string(),
            }),
        }
    }

    async fn delete(&self, id: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
