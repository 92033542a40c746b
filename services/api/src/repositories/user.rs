//! PostgreSQL user repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::models::User;
use crate::repositories::UserRepository;

const USER_COLUMNS: &str = "id, clerk_id, email, location, farm_size, main_crops, farming_type, \
                            created_at, updated_at";

/// User repository for database operations
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> Result<User, sqlx::Error> {
    let farming_type: String = row.try_get("farming_type")?;

    Ok(User {
        id: row.try_get("id")?,
        clerk_id: row.try_get("clerk_id")?,
        email: row.try_get("email")?,
        location: row.try_get("location")?,
        farm_size: row.try_get("farm_size")?,
        main_crops: row.try_get("main_crops")?,
        farming_type: farming_type
            .parse()
            .map_err(|e: String| sqlx::Error::Decode(e.into()))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_clerk_id(&self, clerk_id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM users WHERE clerk_id = $1",
            USER_COLUMNS
        ))
        .bind(clerk_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> DatabaseResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(&format!(
            "SELECT {} FROM users WHERE id = ANY($1)",
            USER_COLUMNS
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(user_from_row)
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Query)
    }

    async fn insert(&self, user: &User) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, clerk_id, email, location, farm_size, main_crops, farming_type,
                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.clerk_id)
        .bind(&user.email)
        .bind(&user.location)
        .bind(&user.farm_size)
        .bind(&user.main_crops)
        .bind(user.farming_type.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn update(&self, user: &User) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET location = $2, farm_size = $3, main_crops = $4, farming_type = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.location)
        .bind(&user.farm_size)
        .bind(&user.main_crops)
        .bind(user.farming_type.as_str())
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }
}
