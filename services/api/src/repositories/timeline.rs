//! PostgreSQL timeline repository

use async_trait::async_trait;
use common::error::{DatabaseError, DatabaseResult};
use sqlx::{PgPool, Row, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::models::timeline::{Area, Yield};
use crate::models::{Timeline, TimelineEntry, TimelineStatus};
use crate::repositories::{TimelineRepository, decode_error};

const TIMELINE_COLUMNS: &str = "id, user_id, title, crop_type, start_date, end_date, description, \
                                status, entries, total_area, expected_yield, actual_yield, tags, \
                                version, created_at, updated_at";

/// Timeline repository for database operations
#[derive(Clone)]
pub struct PgTimelineRepository {
    pool: PgPool,
}

impl PgTimelineRepository {
    /// Create a new timeline repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn timeline_from_row(row: &PgRow) -> Result<Timeline, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let entries: Json<Vec<TimelineEntry>> = row.try_get("entries")?;
    let total_area: Option<Json<Area>> = row.try_get("total_area")?;
    let expected_yield: Option<Json<Yield>> = row.try_get("expected_yield")?;
    let actual_yield: Option<Json<Yield>> = row.try_get("actual_yield")?;

    Ok(Timeline {
        id: row.try_get("id")?,
        user: row.try_get("user_id")?,
        title: row.try_get("title")?,
        crop_type: row.try_get("crop_type")?,
        start_date: row.try_get("start_date")?,
        end_date: row.try_get("end_date")?,
        description: row.try_get("description")?,
        status: status.parse::<TimelineStatus>().map_err(decode_error)?,
        entries: entries.0,
        total_area: total_area.map(|a| a.0),
        expected_yield: expected_yield.map(|y| y.0),
        actual_yield: actual_yield.map(|y| y.0),
        tags: row.try_get("tags")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl TimelineRepository for PgTimelineRepository {
    async fn find_by_id(&self, id: Uuid) -> DatabaseResult<Option<Timeline>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM timelines WHERE id = $1",
            TIMELINE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(timeline_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn find_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<Option<Timeline>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM timelines WHERE id = $1 AND user_id = $2",
            TIMELINE_COLUMNS
        ))
        .bind(id)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        row.as_ref()
            .map(timeline_from_row)
            .transpose()
            .map_err(DatabaseError::Query)
    }

    async fn list_by_owner(
        &self,
        owner: Uuid,
        status: Option<TimelineStatus>,
    ) -> DatabaseResult<Vec<Timeline>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM timelines
            WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY start_date DESC, created_at DESC
            "#,
            TIMELINE_COLUMNS
        ))
        .bind(owner)
        .bind(status.as_ref().map(TimelineStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::Query)?;

        rows.iter()
            .map(timeline_from_row)
            .collect::<Result<_, _>>()
            .map_err(DatabaseError::Query)
    }

    async fn insert(&self, timeline: &Timeline) -> DatabaseResult<()> {
        sqlx::query(
            r#"
            INSERT INTO timelines (id, user_id, title, crop_type, start_date, end_date, description,
                                   status, entries, total_area, expected_yield, actual_yield, tags,
                                   version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(timeline.id)
        .bind(timeline.user)
        .bind(&timeline.title)
        .bind(&timeline.crop_type)
        .bind(timeline.start_date)
        .bind(timeline.end_date)
        .bind(&timeline.description)
        .bind(timeline.status.as_str())
        .bind(Json(&timeline.entries))
        .bind(timeline.total_area.as_ref().map(Json))
        .bind(timeline.expected_yield.as_ref().map(Json))
        .bind(timeline.actual_yield.as_ref().map(Json))
        .bind(&timeline.tags)
        .bind(timeline.version)
        .bind(timeline.created_at)
        .bind(timeline.updated_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        Ok(())
    }

    async fn save(&self, timeline: &Timeline) -> DatabaseResult<Timeline> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE timelines
            SET title = $4, crop_type = $5, start_date = $6, end_date = $7, description = $8,
                status = $9, entries = $10, total_area = $11, expected_yield = $12,
                actual_yield = $13, tags = $14, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND version = $3
            RETURNING {}
            "#,
            TIMELINE_COLUMNS
        ))
        .bind(timeline.id)
        .bind(timeline.user)
        .bind(timeline.version)
        .bind(&timeline.title)
        .bind(&timeline.crop_type)
        .bind(timeline.start_date)
        .bind(timeline.end_date)
        .bind(&timeline.description)
        .bind(timeline.status.as_str())
        .bind(Json(&timeline.entries))
        .bind(timeline.total_area.as_ref().map(Json))
        .bind(timeline.expected_yield.as_ref().map(Json))
        .bind(timeline.actual_yield.as_ref().map(Json))
        .bind(&timeline.tags)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_query)?;

        match row {
            Some(row) => timeline_from_row(&row).map_err(DatabaseError::Query),
            None => Err(DatabaseError::Conflict {
                entity: "timeline",
                id: timeline.id.to_string(),
            }),
        }
    }

    async fn delete_owned(&self, id: Uuid, owner: Uuid) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM timelines WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::Query)?;

        Ok(result.rows_affected() > 0)
    }
}
