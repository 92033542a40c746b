//! Timeline and timeline entry routes

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
};
use serde_json::Value;

use crate::{
    AppState,
    error::ApiResult,
    models::{EntryForm, IdentityRequest, NewTimeline, TimelineListQuery, TimelinePatch},
    routes::{ApiJson, deleted, parse_id, whitelisted},
    uploads::UploadForm,
};

/// Fields a timeline update may carry
const UPDATABLE_FIELDS: [&str; 12] = [
    "identityKey",
    "clerkId",
    "title",
    "cropType",
    "startDate",
    "endDate",
    "description",
    "status",
    "totalArea",
    "expectedYield",
    "actualYield",
    "tags",
];

/// Multipart field names accepted for entry images
const IMAGE_FIELDS: [&str; 2] = ["images", "images[]"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/timelines", get(list_timelines).post(create_timeline))
        .route(
            "/api/timelines/:id",
            get(get_timeline)
                .put(update_timeline)
                .delete(delete_timeline),
        )
        .route("/api/timelines/:id/entries", post(add_entry))
        .route(
            "/api/timelines/:id/entries/:entry_id",
            put(update_entry).delete(delete_entry),
        )
}

fn entry_form(form: &mut UploadForm) -> EntryForm {
    EntryForm {
        date: form.text("date"),
        activity: form.text("activity"),
        weather: form.text("weather"),
        notes: form.text("notes"),
        metrics: form.text("metrics"),
        tags: form.text("tags"),
    }
}

pub async fn create_timeline(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<NewTimeline>,
) -> ApiResult<impl IntoResponse> {
    let timeline = state.timelines.create(payload).await?;
    Ok((StatusCode::CREATED, Json(timeline)))
}

/// Timelines of one owner (`clerkId`), optionally filtered by `status`
pub async fn list_timelines(
    State(state): State<AppState>,
    Query(query): Query<TimelineListQuery>,
) -> ApiResult<impl IntoResponse> {
    let timelines = state.timelines.list(query).await?;
    Ok(Json(timelines))
}

pub async fn get_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let timeline = state.timelines.get(parse_id(&id)?).await?;
    Ok(Json(timeline))
}

pub async fn update_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<impl IntoResponse> {
    let patch: TimelinePatch = whitelisted(body, &UPDATABLE_FIELDS)?;
    let timeline = state.timelines.update(parse_id(&id)?, patch).await?;
    Ok(Json(timeline))
}

pub async fn delete_timeline(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<IdentityRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .timelines
        .delete(parse_id(&id)?, &payload.identity_key)
        .await?;
    Ok(deleted("Timeline deleted successfully"))
}

/// Append an entry from a multipart form, with up to the configured number
/// of images
pub async fn add_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut form: UploadForm,
) -> ApiResult<impl IntoResponse> {
    let timeline_id = parse_id(&id)?;
    let identity_key = form.identity_key()?;
    let images = form.files(&IMAGE_FIELDS)?;

    let timeline = state
        .timelines
        .add_entry(timeline_id, &identity_key, entry_form(&mut form), images)
        .await?;
    Ok((StatusCode::CREATED, Json(timeline)))
}

pub async fn update_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(String, String)>,
    mut form: UploadForm,
) -> ApiResult<impl IntoResponse> {
    let timeline_id = parse_id(&id)?;
    let entry_id = parse_id(&entry_id)?;
    let identity_key = form.identity_key()?;
    let images = form.files(&IMAGE_FIELDS)?;

    let timeline = state
        .timelines
        .update_entry(
            timeline_id,
            entry_id,
            &identity_key,
            entry_form(&mut form),
            images,
        )
        .await?;
    Ok(Json(timeline))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    Path((id, entry_id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<IdentityRequest>,
) -> ApiResult<impl IntoResponse> {
    let timeline = state
        .timelines
        .delete_entry(parse_id(&id)?, parse_id(&entry_id)?, &payload.identity_key)
        .await?;
    Ok(Json(timeline))
}
