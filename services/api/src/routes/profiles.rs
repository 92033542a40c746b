//! Profile routes

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::Value;

use crate::{
    AppState,
    error::ApiResult,
    models::{ProfilePatch, ProfileSync},
    routes::{ApiJson, whitelisted},
};

/// Fields a profile update may touch
const UPDATABLE_FIELDS: [&str; 4] = ["location", "farmSize", "mainCrops", "farmingType"];

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/profile", post(upsert_profile))
        .route("/api/profile/:id", get(get_profile).put(update_profile))
}

/// Create or merge the caller's profile
pub async fn upsert_profile(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ProfileSync>,
) -> ApiResult<impl IntoResponse> {
    let user = state.profiles.upsert_profile(payload).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Path(identity_key): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let user = state.profiles.get_profile(&identity_key).await?;
    Ok(Json(user))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Path(identity_key): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<impl IntoResponse> {
    let patch: ProfilePatch = whitelisted(body, &UPDATABLE_FIELDS)?;
    let user = state.profiles.update_profile(&identity_key, patch).await?;
    Ok(Json(user))
}
