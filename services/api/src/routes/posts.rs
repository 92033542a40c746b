//! Post feed routes

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::{
    AppState,
    error::ApiResult,
    models::{CommentRequest, IdentityRequest, PostListQuery, RetweetRequest},
    routes::{ApiJson, deleted, parse_id},
    uploads::UploadForm,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/posts", get(list_posts).post(create_post))
        .route("/api/posts/:id", delete(delete_post))
        .route("/api/posts/:id/like", post(toggle_like))
        .route("/api/posts/:id/comment", post(add_comment))
        .route("/api/posts/:id/retweet", post(retweet))
        .route("/api/posts/:id/comments/:comment_id", delete(delete_comment))
}

/// Create a post from a multipart form (`content`, `identityKey`, `image`)
pub async fn create_post(
    State(state): State<AppState>,
    mut form: UploadForm,
) -> ApiResult<impl IntoResponse> {
    let identity_key = form.identity_key()?;
    let content = form.text("content").unwrap_or_default();
    let image = form.single_file("image")?;

    let post = state.feed.create_post(&identity_key, &content, image).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostListQuery>,
) -> ApiResult<impl IntoResponse> {
    let page = state.feed.list_posts(&query).await?;
    Ok(Json(page))
}

/// Like the post, or unlike it if the caller already does
pub async fn toggle_like(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<IdentityRequest>,
) -> ApiResult<impl IntoResponse> {
    let post = state
        .feed
        .toggle_like(parse_id(&id)?, &payload.identity_key)
        .await?;
    Ok(Json(post))
}

pub async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<CommentRequest>,
) -> ApiResult<impl IntoResponse> {
    let post = state
        .feed
        .add_comment(parse_id(&id)?, &payload.identity_key, &payload.text)
        .await?;
    Ok(Json(post))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path((id, comment_id)): Path<(String, String)>,
    ApiJson(payload): ApiJson<IdentityRequest>,
) -> ApiResult<impl IntoResponse> {
    let post = state
        .feed
        .delete_comment(parse_id(&id)?, parse_id(&comment_id)?, &payload.identity_key)
        .await?;
    Ok(Json(post))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<IdentityRequest>,
) -> ApiResult<impl IntoResponse> {
    state
        .feed
        .delete_post(parse_id(&id)?, &payload.identity_key)
        .await?;
    Ok(deleted("Post deleted successfully"))
}

/// Share a post, optionally with a quote
pub async fn retweet(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(payload): ApiJson<RetweetRequest>,
) -> ApiResult<impl IntoResponse> {
    let post = state
        .feed
        .retweet(parse_id(&id)?, &payload.identity_key, payload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(post)))
}
