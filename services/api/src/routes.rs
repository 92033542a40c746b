//! API service routes

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest},
    http::{HeaderValue, Method, header},
    response::IntoResponse,
    routing::get,
};
use media::StorageBackend;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, services::ServeDir};
use uuid::Uuid;

use crate::{
    AppState,
    config::Settings,
    error::{ApiError, ApiResult},
};

pub mod posts;
pub mod profiles;
pub mod timelines;

/// JSON body extractor whose rejections use the API error shape.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.body_limit();

    Router::new()
        .route("/health", get(health_check))
        .merge(profiles::routes())
        .merge(posts::routes())
        .merge(timelines::routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// CORS for the frontend origin and, with local storage, the `/uploads`
/// file server.
pub fn with_http_layers(router: Router, settings: &Settings) -> anyhow::Result<Router> {
    let origin: HeaderValue = settings.server.cors_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let router = match settings.storage.storage_backend {
        StorageBackend::Local => router.nest_service(
            "/uploads",
            ServeDir::new(&settings.storage.file_upload_path),
        ),
        StorageBackend::Spaces | StorageBackend::Memory => router,
    };

    Ok(router.layer(cors))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "agroww-kavach-api"
    }))
}

pub(crate) fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Validation(format!("Invalid id: {}", raw)))
}

/// Deserialize an update body after checking every field is allowed.
pub(crate) fn whitelisted<T: DeserializeOwned>(body: Value, allowed: &[&str]) -> ApiResult<T> {
    let valid = body
        .as_object()
        .is_some_and(|fields| fields.keys().all(|key| allowed.contains(&key.as_str())));
    if !valid {
        return Err(ApiError::Validation("Invalid updates".to_string()));
    }

    serde_json::from_value(body)
        .map_err(|e| ApiError::validation_with("Invalid request body", e.to_string()))
}

pub(crate) fn deleted(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}
