//! Custom error types for the API service

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::DatabaseError;
use media::StorageError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Custom error type for the API service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Missing or malformed input
    #[error("{0}")]
    Validation(String),

    /// Malformed input with a parser message worth returning
    #[error("{message}: {details}")]
    BadRequest { message: String, details: String },

    /// Referenced document does not exist or is not visible to the caller
    #[error("{0}")]
    NotFound(String),

    /// Caller does not own the resource
    #[error("{0}")]
    Forbidden(String),

    /// The document kept changing under concurrent writers
    #[error("{0}")]
    Conflict(String),

    /// Upload body exceeds the configured limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Object storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    pub fn validation_with(message: impl Into<String>, details: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            details: details.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(StorageError::FileTooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Storage(e) if e.is_rejection() => StatusCode::BAD_REQUEST,
            ApiError::Database(DatabaseError::Duplicate(_)) => StatusCode::BAD_REQUEST,
            ApiError::Database(DatabaseError::Conflict { .. }) => StatusCode::CONFLICT,
            ApiError::Storage(_) | ApiError::Database(_) | ApiError::InternalServerError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// JSON error body: `{ "error": ..., "details": ... }`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let (error_message, details) = match self {
            ApiError::BadRequest { message, details } => (message, Some(details)),
            ApiError::Validation(msg)
            | ApiError::NotFound(msg)
            | ApiError::Forbidden(msg)
            | ApiError::Conflict(msg)
            | ApiError::PayloadTooLarge(msg) => (msg, None),
            ApiError::Storage(e) if status.is_client_error() => (e.to_string(), None),
            ApiError::Storage(e) => ("File storage error".to_string(), Some(e.to_string())),
            ApiError::Database(DatabaseError::Duplicate(field)) => {
                ("Duplicate value".to_string(), Some(field))
            }
            ApiError::Database(e @ DatabaseError::Conflict { .. }) => (e.to_string(), None),
            ApiError::Database(_) => ("Database error".to_string(), None),
            ApiError::InternalServerError => ("Internal server error".to_string(), None),
        };

        let body = Json(ErrorBody {
            error: error_message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation_with("Invalid request body", rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(err.body_text())
        } else {
            ApiError::validation_with("Invalid multipart body", err.body_text())
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::validation_with("Invalid multipart body", rejection.body_text())
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
