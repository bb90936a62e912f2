//! Shared API plumbing for the resource routers.

use crate::context::ContextError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hpcadmin_db::DbError;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            DbError::Conflict(msg) => ApiError::Conflict(msg),
            DbError::Database(e) => {
                tracing::error!(error = %e, "database operation failed");
                ApiError::InternalServerError("database error".to_string())
            }
        }
    }
}

impl From<ContextError> for ApiError {
    fn from(err: ContextError) -> Self {
        tracing::error!(error = %err, "handler built without required context");
        ApiError::InternalServerError(err.to_string())
    }
}

/// Maximum length for usernames and pirg names.
pub(crate) const MAX_NAME_LEN: usize = 64;

/// Checks that `value` is a non-empty, bounded, whitespace-free name.
pub(crate) fn validate_name(field: &str, value: &str) -> Result<(), ApiError> {
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("{field} must not be empty")));
    }
    if value.len() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "{field} must be at most {MAX_NAME_LEN} bytes"
        )));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(ApiError::BadRequest(format!(
            "{field} must not contain whitespace"
        )));
    }
    Ok(())
}

pub(crate) fn validate_email(value: &str) -> Result<(), ApiError> {
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest(format!("invalid email: {value}"))),
    }
}
