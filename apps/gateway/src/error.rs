//! HTTP error mapping for the operator API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use roslinki_db::DbError;
use roslinki_sync::SyncError;

/// Operator API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Body is not a valid snapshot.
    #[error("Invalid request body: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::Sync(err.into())
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Sync(e) if e.is_conflict() => StatusCode::CONFLICT,
            ApiError::Sync(SyncError::Validation(_)) | ApiError::Sync(SyncError::Decode(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Sync(SyncError::ShuttingDown) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Sync(SyncError::Transport(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "Request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
