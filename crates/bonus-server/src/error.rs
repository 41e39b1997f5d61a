//! Error types for the bonus server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bonus_core::{BonusError, ErrorKind};
use serde_json::json;

use crate::store::StoreError;

/// Application error type.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Bonus(#[from] BonusError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Customer already exists: {0}")]
    AlreadyExists(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AlreadyExists(key) => AppError::AlreadyExists(key),
            e if e.is_unavailable() => AppError::Bonus(BonusError::StoreUnavailable(e.to_string())),
            e => AppError::Internal(e.to_string()),
        }
    }
}

impl AppError {
    /// Wire name of the error, as sent in the `error` field.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Bonus(e) => e.kind().as_str(),
            AppError::BadRequest(_) => ErrorKind::InvalidRequest.as_str(),
            AppError::AlreadyExists(_) => "AlreadyExists",
            AppError::Internal(_) => "Internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Bonus(e) => match e.kind() {
                ErrorKind::InvalidAmount
                | ErrorKind::BonusExceedsAmount
                | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::InsufficientBalance | ErrorKind::Contention => StatusCode::CONFLICT,
                ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AlreadyExists(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            AppError::Bonus(BonusError::StoreUnavailable(msg)) => {
                tracing::error!("Store unavailable: {}", msg);
                "Bonus store is temporarily unavailable, retry later".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "error": self.kind(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}
