use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::repository::StoreError;

/// Result alias used by the service layer.
pub type AppResult<T> = Result<T, AppError>;

/// ErrorCode
///
/// Stable machine-readable category attached to every error response. Clients branch on
/// this value, never on the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum ErrorCode {
    ValidationFailed,
    Conflict,
    NotFound,
    AlreadyInState,
    Forbidden,
    Unauthenticated,
    InternalError,
}

/// AppError
///
/// The service-layer error taxonomy. Every failure a caller can observe is one of these
/// variants; each maps to exactly one `ErrorCode` and HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),
    /// Duplicate email, username or blog body.
    #[error("{0}")]
    Conflict(String),
    /// No matching record, or a record the caller may not see.
    #[error("{0}")]
    NotFound(String),
    /// The record is already in the requested state (already deleted, not deleted,
    /// request already decided).
    #[error("{0}")]
    AlreadyInState(String),
    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),
    /// Missing or invalid credentials or session.
    #[error("{0}")]
    Unauthenticated(String),
    /// Store or infrastructure failure. The detail is logged, not returned.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::ValidationFailed,
            Self::Conflict(_) => ErrorCode::Conflict,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::AlreadyInState(_) => ErrorCode::AlreadyInState,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::Unauthenticated(_) => ErrorCode::Unauthenticated,
            Self::Internal(_) => ErrorCode::InternalError,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) | Self::AlreadyInState(_) => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

impl From<StoreError> for AppError {
    /// Store failures that the services did not handle explicitly. `NotFound` and
    /// `NoRowsAffected` are normally matched at the call site; reaching this path means the
    /// record vanished between two steps.
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound("record not found".to_string()),
            StoreError::NoRowsAffected => {
                Self::AlreadyInState("no rows affected".to_string())
            }
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Database(message) => Self::Internal(message),
        }
    }
}

/// ErrorBody
///
/// JSON envelope for every error response.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(detail) => {
                tracing::error!(detail = %detail, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorBody {
            code: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
