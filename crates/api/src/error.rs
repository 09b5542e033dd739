//! API error responses.
//!
//! Every failure leaves the API as `{"error": "<CODE>", "message": "..."}`
//! with the status of the underlying [`AppError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use ledgerbridge_core::access::AccessError;
use ledgerbridge_core::import::ImportError;
use ledgerbridge_core::qbo::{ProviderError, StateError};
use ledgerbridge_core::tenant::TenantError;
use ledgerbridge_db::RepoError;
use ledgerbridge_shared::AppError;
use serde::Serialize;
use tracing::error;

/// Error returned by handlers and extractors.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Result type alias for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code.
    pub error: &'static str,
    /// Human readable detail.
    pub message: String,
}

impl ApiError {
    /// Returns the HTTP status code.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Returns the stable error code.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        self.0.error_code()
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self(AppError::Validation(message.into()))
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.0.is_client_safe() {
            self.0.to_string()
        } else {
            error!(error = %self.0, "Request failed");
            "An internal error occurred".to_string()
        };
        let body = ErrorBody {
            error: self.error_code(),
            message,
        };
        (self.status_code(), Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        Self(err.into())
    }
}

impl From<TenantError> for ApiError {
    fn from(err: TenantError) -> Self {
        Self(err.into())
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        Self(err.into())
    }
}

impl From<StateError> for ApiError {
    fn from(err: StateError) -> Self {
        Self(err.into())
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        Self(err.into())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        Self(err.into())
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self(AppError::Database(err.to_string()))
    }
}
