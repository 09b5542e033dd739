//! Application-wide error types.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
///
/// Every variant maps to a stable machine-readable code and an HTTP status.
#[derive(Debug, Error)]
pub enum AppError {
    /// A tenant-scoped route was called without the tenant header.
    #[error("Tenant header is required")]
    TenantRequired,

    /// The tenant header is present but is not a UUID.
    #[error("Invalid tenant id: {0}")]
    InvalidTenantFormat(String),

    /// Request payload failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Caller is not allowed to perform the operation.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Resource not found (or not visible to the caller).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (e.g., duplicate entry or unique constraint).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// OAuth state token could not be parsed or its signature is wrong.
    #[error("Invalid OAuth state: {0}")]
    StateInvalid(String),

    /// OAuth state token is older than the allowed window.
    #[error("OAuth state expired")]
    StateExpired,

    /// The accounting provider could not be reached.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The accounting provider answered with a non-success status.
    #[error("Provider rejected request ({status}): {detail}")]
    ProviderRejected {
        /// HTTP status returned by the provider.
        status: u16,
        /// Response body or reason.
        detail: String,
    },

    /// The entity has no provider connection.
    #[error("No provider connection: {0}")]
    ConnectionMissing(String),

    /// The provider throttled the request.
    #[error("Provider rate limit exceeded")]
    RateLimited,

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::TenantRequired
            | Self::InvalidTenantFormat(_)
            | Self::Validation(_)
            | Self::StateInvalid(_)
            | Self::StateExpired => 400,
            Self::Unauthorized(_) => 401,
            Self::AccessDenied(_) => 403,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::ConnectionMissing(_) => 422,
            Self::RateLimited => 429,
            Self::ProviderUnavailable(_) | Self::ProviderRejected { .. } => 502,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::TenantRequired => "TENANT_REQUIRED",
            Self::InvalidTenantFormat(_) => "INVALID_TENANT_FORMAT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::AccessDenied(_) => "ACCESS_DENIED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::StateInvalid(_) => "STATE_INVALID",
            Self::StateExpired => "STATE_EXPIRED",
            Self::ProviderUnavailable(_) => "PROVIDER_UNAVAILABLE",
            Self::ProviderRejected { .. } => "PROVIDER_REJECTED",
            Self::ConnectionMissing(_) => "CONNECTION_MISSING",
            Self::RateLimited => "RATE_LIMITED",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the message may be shown to API clients verbatim.
    #[must_use]
    pub const fn is_client_safe(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Internal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(AppError::TenantRequired, 400, "TENANT_REQUIRED")]
    #[case(AppError::InvalidTenantFormat("x".into()), 400, "INVALID_TENANT_FORMAT")]
    #[case(AppError::Validation("x".into()), 400, "VALIDATION_ERROR")]
    #[case(AppError::Unauthorized("x".into()), 401, "UNAUTHORIZED")]
    #[case(AppError::AccessDenied("x".into()), 403, "ACCESS_DENIED")]
    #[case(AppError::NotFound("x".into()), 404, "NOT_FOUND")]
    #[case(AppError::Conflict("x".into()), 409, "CONFLICT")]
    #[case(AppError::StateInvalid("x".into()), 400, "STATE_INVALID")]
    #[case(AppError::StateExpired, 400, "STATE_EXPIRED")]
    #[case(AppError::ProviderUnavailable("x".into()), 502, "PROVIDER_UNAVAILABLE")]
    #[case(AppError::ProviderRejected { status: 401, detail: "x".into() }, 502, "PROVIDER_REJECTED")]
    #[case(AppError::ConnectionMissing("x".into()), 422, "CONNECTION_MISSING")]
    #[case(AppError::RateLimited, 429, "RATE_LIMITED")]
    #[case(AppError::Database("x".into()), 500, "DATABASE_ERROR")]
    #[case(AppError::Internal("x".into()), 500, "INTERNAL_ERROR")]
    fn test_status_and_code(#[case] err: AppError, #[case] status: u16, #[case] code: &str) {
        assert_eq!(err.status_code(), status);
        assert_eq!(err.error_code(), code);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            AppError::InvalidTenantFormat("abc".into()).to_string(),
            "Invalid tenant id: abc"
        );
        assert_eq!(
            AppError::ProviderRejected {
                status: 400,
                detail: "invalid_grant".into()
            }
            .to_string(),
            "Provider rejected request (400): invalid_grant"
        );
        assert_eq!(AppError::StateExpired.to_string(), "OAuth state expired");
    }

    #[test]
    fn test_internal_errors_are_not_client_safe() {
        assert!(!AppError::Database("pool timeout".into()).is_client_safe());
        assert!(!AppError::Internal("boom".into()).is_client_safe());
        assert!(AppError::Conflict("dup".into()).is_client_safe());
    }
}
