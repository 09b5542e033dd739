//! Provider and OAuth state error types.

use ledgerbridge_shared::AppError;
use thiserror::Error;

/// Errors returned by calls to the accounting provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Network or TLS failure before a response arrived.
    #[error("QuickBooks unavailable: {0}")]
    Unavailable(String),

    /// Non-success response other than throttling.
    #[error("QuickBooks rejected request ({status}): {detail}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Response body.
        detail: String,
    },

    /// HTTP 429 from the provider.
    #[error("QuickBooks rate limit exceeded")]
    RateLimited,

    /// Client id or secret is not configured.
    #[error("QuickBooks client credentials are not configured")]
    CredentialsMissing,

    /// A success response whose body could not be decoded.
    #[error("Unexpected QuickBooks response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Returns true for throttling, the only transient provider failure.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Unavailable(detail) => Self::ProviderUnavailable(detail),
            ProviderError::Rejected { status, detail } => Self::ProviderRejected { status, detail },
            ProviderError::RateLimited => Self::RateLimited,
            ProviderError::CredentialsMissing | ProviderError::Decode(_) => {
                Self::ProviderUnavailable(err.to_string())
            }
        }
    }
}

/// Errors raised while decoding an OAuth state token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    /// Not base64url JSON, missing fields, or bad signature.
    #[error("{0}")]
    Invalid(&'static str),

    /// Issued outside the allowed window.
    #[error("state expired")]
    Expired,

    /// Payload could not be serialized.
    #[error("failed to encode state: {0}")]
    Encode(String),

    /// The signing secret is empty.
    #[error("state signing secret is empty")]
    EmptySecret,
}

impl From<StateError> for AppError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Invalid(reason) => Self::StateInvalid(reason.to_string()),
            StateError::Expired => Self::StateExpired,
            StateError::Encode(_) | StateError::EmptySecret => Self::Internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_errors_map_to_app_errors() {
        assert_eq!(
            AppError::from(ProviderError::Unavailable("dns".into())).status_code(),
            502
        );
        assert_eq!(
            AppError::from(ProviderError::Rejected {
                status: 400,
                detail: "invalid_grant".into()
            })
            .error_code(),
            "PROVIDER_REJECTED"
        );
        assert_eq!(AppError::from(ProviderError::RateLimited).status_code(), 429);
    }

    #[test]
    fn test_only_429_is_rate_limited() {
        assert!(ProviderError::RateLimited.is_rate_limited());
        assert!(
            !ProviderError::Rejected {
                status: 503,
                detail: String::new()
            }
            .is_rate_limited()
        );
    }

    #[test]
    fn test_state_errors_map_to_bad_request() {
        assert_eq!(
            AppError::from(StateError::Invalid("bad signature")).error_code(),
            "STATE_INVALID"
        );
        assert_eq!(AppError::from(StateError::Expired).error_code(), "STATE_EXPIRED");
    }
}
