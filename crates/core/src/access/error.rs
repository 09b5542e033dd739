//! Access error types.

use ledgerbridge_shared::AppError;
use thiserror::Error;

use crate::access::role::Capability;

/// Errors raised by the capability policy and visibility checks.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The caller's role lacks the capability.
    #[error("Role is not allowed to {0}")]
    Denied(Capability),

    /// The row exists but is outside the caller's visibility.
    #[error("{0} not found")]
    NotVisible(&'static str),
}

impl AccessError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Denied(_) => 403,
            Self::NotVisible(_) => 404,
        }
    }
}

impl From<AccessError> for AppError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Denied(_) => Self::AccessDenied(err.to_string()),
            AccessError::NotVisible(_) => Self::NotFound(err.to_string()),
        }
    }
}
