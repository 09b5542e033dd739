//! Tenant resolution error types.

use ledgerbridge_shared::AppError;
use thiserror::Error;

/// Errors that can occur while resolving or authorizing a tenant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TenantError {
    /// The route requires a tenant but no header was sent.
    #[error("Tenant header is required")]
    Missing,

    /// The header value is not a UUID.
    #[error("Invalid tenant id format: {0}")]
    InvalidFormat(String),

    /// The tenant does not exist, is inactive, suspended or deleted.
    #[error("Tenant is not accessible")]
    Inaccessible,

    /// The user has no active membership in the tenant.
    #[error("User is not a member of this tenant")]
    NotMember,
}

impl TenantError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Missing | Self::InvalidFormat(_) => 400,
            Self::Inaccessible | Self::NotMember => 403,
        }
    }
}

impl From<TenantError> for AppError {
    fn from(err: TenantError) -> Self {
        match err {
            TenantError::Missing => Self::TenantRequired,
            TenantError::InvalidFormat(raw) => Self::InvalidTenantFormat(raw),
            TenantError::Inaccessible | TenantError::NotMember => {
                Self::AccessDenied(err.to_string())
            }
        }
    }
}
