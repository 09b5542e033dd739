//! Import error types.

use chrono::NaiveDate;
use ledgerbridge_shared::AppError;
use ledgerbridge_shared::types::{EntityId, ImportRunId};
use thiserror::Error;

use crate::import::types::ImportRunStatus;
use crate::qbo::error::ProviderError;

/// Errors that can occur while creating or executing import runs.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Tax year outside the supported range.
    #[error("Tax year {0} is out of range")]
    InvalidTaxYear(i32),

    /// Period end falls before the start of the tax year.
    #[error("Period end {period_end} is before the start of tax year {tax_year}")]
    PeriodBeforeTaxYear {
        /// Requested tax year.
        tax_year: i32,
        /// Requested period end.
        period_end: NaiveDate,
    },

    /// Run does not exist in the tenant.
    #[error("Import run {0} not found")]
    RunNotFound(ImportRunId),

    /// The entity has no QuickBooks connection.
    #[error("QuickBooks connection for entity {0} not found")]
    ConnectionMissing(EntityId),

    /// The connection cannot be refreshed.
    #[error("Missing refresh token")]
    RefreshTokenMissing,

    /// Attempted a transition the state machine forbids.
    #[error("Invalid import run transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: ImportRunStatus,
        /// Attempted status.
        to: ImportRunStatus,
    },

    /// The provider call failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Persistence failed.
    #[error("Import store error: {0}")]
    Store(String),
}

impl ImportError {
    /// Returns true if the worker should retry the job.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(err) if err.is_rate_limited())
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidTaxYear(_) | Self::PeriodBeforeTaxYear { .. } => 400,
            Self::RunNotFound(_) => 404,
            Self::InvalidTransition { .. } => 409,
            Self::ConnectionMissing(_) | Self::RefreshTokenMissing => 422,
            Self::Provider(ProviderError::RateLimited) => 429,
            Self::Provider(_) => 502,
            Self::Store(_) => 500,
        }
    }
}

impl From<ImportError> for AppError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::InvalidTaxYear(_) | ImportError::PeriodBeforeTaxYear { .. } => {
                Self::Validation(err.to_string())
            }
            ImportError::RunNotFound(_) => Self::NotFound(err.to_string()),
            ImportError::InvalidTransition { .. } => Self::Conflict(err.to_string()),
            ImportError::ConnectionMissing(_) | ImportError::RefreshTokenMissing => {
                Self::ConnectionMissing(err.to_string())
            }
            ImportError::Provider(provider) => provider.into(),
            ImportError::Store(detail) => Self::Database(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(ImportError::Provider(ProviderError::RateLimited).is_retryable());
        assert!(!ImportError::Provider(ProviderError::Unavailable("x".into())).is_retryable());
        assert!(!ImportError::ConnectionMissing(EntityId::new()).is_retryable());
        assert!(!ImportError::Store("x".into()).is_retryable());
    }

    #[test]
    fn test_status_codes_match_app_errors() {
        let cases = [
            ImportError::InvalidTaxYear(0),
            ImportError::RunNotFound(ImportRunId::new()),
            ImportError::ConnectionMissing(EntityId::new()),
            ImportError::Provider(ProviderError::RateLimited),
            ImportError::Provider(ProviderError::Rejected {
                status: 401,
                detail: "expired".into(),
            }),
            ImportError::Store("down".into()),
        ];
        for err in cases {
            let status = err.status_code();
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_connection_missing_message() {
        let entity = EntityId::new();
        let err = ImportError::ConnectionMissing(entity);
        assert_eq!(
            err.to_string(),
            format!("QuickBooks connection for entity {entity} not found")
        );
    }
}
