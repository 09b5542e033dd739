//! Repository error types.

use ledgerbridge_core::import::ImportError;
use ledgerbridge_shared::AppError;
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Errors returned by the repositories.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Row does not exist in the tenant or is not visible to the caller.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint rejected the write.
    #[error("{0}")]
    Conflict(String),

    /// A foreign key rejected the write.
    #[error("{0}")]
    Invalid(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl RepoError {
    /// Classifies a failed write.
    ///
    /// Unique violations become `Conflict(conflict)`, foreign key violations
    /// become `Invalid(invalid)`, anything else stays a database error.
    pub(crate) fn from_write(err: DbErr, conflict: &str, invalid: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::Conflict(conflict.to_string()),
            Some(SqlErr::ForeignKeyConstraintViolation(_)) => Self::Invalid(invalid.to_string()),
            _ => Self::Database(err),
        }
    }

    /// Classifies a failed insert that can only conflict.
    pub(crate) fn conflict_or_db(err: DbErr, conflict: &str) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => Self::Conflict(conflict.to_string()),
            _ => Self::Database(err),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(_) => Self::NotFound(err.to_string()),
            RepoError::Conflict(message) => Self::Conflict(message),
            RepoError::Invalid(message) => Self::Validation(message),
            RepoError::Database(db) => Self::Database(db.to_string()),
        }
    }
}

impl From<RepoError> for ImportError {
    fn from(err: RepoError) -> Self {
        Self::Store(err.to_string())
    }
}
