//! Trial balance import runs.
//!
//! A run is created `queued`, picked up by a worker, and ends `success`
//! (one new snapshot) or `failed` (with `error_text`).
//!
//! # Modules
//!
//! - `types` - Run status, jobs and snapshot payloads
//! - `error` - Import-specific error types
//! - `ports` - Store and provider traits the orchestrator depends on
//! - `service` - Period validation and the run orchestrator

pub mod error;
pub mod ports;
pub mod service;
pub mod types;


pub use error::ImportError;
pub use ports::{ImportStore, TokenRefresher, TrialBalanceSource};
pub use service::{ImportOrchestrator, ImportService, MAX_TAX_YEAR, MIN_TAX_YEAR};
pub use types::{
    ConnectionRecord, ImportJob, ImportOutcome, ImportRun, ImportRunStatus, NewSnapshot,
    ReportRequest,
};
