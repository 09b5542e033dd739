//! Import domain types.
//!
//! An import run moves through a small state machine:
//! - Queued → Running (worker picked the job up)
//! - Running → Running (rate-limited job retried)
//! - Running → Success | Failed
//! - Queued → Failed (precondition failed before the run started)

use chrono::NaiveDate;
use ledgerbridge_shared::types::{
    ClientGroupId, EntityId, ImportRunId, QboConnectionId, SnapshotId, TenantId, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::qbo::report::NormalizedLine;
use crate::qbo::token::TokenSet;

/// Snapshot type written by imports.
pub const SNAPSHOT_TYPE_MONTH_ACTIVITY: &str = "MONTH_ACTIVITY";
/// Snapshot source for provider imports.
pub const SNAPSHOT_SOURCE_QBO_IMPORTED: &str = "QBO_IMPORTED";
/// Run type for provider imports.
pub const RUN_TYPE_IMPORT: &str = "IMPORT";

/// Report API minor version pinned for trial balance requests.
pub const QBO_MINOR_VERSION: u32 = 65;

/// Status of an import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportRunStatus {
    /// Persisted and waiting for a worker.
    Queued,
    /// A worker is executing the run.
    Running,
    /// Snapshot written.
    Success,
    /// Permanently failed; see `error_text`.
    Failed,
}

impl ImportRunStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Parses a stored status. Only the exact lowercase names are accepted.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true once the run can no longer change.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Returns true if the state machine allows `self → next`.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Queued | Self::Running, Self::Running | Self::Failed)
                | (Self::Running, Self::Success)
        )
    }
}

impl fmt::Display for ImportRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message published to the worker pool for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportJob {
    /// Run to execute.
    pub run_id: ImportRunId,
    /// Tenant owning the run.
    pub tenant_id: TenantId,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl ImportJob {
    /// First attempt for a freshly queued run.
    #[must_use]
    pub const fn first(run_id: ImportRunId, tenant_id: TenantId) -> Self {
        Self {
            run_id,
            tenant_id,
            attempt: 1,
        }
    }

    /// The same job, one attempt later.
    #[must_use]
    pub const fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt.saturating_add(1),
            ..self
        }
    }
}

/// An import run as the orchestrator sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRun {
    /// Run id.
    pub id: ImportRunId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Entity being imported.
    pub entity_id: EntityId,
    /// Client group the run was filed under.
    pub client_group_id: Option<ClientGroupId>,
    /// Tax year.
    pub tax_year: i32,
    /// Last day of the imported period.
    pub period_end_date: NaiveDate,
    /// Current status.
    pub status: ImportRunStatus,
    /// User who triggered the run.
    pub triggered_by: Option<UserId>,
}

/// A QuickBooks connection with its stored tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Connection id.
    pub id: QboConnectionId,
    /// Connected entity.
    pub entity_id: EntityId,
    /// QuickBooks company id.
    pub realm_id: String,
    /// Stored tokens.
    pub tokens: TokenSet,
}

/// Parameters of a trial balance report request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    /// QuickBooks company id.
    pub realm_id: String,
    /// Bearer token.
    pub access_token: String,
    /// First day of the report (January 1 of the tax year).
    pub start_date: NaiveDate,
    /// Last day of the report.
    pub end_date: NaiveDate,
}

/// Snapshot to be written for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnapshot {
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Imported entity.
    pub entity_id: EntityId,
    /// Producing run.
    pub import_run_id: ImportRunId,
    /// Tax year.
    pub tax_year: i32,
    /// Period end.
    pub period_end_date: NaiveDate,
    /// Snapshot type.
    pub snapshot_type: &'static str,
    /// Data source.
    pub source: &'static str,
    /// Run type.
    pub run_type: &'static str,
    /// Normalized lines.
    pub lines: Vec<NormalizedLine>,
}

/// What happened when a job was executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Snapshot written and run marked success.
    Succeeded {
        /// New snapshot.
        snapshot_id: SnapshotId,
        /// Lines written.
        line_count: usize,
    },
    /// Run marked failed; not retried.
    Failed {
        /// Recorded error text.
        reason: String,
    },
    /// Run was already terminal; nothing done.
    Skipped(ImportRunStatus),
}
