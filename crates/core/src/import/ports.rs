//! Seams between the orchestrator and the outside world.
//!
//! The db crate implements [`ImportStore`]; the qbo crate implements
//! [`TokenRefresher`] and [`TrialBalanceSource`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbridge_shared::types::{EntityId, ImportRunId, QboConnectionId, SnapshotId, TenantId};

use crate::import::error::ImportError;
use crate::import::types::{ConnectionRecord, ImportRun, NewSnapshot, ReportRequest};
use crate::qbo::error::ProviderError;
use crate::qbo::report::TrialBalanceReport;
use crate::qbo::token::{TokenGrant, TokenSet};

/// Persistence used while executing runs. Every call is tenant-scoped.
#[async_trait]
pub trait ImportStore: Send + Sync {
    /// Loads a run.
    async fn load_run(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
    ) -> Result<Option<ImportRun>, ImportError>;

    /// Loads the connection of an entity.
    async fn load_connection(
        &self,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<Option<ConnectionRecord>, ImportError>;

    /// Persists refreshed tokens.
    async fn save_tokens(
        &self,
        tenant_id: TenantId,
        connection_id: QboConnectionId,
        tokens: &TokenSet,
    ) -> Result<(), ImportError>;

    /// Sets `running`, stamps `started_at` and clears `finished_at`.
    async fn mark_running(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
        at: DateTime<Utc>,
    ) -> Result<(), ImportError>;

    /// Sets `success`, clears `error_text` and stamps `finished_at`.
    async fn mark_success(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
        at: DateTime<Utc>,
    ) -> Result<(), ImportError>;

    /// Sets `failed`, records `error_text` and stamps `finished_at`.
    async fn mark_failed(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
        at: DateTime<Utc>,
        error_text: &str,
    ) -> Result<(), ImportError>;

    /// Writes a new snapshot with its lines atomically.
    async fn write_snapshot(&self, snapshot: &NewSnapshot) -> Result<SnapshotId, ImportError>;
}

/// Obtains fresh tokens from the provider.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Exchanges a refresh token for a new grant.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError>;
}

/// Fetches trial balance reports.
#[async_trait]
pub trait TrialBalanceSource: Send + Sync {
    /// Fetches the report for a company and date range.
    async fn fetch_trial_balance(
        &self,
        request: &ReportRequest,
    ) -> Result<TrialBalanceReport, ProviderError>;
}
