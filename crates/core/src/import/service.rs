//! Import run validation and execution.
//!
//! [`ImportService`] holds the stateless checks used when a run is created.
//! [`ImportOrchestrator`] executes a queued run end to end:
//!
//! 1. load the run (terminal runs are skipped)
//! 2. load the entity's connection
//! 3. refresh and persist tokens if they are about to expire
//! 4. mark the run running
//! 5. fetch and normalize the trial balance
//! 6. write a new snapshot
//! 7. mark the run success
//!
//! Any failure except provider rate limiting marks the run failed. A rate
//! limit leaves the run untouched and is returned so the worker can retry.

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use ledgerbridge_shared::types::SnapshotId;
use tracing::{error, info, instrument, warn};

use crate::import::error::ImportError;
use crate::import::ports::{ImportStore, TokenRefresher, TrialBalanceSource};
use crate::import::types::{
    ConnectionRecord, ImportJob, ImportOutcome, ImportRun, ImportRunStatus, NewSnapshot,
    RUN_TYPE_IMPORT, ReportRequest, SNAPSHOT_SOURCE_QBO_IMPORTED, SNAPSHOT_TYPE_MONTH_ACTIVITY,
};
use crate::qbo::report::normalize;
use crate::qbo::token::TokenSet;

/// Earliest tax year accepted.
pub const MIN_TAX_YEAR: i32 = 1900;
/// Latest tax year accepted.
pub const MAX_TAX_YEAR: i32 = 9999;

/// Default proactive refresh window.
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 300;

/// Stateless checks for import run creation.
pub struct ImportService;

impl ImportService {
    /// Returns January 1 of the tax year.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::InvalidTaxYear` outside `MIN_TAX_YEAR..=MAX_TAX_YEAR`.
    pub fn period_start(tax_year: i32) -> Result<NaiveDate, ImportError> {
        if !(MIN_TAX_YEAR..=MAX_TAX_YEAR).contains(&tax_year) {
            return Err(ImportError::InvalidTaxYear(tax_year));
        }
        NaiveDate::from_ymd_opt(tax_year, 1, 1).ok_or(ImportError::InvalidTaxYear(tax_year))
    }

    /// Validates the requested period of a new run.
    ///
    /// # Errors
    ///
    /// - `ImportError::InvalidTaxYear` if the year is out of range
    /// - `ImportError::PeriodBeforeTaxYear` if the period ends before January 1
    pub fn validate_period(tax_year: i32, period_end: NaiveDate) -> Result<(), ImportError> {
        let start = Self::period_start(tax_year)?;
        if period_end < start {
            return Err(ImportError::PeriodBeforeTaxYear {
                tax_year,
                period_end,
            });
        }
        Ok(())
    }

    /// Checks a status change against the run state machine.
    ///
    /// # Errors
    ///
    /// Returns `ImportError::InvalidTransition` if the change is not allowed.
    pub fn transition(from: ImportRunStatus, to: ImportRunStatus) -> Result<(), ImportError> {
        if from.can_transition_to(to) {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition { from, to })
        }
    }
}

/// Executes import jobs against the store and the provider.
#[derive(Clone)]
pub struct ImportOrchestrator {
    store: Arc<dyn ImportStore>,
    refresher: Arc<dyn TokenRefresher>,
    source: Arc<dyn TrialBalanceSource>,
    refresh_skew: Duration,
}

impl ImportOrchestrator {
    /// Creates an orchestrator with the default refresh window.
    #[must_use]
    pub fn new(
        store: Arc<dyn ImportStore>,
        refresher: Arc<dyn TokenRefresher>,
        source: Arc<dyn TrialBalanceSource>,
    ) -> Self {
        Self {
            store,
            refresher,
            source,
            refresh_skew: Duration::seconds(DEFAULT_REFRESH_SKEW_SECS),
        }
    }

    /// Refresh tokens this long before they expire.
    #[must_use]
    pub fn with_refresh_skew(mut self, skew: Duration) -> Self {
        self.refresh_skew = skew;
        self
    }

    /// Executes one job.
    ///
    /// Returns `Ok` whenever the run reached a decision (success, failure
    /// or already finished). Returns `Err` when nothing was recorded: a
    /// rate limit (retryable), a missing run, or a store failure.
    #[instrument(
        skip(self, job),
        fields(run_id = %job.run_id, tenant_id = %job.tenant_id, attempt = job.attempt)
    )]
    pub async fn execute(&self, job: ImportJob) -> Result<ImportOutcome, ImportError> {
        let run = self
            .store
            .load_run(job.tenant_id, job.run_id)
            .await?
            .ok_or(ImportError::RunNotFound(job.run_id))?;

        if run.status.is_terminal() {
            info!(status = %run.status, "Import run already finished, skipping");
            return Ok(ImportOutcome::Skipped(run.status));
        }

        let start_date = match ImportService::period_start(run.tax_year) {
            Ok(date) => date,
            Err(err) => return self.fail(&run, run.status, &err).await,
        };

        let Some(connection) = self
            .store
            .load_connection(run.tenant_id, run.entity_id)
            .await?
        else {
            return self
                .fail(&run, run.status, &ImportError::ConnectionMissing(run.entity_id))
                .await;
        };

        let tokens = match self.fresh_tokens(&run, &connection).await {
            Ok(tokens) => tokens,
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "Token refresh rate limited, run status unchanged");
                return Err(err);
            }
            Err(err) => return self.fail(&run, run.status, &err).await,
        };

        ImportService::transition(run.status, ImportRunStatus::Running)?;
        self.store
            .mark_running(run.tenant_id, run.id, Utc::now())
            .await?;
        info!(entity_id = %run.entity_id, "Import run running");

        let request = ReportRequest {
            realm_id: connection.realm_id.clone(),
            access_token: tokens.access_token,
            start_date,
            end_date: run.period_end_date,
        };

        match self.import_snapshot(&run, &request).await {
            Ok((snapshot_id, line_count)) => {
                ImportService::transition(ImportRunStatus::Running, ImportRunStatus::Success)?;
                self.store
                    .mark_success(run.tenant_id, run.id, Utc::now())
                    .await?;
                info!(%snapshot_id, line_count, "Import run succeeded");
                Ok(ImportOutcome::Succeeded {
                    snapshot_id,
                    line_count,
                })
            }
            Err(err) if err.is_retryable() => {
                warn!(error = %err, "Trial balance fetch rate limited, run left running");
                Err(err)
            }
            Err(err) => self.fail(&run, ImportRunStatus::Running, &err).await,
        }
    }

    async fn fresh_tokens(
        &self,
        run: &ImportRun,
        connection: &ConnectionRecord,
    ) -> Result<TokenSet, ImportError> {
        if !connection.tokens.needs_refresh(Utc::now(), self.refresh_skew) {
            return Ok(connection.tokens.clone());
        }

        let refresh_token = connection
            .tokens
            .refresh_token
            .as_deref()
            .ok_or(ImportError::RefreshTokenMissing)?;
        let grant = self.refresher.refresh(refresh_token).await?;
        let refreshed = connection.tokens.refreshed(grant, Utc::now());

        // Persisted before the fetch so a failed import keeps the new tokens.
        self.store
            .save_tokens(run.tenant_id, connection.id, &refreshed)
            .await?;
        info!(connection_id = %connection.id, "Refreshed QuickBooks tokens");

        Ok(refreshed)
    }

    async fn import_snapshot(
        &self,
        run: &ImportRun,
        request: &ReportRequest,
    ) -> Result<(SnapshotId, usize), ImportError> {
        let report = self.source.fetch_trial_balance(request).await?;
        let lines = normalize(&report);
        let line_count = lines.len();

        let snapshot = NewSnapshot {
            tenant_id: run.tenant_id,
            entity_id: run.entity_id,
            import_run_id: run.id,
            tax_year: run.tax_year,
            period_end_date: run.period_end_date,
            snapshot_type: SNAPSHOT_TYPE_MONTH_ACTIVITY,
            source: SNAPSHOT_SOURCE_QBO_IMPORTED,
            run_type: RUN_TYPE_IMPORT,
            lines,
        };

        let snapshot_id = self.store.write_snapshot(&snapshot).await?;
        Ok((snapshot_id, line_count))
    }

    async fn fail(
        &self,
        run: &ImportRun,
        current: ImportRunStatus,
        err: &ImportError,
    ) -> Result<ImportOutcome, ImportError> {
        ImportService::transition(current, ImportRunStatus::Failed)?;
        let reason = err.to_string();
        self.store
            .mark_failed(run.tenant_id, run.id, Utc::now(), &reason)
            .await?;
        error!(error = %reason, tax_year = run.tax_year, "Import run failed");
        Ok(ImportOutcome::Failed { reason })
    }
}
