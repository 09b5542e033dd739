//! Trial balance snapshot repository.
//!
//! Snapshots are append-only: every import run writes a new snapshot with
//! its lines in one transaction, and nothing updates or deletes them.

use std::collections::HashMap;

use ledgerbridge_core::access::VisibilityScope;
use ledgerbridge_core::import::NewSnapshot;
use ledgerbridge_core::qbo::NormalizedLine;
use ledgerbridge_shared::types::{
    EntityId, ImportRunId, SnapshotId, TenantId, TrialBalanceAccountId,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{trial_balance_accounts, trial_balance_lines, trial_balance_snapshots};
use crate::error::RepoError;
use crate::repositories::visibility::scope_by_entity;
use crate::rls::RlsConnection;

/// A line with the account it was booked against.
#[derive(Debug, Clone)]
pub struct LineWithAccount {
    /// The line.
    pub line: trial_balance_lines::Model,
    /// Its account.
    pub account: Option<trial_balance_accounts::Model>,
}

/// A snapshot with its lines.
#[derive(Debug, Clone)]
pub struct SnapshotWithLines {
    /// The snapshot.
    pub snapshot: trial_balance_snapshots::Model,
    /// Lines in insertion order.
    pub lines: Vec<LineWithAccount>,
}

/// Trial balance repository.
#[derive(Debug, Clone)]
pub struct TrialBalanceRepository {
    db: DatabaseConnection,
}

impl TrialBalanceRepository {
    /// Creates a new trial balance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds or creates the cached account for a line.
    ///
    /// Accounts are keyed by external id when the provider sent one, by
    /// name otherwise.
    async fn resolve_account<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        entity_id: EntityId,
        line: &NormalizedLine,
    ) -> Result<Uuid, RepoError> {
        let mut query = trial_balance_accounts::Entity::find()
            .filter(trial_balance_accounts::Column::TenantId.eq(tenant_id.0))
            .filter(trial_balance_accounts::Column::EntityId.eq(entity_id.0));
        query = match &line.external_account_id {
            Some(external_id) => {
                query.filter(trial_balance_accounts::Column::ExternalAccountId.eq(external_id))
            }
            None => query.filter(trial_balance_accounts::Column::Name.eq(&line.account_name)),
        };

        if let Some(account) = query.one(conn).await? {
            return Ok(account.id);
        }

        let now = chrono::Utc::now().into();
        let account = trial_balance_accounts::ActiveModel {
            id: Set(TrialBalanceAccountId::new().0),
            tenant_id: Set(tenant_id.0),
            entity_id: Set(entity_id.0),
            external_account_id: Set(line.external_account_id.clone()),
            name: Set(line.account_name.clone()),
            account_type: Set(line.account_type.clone()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(conn)
        .await?;
        Ok(account.id)
    }

    /// Writes a snapshot and its lines atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written then.
    pub async fn write_snapshot(&self, snapshot: &NewSnapshot) -> Result<SnapshotId, RepoError> {
        let tenant_id = snapshot.tenant_id;
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();

        let now = chrono::Utc::now().into();
        let snapshot_id = SnapshotId::new();
        trial_balance_snapshots::ActiveModel {
            id: Set(snapshot_id.0),
            tenant_id: Set(tenant_id.0),
            entity_id: Set(snapshot.entity_id.0),
            import_run_id: Set(snapshot.import_run_id.0),
            tax_year: Set(snapshot.tax_year),
            period_end_date: Set(snapshot.period_end_date),
            snapshot_type: Set(snapshot.snapshot_type.to_string()),
            source: Set(snapshot.source.to_string()),
            run_type: Set(snapshot.run_type.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;

        let mut accounts: HashMap<String, Uuid> = HashMap::new();
        let mut lines = Vec::with_capacity(snapshot.lines.len());
        for line in &snapshot.lines {
            let key = line.account_key();
            let account_id = match accounts.get(key) {
                Some(id) => *id,
                None => {
                    let id =
                        Self::resolve_account(txn, tenant_id, snapshot.entity_id, line).await?;
                    accounts.insert(key.to_string(), id);
                    id
                }
            };

            lines.push(trial_balance_lines::ActiveModel {
                id: Set(Uuid::now_v7()),
                tenant_id: Set(tenant_id.0),
                snapshot_id: Set(snapshot_id.0),
                account_id: Set(account_id),
                amount: Set(line.amount),
                created_at: Set(now),
                updated_at: Set(now),
            });
        }

        let line_count = lines.len();
        if !lines.is_empty() {
            trial_balance_lines::Entity::insert_many(lines)
                .exec_without_returning(txn)
                .await?;
        }
        rls.commit().await?;

        info!(
            tenant_id = %tenant_id,
            run_id = %snapshot.import_run_id,
            %snapshot_id,
            line_count,
            account_count = accounts.len(),
            "Trial balance snapshot written"
        );
        Ok(snapshot_id)
    }

    /// Lists the snapshots of a run with their lines.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_run(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
        run_id: ImportRunId,
    ) -> Result<Vec<SnapshotWithLines>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();

        let query = trial_balance_snapshots::Entity::find()
            .filter(trial_balance_snapshots::Column::TenantId.eq(tenant_id.0))
            .filter(trial_balance_snapshots::Column::ImportRunId.eq(run_id.0));
        let snapshots = scope_by_entity(
            query,
            trial_balance_snapshots::Column::EntityId,
            tenant_id,
            scope,
        )
        .order_by_asc(trial_balance_snapshots::Column::CreatedAt)
        .all(txn)
        .await?;

        let snapshot_ids: Vec<Uuid> = snapshots.iter().map(|s| s.id).collect();
        let rows = if snapshot_ids.is_empty() {
            Vec::new()
        } else {
            trial_balance_lines::Entity::find()
                .filter(trial_balance_lines::Column::TenantId.eq(tenant_id.0))
                .filter(trial_balance_lines::Column::SnapshotId.is_in(snapshot_ids))
                .order_by_asc(trial_balance_lines::Column::Id)
                .find_also_related(trial_balance_accounts::Entity)
                .all(txn)
                .await?
        };
        rls.commit().await?;

        let mut by_snapshot: HashMap<Uuid, Vec<LineWithAccount>> = HashMap::new();
        for (line, account) in rows {
            by_snapshot
                .entry(line.snapshot_id)
                .or_default()
                .push(LineWithAccount { line, account });
        }

        Ok(snapshots
            .into_iter()
            .map(|snapshot| SnapshotWithLines {
                lines: by_snapshot.remove(&snapshot.id).unwrap_or_default(),
                snapshot,
            })
            .collect())
    }
}
