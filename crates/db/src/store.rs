//! `ImportStore` backed by the repositories.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ledgerbridge_core::import::{
    ConnectionRecord, ImportError, ImportRun, ImportStore, NewSnapshot,
};
use ledgerbridge_core::qbo::TokenSet;
use ledgerbridge_shared::types::{
    ClientGroupId, EntityId, ImportRunId, QboConnectionId, SnapshotId, TenantId, UserId,
};
use sea_orm::DatabaseConnection;

use crate::entities::{import_runs, qbo_connections};
use crate::repositories::{
    ImportRunRepository, QboConnectionRepository, TrialBalanceRepository, stored_tokens,
};

impl From<import_runs::Model> for ImportRun {
    fn from(model: import_runs::Model) -> Self {
        Self {
            id: ImportRunId::from_uuid(model.id),
            tenant_id: TenantId::from_uuid(model.tenant_id),
            entity_id: EntityId::from_uuid(model.entity_id),
            client_group_id: model.client_group_id.map(ClientGroupId::from_uuid),
            tax_year: model.tax_year,
            period_end_date: model.period_end_date,
            status: model.status.into(),
            triggered_by: model.triggered_by_user_id.map(UserId::from_uuid),
        }
    }
}

impl From<qbo_connections::Model> for ConnectionRecord {
    fn from(model: qbo_connections::Model) -> Self {
        Self {
            tokens: stored_tokens(&model),
            id: QboConnectionId::from_uuid(model.id),
            entity_id: EntityId::from_uuid(model.entity_id),
            realm_id: model.realm_id,
        }
    }
}

/// Persistence for the import orchestrator.
#[derive(Debug, Clone)]
pub struct SeaImportStore {
    runs: ImportRunRepository,
    connections: QboConnectionRepository,
    snapshots: TrialBalanceRepository,
}

impl SeaImportStore {
    /// Creates a store over a connection pool.
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            runs: ImportRunRepository::new(db.clone()),
            connections: QboConnectionRepository::new(db.clone()),
            snapshots: TrialBalanceRepository::new(db),
        }
    }
}

#[async_trait]
impl ImportStore for SeaImportStore {
    async fn load_run(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
    ) -> Result<Option<ImportRun>, ImportError> {
        Ok(self.runs.load(tenant_id, run_id).await?.map(Into::into))
    }

    async fn load_connection(
        &self,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<Option<ConnectionRecord>, ImportError> {
        Ok(self
            .connections
            .find_by_entity(tenant_id, entity_id)
            .await?
            .map(Into::into))
    }

    async fn save_tokens(
        &self,
        tenant_id: TenantId,
        connection_id: QboConnectionId,
        tokens: &TokenSet,
    ) -> Result<(), ImportError> {
        Ok(self
            .connections
            .save_tokens(tenant_id, connection_id, tokens)
            .await?)
    }

    async fn mark_running(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
        at: DateTime<Utc>,
    ) -> Result<(), ImportError> {
        Ok(self.runs.mark_running(tenant_id, run_id, at).await?)
    }

    async fn mark_success(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
        at: DateTime<Utc>,
    ) -> Result<(), ImportError> {
        Ok(self.runs.mark_success(tenant_id, run_id, at).await?)
    }

    async fn mark_failed(
        &self,
        tenant_id: TenantId,
        run_id: ImportRunId,
        at: DateTime<Utc>,
        error_text: &str,
    ) -> Result<(), ImportError> {
        Ok(self
            .runs
            .mark_failed(tenant_id, run_id, at, error_text)
            .await?)
    }

    async fn write_snapshot(&self, snapshot: &NewSnapshot) -> Result<SnapshotId, ImportError> {
        Ok(self.snapshots.write_snapshot(snapshot).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use ledgerbridge_core::import::ImportRunStatus;
    use uuid::Uuid;

    use crate::entities::sea_orm_active_enums::ImportRunStatusDb;

    #[test]
    fn test_run_model_maps_to_domain() {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        let group = Uuid::now_v7();
        let model = import_runs::Model {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            entity_id: Uuid::now_v7(),
            client_group_id: Some(group),
            client_group_tax_year_id: None,
            tax_year: 2024,
            period_end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            status: ImportRunStatusDb::Running,
            started_at: Some(now.into()),
            finished_at: None,
            triggered_by_user_id: None,
            error_text: None,
            created_at: now.into(),
            updated_at: now.into(),
        };

        let run = ImportRun::from(model.clone());
        assert_eq!(run.id.into_inner(), model.id);
        assert_eq!(run.status, ImportRunStatus::Running);
        assert_eq!(run.client_group_id, Some(ClientGroupId::from_uuid(group)));
        assert_eq!(run.triggered_by, None);
    }
}
