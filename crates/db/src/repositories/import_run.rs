//! Import run repository.
//!
//! Runs are created `queued` by the API and moved through the state
//! machine by the worker. They are never deleted.

use chrono::{DateTime, NaiveDate, Utc};
use ledgerbridge_core::access::VisibilityScope;
use ledgerbridge_core::import::{ImportJob, ImportRunStatus};
use ledgerbridge_shared::types::{
    ClientGroupId, ClientGroupTaxYearId, EntityId, ImportRunId, PageRequest, TenantId, UserId,
};
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use tracing::{debug, info};

use crate::entities::sea_orm_active_enums::ImportRunStatusDb;
use crate::entities::{client_group_tax_years, client_groups, entities, import_runs, tenants};
use crate::error::RepoError;
use crate::repositories::visibility::scope_by_entity;
use crate::rls::RlsConnection;

/// Status given to lazily created tax-year contexts.
pub const DEFAULT_TAX_YEAR_STATUS: &str = "draft";

/// Input for creating an import run.
#[derive(Debug, Clone)]
pub struct CreateImportRunInput {
    /// Entity to import.
    pub entity_id: EntityId,
    /// Client group the run is filed under.
    pub client_group_id: Option<ClientGroupId>,
    /// Tax year.
    pub tax_year: i32,
    /// Last day of the imported period.
    pub period_end_date: NaiveDate,
    /// User who triggered the run.
    pub triggered_by: Option<UserId>,
}

/// Filter options for listing import runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportRunFilter {
    /// Filter by entity.
    pub entity_id: Option<EntityId>,
    /// Filter by client group.
    pub client_group_id: Option<ClientGroupId>,
    /// Filter by tax year.
    pub tax_year: Option<i32>,
}

/// Import run repository.
#[derive(Debug, Clone)]
pub struct ImportRunRepository {
    db: DatabaseConnection,
}

impl ImportRunRepository {
    /// Creates a new import run repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn visible(tenant_id: TenantId, scope: VisibilityScope) -> Select<import_runs::Entity> {
        let query =
            import_runs::Entity::find().filter(import_runs::Column::TenantId.eq(tenant_id.0));
        scope_by_entity(query, import_runs::Column::EntityId, tenant_id, scope)
    }

    fn filtered(
        tenant_id: TenantId,
        scope: VisibilityScope,
        filter: ImportRunFilter,
    ) -> Select<import_runs::Entity> {
        let mut query = Self::visible(tenant_id, scope);
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(import_runs::Column::EntityId.eq(entity_id.0));
        }
        if let Some(group_id) = filter.client_group_id {
            query = query.filter(import_runs::Column::ClientGroupId.eq(group_id.0));
        }
        if let Some(tax_year) = filter.tax_year {
            query = query.filter(import_runs::Column::TaxYear.eq(tax_year));
        }
        query
    }

    /// Fetches the tax-year context of a group, creating it if missing.
    ///
    /// Concurrent callers converge on the same row through the unique key.
    async fn tax_year_context<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        group_id: ClientGroupId,
        tax_year: i32,
    ) -> Result<client_group_tax_years::Model, RepoError> {
        let now = Utc::now().into();
        let candidate = client_group_tax_years::ActiveModel {
            id: Set(ClientGroupTaxYearId::new().0),
            tenant_id: Set(tenant_id.0),
            client_group_id: Set(group_id.0),
            tax_year: Set(tax_year),
            status: Set(DEFAULT_TAX_YEAR_STATUS.to_string()),
            start_date: Set(None),
            end_date: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = client_group_tax_years::Entity::insert(candidate)
            .on_conflict(
                OnConflict::columns([
                    client_group_tax_years::Column::TenantId,
                    client_group_tax_years::Column::ClientGroupId,
                    client_group_tax_years::Column::TaxYear,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await?;
        debug!(inserted, tax_year, "Resolved client group tax year");

        client_group_tax_years::Entity::find()
            .filter(client_group_tax_years::Column::TenantId.eq(tenant_id.0))
            .filter(client_group_tax_years::Column::ClientGroupId.eq(group_id.0))
            .filter(client_group_tax_years::Column::TaxYear.eq(tax_year))
            .one(conn)
            .await?
            .ok_or(RepoError::NotFound("Client group tax year"))
    }

    /// Persists a new `queued` run.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the entity or client group is not in
    /// the tenant.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        input: CreateImportRunInput,
    ) -> Result<import_runs::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();

        let entity_count = entities::Entity::find_by_id(input.entity_id.0)
            .filter(entities::Column::TenantId.eq(tenant_id.0))
            .count(txn)
            .await?;
        if entity_count == 0 {
            return Err(RepoError::NotFound("Entity"));
        }

        let tax_year_id = match input.client_group_id {
            Some(group_id) => {
                let group_count = client_groups::Entity::find_by_id(group_id.0)
                    .filter(client_groups::Column::TenantId.eq(tenant_id.0))
                    .count(txn)
                    .await?;
                if group_count == 0 {
                    return Err(RepoError::NotFound("Client group"));
                }
                let context =
                    Self::tax_year_context(txn, tenant_id, group_id, input.tax_year).await?;
                Some(context.id)
            }
            None => None,
        };

        let now = Utc::now().into();
        let run = import_runs::ActiveModel {
            id: Set(ImportRunId::new().0),
            tenant_id: Set(tenant_id.0),
            entity_id: Set(input.entity_id.0),
            client_group_id: Set(input.client_group_id.map(|id| id.0)),
            client_group_tax_year_id: Set(tax_year_id),
            tax_year: Set(input.tax_year),
            period_end_date: Set(input.period_end_date),
            status: Set(ImportRunStatusDb::Queued),
            started_at: Set(None),
            finished_at: Set(None),
            triggered_by_user_id: Set(input.triggered_by.map(|id| id.0)),
            error_text: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(txn)
        .await?;
        rls.commit().await?;

        info!(
            tenant_id = %tenant_id,
            run_id = %run.id,
            entity_id = %input.entity_id,
            tax_year = input.tax_year,
            "Import run created"
        );
        Ok(run)
    }

    /// Lists visible runs, newest first, with the total count.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
        filter: ImportRunFilter,
        page: PageRequest,
    ) -> Result<(Vec<import_runs::Model>, u64), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();

        let total = Self::filtered(tenant_id, scope, filter).count(txn).await?;
        let rows = Self::filtered(tenant_id, scope, filter)
            .order_by_desc(import_runs::Column::CreatedAt)
            .order_by_desc(import_runs::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(txn)
            .await?;
        rls.commit().await?;
        Ok((rows, total))
    }

    /// Finds a visible run.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if it does not exist or is not visible.
    pub async fn find(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
        id: ImportRunId,
    ) -> Result<import_runs::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let row = Self::visible(tenant_id, scope)
            .filter(import_runs::Column::Id.eq(id.0))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        row.ok_or(RepoError::NotFound("Import run"))
    }

    /// Loads a run for execution, ignoring visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn load(
        &self,
        tenant_id: TenantId,
        id: ImportRunId,
    ) -> Result<Option<import_runs::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let row = import_runs::Entity::find_by_id(id.0)
            .filter(import_runs::Column::TenantId.eq(tenant_id.0))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(row)
    }

    /// Returns a first-attempt job for every run left `queued` or `running`,
    /// oldest first within each tenant.
    ///
    /// Used at startup to pick up runs whose job was lost with the previous
    /// process. Assumes a single worker process per database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn unfinished_jobs(&self) -> Result<Vec<ImportJob>, RepoError> {
        let tenant_ids: Vec<uuid::Uuid> = tenants::Entity::find()
            .select_only()
            .column(tenants::Column::Id)
            .order_by_asc(tenants::Column::CreatedAt)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut jobs = Vec::new();
        for tenant in tenant_ids.into_iter().map(TenantId) {
            let rls = RlsConnection::new(&self.db, tenant).await?;
            let run_ids: Vec<uuid::Uuid> = import_runs::Entity::find()
                .select_only()
                .column(import_runs::Column::Id)
                .filter(import_runs::Column::TenantId.eq(tenant.0))
                .filter(
                    import_runs::Column::Status
                        .is_in([ImportRunStatusDb::Queued, ImportRunStatusDb::Running]),
                )
                .order_by_asc(import_runs::Column::CreatedAt)
                .order_by_asc(import_runs::Column::Id)
                .into_tuple()
                .all(rls.transaction())
                .await?;
            rls.commit().await?;

            jobs.extend(
                run_ids
                    .into_iter()
                    .map(|id| ImportJob::first(ImportRunId(id), tenant)),
            );
        }

        debug!(count = jobs.len(), "Loaded unfinished import runs");
        Ok(jobs)
    }

    async fn set_status(
        &self,
        tenant_id: TenantId,
        id: ImportRunId,
        apply: impl FnOnce(&mut import_runs::ActiveModel) + Send,
    ) -> Result<(), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let existing = import_runs::Entity::find_by_id(id.0)
            .filter(import_runs::Column::TenantId.eq(tenant_id.0))
            .one(rls.transaction())
            .await?
            .ok_or(RepoError::NotFound("Import run"))?;

        let mut active: import_runs::ActiveModel = existing.into();
        apply(&mut active);
        active.updated_at = Set(Utc::now().into());
        active.update(rls.transaction()).await?;
        rls.commit().await?;
        Ok(())
    }

    /// Moves a run to `running`.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the run is not in the tenant.
    pub async fn mark_running(
        &self,
        tenant_id: TenantId,
        id: ImportRunId,
        at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.set_status(tenant_id, id, |run| {
            run.status = Set(ImportRunStatus::Running.into());
            run.started_at = Set(Some(at.into()));
            run.finished_at = Set(None);
        })
        .await
    }

    /// Moves a run to `success`.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the run is not in the tenant.
    pub async fn mark_success(
        &self,
        tenant_id: TenantId,
        id: ImportRunId,
        at: DateTime<Utc>,
    ) -> Result<(), RepoError> {
        self.set_status(tenant_id, id, |run| {
            run.status = Set(ImportRunStatus::Success.into());
            run.error_text = Set(None);
            run.finished_at = Set(Some(at.into()));
        })
        .await
    }

    /// Moves a run to `failed`.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the run is not in the tenant.
    pub async fn mark_failed(
        &self,
        tenant_id: TenantId,
        id: ImportRunId,
        at: DateTime<Utc>,
        error_text: &str,
    ) -> Result<(), RepoError> {
        let error_text = error_text.to_string();
        self.set_status(tenant_id, id, move |run| {
            run.status = Set(ImportRunStatus::Failed.into());
            run.error_text = Set(Some(error_text));
            run.finished_at = Set(Some(at.into()));
        })
        .await
    }
}
