//! Entity repository.

use ledgerbridge_core::access::VisibilityScope;
use ledgerbridge_shared::types::{EntityId, TenantId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Select,
    Set,
};
use tracing::info;

use crate::entities::entities;
use crate::error::RepoError;
use crate::repositories::visibility::scope_by_entity;
use crate::rls::RlsConnection;

const DUPLICATE_NAME: &str = "An entity with this name already exists";

/// Default `entity_type` for new entities.
pub const DEFAULT_ENTITY_TYPE: &str = "Individual";
/// Default `status` for new entities.
pub const DEFAULT_ENTITY_STATUS: &str = "active";
/// Default `source_type` for new entities.
pub const DEFAULT_SOURCE_TYPE: &str = "MANUAL_PROFORMA";

/// Input for creating an entity.
#[derive(Debug, Clone)]
pub struct CreateEntityInput {
    /// Name, unique per tenant.
    pub name: String,
    /// Entity type; defaults to `Individual`.
    pub entity_type: Option<String>,
    /// Status; defaults to `active`.
    pub status: Option<String>,
    /// Employer identification number.
    pub ein: Option<String>,
    /// Tax classification.
    pub tax_type: Option<String>,
    /// Source type; defaults to `MANUAL_PROFORMA`.
    pub source_type: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Fields of an entity that may be changed after creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateEntityInput {
    /// Name.
    pub name: Option<String>,
    /// Entity type.
    pub entity_type: Option<String>,
    /// Status.
    pub status: Option<String>,
    /// EIN (`Some(None)` clears it).
    pub ein: Option<Option<String>>,
    /// Tax classification (`Some(None)` clears it).
    pub tax_type: Option<Option<String>>,
    /// Source type.
    pub source_type: Option<String>,
    /// Notes (`Some(None)` clears them).
    pub notes: Option<Option<String>>,
}

/// Entity repository.
#[derive(Debug, Clone)]
pub struct EntityRepository {
    db: DatabaseConnection,
}

impl EntityRepository {
    /// Creates a new entity repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn visible(tenant_id: TenantId, scope: VisibilityScope) -> Select<entities::Entity> {
        let query = entities::Entity::find().filter(entities::Column::TenantId.eq(tenant_id.0));
        scope_by_entity(query, entities::Column::Id, tenant_id, scope)
    }

    /// Lists the entities visible to the caller, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
    ) -> Result<Vec<entities::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let rows = Self::visible(tenant_id, scope)
            .order_by_asc(entities::Column::Name)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Finds a visible entity.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if it does not exist or is not visible.
    pub async fn find(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
        id: EntityId,
    ) -> Result<entities::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let row = Self::visible(tenant_id, scope)
            .filter(entities::Column::Id.eq(id.0))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        row.ok_or(RepoError::NotFound("Entity"))
    }

    /// Creates an entity.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::Conflict` if the name is taken in the tenant.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        input: CreateEntityInput,
    ) -> Result<entities::Model, RepoError> {
        let now = chrono::Utc::now().into();
        let model = entities::ActiveModel {
            id: Set(EntityId::new().0),
            tenant_id: Set(tenant_id.0),
            name: Set(input.name),
            entity_type: Set(input
                .entity_type
                .unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string())),
            status: Set(input
                .status
                .unwrap_or_else(|| DEFAULT_ENTITY_STATUS.to_string())),
            ein: Set(input.ein),
            tax_type: Set(input.tax_type),
            source_type: Set(input
                .source_type
                .unwrap_or_else(|| DEFAULT_SOURCE_TYPE.to_string())),
            notes: Set(input.notes),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let entity = model
            .insert(rls.transaction())
            .await
            .map_err(|err| RepoError::conflict_or_db(err, DUPLICATE_NAME))?;
        rls.commit().await?;

        info!(tenant_id = %tenant_id, entity_id = %entity.id, "Entity created");
        Ok(entity)
    }

    /// Applies an update to an entity.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the entity is not in the tenant
    /// - `RepoError::Conflict` if the new name is taken
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: EntityId,
        input: UpdateEntityInput,
    ) -> Result<entities::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let existing = entities::Entity::find_by_id(id.0)
            .filter(entities::Column::TenantId.eq(tenant_id.0))
            .one(rls.transaction())
            .await?
            .ok_or(RepoError::NotFound("Entity"))?;

        let mut active: entities::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(entity_type) = input.entity_type {
            active.entity_type = Set(entity_type);
        }
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(ein) = input.ein {
            active.ein = Set(ein);
        }
        if let Some(tax_type) = input.tax_type {
            active.tax_type = Set(tax_type);
        }
        if let Some(source_type) = input.source_type {
            active.source_type = Set(source_type);
        }
        if let Some(notes) = input.notes {
            active.notes = Set(notes);
        }
        active.updated_at = Set(chrono::Utc::now().into());

        let updated = active
            .update(rls.transaction())
            .await
            .map_err(|err| RepoError::conflict_or_db(err, DUPLICATE_NAME))?;
        rls.commit().await?;
        Ok(updated)
    }

    /// Deletes an entity with its assignments, connection and import history.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the entity is not in the tenant.
    pub async fn delete(&self, tenant_id: TenantId, id: EntityId) -> Result<(), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let result = entities::Entity::delete_many()
            .filter(entities::Column::TenantId.eq(tenant_id.0))
            .filter(entities::Column::Id.eq(id.0))
            .exec(rls.transaction())
            .await?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound("Entity"));
        }
        rls.commit().await?;

        info!(tenant_id = %tenant_id, entity_id = %id, "Entity deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerbridge_shared::types::UserId;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn test_visible_query_always_filters_tenant() {
        let tenant = TenantId::new();
        for scope in [
            VisibilityScope::Unrestricted,
            VisibilityScope::Client(UserId::new()),
        ] {
            let sql = EntityRepository::visible(tenant, scope)
                .build(DbBackend::Postgres)
                .to_string();
            assert!(sql.contains(r#""entities"."tenant_id" = "#), "{sql}");
            assert!(sql.contains(&tenant.to_string()));
        }
    }
}
