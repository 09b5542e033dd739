//! Client group repository: groups, entity assignments and memberships.

use ledgerbridge_core::access::{CLIENT_ROLE_SLUG, VisibilityScope};
use ledgerbridge_shared::types::{ClientGroupId, EntityId, TenantId, UserId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{
    client_group_entities, client_group_memberships, client_groups, entities,
};
use crate::error::RepoError;
use crate::repositories::visibility::scope_client_groups;
use crate::rls::RlsConnection;

const DUPLICATE_NAME: &str = "A client group with this name already exists";
const ALREADY_ASSIGNED: &str = "Entity is already assigned to this client group";
const DUPLICATE_MEMBERSHIP: &str =
    "User already has a membership in this client group or an active client membership";
const UNKNOWN_ROLE: &str = "Unknown role slug";

/// Input for creating a client group.
#[derive(Debug, Clone)]
pub struct CreateClientGroupInput {
    /// Name, unique per tenant.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

/// Fields of a client group that may be changed after creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateClientGroupInput {
    /// Name.
    pub name: Option<String>,
    /// Description (`Some(None)` clears it).
    pub description: Option<Option<String>>,
}

/// Input for adding a user to a client group.
#[derive(Debug, Clone)]
pub struct CreateMembershipInput {
    /// Member.
    pub user_id: UserId,
    /// Role slug; defaults to `client`.
    pub role_slug: Option<String>,
    /// Defaults to true.
    pub is_active: Option<bool>,
}

/// Client group repository.
#[derive(Debug, Clone)]
pub struct ClientGroupRepository {
    db: DatabaseConnection,
}

impl ClientGroupRepository {
    /// Creates a new client group repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn visible(tenant_id: TenantId, scope: VisibilityScope) -> Select<client_groups::Entity> {
        let query =
            client_groups::Entity::find().filter(client_groups::Column::TenantId.eq(tenant_id.0));
        scope_client_groups(query, client_groups::Column::Id, tenant_id, scope)
    }

    async fn require_group<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        id: ClientGroupId,
    ) -> Result<client_groups::Model, RepoError> {
        client_groups::Entity::find_by_id(id.0)
            .filter(client_groups::Column::TenantId.eq(tenant_id.0))
            .one(conn)
            .await?
            .ok_or(RepoError::NotFound("Client group"))
    }

    /// Lists the client groups visible to the caller, by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
    ) -> Result<Vec<client_groups::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let rows = Self::visible(tenant_id, scope)
            .order_by_asc(client_groups::Column::Name)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Finds a visible client group.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if it does not exist or is not visible.
    pub async fn find(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
        id: ClientGroupId,
    ) -> Result<client_groups::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let row = Self::visible(tenant_id, scope)
            .filter(client_groups::Column::Id.eq(id.0))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        row.ok_or(RepoError::NotFound("Client group"))
    }

    /// Creates a client group.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::Conflict` if the name is taken in the tenant.
    pub async fn create(
        &self,
        tenant_id: TenantId,
        input: CreateClientGroupInput,
    ) -> Result<client_groups::Model, RepoError> {
        let now = chrono::Utc::now().into();
        let model = client_groups::ActiveModel {
            id: Set(ClientGroupId::new().0),
            tenant_id: Set(tenant_id.0),
            name: Set(input.name),
            description: Set(input.description),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let group = model
            .insert(rls.transaction())
            .await
            .map_err(|err| RepoError::conflict_or_db(err, DUPLICATE_NAME))?;
        rls.commit().await?;

        info!(tenant_id = %tenant_id, client_group_id = %group.id, "Client group created");
        Ok(group)
    }

    /// Applies an update to a client group.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the group is not in the tenant
    /// - `RepoError::Conflict` if the new name is taken
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: ClientGroupId,
        input: UpdateClientGroupInput,
    ) -> Result<client_groups::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let existing = Self::require_group(rls.transaction(), tenant_id, id).await?;

        let mut active: client_groups::ActiveModel = existing.into();
        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        active.updated_at = Set(chrono::Utc::now().into());

        let updated = active
            .update(rls.transaction())
            .await
            .map_err(|err| RepoError::conflict_or_db(err, DUPLICATE_NAME))?;
        rls.commit().await?;
        Ok(updated)
    }

    /// Deletes a client group with its assignments and memberships.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the group is not in the tenant.
    pub async fn delete(&self, tenant_id: TenantId, id: ClientGroupId) -> Result<(), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let result = client_groups::Entity::delete_many()
            .filter(client_groups::Column::TenantId.eq(tenant_id.0))
            .filter(client_groups::Column::Id.eq(id.0))
            .exec(rls.transaction())
            .await?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound("Client group"));
        }
        rls.commit().await?;

        info!(tenant_id = %tenant_id, client_group_id = %id, "Client group deleted");
        Ok(())
    }

    /// Assigns an entity to a group.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the group or entity is not in the tenant
    /// - `RepoError::Conflict` if the entity is already assigned
    pub async fn assign_entity(
        &self,
        tenant_id: TenantId,
        group_id: ClientGroupId,
        entity_id: EntityId,
    ) -> Result<client_group_entities::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();
        Self::require_group(txn, tenant_id, group_id).await?;

        let entity_exists = entities::Entity::find_by_id(entity_id.0)
            .filter(entities::Column::TenantId.eq(tenant_id.0))
            .count(txn)
            .await?
            > 0;
        if !entity_exists {
            return Err(RepoError::NotFound("Entity"));
        }

        let link = client_group_entities::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id.0),
            client_group_id: Set(group_id.0),
            entity_id: Set(entity_id.0),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(txn)
        .await
        .map_err(|err| RepoError::conflict_or_db(err, ALREADY_ASSIGNED))?;
        rls.commit().await?;

        info!(
            tenant_id = %tenant_id,
            client_group_id = %group_id,
            entity_id = %entity_id,
            "Entity assigned to client group"
        );
        Ok(link)
    }

    /// Lists the entity ids assigned to a group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn assigned_entities(
        &self,
        tenant_id: TenantId,
        group_id: ClientGroupId,
    ) -> Result<Vec<client_group_entities::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let rows = client_group_entities::Entity::find()
            .filter(client_group_entities::Column::TenantId.eq(tenant_id.0))
            .filter(client_group_entities::Column::ClientGroupId.eq(group_id.0))
            .order_by_asc(client_group_entities::Column::CreatedAt)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Removes an entity from a group.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the entity is not assigned.
    pub async fn unassign_entity(
        &self,
        tenant_id: TenantId,
        group_id: ClientGroupId,
        entity_id: EntityId,
    ) -> Result<(), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let result = client_group_entities::Entity::delete_many()
            .filter(client_group_entities::Column::TenantId.eq(tenant_id.0))
            .filter(client_group_entities::Column::ClientGroupId.eq(group_id.0))
            .filter(client_group_entities::Column::EntityId.eq(entity_id.0))
            .exec(rls.transaction())
            .await?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound("Client group entity"));
        }
        rls.commit().await?;
        Ok(())
    }

    /// Adds a user to a group.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the group is not in the tenant
    /// - `RepoError::Conflict` on a duplicate membership, or a second active
    ///   `client` membership for the user in the tenant
    /// - `RepoError::Invalid` if the role slug does not exist
    pub async fn add_membership(
        &self,
        tenant_id: TenantId,
        group_id: ClientGroupId,
        input: CreateMembershipInput,
    ) -> Result<client_group_memberships::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();
        Self::require_group(txn, tenant_id, group_id).await?;

        let membership = client_group_memberships::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id.0),
            user_id: Set(input.user_id.0),
            client_group_id: Set(group_id.0),
            role_slug: Set(input
                .role_slug
                .unwrap_or_else(|| CLIENT_ROLE_SLUG.to_string())),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(txn)
        .await
        .map_err(|err| RepoError::from_write(err, DUPLICATE_MEMBERSHIP, UNKNOWN_ROLE))?;
        rls.commit().await?;

        info!(
            tenant_id = %tenant_id,
            client_group_id = %group_id,
            user_id = %input.user_id,
            role_slug = %membership.role_slug,
            "Client group membership added"
        );
        Ok(membership)
    }

    /// Lists the memberships of a group.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn memberships(
        &self,
        tenant_id: TenantId,
        group_id: ClientGroupId,
    ) -> Result<Vec<client_group_memberships::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let rows = client_group_memberships::Entity::find()
            .filter(client_group_memberships::Column::TenantId.eq(tenant_id.0))
            .filter(client_group_memberships::Column::ClientGroupId.eq(group_id.0))
            .order_by_asc(client_group_memberships::Column::CreatedAt)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Removes a membership from a group.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the membership is not in the group.
    pub async fn remove_membership(
        &self,
        tenant_id: TenantId,
        group_id: ClientGroupId,
        membership_id: Uuid,
    ) -> Result<(), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let result = client_group_memberships::Entity::delete_many()
            .filter(client_group_memberships::Column::TenantId.eq(tenant_id.0))
            .filter(client_group_memberships::Column::ClientGroupId.eq(group_id.0))
            .filter(client_group_memberships::Column::Id.eq(membership_id))
            .exec(rls.transaction())
            .await?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound("Client group membership"));
        }
        rls.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    #[test]
    fn test_client_scope_narrows_groups_within_tenant() {
        let tenant = TenantId::new();
        let user = UserId::new();
        let sql = ClientGroupRepository::visible(tenant, VisibilityScope::Client(user))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#""client_groups"."tenant_id" = "#));
        assert!(sql.contains("client_group_memberships"));
        assert!(sql.contains(&user.to_string()));
    }

    #[test]
    fn test_staff_scope_sees_whole_tenant() {
        let tenant = TenantId::new();
        let sql = ClientGroupRepository::visible(tenant, VisibilityScope::Unrestricted)
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#""client_groups"."tenant_id" = "#));
        assert!(!sql.contains("client_group_memberships"));
    }
}
