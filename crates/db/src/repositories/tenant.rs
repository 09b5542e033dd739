//! Tenant repository: tenant rows, memberships and caller access.

use ledgerbridge_core::tenant::{MembershipStanding, TenantStanding};
use ledgerbridge_shared::types::{EntityId, RoleId, TenantId, UserId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use tracing::info;
use uuid::Uuid;

use crate::entities::{entity_memberships, roles, tenant_memberships, tenants};
use crate::error::RepoError;
use crate::rls::RlsConnection;

/// What the database knows about a caller in a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerAccess {
    /// Tenant flags, `None` if the tenant does not exist.
    pub tenant: Option<TenantStanding>,
    /// Membership flags, `None` if the user is not a member.
    pub membership: Option<MembershipStanding>,
    /// Slug of the membership's role.
    pub role_slug: Option<String>,
}

/// Tenant repository.
#[derive(Debug, Clone)]
pub struct TenantRepository {
    db: DatabaseConnection,
}

impl TenantRepository {
    /// Creates a new tenant repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a tenant by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: TenantId) -> Result<Option<tenants::Model>, RepoError> {
        Ok(tenants::Entity::find_by_id(id.0).one(&self.db).await?)
    }

    /// Finds a tenant by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<tenants::Model>, RepoError> {
        Ok(tenants::Entity::find()
            .filter(tenants::Column::Slug.eq(slug))
            .one(&self.db)
            .await?)
    }

    /// Creates an active tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::Conflict` if the slug is taken.
    pub async fn create(&self, name: &str, slug: &str) -> Result<tenants::Model, RepoError> {
        let now = chrono::Utc::now().into();
        let tenant = tenants::ActiveModel {
            id: Set(TenantId::new().0),
            name: Set(name.to_string()),
            slug: Set(slug.to_string()),
            is_active: Set(true),
            is_suspended: Set(false),
            suspended_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&self.db)
        .await
        .map_err(|err| RepoError::conflict_or_db(err, "Tenant slug already exists"))?;

        info!(tenant_id = %tenant.id, slug = %tenant.slug, "Tenant created");
        Ok(tenant)
    }

    /// Suspends or reinstates a tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the tenant does not exist.
    pub async fn set_suspended(
        &self,
        id: TenantId,
        reason: Option<&str>,
    ) -> Result<tenants::Model, RepoError> {
        let existing = tenants::Entity::find_by_id(id.0)
            .one(&self.db)
            .await?
            .ok_or(RepoError::NotFound("Tenant"))?;

        let mut active: tenants::ActiveModel = existing.into();
        active.is_suspended = Set(reason.is_some());
        active.suspended_reason = Set(reason.map(str::to_string));
        active.updated_at = Set(chrono::Utc::now().into());
        Ok(active.update(&self.db).await?)
    }

    /// Adds a user to a tenant.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::Conflict` if the user is already a member.
    pub async fn add_member(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        role_id: Option<RoleId>,
        is_owner: bool,
    ) -> Result<tenant_memberships::Model, RepoError> {
        let now = chrono::Utc::now().into();
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let membership = tenant_memberships::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id.0),
            user_id: Set(user_id.0),
            role_id: Set(role_id.map(|id| id.0)),
            is_owner: Set(is_owner),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(|err| RepoError::conflict_or_db(err, "User is already a member of this tenant"))?;
        rls.commit().await?;

        info!(tenant_id = %tenant_id, user_id = %user_id, "Tenant member added");
        Ok(membership)
    }

    /// Grants a user direct visibility of one entity.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::Conflict` if the grant already exists.
    pub async fn grant_entity(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
        entity_id: EntityId,
    ) -> Result<entity_memberships::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let grant = entity_memberships::ActiveModel {
            id: Set(Uuid::now_v7()),
            tenant_id: Set(tenant_id.0),
            user_id: Set(user_id.0),
            entity_id: Set(entity_id.0),
            created_at: Set(chrono::Utc::now().into()),
        }
        .insert(rls.transaction())
        .await
        .map_err(|err| RepoError::from_write(err, "Entity already granted", "Unknown user or entity"))?;
        rls.commit().await?;
        Ok(grant)
    }

    /// Loads the tenant and membership flags used to authorize a caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn caller_access(
        &self,
        tenant_id: TenantId,
        user_id: UserId,
    ) -> Result<CallerAccess, RepoError> {
        let tenant = tenants::Entity::find_by_id(tenant_id.0)
            .one(&self.db)
            .await?
            .map(|row| TenantStanding {
                is_active: row.is_active,
                is_suspended: row.is_suspended,
                is_deleted: row.deleted_at.is_some(),
            });

        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let membership = tenant_memberships::Entity::find()
            .filter(tenant_memberships::Column::TenantId.eq(tenant_id.0))
            .filter(tenant_memberships::Column::UserId.eq(user_id.0))
            .find_also_related(roles::Entity)
            .one(rls.transaction())
            .await?;
        rls.commit().await?;

        let (membership, role_slug) = match membership {
            Some((row, role)) => (
                Some(MembershipStanding {
                    is_active: row.is_active,
                }),
                role.map(|role| role.slug),
            ),
            None => (None, None),
        };

        Ok(CallerAccess {
            tenant,
            membership,
            role_slug,
        })
    }
}
