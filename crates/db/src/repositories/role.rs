//! Role repository.
//!
//! Role slugs are globally unique. Platform roles have no tenant.

use ledgerbridge_shared::types::{RoleId, TenantId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::info;

use crate::entities::roles;

/// Definition of a role to ensure.
#[derive(Debug, Clone, Copy)]
pub struct RoleSpec<'a> {
    /// Unique slug.
    pub slug: &'a str,
    /// Display name.
    pub name: &'a str,
    /// Description.
    pub description: Option<&'a str>,
    /// Owning tenant; `None` for platform roles.
    pub tenant_id: Option<TenantId>,
}

/// Role repository.
#[derive(Debug, Clone)]
pub struct RoleRepository {
    db: DatabaseConnection,
}

impl RoleRepository {
    /// Creates a new role repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds a role by slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<roles::Model>, DbErr> {
        roles::Entity::find()
            .filter(roles::Column::Slug.eq(slug))
            .one(&self.db)
            .await
    }

    /// Returns the role with this slug, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn ensure(&self, spec: RoleSpec<'_>) -> Result<roles::Model, DbErr> {
        if let Some(role) = self.find_by_slug(spec.slug).await? {
            return Ok(role);
        }

        let now = chrono::Utc::now().into();
        let role = roles::ActiveModel {
            id: Set(RoleId::new().0),
            tenant_id: Set(spec.tenant_id.map(|id| id.0)),
            name: Set(spec.name.to_string()),
            slug: Set(spec.slug.to_string()),
            description: Set(spec.description.map(str::to_string)),
            is_system_role: Set(spec.tenant_id.is_none()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        info!(slug = %role.slug, "Role created");
        Ok(role)
    }
}
