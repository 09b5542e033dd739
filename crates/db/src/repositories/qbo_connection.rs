//! QuickBooks connection repository.

use chrono::{DateTime, Utc};
use ledgerbridge_core::access::VisibilityScope;
use ledgerbridge_core::qbo::TokenSet;
use ledgerbridge_shared::types::{EntityId, QboConnectionId, TenantId};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Select, Set,
};
use tracing::info;

use crate::entities::{entities, qbo_connections};
use crate::error::RepoError;
use crate::repositories::visibility::scope_by_entity;
use crate::rls::RlsConnection;

const LINK_CONFLICT: &str =
    "Entity already has a QuickBooks connection or the realm is linked to another entity";

/// Input for creating a connection.
#[derive(Debug, Clone)]
pub struct CreateConnectionInput {
    /// Entity to connect.
    pub entity_id: EntityId,
    /// QuickBooks company id.
    pub realm_id: String,
    /// Bearer token.
    pub access_token: Option<String>,
    /// Refresh token.
    pub refresh_token: Option<String>,
    /// Access token expiry.
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Fields of a connection that may be changed after creation.
#[derive(Debug, Clone, Default)]
pub struct UpdateConnectionInput {
    /// QuickBooks company id.
    pub realm_id: Option<String>,
    /// Bearer token (`Some(None)` clears it).
    pub access_token: Option<Option<String>>,
    /// Refresh token (`Some(None)` clears it).
    pub refresh_token: Option<Option<String>>,
    /// Access token expiry (`Some(None)` clears it).
    pub token_expires_at: Option<Option<DateTime<Utc>>>,
}

/// QuickBooks connection repository.
#[derive(Debug, Clone)]
pub struct QboConnectionRepository {
    db: DatabaseConnection,
}

impl QboConnectionRepository {
    /// Creates a new connection repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn visible(tenant_id: TenantId, scope: VisibilityScope) -> Select<qbo_connections::Entity> {
        let query = qbo_connections::Entity::find()
            .filter(qbo_connections::Column::TenantId.eq(tenant_id.0));
        scope_by_entity(query, qbo_connections::Column::EntityId, tenant_id, scope)
    }

    async fn require_entity<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<(), RepoError> {
        let count = entities::Entity::find_by_id(entity_id.0)
            .filter(entities::Column::TenantId.eq(tenant_id.0))
            .count(conn)
            .await?;
        if count == 0 {
            return Err(RepoError::NotFound("Entity"));
        }
        Ok(())
    }

    async fn by_entity<C: ConnectionTrait>(
        conn: &C,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<Option<qbo_connections::Model>, RepoError> {
        Ok(qbo_connections::Entity::find()
            .filter(qbo_connections::Column::TenantId.eq(tenant_id.0))
            .filter(qbo_connections::Column::EntityId.eq(entity_id.0))
            .one(conn)
            .await?)
    }

    /// Lists the connections of entities visible to the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
    ) -> Result<Vec<qbo_connections::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let rows = Self::visible(tenant_id, scope)
            .order_by_asc(qbo_connections::Column::CreatedAt)
            .all(rls.transaction())
            .await?;
        rls.commit().await?;
        Ok(rows)
    }

    /// Finds a visible connection.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if it does not exist or is not visible.
    pub async fn find(
        &self,
        tenant_id: TenantId,
        scope: VisibilityScope,
        id: QboConnectionId,
    ) -> Result<qbo_connections::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let row = Self::visible(tenant_id, scope)
            .filter(qbo_connections::Column::Id.eq(id.0))
            .one(rls.transaction())
            .await?;
        rls.commit().await?;
        row.ok_or(RepoError::NotFound("QuickBooks connection"))
    }

    /// Finds the connection of an entity, ignoring visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_entity(
        &self,
        tenant_id: TenantId,
        entity_id: EntityId,
    ) -> Result<Option<qbo_connections::Model>, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let row = Self::by_entity(rls.transaction(), tenant_id, entity_id).await?;
        rls.commit().await?;
        Ok(row)
    }

    /// Creates a connection.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the entity is not in the tenant
    /// - `RepoError::Conflict` if the entity is connected or the realm is taken
    pub async fn create(
        &self,
        tenant_id: TenantId,
        input: CreateConnectionInput,
    ) -> Result<qbo_connections::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        Self::require_entity(rls.transaction(), tenant_id, input.entity_id).await?;

        let now = Utc::now().into();
        let connection = qbo_connections::ActiveModel {
            id: Set(QboConnectionId::new().0),
            tenant_id: Set(tenant_id.0),
            entity_id: Set(input.entity_id.0),
            realm_id: Set(input.realm_id),
            access_token: Set(input.access_token),
            refresh_token: Set(input.refresh_token),
            token_expires_at: Set(input.token_expires_at.map(Into::into)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(rls.transaction())
        .await
        .map_err(|err| RepoError::conflict_or_db(err, LINK_CONFLICT))?;
        rls.commit().await?;

        info!(
            tenant_id = %tenant_id,
            entity_id = %input.entity_id,
            connection_id = %connection.id,
            "QuickBooks connection created"
        );
        Ok(connection)
    }

    /// Applies an update to a connection.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the connection is not in the tenant
    /// - `RepoError::Conflict` if the new realm is linked to another entity
    pub async fn update(
        &self,
        tenant_id: TenantId,
        id: QboConnectionId,
        input: UpdateConnectionInput,
    ) -> Result<qbo_connections::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let existing = qbo_connections::Entity::find_by_id(id.0)
            .filter(qbo_connections::Column::TenantId.eq(tenant_id.0))
            .one(rls.transaction())
            .await?
            .ok_or(RepoError::NotFound("QuickBooks connection"))?;

        let mut active: qbo_connections::ActiveModel = existing.into();
        if let Some(realm_id) = input.realm_id {
            active.realm_id = Set(realm_id);
        }
        if let Some(access_token) = input.access_token {
            active.access_token = Set(access_token);
        }
        if let Some(refresh_token) = input.refresh_token {
            active.refresh_token = Set(refresh_token);
        }
        if let Some(expires_at) = input.token_expires_at {
            active.token_expires_at = Set(expires_at.map(Into::into));
        }
        active.updated_at = Set(Utc::now().into());

        let updated = active
            .update(rls.transaction())
            .await
            .map_err(|err| RepoError::conflict_or_db(err, LINK_CONFLICT))?;
        rls.commit().await?;
        Ok(updated)
    }

    /// Deletes a connection.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the connection is not in the tenant.
    pub async fn delete(&self, tenant_id: TenantId, id: QboConnectionId) -> Result<(), RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let result = qbo_connections::Entity::delete_many()
            .filter(qbo_connections::Column::TenantId.eq(tenant_id.0))
            .filter(qbo_connections::Column::Id.eq(id.0))
            .exec(rls.transaction())
            .await?;
        if result.rows_affected == 0 {
            return Err(RepoError::NotFound("QuickBooks connection"));
        }
        rls.commit().await?;

        info!(tenant_id = %tenant_id, connection_id = %id, "QuickBooks connection deleted");
        Ok(())
    }

    /// Links an entity to a realm with fresh tokens, creating or replacing
    /// its connection.
    ///
    /// # Errors
    ///
    /// - `RepoError::NotFound` if the entity is not in the tenant
    /// - `RepoError::Conflict` if the realm is linked to another entity
    pub async fn upsert_for_entity(
        &self,
        tenant_id: TenantId,
        entity_id: EntityId,
        realm_id: &str,
        tokens: &TokenSet,
    ) -> Result<qbo_connections::Model, RepoError> {
        let rls = RlsConnection::new(&self.db, tenant_id).await?;
        let txn = rls.transaction();
        Self::require_entity(txn, tenant_id, entity_id).await?;

        let now = Utc::now().into();
        let expires_at = tokens.expires_at.map(Into::into);
        let connection = match Self::by_entity(txn, tenant_id, entity_id).await? {
            Some(existing) => {
                let mut active: qbo_connections::ActiveModel = existing.into();
                active.realm_id = Set(realm_id.to_string());
                active.access_token = Set(Some(tokens.access_token.clone()));
                active.refresh_token = Set(tokens.refresh_token.clone());
                active.token_expires_at = Set(expires_at);
                active.updated_at = Set(now);
                active.update(txn).await
            }
            None => {
                qbo_connections::ActiveModel {
                    id: Set(QboConnectionId::new().0),
                    tenant_id: Set(tenant_id.0),
                    entity_id: Set(entity_id.0),
                    realm_id: Set(realm_id.to_string()),
                    access_token: Set(Some(tokens.access_token.clone())),
                    refresh_token: Set(tokens.refresh_token.clone()),
                    token_expires_at: Set(expires_at),
                    created_at: Set(now),
                    updated_at: Set(now),
                }
                .insert(txn)
                .await
            }
        }
        .map_err(|err| RepoError::conflict_or_db(err, LINK_CONFLICT))?;
        rls.commit().await?;

        info!(
            tenant_id = %tenant_id,
            entity_id = %entity_id,
            realm_id = %realm_id,
            "QuickBooks connection linked"
        );
        Ok(connection)
    }

    /// Stores a refreshed token set.
    ///
    /// # Errors
    ///
    /// Returns `RepoError::NotFound` if the connection is not in the tenant.
    pub async fn save_tokens(
        &self,
        tenant_id: TenantId,
        id: QboConnectionId,
        tokens: &TokenSet,
    ) -> Result<(), RepoError> {
        self.update(
            tenant_id,
            id,
            UpdateConnectionInput {
                realm_id: None,
                access_token: Some(Some(tokens.access_token.clone())),
                refresh_token: Some(tokens.refresh_token.clone()),
                token_expires_at: Some(tokens.expires_at),
            },
        )
        .await
        .map(|_| ())
    }
}

/// Reads the stored tokens of a connection.
///
/// A connection without an access token is reported as already expired so
/// the next import refreshes it first.
#[must_use]
pub fn stored_tokens(model: &qbo_connections::Model) -> TokenSet {
    let expires_at = match &model.access_token {
        Some(_) => model.token_expires_at.map(|at| at.with_timezone(&Utc)),
        None => Some(DateTime::<Utc>::UNIX_EPOCH),
    };
    TokenSet {
        access_token: model.access_token.clone().unwrap_or_default(),
        refresh_token: model.refresh_token.clone(),
        expires_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ledgerbridge_shared::types::UserId;
    use sea_orm::{DbBackend, QueryTrait};
    use uuid::Uuid;

    fn model(access: Option<&str>, expires_at: Option<DateTime<Utc>>) -> qbo_connections::Model {
        let now = Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0).unwrap();
        qbo_connections::Model {
            id: Uuid::now_v7(),
            tenant_id: Uuid::now_v7(),
            entity_id: Uuid::now_v7(),
            realm_id: "9130".into(),
            access_token: access.map(Into::into),
            refresh_token: Some("refresh-1".into()),
            token_expires_at: expires_at.map(Into::into),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    #[test]
    fn test_stored_tokens_keep_expiry() {
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap();
        let tokens = stored_tokens(&model(Some("access-1"), Some(at)));

        assert_eq!(tokens.access_token, "access-1");
        assert_eq!(tokens.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(tokens.expires_at, Some(at));
    }

    #[test]
    fn test_missing_access_token_forces_refresh() {
        let tokens = stored_tokens(&model(None, None));
        assert!(tokens.needs_refresh(Utc::now(), Duration::seconds(0)));
    }

    #[test]
    fn test_connections_scope_on_entity_column() {
        let tenant = TenantId::new();
        let sql = QboConnectionRepository::visible(tenant, VisibilityScope::Client(UserId::new()))
            .build(DbBackend::Postgres)
            .to_string();

        assert!(sql.contains(r#""qbo_connections"."tenant_id" = "#));
        assert!(sql.contains(r#""qbo_connections"."entity_id" IN (SELECT"#));
    }
}
