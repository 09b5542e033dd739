//! Visibility query scoping.
//!
//! Repositories always filter on `tenant_id` themselves. The helpers here
//! add the client narrowing on top of that predicate:
//!
//! - entity-like rows: entity id in (group reach ∪ direct grants)
//! - client groups: group id in the groups the user is a member of
//!
//! Staff queries pass through unchanged.

use ledgerbridge_core::access::{ClientReach, RoleKind, VisibilityScope};
use ledgerbridge_shared::types::{EntityId, TenantId, UserId};
use sea_orm::sea_query::{Query, SelectStatement};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect,
};
use uuid::Uuid;

use crate::entities::{
    client_group_entities, client_group_memberships, entities, entity_memberships, roles,
    tenant_memberships,
};

/// Looks up the caller's role slug through their tenant membership.
///
/// Returns `None` when there is no membership or it has no role.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn role_slug<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    user_id: UserId,
) -> Result<Option<String>, DbErr> {
    let row = tenant_memberships::Entity::find()
        .filter(tenant_memberships::Column::TenantId.eq(tenant_id.0))
        .filter(tenant_memberships::Column::UserId.eq(user_id.0))
        .find_also_related(roles::Entity)
        .one(conn)
        .await?;

    Ok(row.and_then(|(_, role)| role).map(|role| role.slug))
}

/// Picks the scope for a caller, looking the role up if not supplied.
///
/// # Errors
///
/// Returns an error if the role lookup fails.
pub async fn resolve_scope<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    user_id: UserId,
    role_slug_hint: Option<&str>,
) -> Result<VisibilityScope, DbErr> {
    let kind = match role_slug_hint {
        Some(slug) => RoleKind::from_slug(Some(slug)),
        None => RoleKind::from_slug(role_slug(conn, tenant_id, user_id).await?.as_deref()),
    };
    Ok(VisibilityScope::for_role(kind, user_id))
}

/// Groups in which the user holds an active membership.
fn active_groups(tenant_id: TenantId, user_id: UserId) -> SelectStatement {
    Query::select()
        .column(client_group_memberships::Column::ClientGroupId)
        .from(client_group_memberships::Entity)
        .and_where(client_group_memberships::Column::TenantId.eq(tenant_id.0))
        .and_where(client_group_memberships::Column::UserId.eq(user_id.0))
        .and_where(client_group_memberships::Column::IsActive.eq(true))
        .to_owned()
}

/// Groups in which the user holds any membership row.
fn member_groups(tenant_id: TenantId, user_id: UserId) -> SelectStatement {
    Query::select()
        .column(client_group_memberships::Column::ClientGroupId)
        .from(client_group_memberships::Entity)
        .and_where(client_group_memberships::Column::TenantId.eq(tenant_id.0))
        .and_where(client_group_memberships::Column::UserId.eq(user_id.0))
        .to_owned()
}

/// Entities assigned to the user's active groups.
fn group_reach(tenant_id: TenantId, user_id: UserId) -> SelectStatement {
    Query::select()
        .column(client_group_entities::Column::EntityId)
        .from(client_group_entities::Entity)
        .and_where(client_group_entities::Column::TenantId.eq(tenant_id.0))
        .and_where(
            client_group_entities::Column::ClientGroupId
                .in_subquery(active_groups(tenant_id, user_id)),
        )
        .to_owned()
}

/// Entities granted to the user directly.
fn direct_grants(tenant_id: TenantId, user_id: UserId) -> SelectStatement {
    Query::select()
        .column(entity_memberships::Column::EntityId)
        .from(entity_memberships::Entity)
        .and_where(entity_memberships::Column::TenantId.eq(tenant_id.0))
        .and_where(entity_memberships::Column::UserId.eq(user_id.0))
        .to_owned()
}

/// Condition restricting an entity id column to a client's reach.
pub fn entity_condition<C: ColumnTrait>(
    column: C,
    tenant_id: TenantId,
    user_id: UserId,
) -> Condition {
    Condition::any()
        .add(column.in_subquery(group_reach(tenant_id, user_id)))
        .add(column.in_subquery(direct_grants(tenant_id, user_id)))
}

/// Condition restricting a client group id column to a client's groups.
pub fn client_group_condition<C: ColumnTrait>(
    column: C,
    tenant_id: TenantId,
    user_id: UserId,
) -> Condition {
    Condition::all().add(column.in_subquery(member_groups(tenant_id, user_id)))
}

/// Narrows a query over rows keyed by entity.
///
/// `column` is the entity id column: `entities.id` itself, or the
/// `entity_id` of import runs, connections and snapshots.
pub fn scope_by_entity<Q, C>(query: Q, column: C, tenant_id: TenantId, scope: VisibilityScope) -> Q
where
    Q: QueryFilter,
    C: ColumnTrait,
{
    match scope.restricted_user() {
        None => query,
        Some(user_id) => query.filter(entity_condition(column, tenant_id, user_id)),
    }
}

/// Narrows a query over client groups.
pub fn scope_client_groups<Q, C>(
    query: Q,
    column: C,
    tenant_id: TenantId,
    scope: VisibilityScope,
) -> Q
where
    Q: QueryFilter,
    C: ColumnTrait,
{
    match scope.restricted_user() {
        None => query,
        Some(user_id) => query.filter(client_group_condition(column, tenant_id, user_id)),
    }
}

/// Loads both reach paths of a client user.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn client_reach<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    user_id: UserId,
) -> Result<ClientReach, DbErr> {
    let via_groups: Vec<Uuid> = client_group_entities::Entity::find()
        .select_only()
        .column(client_group_entities::Column::EntityId)
        .filter(client_group_entities::Column::TenantId.eq(tenant_id.0))
        .filter(
            client_group_entities::Column::ClientGroupId
                .in_subquery(active_groups(tenant_id, user_id)),
        )
        .into_tuple()
        .all(conn)
        .await?;

    let direct: Vec<Uuid> = entity_memberships::Entity::find()
        .select_only()
        .column(entity_memberships::Column::EntityId)
        .filter(entity_memberships::Column::TenantId.eq(tenant_id.0))
        .filter(entity_memberships::Column::UserId.eq(user_id.0))
        .into_tuple()
        .all(conn)
        .await?;

    Ok(ClientReach {
        via_groups: via_groups.into_iter().map(EntityId::from_uuid).collect(),
        direct: direct.into_iter().map(EntityId::from_uuid).collect(),
    })
}

/// Ids of every entity the caller can see, sorted.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub async fn visible_entity_ids<C: ConnectionTrait>(
    conn: &C,
    tenant_id: TenantId,
    scope: VisibilityScope,
) -> Result<Vec<EntityId>, DbErr> {
    if let Some(user_id) = scope.restricted_user() {
        let reach = client_reach(conn, tenant_id, user_id).await?;
        return Ok(reach.visible_entities().into_iter().collect());
    }

    let mut ids: Vec<EntityId> = entities::Entity::find()
        .select_only()
        .column(entities::Column::Id)
        .filter(entities::Column::TenantId.eq(tenant_id.0))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .map(EntityId::from_uuid)
        .collect();
    ids.sort();
    Ok(ids)
}
