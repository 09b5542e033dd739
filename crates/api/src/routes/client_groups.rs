//! Client group routes: groups, entity assignments and memberships.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::{DateTime, FixedOffset};
use ledgerbridge_core::access::Capability;
use ledgerbridge_db::{ClientGroupRepository, RlsConnection};
use ledgerbridge_db::entities::{client_group_memberships, client_groups};
use ledgerbridge_db::repositories::visibility::visible_entity_ids;
use ledgerbridge_db::repositories::{
    CreateClientGroupInput, CreateMembershipInput, UpdateClientGroupInput,
};
use ledgerbridge_shared::types::{ClientGroupId, EntityId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::ApiResult;
use crate::extractors::{Caller, JsonBody};
use crate::routes::entities::required_name;
use crate::routes::patch_field;

/// Creates the client group routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/client-groups", get(list_groups).post(create_group))
        .route("/client-groups/visible/entities", get(visible_entities))
        .route(
            "/client-groups/{id}",
            get(get_group).patch(update_group).delete(delete_group),
        )
        .route(
            "/client-groups/{id}/entities",
            get(list_assigned).post(assign_entity),
        )
        .route(
            "/client-groups/{id}/entities/{entity_id}",
            delete(unassign_entity),
        )
        .route(
            "/client-groups/{id}/memberships",
            get(list_memberships).post(add_membership),
        )
        .route(
            "/client-groups/{id}/memberships/{membership_id}",
            delete(remove_membership),
        )
}

/// Request body for creating a client group.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateClientGroupRequest {
    /// Name, unique within the tenant.
    pub name: String,
    /// Description.
    pub description: Option<String>,
}

/// Request body for updating a client group.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateClientGroupRequest {
    /// New name.
    pub name: Option<String>,
    /// New description; `null` clears it.
    #[serde(default, deserialize_with = "patch_field")]
    pub description: Option<Option<String>>,
}

/// Request body for assigning an entity.
#[derive(Debug, Deserialize)]
pub struct AssignEntityRequest {
    /// Entity to assign.
    pub entity_id: Uuid,
}

/// Request body for adding a membership.
#[derive(Debug, Deserialize)]
pub struct AddMembershipRequest {
    /// Member user.
    pub user_id: Uuid,
    /// Role slug (default `client`).
    pub role_slug: Option<String>,
    /// Whether the membership is active (default true).
    pub is_active: Option<bool>,
}

/// Response for a client group.
#[derive(Debug, Serialize)]
pub struct ClientGroupResponse {
    /// Group ID.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
    /// Last update time.
    pub updated_at: DateTime<FixedOffset>,
}

impl From<client_groups::Model> for ClientGroupResponse {
    fn from(m: client_groups::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            description: m.description,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Response for a client group membership.
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    /// Membership ID.
    pub id: Uuid,
    /// Member user.
    pub user_id: Uuid,
    /// Group.
    pub client_group_id: Uuid,
    /// Role slug.
    pub role_slug: String,
    /// Whether the membership is active.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
}

impl From<client_group_memberships::Model> for MembershipResponse {
    fn from(m: client_group_memberships::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            client_group_id: m.client_group_id,
            role_slug: m.role_slug,
            is_active: m.is_active,
            created_at: m.created_at,
        }
    }
}

fn repo(state: &AppState) -> ClientGroupRepository {
    ClientGroupRepository::new(state.db.clone())
}

/// GET `/client-groups` - List groups visible to the caller.
async fn list_groups(State(state): State<AppState>, caller: Caller) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ReadTenantData)?;
    let rows = repo(&state).list(caller.tenant_id(), caller.scope).await?;
    let groups: Vec<ClientGroupResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "client_groups": groups })))
}

/// GET `/client-groups/visible/entities` - Ids of the entities the caller can see.
async fn visible_entities(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ReadTenantData)?;
    let rls = RlsConnection::new(&state.db, caller.tenant_id()).await?;
    let ids = visible_entity_ids(rls.transaction(), caller.tenant_id(), caller.scope).await?;
    rls.commit().await?;
    Ok(Json(json!({ "entity_ids": ids })))
}

/// POST `/client-groups` - Create a group.
async fn create_group(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(payload): JsonBody<CreateClientGroupRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ManageClientGroups)?;
    let group = repo(&state)
        .create(
            caller.tenant_id(),
            CreateClientGroupInput {
                name: required_name(&payload.name)?,
                description: payload.description,
            },
        )
        .await?;
    info!(tenant_id = %caller.tenant_id(), client_group_id = %group.id, "Client group created");
    Ok((StatusCode::CREATED, Json(ClientGroupResponse::from(group))))
}

/// GET `/client-groups/{id}` - Get a visible group.
async fn get_group(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClientGroupResponse>> {
    caller.require(Capability::ReadTenantData)?;
    let group = repo(&state)
        .find(caller.tenant_id(), caller.scope, ClientGroupId::from_uuid(id))
        .await?;
    Ok(Json(group.into()))
}

/// PATCH `/client-groups/{id}` - Update a group.
async fn update_group(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateClientGroupRequest>,
) -> ApiResult<Json<ClientGroupResponse>> {
    caller.require(Capability::ManageClientGroups)?;
    let input = UpdateClientGroupInput {
        name: payload.name.as_deref().map(required_name).transpose()?,
        description: payload.description,
    };
    let group = repo(&state)
        .update(caller.tenant_id(), ClientGroupId::from_uuid(id), input)
        .await?;
    Ok(Json(group.into()))
}

/// DELETE `/client-groups/{id}` - Delete a group with its assignments and memberships.
async fn delete_group(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Capability::ManageClientGroups)?;
    repo(&state)
        .delete(caller.tenant_id(), ClientGroupId::from_uuid(id))
        .await?;
    info!(tenant_id = %caller.tenant_id(), client_group_id = %id, "Client group deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/client-groups/{id}/entities` - Entities assigned to a visible group.
async fn list_assigned(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ReadTenantData)?;
    let group_id = ClientGroupId::from_uuid(id);
    let groups = repo(&state);
    groups.find(caller.tenant_id(), caller.scope, group_id).await?;
    let entity_ids: Vec<Uuid> = groups
        .assigned_entities(caller.tenant_id(), group_id)
        .await?
        .into_iter()
        .map(|row| row.entity_id)
        .collect();
    Ok(Json(json!({ "entity_ids": entity_ids })))
}

/// POST `/client-groups/{id}/entities` - Assign an entity.
async fn assign_entity(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<AssignEntityRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ManageClientGroups)?;
    let row = repo(&state)
        .assign_entity(
            caller.tenant_id(),
            ClientGroupId::from_uuid(id),
            EntityId::from_uuid(payload.entity_id),
        )
        .await?;
    info!(
        tenant_id = %caller.tenant_id(),
        client_group_id = %id,
        entity_id = %payload.entity_id,
        "Entity assigned to client group"
    );
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "id": row.id,
            "client_group_id": row.client_group_id,
            "entity_id": row.entity_id,
        })),
    ))
}

/// DELETE `/client-groups/{id}/entities/{entity_id}` - Remove an assignment.
async fn unassign_entity(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, entity_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    caller.require(Capability::ManageClientGroups)?;
    repo(&state)
        .unassign_entity(
            caller.tenant_id(),
            ClientGroupId::from_uuid(id),
            EntityId::from_uuid(entity_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/client-groups/{id}/memberships` - Members of a group.
async fn list_memberships(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ManageClientGroups)?;
    let rows = repo(&state)
        .memberships(caller.tenant_id(), ClientGroupId::from_uuid(id))
        .await?;
    let memberships: Vec<MembershipResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "memberships": memberships })))
}

/// POST `/client-groups/{id}/memberships` - Add a member.
async fn add_membership(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<AddMembershipRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ManageClientGroups)?;
    let membership = repo(&state)
        .add_membership(
            caller.tenant_id(),
            ClientGroupId::from_uuid(id),
            CreateMembershipInput {
                user_id: UserId::from_uuid(payload.user_id),
                role_slug: payload.role_slug,
                is_active: payload.is_active,
            },
        )
        .await?;
    info!(
        tenant_id = %caller.tenant_id(),
        client_group_id = %id,
        member_id = %membership.user_id,
        role_slug = %membership.role_slug,
        "Client group membership added"
    );
    Ok((StatusCode::CREATED, Json(MembershipResponse::from(membership))))
}

/// DELETE `/client-groups/{id}/memberships/{membership_id}` - Remove a member.
async fn remove_membership(
    State(state): State<AppState>,
    caller: Caller,
    Path((id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    caller.require(Capability::ManageClientGroups)?;
    repo(&state)
        .remove_membership(caller.tenant_id(), ClientGroupId::from_uuid(id), membership_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
