//! Entity routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use chrono::{DateTime, FixedOffset};
use ledgerbridge_core::access::Capability;
use ledgerbridge_db::EntityRepository;
use ledgerbridge_db::entities::entities;
use ledgerbridge_db::repositories::{CreateEntityInput, UpdateEntityInput};
use ledgerbridge_shared::types::EntityId;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{Caller, JsonBody};
use crate::routes::patch_field;

/// Creates the entity routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/entities", get(list_entities).post(create_entity))
        .route(
            "/entities/{id}",
            get(get_entity).patch(update_entity).delete(delete_entity),
        )
}

/// Request body for creating an entity.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateEntityRequest {
    /// Display name, unique within the tenant.
    pub name: String,
    /// Entity type (default `Individual`).
    pub entity_type: Option<String>,
    /// Lifecycle status (default `active`).
    pub status: Option<String>,
    /// Employer identification number.
    pub ein: Option<String>,
    /// Tax return type.
    pub tax_type: Option<String>,
    /// Source type (default `MANUAL_PROFORMA`).
    pub source_type: Option<String>,
    /// Free-form notes.
    pub notes: Option<String>,
}

/// Request body for updating an entity. Only these fields can change.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateEntityRequest {
    /// New name.
    pub name: Option<String>,
    /// New entity type.
    pub entity_type: Option<String>,
    /// New status.
    pub status: Option<String>,
    /// New EIN; `null` clears it.
    #[serde(default, deserialize_with = "patch_field")]
    pub ein: Option<Option<String>>,
    /// New tax type; `null` clears it.
    #[serde(default, deserialize_with = "patch_field")]
    pub tax_type: Option<Option<String>>,
    /// New source type.
    pub source_type: Option<String>,
    /// New notes; `null` clears them.
    #[serde(default, deserialize_with = "patch_field")]
    pub notes: Option<Option<String>>,
}

/// Response for an entity.
#[derive(Debug, Serialize)]
pub struct EntityResponse {
    /// Entity ID.
    pub id: Uuid,
    /// Name.
    pub name: String,
    /// Entity type.
    pub entity_type: String,
    /// Status.
    pub status: String,
    /// EIN.
    pub ein: Option<String>,
    /// Tax type.
    pub tax_type: Option<String>,
    /// Source type.
    pub source_type: String,
    /// Notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
    /// Last update time.
    pub updated_at: DateTime<FixedOffset>,
}

impl From<entities::Model> for EntityResponse {
    fn from(m: entities::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            entity_type: m.entity_type,
            status: m.status,
            ein: m.ein,
            tax_type: m.tax_type,
            source_type: m.source_type,
            notes: m.notes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Trims a required name, rejecting blanks.
pub(crate) fn required_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::validation("name must not be empty"));
    }
    Ok(name.to_string())
}

/// GET `/entities` - List entities visible to the caller.
async fn list_entities(State(state): State<AppState>, caller: Caller) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ReadTenantData)?;
    let rows = EntityRepository::new(state.db.clone())
        .list(caller.tenant_id(), caller.scope)
        .await?;
    let entities: Vec<EntityResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "entities": entities })))
}

/// POST `/entities` - Create an entity.
async fn create_entity(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(payload): JsonBody<CreateEntityRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ManageEntities)?;
    let input = CreateEntityInput {
        name: required_name(&payload.name)?,
        entity_type: payload.entity_type,
        status: payload.status,
        ein: payload.ein,
        tax_type: payload.tax_type,
        source_type: payload.source_type,
        notes: payload.notes,
    };

    let entity = EntityRepository::new(state.db.clone())
        .create(caller.tenant_id(), input)
        .await?;
    info!(
        tenant_id = %caller.tenant_id(),
        entity_id = %entity.id,
        user_id = %caller.user_id,
        "Entity created"
    );
    Ok((StatusCode::CREATED, Json(EntityResponse::from(entity))))
}

/// GET `/entities/{id}` - Get a visible entity.
async fn get_entity(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<EntityResponse>> {
    caller.require(Capability::ReadTenantData)?;
    let entity = EntityRepository::new(state.db.clone())
        .find(caller.tenant_id(), caller.scope, EntityId::from_uuid(id))
        .await?;
    Ok(Json(entity.into()))
}

/// PATCH `/entities/{id}` - Update the allow-listed fields of an entity.
async fn update_entity(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateEntityRequest>,
) -> ApiResult<Json<EntityResponse>> {
    caller.require(Capability::ManageEntities)?;
    let input = UpdateEntityInput {
        name: payload.name.as_deref().map(required_name).transpose()?,
        entity_type: payload.entity_type,
        status: payload.status,
        ein: payload.ein,
        tax_type: payload.tax_type,
        source_type: payload.source_type,
        notes: payload.notes,
    };

    let entity = EntityRepository::new(state.db.clone())
        .update(caller.tenant_id(), EntityId::from_uuid(id), input)
        .await?;
    Ok(Json(entity.into()))
}

/// DELETE `/entities/{id}` - Delete an entity and everything hanging off it.
async fn delete_entity(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Capability::ManageEntities)?;
    EntityRepository::new(state.db.clone())
        .delete(caller.tenant_id(), EntityId::from_uuid(id))
        .await?;
    info!(tenant_id = %caller.tenant_id(), entity_id = %id, "Entity deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_name_trims_and_rejects_blank() {
        assert_eq!(required_name("  Acme ").unwrap(), "Acme");
        assert_eq!(required_name("   ").unwrap_err().error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_update_rejects_fields_outside_allow_list() {
        let result = serde_json::from_str::<UpdateEntityRequest>(r#"{"tenant_id": "x"}"#);
        assert!(result.is_err());
    }
}
