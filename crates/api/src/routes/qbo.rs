//! QuickBooks Online connection and OAuth routes.
//!
//! `/qbo/callback` is public: Intuit redirects the browser there without our
//! headers, so the tenant and entity come from the signed state token. A
//! tenant header, when sent, must name the same tenant.

use axum::{
    Json, Router,
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::get,
};
use chrono::{DateTime, FixedOffset, Utc};
use ledgerbridge_core::access::Capability;
use ledgerbridge_core::qbo::TokenSet;
use ledgerbridge_core::tenant::TenantContext;
use ledgerbridge_db::entities::qbo_connections;
use ledgerbridge_db::repositories::{CreateConnectionInput, UpdateConnectionInput};
use ledgerbridge_db::{EntityRepository, QboConnectionRepository};
use ledgerbridge_shared::AppError;
use ledgerbridge_shared::types::{EntityId, QboConnectionId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::{ApiError, ApiResult};
use crate::extractors::{Caller, JsonBody, QueryParams};
use crate::routes::patch_field;

/// Creates the tenant-scoped QuickBooks routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/qbo/connections",
            get(list_connections).post(create_connection),
        )
        .route(
            "/qbo/connections/{id}",
            get(get_connection)
                .patch(update_connection)
                .delete(delete_connection),
        )
        .route("/qbo/authorize", get(authorize))
}

/// Creates the routes reachable without a token or tenant header.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/qbo/callback", get(callback))
}

/// Request body for creating a connection manually.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateConnectionRequest {
    /// Entity to connect.
    pub entity_id: Uuid,
    /// QuickBooks company id.
    pub realm_id: String,
    /// Access token.
    pub access_token: Option<String>,
    /// Refresh token.
    pub refresh_token: Option<String>,
    /// Access token expiry.
    pub token_expires_at: Option<DateTime<Utc>>,
}

/// Request body for updating a connection.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateConnectionRequest {
    /// New company id.
    pub realm_id: Option<String>,
    /// New access token; `null` clears it.
    #[serde(default, deserialize_with = "patch_field")]
    pub access_token: Option<Option<String>>,
    /// New refresh token; `null` clears it.
    #[serde(default, deserialize_with = "patch_field")]
    pub refresh_token: Option<Option<String>>,
    /// New expiry; `null` clears it.
    #[serde(default, deserialize_with = "patch_field")]
    pub token_expires_at: Option<Option<DateTime<Utc>>>,
}

/// Response for a connection. Tokens are never returned.
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    /// Connection ID.
    pub id: Uuid,
    /// Connected entity.
    pub entity_id: Uuid,
    /// QuickBooks company id.
    pub realm_id: String,
    /// Whether an access token is stored.
    pub has_access_token: bool,
    /// Whether a refresh token is stored.
    pub has_refresh_token: bool,
    /// Access token expiry.
    pub token_expires_at: Option<DateTime<FixedOffset>>,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
    /// Last update time.
    pub updated_at: DateTime<FixedOffset>,
}

impl From<qbo_connections::Model> for ConnectionResponse {
    fn from(m: qbo_connections::Model) -> Self {
        Self {
            id: m.id,
            entity_id: m.entity_id,
            realm_id: m.realm_id,
            has_access_token: m.access_token.is_some(),
            has_refresh_token: m.refresh_token.is_some(),
            token_expires_at: m.token_expires_at,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

/// Query parameters for starting the OAuth flow.
#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    /// Entity to connect.
    pub entity_id: Uuid,
    /// Relative path to return to after the callback.
    pub next: Option<String>,
}

/// Response for starting the OAuth flow.
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// Intuit consent URL.
    pub authorization_url: String,
    /// Signed state token embedded in the URL.
    pub state: String,
}

/// Query parameters Intuit sends to the callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Authorization code.
    pub code: Option<String>,
    /// State token we issued.
    pub state: Option<String>,
    /// QuickBooks company id.
    #[serde(rename = "realmId")]
    pub realm_id: Option<String>,
    /// Error reported by Intuit.
    pub error: Option<String>,
}

/// Accepts only same-site relative paths as a post-callback target.
fn relative_next(next: Option<&str>) -> ApiResult<Option<&str>> {
    match next.map(str::trim).filter(|n| !n.is_empty()) {
        None => Ok(None),
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            Ok(Some(path))
        }
        Some(_) => Err(ApiError::validation("next must be a relative path")),
    }
}

fn repo(state: &AppState) -> QboConnectionRepository {
    QboConnectionRepository::new(state.db.clone())
}

/// GET `/qbo/connections` - List connections of visible entities.
async fn list_connections(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ReadTenantData)?;
    let rows = repo(&state).list(caller.tenant_id(), caller.scope).await?;
    let connections: Vec<ConnectionResponse> = rows.into_iter().map(Into::into).collect();
    Ok(Json(json!({ "connections": connections })))
}

/// POST `/qbo/connections` - Create a connection.
async fn create_connection(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(payload): JsonBody<CreateConnectionRequest>,
) -> ApiResult<impl IntoResponse> {
    caller.require(Capability::ManageConnections)?;
    let realm_id = payload.realm_id.trim();
    if realm_id.is_empty() {
        return Err(ApiError::validation("realm_id must not be empty"));
    }

    let connection = repo(&state)
        .create(
            caller.tenant_id(),
            CreateConnectionInput {
                entity_id: EntityId::from_uuid(payload.entity_id),
                realm_id: realm_id.to_string(),
                access_token: payload.access_token,
                refresh_token: payload.refresh_token,
                token_expires_at: payload.token_expires_at,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ConnectionResponse::from(connection))))
}

/// GET `/qbo/connections/{id}` - Get a visible connection.
async fn get_connection(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ConnectionResponse>> {
    caller.require(Capability::ReadTenantData)?;
    let connection = repo(&state)
        .find(caller.tenant_id(), caller.scope, QboConnectionId::from_uuid(id))
        .await?;
    Ok(Json(connection.into()))
}

/// PATCH `/qbo/connections/{id}` - Update a connection.
async fn update_connection(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    JsonBody(payload): JsonBody<UpdateConnectionRequest>,
) -> ApiResult<Json<ConnectionResponse>> {
    caller.require(Capability::ManageConnections)?;
    let connection = repo(&state)
        .update(
            caller.tenant_id(),
            QboConnectionId::from_uuid(id),
            UpdateConnectionInput {
                realm_id: payload.realm_id,
                access_token: payload.access_token,
                refresh_token: payload.refresh_token,
                token_expires_at: payload.token_expires_at,
            },
        )
        .await?;
    Ok(Json(connection.into()))
}

/// DELETE `/qbo/connections/{id}` - Unlink a connection.
async fn delete_connection(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    caller.require(Capability::ManageConnections)?;
    repo(&state)
        .delete(caller.tenant_id(), QboConnectionId::from_uuid(id))
        .await?;
    info!(tenant_id = %caller.tenant_id(), connection_id = %id, "QuickBooks connection removed");
    Ok(StatusCode::NO_CONTENT)
}

/// GET `/qbo/authorize` - Start the OAuth flow for an entity.
async fn authorize(
    State(state): State<AppState>,
    caller: Caller,
    QueryParams(query): QueryParams<AuthorizeQuery>,
) -> ApiResult<Json<AuthorizeResponse>> {
    caller.require(Capability::ManageConnections)?;
    let next = relative_next(query.next.as_deref())?;
    let entity_id = EntityId::from_uuid(query.entity_id);
    EntityRepository::new(state.db.clone())
        .find(caller.tenant_id(), caller.scope, entity_id)
        .await?;

    let redirect_uri = state.settings.redirect_uri.as_str();
    if redirect_uri.is_empty() {
        return Err(ApiError(AppError::Internal(
            "qbo.redirect_uri is not configured".into(),
        )));
    }
    let token = state
        .state_codec
        .encode(caller.tenant_id(), entity_id, redirect_uri, next)?;
    let authorization_url = state.oauth.authorization_url(redirect_uri, &token)?;

    info!(tenant_id = %caller.tenant_id(), %entity_id, "QuickBooks authorization started");
    Ok(Json(AuthorizeResponse {
        authorization_url,
        state: token,
    }))
}

/// GET `/qbo/callback` - Finish the OAuth flow and link the connection.
async fn callback(
    State(state): State<AppState>,
    tenant: Option<Extension<TenantContext>>,
    QueryParams(query): QueryParams<CallbackQuery>,
) -> ApiResult<Redirect> {
    if let Some(error) = query.error {
        warn!(%error, "QuickBooks authorization was not granted");
        return Err(ApiError::validation(format!(
            "QuickBooks authorization failed: {error}"
        )));
    }
    let (Some(code), Some(raw_state), Some(realm_id)) = (query.code, query.state, query.realm_id)
    else {
        return Err(ApiError::validation("code, state and realmId are required"));
    };

    let verified = state.state_codec.decode(&raw_state)?;
    if verified.redirect_uri != state.settings.redirect_uri {
        return Err(ApiError(AppError::StateInvalid(
            "redirect_uri does not match".into(),
        )));
    }
    if let Some(Extension(context)) = tenant
        && context.tenant_id() != verified.tenant_id
    {
        return Err(ApiError(AppError::StateInvalid(
            "tenant does not match".into(),
        )));
    }

    let grant = state
        .oauth
        .exchange_code(&code, &verified.redirect_uri)
        .await?;
    let tokens = TokenSet::from_grant(grant, Utc::now());
    repo(&state)
        .upsert_for_entity(verified.tenant_id, verified.entity_id, &realm_id, &tokens)
        .await?;

    let target = match relative_next(verified.next.as_deref()) {
        Ok(Some(next)) => next.to_string(),
        _ => state.settings.default_next_url.clone(),
    };
    Ok(Redirect::to(&target))
}
