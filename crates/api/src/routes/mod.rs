//! API route definitions.

use axum::{Router, middleware};
use serde::{Deserialize, Deserializer};

use crate::AppState;
use crate::middleware::{auth_middleware, optional_tenant_middleware, tenant_middleware};

pub mod client_groups;
pub mod entities;
pub mod health;
pub mod import_runs;
pub mod qbo;

/// Creates the API router.
///
/// Health and the OAuth callback are public; the callback accepts an
/// optional tenant header. Everything else needs a bearer token and the
/// tenant header; authentication runs first.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let tenant_routes = Router::new()
        .merge(entities::routes())
        .merge(client_groups::routes())
        .merge(qbo::routes())
        .merge(import_runs::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            tenant_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let public_routes = qbo::public_routes().layer(middleware::from_fn_with_state(
        state,
        optional_tenant_middleware,
    ));

    Router::new()
        .merge(health::routes())
        .merge(public_routes)
        .merge(tenant_routes)
}

/// Deserializes a field that distinguishes "absent" from "null".
///
/// Use with `#[serde(default, deserialize_with = "patch_field")]` on an
/// `Option<Option<T>>`: absent leaves `None`, `null` gives `Some(None)`.
pub(crate) fn patch_field<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "patch_field")]
        notes: Option<Option<String>>,
    }

    #[test]
    fn test_patch_field_distinguishes_null_from_absent() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        let null: Patch = serde_json::from_str(r#"{"notes": null}"#).unwrap();
        let set: Patch = serde_json::from_str(r#"{"notes": "x"}"#).unwrap();

        assert_eq!(absent.notes, None);
        assert_eq!(null.notes, Some(None));
        assert_eq!(set.notes, Some(Some("x".to_string())));
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = crate::create_router(test_support::state())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn test_health_needs_no_credentials() {
        let (status, body) =
            send(Request::get("/api/v1/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (status, body) = send(
            Request::get("/api/v1/entities")
                .header("X-Tenant-ID", uuid::Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_authentication_runs_before_tenant_resolution() {
        let (status, _) =
            send(Request::get("/api/v1/import-runs").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_protected_route_requires_tenant() {
        let (status, body) = send(
            Request::get("/api/v1/client-groups")
                .header("Authorization", test_support::bearer(uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "TENANT_REQUIRED");
    }

    #[tokio::test]
    async fn test_invalid_token_is_rejected() {
        let (status, body) = send(
            Request::get("/api/v1/entities")
                .header("Authorization", "Bearer not-a-jwt")
                .header("X-Tenant-ID", uuid::Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Authentication failed: Invalid or malformed token");
    }
}
