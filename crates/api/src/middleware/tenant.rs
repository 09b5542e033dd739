//! Tenant resolution middleware.
//!
//! Resolves the [`TenantContext`] from the configured header and stores it in
//! the request extensions. The context lives and dies with the request.
//! Tenant-scoped routes use [`tenant_middleware`]. The OAuth callback is
//! reached by a browser redirect and uses [`optional_tenant_middleware`].
//! Health is mounted outside both.

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ledgerbridge_core::tenant::{TenantContext, TenantError, TenantRequirement, resolve};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;

/// Requires a tenant header and publishes the resolved context.
///
/// The resolved tenant id is echoed back in the same header.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    with_tenant(&state, request, next, TenantRequirement::Required).await
}

/// Publishes the tenant context when the header is present.
///
/// A present header must still be a valid tenant id.
pub async fn optional_tenant_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    with_tenant(&state, request, next, TenantRequirement::Optional).await
}

async fn with_tenant(
    state: &AppState,
    mut request: Request,
    next: Next,
    requirement: TenantRequirement,
) -> Response {
    let header_name = &state.settings.tenant_header;
    let raw = match request.headers().get(header_name) {
        Some(value) => match value.to_str() {
            Ok(value) => Some(value),
            Err(_) => {
                let lossy = String::from_utf8_lossy(value.as_bytes()).into_owned();
                return ApiError::from(TenantError::InvalidFormat(lossy)).into_response();
            }
        },
        None => None,
    };

    let context = match resolve(raw, requirement) {
        Ok(context) => context,
        Err(e) => {
            debug!(error = %e, "Tenant header rejected");
            return ApiError::from(e).into_response();
        }
    };

    let Some(context) = context else {
        return next.run(request).await;
    };
    request.extensions_mut().insert(context);
    let mut response = next.run(request).await;
    echo_tenant(&mut response, header_name, context);
    response
}

fn echo_tenant(response: &mut Response, header_name: &HeaderName, context: TenantContext) {
    if let Ok(value) = HeaderValue::from_str(&context.tenant_id().to_string()) {
        response.headers_mut().insert(header_name.clone(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;
    use axum::{Extension, Router, body::Body, http::StatusCode, middleware, routing::get};
    use http_body_util::BodyExt;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app() -> Router {
        let state = test_support::state();
        Router::new()
            .route(
                "/tenant",
                get(|Extension(ctx): Extension<TenantContext>| async move {
                    ctx.tenant_uuid().to_string()
                }),
            )
            .layer(middleware::from_fn_with_state(state.clone(), tenant_middleware))
            .with_state(state)
    }

    async fn error_code(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_missing_header_is_rejected() {
        let response = app()
            .oneshot(Request::get("/tenant").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "TENANT_REQUIRED");
    }

    #[tokio::test]
    async fn test_malformed_header_is_rejected() {
        let response = app()
            .oneshot(
                Request::get("/tenant")
                    .header("X-Tenant-ID", "not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "INVALID_TENANT_FORMAT");
    }

    #[tokio::test]
    async fn test_context_reaches_handler_and_is_echoed() {
        let tenant = Uuid::new_v4();
        let response = app()
            .oneshot(
                Request::get("/tenant")
                    .header("X-Tenant-ID", tenant.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("x-tenant-id").unwrap(),
            tenant.to_string().as_str()
        );
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, tenant.to_string().as_bytes());
    }

    fn optional_app() -> Router {
        let state = test_support::state();
        Router::new()
            .route(
                "/tenant",
                get(|ctx: Option<Extension<TenantContext>>| async move {
                    ctx.map_or_else(|| "none".to_string(), |Extension(ctx)| {
                        ctx.tenant_uuid().to_string()
                    })
                }),
            )
            .layer(middleware::from_fn_with_state(
                state.clone(),
                optional_tenant_middleware,
            ))
            .with_state(state)
    }

    #[tokio::test]
    async fn test_optional_mode_passes_without_header() {
        let response = optional_app()
            .oneshot(Request::get("/tenant").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("x-tenant-id").is_none());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, "none".as_bytes());
    }

    #[tokio::test]
    async fn test_optional_mode_still_rejects_malformed_header() {
        let response = optional_app()
            .oneshot(
                Request::get("/tenant")
                    .header("X-Tenant-ID", "acme")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(error_code(response).await, "INVALID_TENANT_FORMAT");
    }

    #[tokio::test]
    async fn test_optional_mode_publishes_present_header() {
        let tenant = Uuid::new_v4();
        let response = optional_app()
            .oneshot(
                Request::get("/tenant")
                    .header("X-Tenant-ID", tenant.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes, tenant.to_string().as_bytes());
    }
}
