//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes under `/api/v1`
//! - Authentication and tenant resolution middleware
//! - The [`Caller`](extractors::Caller) extractor with role and visibility
//! - [`ApiError`](error::ApiError), the uniform error response

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;

use axum::Router;
use axum::http::{HeaderName, header};
use ledgerbridge_core::qbo::StateCodec;
use ledgerbridge_qbo::QboOAuthClient;
use ledgerbridge_shared::jwt::JwtService;
use ledgerbridge_shared::{AppConfig, AppError};
use ledgerbridge_worker::ImportQueue;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

/// Request-independent settings read from configuration.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Header carrying the tenant id.
    pub tenant_header: HeaderName,
    /// Redirect URI registered with Intuit.
    pub redirect_uri: String,
    /// Where the OAuth callback sends the browser without a `next`.
    pub default_next_url: String,
}

impl ApiSettings {
    /// Reads the settings from the application config.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the tenant header name is not a valid
    /// header name.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let tenant_header = HeaderName::try_from(config.tenant.header_name.as_str())
            .map_err(|e| AppError::Internal(format!("tenant.header_name: {e}")))?;
        Ok(Self {
            tenant_header,
            redirect_uri: config.qbo.redirect_uri.clone(),
            default_next_url: config.qbo.default_next_url.clone(),
        })
    }
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: DatabaseConnection,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Intuit OAuth client.
    pub oauth: Arc<QboOAuthClient>,
    /// Signs and verifies OAuth state tokens.
    pub state_codec: Arc<StateCodec>,
    /// Import job queue feeding the worker pool.
    pub imports: ImportQueue,
    /// Static settings.
    pub settings: Arc<ApiSettings>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new([header::AUTHORIZATION]))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
