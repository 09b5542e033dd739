//! Application configuration management.
//!
//! Sources, later ones winning: `config/default.toml`, `config/{RUN_MODE}.toml`,
//! then `LEDGERBRIDGE__SECTION__KEY` environment variables.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtConfig,
    /// Tenant resolution configuration.
    #[serde(default)]
    pub tenant: TenantConfig,
    /// QuickBooks Online OAuth and API configuration.
    #[serde(default)]
    pub qbo: QboConfig,
    /// OAuth state token signing.
    pub oauth_state: OAuthStateConfig,
    /// Import worker pool configuration.
    #[serde(default)]
    pub worker: WorkerConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// Secret key for verifying access tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Tenant resolution configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TenantConfig {
    /// Header carrying the tenant UUID.
    #[serde(default = "default_tenant_header")]
    pub header_name: String,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            header_name: default_tenant_header(),
        }
    }
}

fn default_tenant_header() -> String {
    "X-Tenant-ID".to_string()
}

/// QuickBooks Online configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct QboConfig {
    /// OAuth client id. Empty means the integration is not configured.
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Redirect URI registered with Intuit.
    #[serde(default)]
    pub redirect_uri: String,
    /// Requested OAuth scopes.
    #[serde(default = "default_qbo_scopes")]
    pub scopes: Vec<String>,
    /// Authorization endpoint.
    #[serde(default = "default_qbo_authorization_url")]
    pub authorization_url: String,
    /// Token endpoint.
    #[serde(default = "default_qbo_token_url")]
    pub token_url: String,
    /// Accounting API base URL.
    #[serde(default = "default_qbo_api_base_url")]
    pub api_base_url: String,
    /// Where the callback redirects when the state carries no `next`.
    #[serde(default = "default_next_url")]
    pub default_next_url: String,
    /// Per-request timeout for provider calls.
    #[serde(default = "default_qbo_timeout")]
    pub timeout_secs: u64,
}

impl Default for QboConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scopes: default_qbo_scopes(),
            authorization_url: default_qbo_authorization_url(),
            token_url: default_qbo_token_url(),
            api_base_url: default_qbo_api_base_url(),
            default_next_url: default_next_url(),
            timeout_secs: default_qbo_timeout(),
        }
    }
}

fn default_qbo_scopes() -> Vec<String> {
    vec!["com.intuit.quickbooks.accounting".to_string()]
}

fn default_qbo_authorization_url() -> String {
    "https://appcenter.intuit.com/connect/oauth2".to_string()
}

fn default_qbo_token_url() -> String {
    "https://oauth.platform.intuit.com/oauth2/v1/tokens/bearer".to_string()
}

fn default_qbo_api_base_url() -> String {
    "https://quickbooks.api.intuit.com".to_string()
}

fn default_next_url() -> String {
    "/".to_string()
}

fn default_qbo_timeout() -> u64 {
    30
}

/// OAuth state signing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthStateConfig {
    /// HMAC secret for state tokens.
    pub secret: String,
    /// Maximum age of a state token in seconds.
    #[serde(default = "default_state_ttl")]
    pub ttl_secs: i64,
}

fn default_state_ttl() -> i64 {
    600
}

/// Import worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    /// Number of import jobs executed concurrently.
    #[serde(default = "default_worker_concurrency")]
    pub concurrency: usize,
    /// Total attempts for a rate-limited job, the first one included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry.
    #[serde(default = "default_base_backoff")]
    pub base_backoff_secs: u64,
    /// Upper bound for any single retry delay.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
    /// Refresh tokens this many seconds before they expire.
    #[serde(default = "default_refresh_skew")]
    pub refresh_skew_secs: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_worker_concurrency(),
            max_attempts: default_max_attempts(),
            base_backoff_secs: default_base_backoff(),
            max_backoff_secs: default_max_backoff(),
            refresh_skew_secs: default_refresh_skew(),
        }
    }
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    5
}

fn default_base_backoff() -> u64 {
    60
}

fn default_max_backoff() -> u64 {
    3600
}

fn default_refresh_skew() -> i64 {
    300
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("LEDGERBRIDGE")
                    .separator("__")
                    .list_separator(" ")
                    .with_list_parse_key("qbo.scopes")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
