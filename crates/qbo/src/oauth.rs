//! OAuth client for the Intuit token endpoint.
//!
//! Both grants are form POSTs authenticated with HTTP basic client
//! credentials. Missing credentials fail before any request is sent.

use async_trait::async_trait;
use ledgerbridge_core::import::TokenRefresher;
use ledgerbridge_core::qbo::{ProviderError, TokenGrant};
use ledgerbridge_shared::config::QboConfig;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::{debug, info};
use url::Url;

use crate::http::{build_client, decode, transport};

/// Client for the authorization and token endpoints.
#[derive(Clone)]
pub struct QboOAuthClient {
    http: Client,
    client_id: String,
    client_secret: String,
    authorization_url: String,
    token_url: String,
    scopes: Vec<String>,
}

impl std::fmt::Debug for QboOAuthClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QboOAuthClient")
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url)
            .finish_non_exhaustive()
    }
}

impl QboOAuthClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unavailable` if the HTTP client cannot be built.
    pub fn from_config(config: &QboConfig) -> Result<Self, ProviderError> {
        Ok(Self::with_http(build_client(config.timeout_secs)?, config))
    }

    /// Creates a client around an existing HTTP client.
    #[must_use]
    pub fn with_http(http: Client, config: &QboConfig) -> Self {
        Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            authorization_url: config.authorization_url.clone(),
            token_url: config.token_url.clone(),
            scopes: config.scopes.clone(),
        }
    }

    /// Returns true if client id and secret are both set.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }

    fn ensure_configured(&self) -> Result<(), ProviderError> {
        if self.is_configured() {
            Ok(())
        } else {
            Err(ProviderError::CredentialsMissing)
        }
    }

    /// Builds the URL the user is sent to for consent.
    ///
    /// # Errors
    ///
    /// - `ProviderError::CredentialsMissing` if the client id is not set
    /// - `ProviderError::Decode` if the configured authorization URL is invalid
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> Result<String, ProviderError> {
        if self.client_id.is_empty() {
            return Err(ProviderError::CredentialsMissing);
        }
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.authorization_url,
            [
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("redirect_uri", redirect_uri),
                ("state", state),
            ],
        )
        .map_err(|e| ProviderError::Decode(format!("authorization url: {e}")))?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns the classified provider error.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant, ProviderError> {
        self.ensure_configured()?;
        let grant = self
            .token_request(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;
        info!("Exchanged QuickBooks authorization code");
        Ok(grant)
    }

    /// Obtains a new access token.
    ///
    /// # Errors
    ///
    /// Returns the classified provider error.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.ensure_configured()?;
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenGrant, ProviderError> {
        debug!(url = %self.token_url, "Calling QuickBooks token endpoint");
        let response = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(ACCEPT, "application/json")
            .form(form)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

#[async_trait]
impl TokenRefresher for QboOAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ProviderError> {
        self.refresh_token(refresh_token).await
    }
}
