//! Shared HTTP plumbing for the provider clients.

use std::time::Duration;

use ledgerbridge_core::qbo::ProviderError;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::warn;

/// Longest response body kept in a `Rejected` error.
const MAX_DETAIL_CHARS: usize = 512;

/// Builds the reqwest client used for every provider call.
///
/// # Errors
///
/// Returns `ProviderError::Unavailable` if the TLS backend cannot be initialised.
pub fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(transport)
}

/// Maps a transport failure.
pub(crate) fn transport(err: reqwest::Error) -> ProviderError {
    ProviderError::Unavailable(err.to_string())
}

/// Passes 2xx responses through and turns everything else into an error.
pub(crate) async fn classify(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        warn!(url = %response.url(), "QuickBooks throttled request");
        return Err(ProviderError::RateLimited);
    }

    let body = response.text().await.unwrap_or_default();
    let detail: String = body.chars().take(MAX_DETAIL_CHARS).collect();
    warn!(status = status.as_u16(), %detail, "QuickBooks rejected request");
    Err(ProviderError::Rejected {
        status: status.as_u16(),
        detail,
    })
}

/// Classifies the response and decodes a JSON body.
pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let response = classify(response).await?;
    let bytes = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Decode(e.to_string()))
}
