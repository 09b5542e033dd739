//! Accounting reports client.

use async_trait::async_trait;
use ledgerbridge_core::import::TrialBalanceSource;
use ledgerbridge_core::import::types::{QBO_MINOR_VERSION, ReportRequest};
use ledgerbridge_core::qbo::{ProviderError, TrialBalanceReport};
use ledgerbridge_shared::config::QboConfig;
use reqwest::Client;
use reqwest::header::ACCEPT;
use tracing::debug;

use crate::http::{build_client, decode, transport};

/// Client for `/v3/company/{realm}/reports/*`.
#[derive(Debug, Clone)]
pub struct QboReportsClient {
    http: Client,
    api_base_url: String,
}

impl QboReportsClient {
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
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn report_url(&self, realm_id: &str, report: &str) -> String {
        format!("{}/v3/company/{realm_id}/reports/{report}", self.api_base_url)
    }

    /// Fetches the trial balance for the request's date range.
    ///
    /// # Errors
    ///
    /// Returns the classified provider error.
    pub async fn trial_balance(
        &self,
        request: &ReportRequest,
    ) -> Result<TrialBalanceReport, ProviderError> {
        let url = self.report_url(&request.realm_id, "TrialBalance");
        debug!(realm_id = %request.realm_id, %url, "Fetching trial balance");

        let response = self
            .http
            .get(&url)
            .bearer_auth(&request.access_token)
            .header(ACCEPT, "application/json")
            .query(&[
                ("start_date", request.start_date.to_string()),
                ("end_date", request.end_date.to_string()),
                ("minorversion", QBO_MINOR_VERSION.to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

#[async_trait]
impl TrialBalanceSource for QboReportsClient {
    async fn fetch_trial_balance(
        &self,
        request: &ReportRequest,
    ) -> Result<TrialBalanceReport, ProviderError> {
        self.trial_balance(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ledgerbridge_core::qbo::normalize;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> QboReportsClient {
        QboReportsClient::from_config(&QboConfig {
            api_base_url: format!("{}/", server.uri()),
            ..QboConfig::default()
        })
        .unwrap()
    }

    fn request() -> ReportRequest {
        ReportRequest {
            realm_id: "R1".into(),
            access_token: "access-1".into(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_fetches_trial_balance_for_realm() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v3/company/R1/reports/TrialBalance"))
            .and(bearer_token("access-1"))
            .and(query_param("start_date", "2024-01-01"))
            .and(query_param("end_date", "2024-12-31"))
            .and(query_param("minorversion", "65"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Header": {"ReportName": "TrialBalance"},
                "Rows": {"Row": [
                    {"ColData": [{"value": "Checking", "id": "35"}, {"value": "1,234.56"}]},
                    {"ColData": [{"value": "Accounts Payable", "id": "33"}, {"value": "(500.00)"}]},
                    {"ColData": [{"value": "Total Assets"}, {"value": "734.56"}]}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let report = client(&server).fetch_trial_balance(&request()).await.unwrap();

        assert_eq!(normalize(&report).len(), 2);
    }

    #[tokio::test]
    async fn test_throttled_report_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("Throttled"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_trial_balance(&request()).await.unwrap_err();

        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_unauthorized_report_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("AuthenticationFailed"))
            .mount(&server)
            .await;

        let err = client(&server).fetch_trial_balance(&request()).await.unwrap_err();

        assert_eq!(
            err,
            ProviderError::Rejected {
                status: 401,
                detail: "AuthenticationFailed".into()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_report_has_no_lines() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Header": {}})))
            .mount(&server)
            .await;

        let report = client(&server).fetch_trial_balance(&request()).await.unwrap();

        assert!(normalize(&report).is_empty());
    }
}
