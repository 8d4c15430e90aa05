//! HTTP client for the desk service.

use super::{BackendError, DealStateRequest, DeskBackend, PersistRequest, TaxRecalcResponse};
use crate::domain::{Deal, DealId, DealState, Scenario};
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Desk backend speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDeskBackend {
    client: Client,
    base_url: String,
    retry_budget: Duration,
}

impl HttpDeskBackend {
    /// Create a client with a per-request `timeout`.
    ///
    /// Transient failures are retried for up to three timeouts in total.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry_budget: timeout * 3,
        })
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, BackendError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.retry_budget),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .request(method.clone(), &url)
                .json(body)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(BackendError::NetworkError(e.to_string())))?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(backoff::Error::transient(BackendError::HttpError {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                let message = error_message(response).await;
                let err = match status.as_u16() {
                    404 => BackendError::NotFound(message),
                    400 | 409 | 422 => BackendError::Rejected(message),
                    code => BackendError::HttpError {
                        status: code,
                        message,
                    },
                };
                return Err(backoff::Error::permanent(err));
            }

            response
                .json::<T>()
                .await
                .map_err(|e| backoff::Error::permanent(BackendError::ParseError(e.to_string())))
        })
        .await
    }
}

/// Pull the `{"error": ...}` message out of an error response.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<serde_json::Value>().await {
        Ok(body) => body
            .get("error")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string()),
        Err(_) => status.to_string(),
    }
}

#[async_trait]
impl DeskBackend for HttpDeskBackend {
    // a replay after a lost response carries the same save id and is not re-applied
    async fn persist_scenario(&self, request: PersistRequest) -> Result<Scenario, BackendError> {
        debug!(
            "Persisting {} field(s) for scenario {}",
            request.updates.len(),
            request.scenario_id
        );
        let path = format!(
            "/v1/deals/{}/scenarios/{}",
            request.deal_id, request.scenario_id
        );
        self.send_json(Method::PATCH, &path, &request).await
    }

    async fn recalculate_tax(&self, deal_id: &DealId) -> Result<TaxRecalcResponse, BackendError> {
        debug!("Recalculating tax profile for deal {}", deal_id);
        let path = format!("/v1/deals/{}/tax/recalculate", deal_id);
        self.send_json(Method::POST, &path, &serde_json::json!({ "dealId": deal_id }))
            .await
    }

    async fn update_deal_state(
        &self,
        deal_id: &DealId,
        state: DealState,
    ) -> Result<Deal, BackendError> {
        debug!("Moving deal {} to {}", deal_id, state);
        let path = format!("/v1/deals/{}/state", deal_id);
        let body = DealStateRequest {
            deal_id: deal_id.clone(),
            deal_state: state,
        };
        self.send_json(Method::POST, &path, &body).await
    }
}
