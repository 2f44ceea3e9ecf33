use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};

#[cfg(test)]
use mockall::automock;

use crate::error::{CopywriterError, Result};
use crate::models::{CompletionRequest, CompletionResponse};

/// Upper bound on a single completion call, including reading the body
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse>;
}

/// YandexGPT foundation-models completion endpoint over HTTPS
pub struct YandexTransport {
    client: Client,
    endpoint: String,
    iam_token: String,
}

impl YandexTransport {
    pub fn new(endpoint: String, iam_token: String) -> Result<Self> {
        Self::with_timeout(endpoint, iam_token, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(endpoint: String, iam_token: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CopywriterError::Backend(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            iam_token,
        })
    }
}

#[async_trait]
impl Transport for YandexTransport {
    async fn complete(&self, req: &CompletionRequest) -> Result<CompletionResponse> {
        let start_time = Instant::now();

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.iam_token)
            .json(req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CopywriterError::Backend(format!(
                        "YandexGPT request timed out after {} ms",
                        start_time.elapsed().as_millis()
                    ))
                } else {
                    CopywriterError::Backend(format!("Failed to send request to YandexGPT: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(CopywriterError::Backend(format!(
                "YandexGPT returned {status}: {body}"
            )));
        }

        let body = response.bytes().await.map_err(|e| {
            CopywriterError::Backend(format!("Failed to read YandexGPT response body: {e}"))
        })?;

        tracing::debug!(
            status = %status,
            bytes = body.len(),
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "YandexGPT response received"
        );

        serde_json::from_slice(&body).map_err(|e| {
            CopywriterError::MalformedResponse(format!(
                "Failed to parse YandexGPT response: {e}. Raw: {}",
                String::from_utf8_lossy(&body)
            ))
        })
    }
}
