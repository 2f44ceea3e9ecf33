use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

#[cfg(test)]
use mockall::automock;

use crate::error::{CopywriterError, Result};
use crate::observe::{Observation, Observer};
use crate::prompt::build_request;
use crate::transport::Transport;

/// Turns a collected (name, details) pair into a sales description
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, product_name: &str, product_info: &str) -> Result<String>;
}

pub struct YandexCopywriter {
    tx: Arc<dyn Transport>,
    observer: Arc<dyn Observer>,
    model_uri: String,
}

impl YandexCopywriter {
    pub fn new(tx: Arc<dyn Transport>, observer: Arc<dyn Observer>, model_uri: String) -> Self {
        Self {
            tx,
            observer,
            model_uri,
        }
    }
}

#[async_trait]
impl Generator for YandexCopywriter {
    async fn generate(&self, product_name: &str, product_info: &str) -> Result<String> {
        let request = build_request(&self.model_uri, product_name, product_info);
        let observation = Observation::start("yandex_call", json!({ "payload": request }));
        let started = Instant::now();

        let outcome = self.tx.complete(&request).await;

        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.observer.record(observation.fail(e.to_string()));
                return Err(e);
            }
        };

        self.observer
            .record(observation.succeed(json!({ "response": response })));

        match response.first_text() {
            Some(text) => {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    chars = text.chars().count(),
                    total_tokens = response.total_tokens().unwrap_or("?"),
                    "Product description generated"
                );
                Ok(text.to_string())
            }
            None => Err(CopywriterError::MalformedResponse(
                "YandexGPT response has no result.alternatives[0].message.text".to_string(),
            )),
        }
    }
}
