//! Best-effort recording of generation inputs and outputs for offline analysis.
//!
//! Nothing here may influence the outcome of a generation: `record` never
//! blocks and never returns an error.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const INGESTION_PATH: &str = "/api/public/ingestion";
const INGESTION_TIMEOUT: Duration = Duration::from_secs(10);

tokio::task_local! {
    static CURRENT_SPAN: SpanContext;
}

/// Identity of the enclosing observation while its work is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanContext {
    pub trace_id: Uuid,
    pub observation_id: Uuid,
}

/// One finished operation: what went in, what came out
#[derive(Debug, Clone)]
pub struct Observation {
    pub id: Uuid,
    pub trace_id: Uuid,
    /// Enclosing observation, when started inside [`Observation::within`]
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub input: Value,
    pub output: Option<Value>,
    pub error: Option<String>,
}

impl Observation {
    /// Open an observation; finish it with [`Observation::succeed`] or [`Observation::fail`].
    ///
    /// Started inside another observation's [`Observation::within`], it joins that trace
    /// as a child; otherwise it opens a new trace.
    pub fn start(name: impl Into<String>, input: Value) -> Self {
        let now = Utc::now();
        let parent = CURRENT_SPAN.try_with(|ctx| *ctx).ok();
        Self {
            id: Uuid::new_v4(),
            trace_id: parent.map(|p| p.trace_id).unwrap_or_else(Uuid::new_v4),
            parent_id: parent.map(|p| p.observation_id),
            name: name.into(),
            start_time: now,
            end_time: now,
            input,
            output: None,
            error: None,
        }
    }

    pub fn context(&self) -> SpanContext {
        SpanContext {
            trace_id: self.trace_id,
            observation_id: self.id,
        }
    }

    /// Run `fut` with this observation as the parent of any observation started inside it
    pub async fn within<F: Future>(&self, fut: F) -> F::Output {
        CURRENT_SPAN.scope(self.context(), fut).await
    }

    pub fn succeed(mut self, output: Value) -> Self {
        self.end_time = Utc::now();
        self.output = Some(output);
        self
    }

    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.end_time = Utc::now();
        self.error = Some(error.into());
        self
    }

    /// Langfuse ingestion batch: the span carrying the payloads, preceded by a
    /// trace-create when this observation is the root of its trace
    pub fn to_ingestion_batch(&self) -> Value {
        let ts = |t: &DateTime<Utc>| t.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut span = json!({
            "id": self.id,
            "traceId": self.trace_id,
            "name": self.name,
            "startTime": ts(&self.start_time),
            "endTime": ts(&self.end_time),
            "input": self.input,
            "level": if self.error.is_some() { "ERROR" } else { "DEFAULT" },
        });
        if let Some(parent_id) = self.parent_id {
            span["parentObservationId"] = json!(parent_id);
        }
        if let Some(output) = &self.output {
            span["output"] = output.clone();
        }
        if let Some(error) = &self.error {
            span["statusMessage"] = Value::String(error.clone());
        }

        let mut batch = Vec::with_capacity(2);
        if self.parent_id.is_none() {
            batch.push(json!({
                "id": Uuid::new_v4(),
                "timestamp": ts(&self.start_time),
                "type": "trace-create",
                "body": {
                    "id": self.trace_id,
                    "name": self.name,
                    "timestamp": ts(&self.start_time),
                    "input": self.input,
                    "output": self.output,
                }
            }));
        }
        batch.push(json!({
            "id": Uuid::new_v4(),
            "timestamp": ts(&self.end_time),
            "type": "span-create",
            "body": span,
        }));
        json!({ "batch": batch })
    }
}

pub trait Observer: Send + Sync {
    fn record(&self, observation: Observation);
}

/// Discards everything; used when tracing is disabled
pub struct NoopObserver;

impl Observer for NoopObserver {
    fn record(&self, _observation: Observation) {}
}

/// Ships observations to a Langfuse project via its public ingestion API
pub struct LangfuseObserver {
    client: Client,
    url: String,
    public_key: String,
    secret_key: String,
}

impl LangfuseObserver {
    pub fn new(host: &str, public_key: String, secret_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(INGESTION_TIMEOUT)
                .build()
                .unwrap_or_default(),
            url: format!("{}{INGESTION_PATH}", host.trim_end_matches('/')),
            public_key,
            secret_key,
        }
    }
}

impl Observer for LangfuseObserver {
    fn record(&self, observation: Observation) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(name = %observation.name, "No tokio runtime, dropping observation");
            return;
        };

        let request = self
            .client
            .post(&self.url)
            .basic_auth(&self.public_key, Some(&self.secret_key))
            .json(&observation.to_ingestion_batch());
        let name = observation.name;

        runtime.spawn(async move {
            match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    tracing::debug!(%name, "Observation ingested");
                }
                Ok(resp) => {
                    tracing::warn!(%name, status = %resp.status(), "Langfuse rejected observation");
                }
                Err(e) => {
                    tracing::warn!(%name, "Failed to send observation to Langfuse: {}", e);
                }
            }
        });
    }
}

/// Keeps observations in memory; handy for tests and local inspection
#[derive(Default, Clone)]
pub struct MemoryObserver {
    recorded: Arc<Mutex<Vec<Observation>>>,
}

impl MemoryObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Observation> {
        match self.recorded.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Observer for MemoryObserver {
    fn record(&self, observation: Observation) {
        match self.recorded.lock() {
            Ok(mut guard) => guard.push(observation),
            Err(poisoned) => poisoned.into_inner().push(observation),
        }
    }
}
