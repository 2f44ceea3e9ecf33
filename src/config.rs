use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{CopywriterError, Result};

pub const DEFAULT_LANGFUSE_HOST: &str = "https://cloud.langfuse.com";

/// Main configuration structure for the copywriter bot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub backend: BackendConfig,
    pub langfuse: LangfuseConfig,
    pub session: SessionConfig,
    pub health: HealthConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub token: String,
}

/// YandexGPT completion endpoint and credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub endpoint: String,
    pub iam_token: String,
    /// e.g. `gpt://<folder-id>/yandexgpt/latest`
    pub model_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LangfuseConfig {
    pub enabled: bool,
    pub host: String,
    pub public_key: String,
    pub secret_key: String,
}

impl Default for LangfuseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_LANGFUSE_HOST.to_string(),
            public_key: String::new(),
            secret_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions idle longer than this are dropped; unset keeps them for the process lifetime
    pub idle_ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: None,
            sweep_interval_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// `host:port` for the health endpoint; unset disables it
    pub bind: Option<String>,
}

impl Config {
    /// Load configuration from `.env`, an optional YAML file and the environment.
    ///
    /// Missing credentials are fatal: the bot cannot do anything useful without them.
    pub fn load() -> Result<Self> {
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("BOT_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            let contents = fs::read_to_string(&config_path)?;
            let config = Self::from_yaml(&contents).map_err(|e| {
                CopywriterError::Config(format!("Failed to parse config file {config_path}: {e}"))
            })?;
            tracing::info!("Loaded configuration from {}", config_path);
            config
        } else {
            tracing::debug!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Apply overrides from `lookup`, normally the process environment
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_TOKEN") {
            self.telegram.token = token;
        }

        if let Some(endpoint) = lookup("ENDPOINT") {
            self.backend.endpoint = endpoint;
        }
        if let Some(iam_token) = lookup("IAM_TOKEN") {
            self.backend.iam_token = iam_token;
        }
        if let Some(model_uri) = lookup("MODEL_URI") {
            self.backend.model_uri = model_uri;
        }

        if let Some(enabled) = lookup("LANGFUSE_ENABLED") {
            match enabled.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.langfuse.enabled = true,
                "0" | "false" | "no" | "off" => self.langfuse.enabled = false,
                other => tracing::warn!("Ignoring invalid LANGFUSE_ENABLED value: {}", other),
            }
        }
        if let Some(host) = lookup("LANGFUSE_HOST") {
            self.langfuse.host = host;
        }
        if let Some(public_key) = lookup("LANGFUSE_PUBLIC_KEY") {
            self.langfuse.public_key = public_key;
        }
        if let Some(secret_key) = lookup("LANGFUSE_SECRET_KEY") {
            self.langfuse.secret_key = secret_key;
        }

        if let Some(ttl) = lookup("BOT_SESSION_IDLE_TTL_SECS") {
            if let Ok(secs) = ttl.parse() {
                self.session.idle_ttl_secs = Some(secs);
            }
        }
        if let Some(interval) = lookup("BOT_SESSION_SWEEP_SECS") {
            if let Ok(secs) = interval.parse() {
                self.session.sweep_interval_secs = secs;
            }
        }

        if let Some(bind) = lookup("BOT_HEALTH_BIND") {
            self.health.bind = Some(bind);
        }
    }

    /// Every missing required value is reported at once
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        for (name, value) in [
            ("TELEGRAM_TOKEN", &self.telegram.token),
            ("IAM_TOKEN", &self.backend.iam_token),
            ("MODEL_URI", &self.backend.model_uri),
            ("ENDPOINT", &self.backend.endpoint),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        if self.langfuse.enabled {
            if self.langfuse.public_key.trim().is_empty() {
                missing.push("LANGFUSE_PUBLIC_KEY");
            }
            if self.langfuse.secret_key.trim().is_empty() {
                missing.push("LANGFUSE_SECRET_KEY");
            }
        }
        if !missing.is_empty() {
            return Err(CopywriterError::Config(format!(
                "Missing required configuration: {}",
                missing.join(", ")
            )));
        }

        if self.session.sweep_interval_secs == 0 {
            return Err(CopywriterError::Config(
                "session.sweep_interval_secs cannot be 0".to_string(),
            ));
        }
        self.health_bind()?;
        Ok(())
    }

    pub fn health_bind(&self) -> Result<Option<SocketAddr>> {
        self.health
            .bind
            .as_deref()
            .map(|b| {
                b.parse().map_err(|e| {
                    CopywriterError::Config(format!("Invalid health.bind '{b}' (expected host:port): {e}"))
                })
            })
            .transpose()
    }

    pub fn session_idle_ttl(&self) -> Option<Duration> {
        self.session.idle_ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_secs)
    }
}
