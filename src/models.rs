use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable chat user identifier, as assigned by the chat platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a user in the two-step collection protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial and post-completion stage: the next text is the product name
    #[default]
    AwaitingName,
    /// Product name collected: the next text is the product details
    AwaitingInfo,
}

/// Per-user conversation record owned by the session store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: UserId,
    pub stage: Stage,
    pub product_name: Option<String>,
    pub product_info: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            stage: Stage::AwaitingName,
            product_name: None,
            product_info: None,
            updated_at: Utc::now(),
        }
    }

    /// Back to `AwaitingName` with both collected fields dropped
    pub fn reset(&mut self) {
        self.stage = Stage::AwaitingName;
        self.product_name = None;
        self.product_info = None;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

// YandexGPT message roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

// YandexGPT chat message format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionOptions {
    pub stream: bool,
    pub temperature: f64,
    pub max_tokens: u32,
}

// YandexGPT completion request format
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model_uri: String,
    pub completion_options: CompletionOptions,
    pub messages: Vec<ChatMessage>,
}

// YandexGPT completion response format. Every level is optional so that a
// structurally incomplete body decodes and is rejected by `first_text`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct CompletionResponse {
    #[serde(default)]
    pub result: Option<CompletionResult>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct CompletionResult {
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Alternative {
    #[serde(default)]
    pub message: Option<AlternativeMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AlternativeMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub text: Option<String>,
}

/// Token accounting; YandexGPT reports the counts as decimal strings
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    #[serde(default)]
    pub input_text_tokens: Option<String>,
    #[serde(default)]
    pub completion_tokens: Option<String>,
    #[serde(default)]
    pub total_tokens: Option<String>,
}

impl CompletionResponse {
    /// Text of the first alternative, if the response carries one
    pub fn first_text(&self) -> Option<&str> {
        self.result
            .as_ref()?
            .alternatives
            .first()?
            .message
            .as_ref()?
            .text
            .as_deref()
    }

    pub fn total_tokens(&self) -> Option<&str> {
        self.result.as_ref()?.usage.as_ref()?.total_tokens.as_deref()
    }
}
