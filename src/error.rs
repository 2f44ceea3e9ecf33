use thiserror::Error;

/// Errors produced by the copywriter bot library
#[derive(Debug, Error)]
pub enum CopywriterError {
    /// Transport failure, non-success status or timeout talking to the generation backend
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend answered with success but without `result.alternatives[0].message.text`
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// Session stage inconsistent with the collected fields
    #[error("Unknown session state: {0}")]
    UnknownState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound chat message could not be delivered
    #[error("Chat transport error: {0}")]
    Chat(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CopywriterError {
    /// True for failures of a generation attempt, which the user sees as one fixed message
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::MalformedResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, CopywriterError>;
