use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

use crate::copywriter::Generator;
use crate::error::{CopywriterError, Result};
use crate::models::{Stage, UserId};
use crate::observe::{Observation, Observer};
use crate::session::SessionStore;

pub const GREETING: &str = "👋 Привет! Я бот-помощник, создающий продающие описания товаров. Для генерации описания отправь мне первым сообщением название товара.";
pub const ASK_FOR_INFO: &str =
    "Отлично! Теперь отправь характеристики товара (описание, размеры, особенности и т.д.).";
pub const WORKING: &str = "⏳ Генерирую описание товара...";
pub const GENERATION_FAILED: &str = "Ошибка при обработке запроса. Попробуйте позже.";
pub const RESTART_PROMPT: &str = "Пожалуйста, отправь название товара, чтобы начать.";

/// Outbound side of the chat transport
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()>;
}

/// What the current message means for the user's session
enum Step {
    NameReceived,
    InfoReceived { name: String, info: String },
    Inconsistent,
}

/// Drives each user through name -> details -> generate-and-reply -> reset
pub struct DialogueController {
    sessions: Arc<SessionStore>,
    generator: Arc<dyn Generator>,
    messenger: Arc<dyn Messenger>,
    observer: Arc<dyn Observer>,
}

impl DialogueController {
    pub fn new(
        sessions: Arc<SessionStore>,
        generator: Arc<dyn Generator>,
        messenger: Arc<dyn Messenger>,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            sessions,
            generator,
            messenger,
            observer,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    /// Start command: always back to the first step, whatever came before
    pub async fn handle_start(&self, user_id: UserId) {
        self.sessions.reset(user_id).await;
        tracing::debug!(%user_id, "Session started");
        self.reply(user_id, GREETING).await;
    }

    pub async fn handle_text(&self, user_id: UserId, text: &str) {
        let step = self
            .sessions
            .update(user_id, |session| match session.stage {
                Stage::AwaitingName => {
                    session.product_name = Some(text.to_string());
                    session.product_info = None;
                    session.stage = Stage::AwaitingInfo;
                    Step::NameReceived
                }
                Stage::AwaitingInfo => match session.product_name.clone() {
                    Some(name) => {
                        session.product_info = Some(text.to_string());
                        Step::InfoReceived {
                            name,
                            info: text.to_string(),
                        }
                    }
                    None => Step::Inconsistent,
                },
            })
            .await;

        match step {
            Step::NameReceived => {
                tracing::debug!(%user_id, "Product name received, awaiting details");
                self.reply(user_id, ASK_FOR_INFO).await;
            }
            Step::InfoReceived { name, info } => {
                self.reply(user_id, WORKING).await;
                let reply = match self.describe(user_id, &name, &info).await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(%user_id, "Failed to generate product description: {}", e);
                        GENERATION_FAILED.to_string()
                    }
                };
                self.sessions.reset(user_id).await;
                self.reply(user_id, &reply).await;
            }
            Step::Inconsistent => {
                let e = CopywriterError::UnknownState(format!(
                    "user {user_id} awaiting details without a product name"
                ));
                tracing::warn!(%user_id, "{}, resetting session", e);
                self.sessions.reset(user_id).await;
                self.reply(user_id, RESTART_PROMPT).await;
            }
        }
    }

    /// One generation attempt, traced as the parent of the backend call
    async fn describe(&self, user_id: UserId, name: &str, info: &str) -> Result<String> {
        tracing::info!(%user_id, "Generating product description");
        let observation = Observation::start("yandex_bot_call", json!({ "user_text": info }));

        let outcome = observation
            .within(self.generator.generate(name, info))
            .await
            .and_then(|text| {
                if text.trim().is_empty() {
                    Err(CopywriterError::MalformedResponse(
                        "YandexGPT returned an empty description".to_string(),
                    ))
                } else {
                    Ok(text)
                }
            });

        match &outcome {
            Ok(text) => self
                .observer
                .record(observation.succeed(json!({ "response": text }))),
            Err(e) => self.observer.record(observation.fail(e.to_string())),
        }
        outcome
    }

    /// Delivery failures are logged and swallowed; there is nobody to report them to
    async fn reply(&self, user_id: UserId, text: &str) {
        if let Err(e) = self.messenger.send_text(user_id, text).await {
            tracing::warn!(%user_id, "Failed to send reply: {}", e);
        }
    }
}
