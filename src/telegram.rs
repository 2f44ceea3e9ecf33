use async_trait::async_trait;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use teloxide::utils::command::BotCommands;

use crate::dialogue::{DialogueController, Messenger};
use crate::error::{CopywriterError, Result};
use crate::models::UserId;

/// Telegram's hard limit on a single text message, in characters
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Доступные команды:")]
pub enum Command {
    #[command(description = "начать заново")]
    Start,
}

/// Sends replies into the user's private chat
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_text(&self, user_id: UserId, text: &str) -> Result<()> {
        let chat_id = ChatId(user_id.0 as i64);
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.bot
                .send_message(chat_id, chunk)
                .await
                .map_err(|e| CopywriterError::Chat(format!("send_message to {user_id}: {e}")))?;
        }
        Ok(())
    }
}

/// Split `text` into pieces of at most `limit` characters, preferring line breaks
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        // Byte offset just past the `limit`-th character, or the end
        let hard_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if hard_end == rest.len() {
            chunks.push(rest.to_string());
            break;
        }
        let cut = match rest[..hard_end].rfind('\n') {
            Some(nl) if nl > 0 => nl + 1,
            _ => hard_end,
        };
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }
    chunks
}

/// Run the long-polling dispatcher until Ctrl-C
pub async fn run(bot: Bot, controller: Arc<DialogueController>) {
    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        tracing::warn!("Failed to register bot commands: {}", e);
    }

    let handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(on_command),
        )
        .branch(dptree::endpoint(on_message));

    tracing::info!("Bot started, polling for updates");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![controller])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    tracing::info!("Dispatcher stopped");
}

async fn on_command(
    msg: Message,
    cmd: Command,
    controller: Arc<DialogueController>,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    match cmd {
        Command::Start => controller.handle_start(UserId(user.id.0)).await,
    }
    Ok(())
}

async fn on_message(msg: Message, controller: Arc<DialogueController>) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    match msg.text() {
        // Unrecognised commands are not product text
        Some(text) if text.starts_with('/') => {
            tracing::debug!(user_id = user.id.0, "Ignoring unknown command");
        }
        Some(text) => controller.handle_text(UserId(user.id.0), text).await,
        None => {
            tracing::debug!(user_id = user.id.0, "Ignoring non-text message");
        }
    }
    Ok(())
}
