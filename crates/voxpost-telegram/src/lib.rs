// SPDX-FileCopyrightText: 2026 Voxpost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram messenger adapter for Voxpost.
//!
//! Implements [`MessengerAdapter`] for the Telegram Bot API via teloxide:
//! long polling, update decoding, inline keyboards, entity-formatted
//! sends and voice downloads.

pub mod handler;
pub mod markdown;
pub mod render;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{ChatId, FileId};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use voxpost_config::model::TelegramConfig;
use voxpost_core::{
    AdapterType, HealthStatus, InboundEvent, MessageId, MessengerAdapter, OutboundMessage,
    PluginAdapter, VoxpostError,
};
use voxpost_session::SessionEngine;

pub use markdown::MarkdownFormatter;

/// Telegram messenger implementing [`MessengerAdapter`].
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    /// Requires `config.bot_token` to be set.
    pub fn new(config: &TelegramConfig) -> Result<Self, VoxpostError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            VoxpostError::Config("telegram.bot_token is required for the Telegram adapter".into())
        })?;

        if token.is_empty() {
            return Err(VoxpostError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }

        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    /// Long-polls for updates and feeds them to `engine` until `cancel`
    /// fires.
    ///
    /// Updates from one chat are handled in order. Generation requests are
    /// spawned so the chat can still be served while they run.
    pub async fn run(&self, engine: Arc<SessionEngine>, cancel: CancellationToken) {
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(on_message))
            .branch(Update::filter_callback_query().endpoint(on_callback));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![engine])
            .default_handler(|_| async {}) // Silently ignore other update kinds
            .build();

        let shutdown = dispatcher.shutdown_token();
        tokio::spawn(async move {
            cancel.cancelled().await;
            // The dispatcher refuses to stop before it has started polling.
            for _ in 0..50 {
                match shutdown.shutdown() {
                    Ok(done) => {
                        done.await;
                        return;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
            warn!("telegram dispatcher did not acknowledge shutdown");
        });

        info!("starting Telegram long polling");
        dispatcher.dispatch().await;
        info!("Telegram long polling stopped");
    }
}

async fn on_message(msg: Message, engine: Arc<SessionEngine>) -> ResponseResult<()> {
    if let Some(event) = handler::decode_message(&msg) {
        forward(&engine, event).await;
    }
    respond(())
}

async fn on_callback(
    bot: Bot,
    query: CallbackQuery,
    engine: Arc<SessionEngine>,
) -> ResponseResult<()> {
    // Stops the button's loading spinner on the client.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        debug!(error = %e, "failed to answer callback query");
    }
    if let Some(event) = handler::decode_callback(&query) {
        forward(&engine, event).await;
    }
    respond(())
}

async fn forward(engine: &Arc<SessionEngine>, event: InboundEvent) {
    if handler::runs_long(&event.kind) {
        let engine = engine.clone();
        tokio::spawn(async move { engine.dispatch(event).await });
    } else {
        engine.dispatch(event).await;
    }
}

fn channel_error(context: &str, e: impl std::error::Error + Send + Sync + 'static) -> VoxpostError {
    VoxpostError::Channel {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl PluginAdapter for TelegramMessenger {
    fn name(&self) -> &str {
        "telegram"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Messenger
    }

    async fn health_check(&self) -> Result<HealthStatus, VoxpostError> {
        // Check if the bot token is valid by calling getMe.
        match self.bot.get_me().await {
            Ok(_) => Ok(HealthStatus::Healthy),
            Err(e) => Ok(HealthStatus::Unhealthy(format!(
                "Telegram bot unreachable: {e}"
            ))),
        }
    }

    async fn shutdown(&self) -> Result<(), VoxpostError> {
        debug!("Telegram messenger shutting down");
        Ok(())
    }
}

#[async_trait]
impl MessengerAdapter for TelegramMessenger {
    async fn send(&self, msg: OutboundMessage) -> Result<MessageId, VoxpostError> {
        let chat_id = ChatId(msg.user_id.0);
        let parts = render::split_message(&msg.text, &msg.entities, render::MAX_MESSAGE_LEN);
        let last = parts.len().saturating_sub(1);

        let mut sent_id = None;
        for (i, part) in parts.into_iter().enumerate() {
            let mut request = self.bot.send_message(chat_id, part.text);
            if !part.entities.is_empty() {
                request = request.entities(render::to_entities(&part.entities));
            }
            // Buttons go under the final part.
            if i == last
                && let Some(keyboard) = &msg.keyboard
            {
                request = request.reply_markup(render::to_markup(keyboard));
            }
            let sent = request
                .await
                .map_err(|e| channel_error("failed to send message", e))?;
            sent_id = Some(sent.id.0);
        }

        let id = sent_id.ok_or_else(|| VoxpostError::channel("refusing to send an empty message"))?;
        Ok(MessageId(id.to_string()))
    }

    async fn download_voice(&self, file_handle: &str, dest: &Path) -> Result<(), VoxpostError> {
        let file = self
            .bot
            .get_file(FileId(file_handle.to_string()))
            .await
            .map_err(|e| channel_error("failed to get file info", e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| channel_error("failed to create media dir", e))?;
        }
        let mut out = tokio::fs::File::create(dest)
            .await
            .map_err(|e| channel_error("failed to create media file", e))?;
        self.bot
            .download_file(&file.path, &mut out)
            .await
            .map_err(|e| channel_error("failed to download file", e))?;
        out.flush()
            .await
            .map_err(|e| channel_error("failed to write media file", e))?;

        debug!(
            file_handle,
            path = %dest.display(),
            "downloaded voice from Telegram"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_a_config_error() {
        let err = TelegramMessenger::new(&TelegramConfig::default())
            .err()
            .expect("should fail");
        assert!(matches!(err, VoxpostError::Config(_)));

        let empty = TelegramConfig {
            bot_token: Some(String::new()),
        };
        assert!(TelegramMessenger::new(&empty).is_err());
    }

    #[test]
    fn identifies_as_messenger() {
        let config = TelegramConfig {
            bot_token: Some("123:test-token".into()),
        };
        let messenger = TelegramMessenger::new(&config).unwrap();
        assert_eq!(messenger.name(), "telegram");
        assert_eq!(messenger.adapter_type(), AdapterType::Messenger);
    }
}
