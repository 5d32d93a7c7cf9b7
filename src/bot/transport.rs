use crate::bot::resilient::{
    delete_message_resilient, edit_message_resilient, send_message_resilient,
};
use crate::download::{ChatTransport, StatusId};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, MessageId, ParseMode};
use tracing::{info, warn};

/// [`ChatTransport`] bound to one Telegram chat.
#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramChat {
    /// Create a transport for `chat_id`
    pub const fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl ChatTransport for TelegramChat {
    async fn send_status(&self, text: &str) -> Result<StatusId> {
        let msg =
            send_message_resilient(&self.bot, self.chat_id, text, Some(ParseMode::Html)).await?;
        Ok(StatusId(msg.id.0))
    }

    async fn edit_status(&self, id: StatusId, text: &str) -> Result<()> {
        edit_message_resilient(
            &self.bot,
            self.chat_id,
            MessageId(id.0),
            text,
            Some(ParseMode::Html),
        )
        .await
    }

    async fn delete_status(&self, id: StatusId) -> Result<()> {
        delete_message_resilient(&self.bot, self.chat_id, MessageId(id.0)).await
    }

    async fn upload_video(&self, path: &Path, caption: &str) -> Result<()> {
        send_video_smart(&self.bot, self.chat_id, path, caption).await
    }
}

/// Upload as a streamable video, falling back to a plain document.
///
/// Not retried.
async fn send_video_smart(bot: &Bot, chat_id: ChatId, path: &Path, caption: &str) -> Result<()> {
    info!(path = %path.display(), "Uploading video");

    match bot
        .send_video(chat_id, InputFile::file(path.to_path_buf()))
        .caption(caption)
        .supports_streaming(true)
        .await
    {
        Ok(_) => Ok(()),
        Err(e) => {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to send video as native media; falling back to document"
            );
            bot.send_document(chat_id, InputFile::file(path.to_path_buf()))
                .caption(caption)
                .await
                .map(|_| ())
                .map_err(|e| anyhow::anyhow!("Telegram upload error: {e}"))
        }
    }
}
