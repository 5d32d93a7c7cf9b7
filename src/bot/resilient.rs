//! Telegram API calls wrapped in [`crate::utils::retry_telegram_operation`].
//!
//! Transient network failures are retried with exponential backoff and
//! jitter. Edits that Telegram reports as no-ops are treated as success.

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, Message, MessageId, ParseMode};
use tracing::debug;

/// Telegram hard limit for message text
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

const ERROR_NOT_MODIFIED: &str = "message is not modified";

/// Send a message, retrying on network failures.
///
/// # Errors
///
/// Returns the last Telegram error once all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<Message> {
    let text = crate::utils::truncate_str(text.into(), TELEGRAM_MESSAGE_LIMIT);
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

/// Edit a message, retrying on network failures.
///
/// A "message is not modified" answer counts as success.
///
/// # Errors
///
/// Returns the last Telegram error once all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: impl Into<String>,
    parse_mode: Option<ParseMode>,
) -> Result<()> {
    let text = crate::utils::truncate_str(text.into(), TELEGRAM_MESSAGE_LIMIT);
    let result = crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.edit_message_text(chat_id, msg_id, text.clone());
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
    })
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) if is_not_modified(&e.to_string()) => {
            debug!("Message update skipped: {e}");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Delete a message, retrying on network failures.
///
/// # Errors
///
/// Returns the last Telegram error once all retries are exhausted.
pub async fn delete_message_resilient(bot: &Bot, chat_id: ChatId, msg_id: MessageId) -> Result<()> {
    crate::utils::retry_telegram_operation(|| async {
        bot.delete_message(chat_id, msg_id)
            .await
            .map(|_| ())
            .map_err(|e| anyhow::anyhow!("Telegram delete error: {e}"))
    })
    .await
}

fn is_not_modified(err_msg: &str) -> bool {
    err_msg.contains(ERROR_NOT_MODIFIED)
}
