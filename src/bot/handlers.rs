use crate::bot::resilient::send_message_resilient;
use crate::bot::transport::TelegramChat;
use crate::download::{DownloadRequest, DownloadWorkflow};
use crate::router::{Intent, IntentRouter};
use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{info, warn};

/// Sender id, `0` when the message has no sender
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

/// Route one text message and act on the resulting intent.
///
/// Download requests run on their own task so the chat stays responsive
/// while the file is fetched.
///
/// # Errors
///
/// Returns an error if the reply cannot be delivered.
pub async fn handle_text(
    bot: Bot,
    msg: Message,
    router: Arc<IntentRouter>,
    workflow: Arc<DownloadWorkflow>,
) -> Result<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let user_id = get_user_id_safe(&msg);
    let intent = router.route(user_id, text).await;

    match intent {
        Intent::Download { url } => {
            let request = DownloadRequest {
                url,
                chat_id: msg.chat.id.0,
                user_id,
            };
            let chat = TelegramChat::new(bot, msg.chat.id);
            tokio::spawn(async move {
                let result = workflow.run(&request, &chat).await;
                info!(
                    user_id = request.user_id,
                    url = %request.url,
                    success = result.is_success(),
                    "Download finished"
                );
            });
        }
        other => {
            if matches!(other, Intent::CodeRejected | Intent::AuthRequired) {
                warn!(user_id, intent = other.label(), "Access denied");
            }
            if let Some(reply) = other.reply_text() {
                send_message_resilient(&bot, msg.chat.id, reply, None).await?;
            }
        }
    }

    Ok(())
}
