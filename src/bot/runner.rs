use crate::auth::{AuthGate, InMemorySessionStore};
use crate::bot::handlers::handle_text;
use crate::config::{Settings, TELEGRAM_CONNECT_TIMEOUT_SECS};
use crate::download::{DownloadWorkflow, WorkflowConfig, YtDlpExtractor};
use crate::proxy::{ProxySource, ProxySupplier};
use crate::router::IntentRouter;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::BotCommand;
use tracing::{error, info, warn};

/// Build a bot whose HTTP client tolerates long uploads.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built or the custom API URL
/// is malformed.
pub fn build_bot(settings: &Settings) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(Duration::from_secs(settings.upload_timeout_secs))
        .connect_timeout(Duration::from_secs(TELEGRAM_CONNECT_TIMEOUT_SECS))
        .build()
        .context("failed to build Telegram HTTP client")?;

    let mut bot = Bot::with_client(settings.bot_token.clone(), client);
    if let Some(api_url) = &settings.telegram_api_url {
        let url = reqwest::Url::parse(api_url)
            .with_context(|| format!("invalid TELEGRAM_API_URL: {api_url}"))?;
        info!(api_url = %url, "Using custom Telegram Bot API server");
        bot = bot.set_api_url(url);
    }
    Ok(bot)
}

/// Assemble the download workflow from settings
#[must_use]
pub fn build_workflow(settings: &Settings) -> DownloadWorkflow {
    let extractor = Arc::new(YtDlpExtractor::new(settings.ytdlp_bin.clone()));
    let proxies = settings.proxy_endpoint().map(|endpoint| {
        info!(endpoint, "Proxy rotation enabled");
        Arc::new(ProxySupplier::new(endpoint)) as Arc<dyn ProxySource>
    });
    DownloadWorkflow::new(extractor, proxies, WorkflowConfig::from_settings(settings))
}

/// Start long polling and block until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the bot cannot be constructed.
pub async fn run_bot(settings: Arc<Settings>) -> Result<()> {
    let bot = build_bot(&settings)?;

    let gate = AuthGate::new(
        Arc::new(InMemorySessionStore::new()),
        settings.secret_code.clone(),
    );
    let router = Arc::new(IntentRouter::new(gate));
    let workflow = Arc::new(build_workflow(&settings));

    register_commands(&bot).await;

    info!("Bot is running...");

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![router, workflow, settings])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Bot stopped");
    Ok(())
}

/// Update routing tree: every text message goes through the intent router
#[must_use]
pub fn schema() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some())
        .endpoint(handle_text_endpoint)
}

async fn handle_text_endpoint(
    bot: Bot,
    msg: Message,
    router: Arc<IntentRouter>,
    workflow: Arc<DownloadWorkflow>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_text(bot, msg, router, workflow).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn register_commands(bot: &Bot) {
    let commands = [
        BotCommand::new("start", "Start the bot"),
        BotCommand::new("help", "How to use the bot"),
    ];
    if let Err(e) = bot.set_my_commands(commands).await {
        warn!(error = %e, "Failed to register bot commands");
    }
}
