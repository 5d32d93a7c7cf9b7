//! Configuration and settings management
//!
//! Loads settings from environment variables (and optional config files)
//! and defines the download policy constants.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(alias = "telegram_token")]
    pub bot_token: String,

    /// Shared secret users must send after `/start`
    #[serde(default = "default_secret_code")]
    pub secret_code: String,

    /// Scratch directory for extractor output
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Path or name of the yt-dlp binary
    #[serde(default = "default_ytdlp_bin")]
    pub ytdlp_bin: String,

    /// Whether downloads should go through a random public proxy
    #[serde(default = "default_use_proxy")]
    pub use_proxy: bool,

    /// Plain-text proxy list endpoint
    #[serde(default = "default_proxy_list_url")]
    pub proxy_list_url: String,

    /// Custom Bot API server (a local server lifts the 50 MB upload cap)
    pub telegram_api_url: Option<String>,

    /// HTTP client timeout for Telegram requests, including uploads
    #[serde(default = "default_upload_timeout_secs")]
    pub upload_timeout_secs: u64,
}

fn default_secret_code() -> String {
    DEFAULT_SECRET_CODE.to_string()
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_ytdlp_bin() -> String {
    "yt-dlp".to_string()
}

const fn default_use_proxy() -> bool {
    true
}

fn default_proxy_list_url() -> String {
    DEFAULT_PROXY_LIST_URL.to_string()
}

const fn default_upload_timeout_secs() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_SECS
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tube_courier::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let settings: Self = build_config()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Message(
                "BOT_TOKEN is not set".to_string(),
            ));
        }
        if self.secret_code.is_empty() {
            return Err(ConfigError::Message(
                "SECRET_CODE must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the configured proxy list endpoint when proxies are enabled
    #[must_use]
    pub fn proxy_endpoint(&self) -> Option<&str> {
        if self.use_proxy && !self.proxy_list_url.trim().is_empty() {
            Some(self.proxy_list_url.as_str())
        } else {
            None
        }
    }
}

/// Build the layered configuration source.
///
/// # Errors
///
/// Returns a `ConfigError` if any source fails to load.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Local overrides, not checked into git
        .add_source(File::with_name("config/local").required(false))
        // Eg.. `APP__SECRET_CODE=xyz` sets `secret_code`
        .add_source(Environment::with_prefix("APP").separator("__"))
        // Plain UPPER_SNAKE_CASE variables; empty values count as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Secret code used when `SECRET_CODE` is not configured
pub const DEFAULT_SECRET_CODE: &str = "open-sesame";

/// Public proxy list returning one `scheme://host:port` per line
pub const DEFAULT_PROXY_LIST_URL: &str =
    "https://cdn.jsdelivr.net/gh/proxifly/free-proxy-list@main/proxies/protocols/http/data.txt";

/// Client-side timeout for the proxy list request
pub const PROXY_FETCH_TIMEOUT_SECS: u64 = 10;

// Download policy
/// Artifacts smaller than this are treated as empty
pub const MIN_ARTIFACT_BYTES: u64 = 1024;
/// Largest artifact the bot will try to upload (2000 MiB)
pub const MAX_ARTIFACT_BYTES: u64 = 2000 * 1024 * 1024;
/// Extractor retry count for whole requests
pub const EXTRACTOR_RETRIES: u32 = 10;
/// Extractor retry count for individual fragments
pub const EXTRACTOR_FRAGMENT_RETRIES: u32 = 10;
/// Extractor socket timeout in seconds
pub const EXTRACTOR_SOCKET_TIMEOUT_SECS: u64 = 30;
/// Format selector: best video + best audio, falling back to best single file
pub const EXTRACTOR_FORMAT: &str = "bestvideo*+bestaudio/best";
/// User agent sent by the extractor
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

// Telegram
/// Default Telegram HTTP timeout (30 minutes, sized for 2 GB uploads)
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 1800;
/// Connect timeout for the Telegram HTTP client
pub const TELEGRAM_CONNECT_TIMEOUT_SECS: u64 = 30;
/// Initial backoff for retried Telegram API calls
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Maximum backoff for retried Telegram API calls
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Attempts for retried Telegram API calls
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;
/// Telegram caption limit in characters
pub const CAPTION_LIMIT: usize = 1024;
/// Maximum length of an error shown to the user
pub const USER_ERROR_LIMIT: usize = 200;
