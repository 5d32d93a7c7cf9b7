/// Message handlers
pub mod handlers;
/// Telegram API calls with retry
pub mod resilient;
/// Dispatcher setup and bot construction
pub mod runner;
/// [`crate::download::ChatTransport`] backed by teloxide
pub mod transport;

pub use runner::run_bot;
pub use transport::TelegramChat;
