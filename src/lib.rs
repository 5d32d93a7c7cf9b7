//! Telegram bot that downloads YouTube videos for users who know the access code.
//!
//! The core ([`auth`], [`router`], [`proxy`], [`download`]) knows nothing
//! about Telegram; [`bot`] wires it to teloxide.

#![deny(missing_docs)]

/// Access-code challenge and per-user session flags
pub mod auth;
/// Telegram transport
pub mod bot;
/// Settings and constants
pub mod config;
/// Download, validation, upload and cleanup
pub mod download;
/// Rotating proxy lookup
pub mod proxy;
/// Message classification and session transitions
pub mod router;
/// Shared helpers
pub mod utils;
