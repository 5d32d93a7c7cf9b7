//! Chat-side operations needed by a download run.

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

/// Identifier of the in-place status message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusId(pub i32);

/// Transport adapter used by the download workflow.
///
/// Status text is Telegram-flavoured HTML; callers escape untrusted parts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Post a new status message
    async fn send_status(&self, text: &str) -> Result<StatusId>;

    /// Replace the text of an existing status message
    async fn edit_status(&self, id: StatusId, text: &str) -> Result<()>;

    /// Remove a status message
    async fn delete_status(&self, id: StatusId) -> Result<()>;

    /// Upload a video file with a caption
    async fn upload_video(&self, path: &Path, caption: &str) -> Result<()>;
}
