//! Download workflow: proxy → extract → validate → upload → clean up.
//!
//! A run is all-or-nothing from the caller's point of view. The status
//! message is edited in place while the run progresses, deleted on success
//! and left showing the error on failure. Files are written under a per-run
//! random token, and every file carrying that token is swept when the run
//! ends, whichever way it ends.

use super::artifact::{artifact_size, format_size, remove_artifact, sweep_run_artifacts};
use super::extractor::{ExtractionRequest, ExtractorError, MediaExtractor};
use super::transport::{ChatTransport, StatusId};
use super::{DownloadRequest, DownloadResult, FailureKind};
use crate::config::{
    Settings, BROWSER_USER_AGENT, CAPTION_LIMIT, EXTRACTOR_FORMAT, EXTRACTOR_FRAGMENT_RETRIES,
    EXTRACTOR_RETRIES, EXTRACTOR_SOCKET_TIMEOUT_SECS, MAX_ARTIFACT_BYTES, MIN_ARTIFACT_BYTES,
    USER_ERROR_LIMIT,
};
use crate::proxy::{ProxyRecord, ProxySource};
use crate::utils::truncate_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Policy knobs for a workflow
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Scratch directory for artifacts
    pub download_dir: PathBuf,
    /// Smallest acceptable artifact in bytes
    pub min_bytes: u64,
    /// Largest acceptable artifact in bytes
    pub max_bytes: u64,
    /// Format selector passed to the extractor
    pub format: String,
    /// User agent passed to the extractor
    pub user_agent: String,
    /// Whole-request retries
    pub retries: u32,
    /// Per-fragment retries
    pub fragment_retries: u32,
    /// Socket timeout in seconds
    pub socket_timeout_secs: u64,
}

impl WorkflowConfig {
    /// Default policy writing into `download_dir`
    #[must_use]
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            download_dir: download_dir.into(),
            min_bytes: MIN_ARTIFACT_BYTES,
            max_bytes: MAX_ARTIFACT_BYTES,
            format: EXTRACTOR_FORMAT.to_string(),
            user_agent: BROWSER_USER_AGENT.to_string(),
            retries: EXTRACTOR_RETRIES,
            fragment_retries: EXTRACTOR_FRAGMENT_RETRIES,
            socket_timeout_secs: EXTRACTOR_SOCKET_TIMEOUT_SECS,
        }
    }

    /// Default policy for the configured download directory
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.download_dir.clone())
    }

    fn output_template(&self, token: &str) -> String {
        self.download_dir
            .join(format!("{token}.%(ext)s"))
            .to_string_lossy()
            .into_owned()
    }
}

/// Ways a run can fail
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Extractor reported no result or refused the link
    #[error("could not extract the video: {0}")]
    ExtractionFailed(String),
    /// Reported file is not on disk
    #[error("downloaded file not found: {}", .0.display())]
    FileMissing(PathBuf),
    /// Artifact below the size floor
    #[error("downloaded file is empty ({size} bytes)")]
    EmptyFile {
        /// Actual size
        size: u64,
    },
    /// Artifact above the size ceiling
    #[error("file is too large ({}, limit {})", format_size(*size), format_size(*limit))]
    TooLarge {
        /// Actual size
        size: u64,
        /// Configured ceiling
        limit: u64,
    },
    /// Anything else
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WorkflowError {
    /// Failure category reported to the caller
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::ExtractionFailed(_) => FailureKind::ExtractionFailed,
            Self::FileMissing(_) => FailureKind::FileMissing,
            Self::EmptyFile { .. } => FailureKind::EmptyFile,
            Self::TooLarge { .. } => FailureKind::TooLarge,
            Self::Internal(_) => FailureKind::InternalError,
        }
    }

    /// Text shown to the user, at most `USER_ERROR_LIMIT` characters
    #[must_use]
    pub fn user_message(&self) -> String {
        let text = match self {
            Self::ExtractionFailed(reason) => format!("❌ Could not download the video: {reason}"),
            Self::FileMissing(_) => "❌ Download finished but the file was not found.".to_string(),
            Self::EmptyFile { .. } => "❌ The downloaded file is empty.".to_string(),
            Self::TooLarge { size, limit } => format!(
                "❌ The video is too large ({}). Limit is {}.",
                format_size(*size),
                format_size(*limit)
            ),
            Self::Internal(e) => format!("❌ Error: {e}"),
        };
        truncate_str(text, USER_ERROR_LIMIT)
    }
}

impl From<ExtractorError> for WorkflowError {
    fn from(e: ExtractorError) -> Self {
        match e {
            ExtractorError::Rejected { message, .. } => Self::ExtractionFailed(message),
            other => Self::Internal(other.into()),
        }
    }
}

struct Delivered {
    title: String,
    byte_size: u64,
}

/// Runs downloads for validated requests
pub struct DownloadWorkflow {
    extractor: Arc<dyn MediaExtractor>,
    proxies: Option<Arc<dyn ProxySource>>,
    config: WorkflowConfig,
}

impl DownloadWorkflow {
    /// Create a workflow; pass `None` for `proxies` to always go direct
    #[must_use]
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        proxies: Option<Arc<dyn ProxySource>>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            extractor,
            proxies,
            config,
        }
    }

    /// Policy in effect
    #[must_use]
    pub const fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Run one download and report the outcome through `chat`.
    ///
    /// Never returns an error: every failure is shown to the user and
    /// folded into [`DownloadResult::Failure`].
    pub async fn run(&self, request: &DownloadRequest, chat: &dyn ChatTransport) -> DownloadResult {
        let token = Uuid::new_v4().simple().to_string();
        info!(
            user_id = request.user_id,
            chat_id = request.chat_id,
            url = %request.url,
            run = %token,
            "Starting download"
        );

        let status = match chat.send_status("⏳ Processing your video...").await {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(error = %e, "Failed to post status message");
                None
            }
        };

        let outcome = self.execute(request, &token, chat, status).await;

        // Sweep failures never change the outcome.
        match sweep_run_artifacts(&self.config.download_dir, &token).await {
            Ok(0) => {}
            Ok(count) => debug!(run = %token, count, "Swept leftover artifacts"),
            Err(e) => warn!(run = %token, error = %e, "Failed to sweep run artifacts"),
        }

        match outcome {
            Ok(Delivered { title, byte_size }) => {
                info!(run = %token, title = %title, byte_size, "Video delivered");
                DownloadResult::Success { title, byte_size }
            }
            Err(e) => {
                let kind = e.kind();
                error!(run = %token, url = %request.url, %kind, error = ?e, "Download failed");
                let message = e.user_message();
                self.report_failure(chat, status, &message).await;
                DownloadResult::Failure {
                    kind,
                    detail: e.to_string(),
                }
            }
        }
    }

    async fn execute(
        &self,
        request: &DownloadRequest,
        token: &str,
        chat: &dyn ChatTransport,
        status: Option<StatusId>,
    ) -> Result<Delivered, WorkflowError> {
        let proxy = self.pick_proxy().await;

        self.update_status(chat, status, "📥 Downloading...").await;
        let extraction = ExtractionRequest {
            url: request.url.clone(),
            output_template: self.config.output_template(token),
            format: self.config.format.clone(),
            user_agent: self.config.user_agent.clone(),
            retries: self.config.retries,
            fragment_retries: self.config.fragment_retries,
            socket_timeout_secs: self.config.socket_timeout_secs,
            proxy,
        };

        let media = self.extractor.extract(&extraction).await?.ok_or_else(|| {
            WorkflowError::ExtractionFailed("the extractor returned no result".to_string())
        })?;

        let size = artifact_size(&media.file_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to read file size: {e}"))?
            .ok_or_else(|| WorkflowError::FileMissing(media.file_path.clone()))?;

        if size < self.config.min_bytes {
            discard_artifact(&media.file_path).await;
            return Err(WorkflowError::EmptyFile { size });
        }
        if size > self.config.max_bytes {
            discard_artifact(&media.file_path).await;
            return Err(WorkflowError::TooLarge {
                size,
                limit: self.config.max_bytes,
            });
        }

        let progress = format!(
            "📤 Uploading <b>{}</b> ({})...",
            html_escape::encode_text(&truncate_str(&media.title, 200)),
            format_size(size)
        );
        self.update_status(chat, status, &progress).await;

        let caption = truncate_str(&media.title, CAPTION_LIMIT);
        chat.upload_video(&media.file_path, &caption)
            .await
            .map_err(|e| anyhow::anyhow!("upload failed: {e}"))?;

        if let Some(id) = status {
            if let Err(e) = chat.delete_status(id).await {
                warn!(error = %e, "Failed to delete status message");
            }
        }
        discard_artifact(&media.file_path).await;

        Ok(Delivered {
            title: media.title,
            byte_size: size,
        })
    }

    /// Best-effort proxy lookup; any error means "go direct".
    async fn pick_proxy(&self) -> Option<ProxyRecord> {
        let source = self.proxies.as_ref()?;
        match source.fetch_proxy().await {
            Ok(proxy) => {
                info!(proxy = %proxy, "Using proxy for download");
                Some(proxy)
            }
            Err(e) => {
                warn!(error = %e, "Proxy lookup failed, downloading without proxy");
                None
            }
        }
    }

    async fn update_status(&self, chat: &dyn ChatTransport, status: Option<StatusId>, text: &str) {
        if let Some(id) = status {
            if let Err(e) = chat.edit_status(id, text).await {
                debug!(error = %e, "Status update skipped");
            }
        }
    }

    async fn report_failure(&self, chat: &dyn ChatTransport, status: Option<StatusId>, text: &str) {
        let text = html_escape::encode_text(text);
        let edited = match status {
            Some(id) => chat.edit_status(id, &text).await.is_ok(),
            None => false,
        };
        if !edited {
            if let Err(e) = chat.send_status(&text).await {
                error!(error = %e, "Failed to report download failure to user");
            }
        }
    }
}

/// Delete an artifact, logging instead of failing.
async fn discard_artifact(path: &Path) {
    if let Err(e) = remove_artifact(path).await {
        warn!(path = %path.display(), error = %e, "Failed to delete artifact");
    }
}
