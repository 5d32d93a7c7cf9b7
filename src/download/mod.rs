//! Download-and-delivery pipeline
//!
//! Transport-agnostic: the workflow talks to the chat through
//! [`ChatTransport`] and to the media tool through [`MediaExtractor`].

/// Local artifact bookkeeping (size checks, deletion, sweeping)
pub mod artifact;
/// External media extractor (yt-dlp)
pub mod extractor;
/// Chat operations used while a download runs
pub mod transport;
/// Orchestration of a single download run
pub mod workflow;

pub use extractor::{ExtractedMedia, ExtractionRequest, ExtractorError, MediaExtractor, YtDlpExtractor};
pub use transport::{ChatTransport, StatusId};
pub use workflow::{DownloadWorkflow, WorkflowConfig, WorkflowError};

use std::fmt;

/// A validated link plus where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Normalised video link (always carries a scheme)
    pub url: String,
    /// Chat the request arrived in
    pub chat_id: i64,
    /// Sender of the request
    pub user_id: i64,
}

/// Why a run failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Extractor produced no result or exited with an error
    ExtractionFailed,
    /// Extractor reported a file that is not on disk
    FileMissing,
    /// Artifact below the size floor
    EmptyFile,
    /// Artifact above the size ceiling
    TooLarge,
    /// Anything unexpected (spawn failures, upload errors, I/O)
    InternalError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ExtractionFailed => "extraction_failed",
            Self::FileMissing => "file_missing",
            Self::EmptyFile => "empty_file",
            Self::TooLarge => "too_large",
            Self::InternalError => "internal_error",
        };
        f.write_str(name)
    }
}

/// Outcome of one workflow run, reported once and then dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    /// Video uploaded
    Success {
        /// Title reported by the extractor
        title: String,
        /// Size of the uploaded file
        byte_size: u64,
    },
    /// Run failed; the user has already been told
    Failure {
        /// Failure category
        kind: FailureKind,
        /// Human-readable detail
        detail: String,
    },
}

impl DownloadResult {
    /// Whether the video was delivered
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure category, if any
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}
