//! yt-dlp extractor
//!
//! Runs the `yt-dlp` binary as a child process. The final file path and the
//! title are read back from a single JSON line printed after the file has
//! been moved into place, so no filename guessing is needed.

use crate::proxy::ProxyRecord;
use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Print template emitting `{"title": ..., "filepath": ...}` once the file is final
const PRINT_TEMPLATE: &str = "after_move:%(.{title,filepath})j";

/// Title used when the extractor does not report one
const FALLBACK_TITLE: &str = "video";

/// Stderr patterns for videos that cannot be fetched at all
const UNAVAILABLE_PATTERNS: &[&str] = &[
    "Video unavailable",
    "Private video",
    "This video is private",
    "This video is not available",
    "removed by the uploader",
    "no longer available",
    "This video has been removed",
    "terminated account",
    "blocked it in your country",
    "geo-restricted",
    "copyright grounds",
];

/// Stderr patterns for videos behind a login wall
const LOGIN_PATTERNS: &[&str] = &[
    "Sign in to confirm your age",
    "age-restricted",
    "members-only",
    "Join this channel to get access",
    "Sign in to view this video",
    "Sign in to confirm you",
];

/// Stderr patterns for streams that have not started yet
const NOT_STARTED_PATTERNS: &[&str] = &["Premieres in", "This live event will begin"];

/// Errors raised by an extractor run
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Binary not found on `PATH`
    #[error("{0} is not installed")]
    NotInstalled(String),
    /// Process could not be started
    #[error("failed to start {bin}: {source}")]
    Spawn {
        /// Binary that failed to start
        bin: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Process ran and exited with a failure
    #[error("{message}")]
    Rejected {
        /// Exit code, if the process was not killed by a signal
        code: Option<i32>,
        /// Summary of the extractor's error output
        message: String,
    },
}

/// Everything the extractor needs for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    /// Video link
    pub url: String,
    /// Output template, e.g. `downloads/<token>.%(ext)s`
    pub output_template: String,
    /// Format selector
    pub format: String,
    /// User agent header
    pub user_agent: String,
    /// Whole-request retries
    pub retries: u32,
    /// Per-fragment retries
    pub fragment_retries: u32,
    /// Socket timeout in seconds
    pub socket_timeout_secs: u64,
    /// Optional proxy
    pub proxy: Option<ProxyRecord>,
}

/// Result of a successful extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedMedia {
    /// Video title, used only as upload caption
    pub title: String,
    /// Final file path as reported by the extractor
    pub file_path: PathBuf,
}

/// External media extractor
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch the video. `Ok(None)` means the extractor finished but reported
    /// no file.
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Option<ExtractedMedia>, ExtractorError>;
}

/// [`MediaExtractor`] backed by the `yt-dlp` command line tool
pub struct YtDlpExtractor {
    bin: String,
}

impl YtDlpExtractor {
    /// Use the given binary name or path
    #[must_use]
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Option<ExtractedMedia>, ExtractorError> {
        let args = build_args(request);
        debug!(
            bin = %self.bin,
            url = %request.url,
            proxy = request.proxy.as_ref().map(ProxyRecord::as_str),
            "Running extractor"
        );

        let output = Command::new(&self.bin)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    ExtractorError::NotInstalled(self.bin.clone())
                } else {
                    ExtractorError::Spawn {
                        bin: self.bin.clone(),
                        source: e,
                    }
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(code = ?output.status.code(), stderr = %stderr, "Extractor failed");
            return Err(ExtractorError::Rejected {
                code: output.status.code(),
                message: describe_failure(&stderr),
            });
        }

        Ok(parse_printed_media(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Command line for one extraction run
#[must_use]
pub fn build_args(request: &ExtractionRequest) -> Vec<String> {
    let mut args: Vec<String> = [
        "--no-playlist",
        "--no-warnings",
        "--no-progress",
        "--no-simulate",
        "--format",
        request.format.as_str(),
        "--merge-output-format",
        "mp4",
        "--output",
        request.output_template.as_str(),
        "--user-agent",
        request.user_agent.as_str(),
    ]
    .iter()
    .map(ToString::to_string)
    .collect();

    args.extend([
        "--retries".to_string(),
        request.retries.to_string(),
        "--fragment-retries".to_string(),
        request.fragment_retries.to_string(),
        "--socket-timeout".to_string(),
        request.socket_timeout_secs.to_string(),
    ]);

    if let Some(proxy) = &request.proxy {
        args.push("--proxy".to_string());
        args.push(proxy.as_str().to_string());
    }

    args.push("--print".to_string());
    args.push(PRINT_TEMPLATE.to_string());
    args.push("--".to_string());
    args.push(request.url.clone());
    args
}

#[derive(Deserialize)]
struct PrintedMedia {
    title: Option<String>,
    filepath: Option<String>,
}

/// Read the title and file path from the extractor's stdout.
///
/// Uses the last JSON line; returns `None` when there is none or it lacks a
/// file path.
#[must_use]
pub fn parse_printed_media(stdout: &str) -> Option<ExtractedMedia> {
    let line = stdout
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .next_back()?;

    let printed: PrintedMedia = match serde_json::from_str(line) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, line = %line, "Unreadable extractor output");
            return None;
        }
    };

    let file_path = printed.filepath.filter(|p| !p.trim().is_empty())?;
    let title = printed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string());

    Some(ExtractedMedia {
        title,
        file_path: PathBuf::from(file_path),
    })
}

/// Turn the extractor's stderr into a short, user-facing reason
#[must_use]
pub fn describe_failure(stderr: &str) -> String {
    let matches_any = |patterns: &[&str]| patterns.iter().any(|p| stderr.contains(p));

    if matches_any(UNAVAILABLE_PATTERNS) {
        return "The video is unavailable (private, removed or blocked in this region).".to_string();
    }
    if matches_any(LOGIN_PATTERNS) {
        return "The video requires signing in (age-restricted or members-only).".to_string();
    }
    if matches_any(NOT_STARTED_PATTERNS) {
        return "The video has not been published yet.".to_string();
    }

    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    lines
        .iter()
        .rev()
        .find_map(|line| line.strip_prefix("ERROR:"))
        .or_else(|| lines.last().copied())
        .map_or_else(
            || "yt-dlp exited without an error message".to_string(),
            |line| line.trim().to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(proxy: Option<ProxyRecord>) -> ExtractionRequest {
        ExtractionRequest {
            url: "https://youtu.be/abc".to_string(),
            output_template: "downloads/tok.%(ext)s".to_string(),
            format: "best".to_string(),
            user_agent: "UA/1.0".to_string(),
            retries: 10,
            fragment_retries: 10,
            socket_timeout_secs: 30,
            proxy,
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_build_args_without_proxy() {
        let args = build_args(&request(None));
        assert_eq!(value_after(&args, "--output"), Some("downloads/tok.%(ext)s"));
        assert_eq!(value_after(&args, "--user-agent"), Some("UA/1.0"));
        assert_eq!(value_after(&args, "--retries"), Some("10"));
        assert_eq!(value_after(&args, "--fragment-retries"), Some("10"));
        assert_eq!(value_after(&args, "--socket-timeout"), Some("30"));
        assert_eq!(value_after(&args, "--print"), Some(PRINT_TEMPLATE));
        assert!(!args.iter().any(|a| a == "--proxy"));
        // URL is last and follows the option terminator
        assert_eq!(args.last().map(String::as_str), Some("https://youtu.be/abc"));
        assert_eq!(args.get(args.len() - 2).map(String::as_str), Some("--"));
    }

    #[test]
    fn test_build_args_with_proxy() {
        let args = build_args(&request(Some(ProxyRecord::new("1.2.3.4:8080"))));
        assert_eq!(value_after(&args, "--proxy"), Some("http://1.2.3.4:8080"));
    }

    #[test]
    fn test_build_args_has_no_size_filter() {
        let args = build_args(&request(None));
        assert!(!args.iter().any(|a| a.contains("filesize") || a == "--max-filesize"));
    }

    #[test]
    fn test_parse_printed_media() {
        let stdout = "[info] something\n{\"title\": \"My Clip\", \"filepath\": \"/dl/tok.mp4\"}\n";
        assert_eq!(
            parse_printed_media(stdout),
            Some(ExtractedMedia {
                title: "My Clip".to_string(),
                file_path: PathBuf::from("/dl/tok.mp4"),
            })
        );
    }

    #[test]
    fn test_parse_printed_media_fallback_title() {
        let media = parse_printed_media("{\"filepath\": \"/dl/tok.webm\"}");
        assert_eq!(media.map(|m| m.title), Some(FALLBACK_TITLE.to_string()));
    }

    #[test]
    fn test_parse_printed_media_no_result() {
        assert_eq!(parse_printed_media(""), None);
        assert_eq!(parse_printed_media("{\"title\": \"x\"}"), None);
        assert_eq!(parse_printed_media("{not json"), None);
    }

    #[test]
    fn test_describe_failure() {
        assert!(describe_failure("ERROR: [youtube] abc: Private video. Sign in")
            .contains("unavailable"));
        assert!(describe_failure("ERROR: Sign in to confirm your age").contains("signing in"));
        assert_eq!(
            describe_failure("WARNING: x\nERROR: Unable to download webpage: timed out\n"),
            "Unable to download webpage: timed out"
        );
        assert_eq!(describe_failure("something odd\n"), "something odd");
        assert_eq!(
            describe_failure(""),
            "yt-dlp exited without an error message"
        );
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let extractor = YtDlpExtractor::new("definitely-not-a-real-yt-dlp-binary");
        let result = extractor.extract(&request(None)).await;
        assert!(matches!(result, Err(ExtractorError::NotInstalled(_))));
    }
}
