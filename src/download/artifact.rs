//! Filesystem helpers for download artifacts.
//!
//! Every helper returns an explicit `io::Result`; the workflow logs and
//! discards deletion errors instead of failing the run.

use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// Size of the file at `path`, `None` when it does not exist or is not a file
///
/// # Errors
///
/// Returns any I/O error other than `NotFound`.
pub async fn artifact_size(path: &Path) -> std::io::Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Delete one artifact; a file that is already gone counts as deleted
///
/// # Errors
///
/// Returns any I/O error other than `NotFound`.
pub async fn remove_artifact(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Delete every file in `dir` whose name starts with `token`.
///
/// Catches partial downloads (`.part`, `.ytdl`, unmerged formats) left
/// behind by the extractor. Returns the number of files removed.
///
/// # Errors
///
/// Returns an error if the directory cannot be read or a matching file
/// cannot be removed.
pub async fn sweep_run_artifacts(dir: &Path, token: &str) -> std::io::Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let matches = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(token));
        if matches && entry.file_type().await?.is_file() {
            remove_artifact(&entry.path()).await?;
            debug!(path = %entry.path().display(), "Removed leftover artifact");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Render a byte count as MB with two decimals
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_artifact_size() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("a.mp4");

        assert_eq!(artifact_size(&path).await?, None);
        tokio::fs::write(&path, vec![0u8; 1500]).await?;
        assert_eq!(artifact_size(&path).await?, Some(1500));
        // Directories are not artifacts
        assert_eq!(artifact_size(dir.path()).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        remove_artifact(&dir.path().join("missing.mp4")).await
    }

    #[tokio::test]
    async fn test_sweep_only_touches_run_files() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        for name in ["run1.mp4", "run1.f137.mp4.part", "run2.mp4", "other.txt"] {
            tokio::fs::write(dir.path().join(name), b"x").await?;
        }

        assert_eq!(sweep_run_artifacts(dir.path(), "run1").await?, 2);
        assert!(!dir.path().join("run1.mp4").exists());
        assert!(dir.path().join("run2.mp4").exists());
        assert!(dir.path().join("other.txt").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_sweep_missing_dir() -> std::io::Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(sweep_run_artifacts(&dir.path().join("nope"), "t").await?, 0);
        Ok(())
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 MB");
        assert_eq!(format_size(1024 * 1024 * 3 / 2), "1.50 MB");
    }
}
