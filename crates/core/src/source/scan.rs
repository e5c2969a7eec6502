//! Directory listing for batch planning.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::converter::ConversionJob;

use super::config::SourceConfig;
use super::SourceError;

/// Lists regular files in `dir` whose extension is in `allowed_extensions`.
///
/// Matching ignores case and a leading dot. Results are sorted by file name so
/// the display order is deterministic. Subdirectories are not descended into.
pub async fn scan_directory(
    dir: &Path,
    allowed_extensions: &[String],
) -> Result<Vec<PathBuf>, SourceError> {
    let metadata = tokio::fs::metadata(dir)
        .await
        .map_err(|e| SourceError::io(dir, e))?;
    if !metadata.is_dir() {
        return Err(SourceError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let allowed: Vec<String> = allowed_extensions
        .iter()
        .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
        .collect();

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| SourceError::io(dir, e))?;
    let mut files = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| SourceError::io(dir, e))?
    {
        let path = entry.path();
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| allowed.contains(&e.to_ascii_lowercase()))
            .unwrap_or(false);
        if matches {
            files.push(path);
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!(dir = %dir.display(), count = files.len(), "Scanned source directory");
    Ok(files)
}

/// Scans `input_dir` and builds one job per eligible file.
pub async fn plan_jobs(
    input_dir: &Path,
    output_dir: &Path,
    config: &SourceConfig,
    target_extension: &str,
) -> Result<Vec<ConversionJob>, SourceError> {
    let files = scan_directory(input_dir, &config.allowed_extensions).await?;
    Ok(files
        .into_iter()
        .map(|source| ConversionJob::new(source, output_dir, target_extension))
        .collect())
}
