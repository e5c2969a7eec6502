//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One source-file-to-destination-file conversion unit.
///
/// Jobs are plain values: they are built once when a batch is planned and
/// handed to exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Identifier used to correlate events for this job.
    pub id: Uuid,
    /// File to read.
    pub source: PathBuf,
    /// File to write.
    pub destination: PathBuf,
}

impl ConversionJob {
    /// Creates a job writing `<destination_dir>/<source stem>.<target_extension>`.
    pub fn new(source: impl Into<PathBuf>, destination_dir: &Path, target_extension: &str) -> Self {
        let source = source.into();
        let stem = source
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "output".into());
        let mut file_name = stem;
        file_name.push(".");
        file_name.push(target_extension.trim_start_matches('.'));

        Self {
            id: Uuid::new_v4(),
            destination: destination_dir.join(file_name),
            source,
        }
    }

    /// Creates a job with an explicit destination path.
    pub fn with_destination(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Source file name for display.
    pub fn display_name(&self) -> String {
        self.source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source.display().to_string())
    }
}
