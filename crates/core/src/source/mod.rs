//! Job source: turns a directory listing into conversion jobs.

mod config;
mod scan;

pub use config::SourceConfig;
pub use scan::{plan_jobs, scan_directory};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while listing source files.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("not a directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SourceError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
