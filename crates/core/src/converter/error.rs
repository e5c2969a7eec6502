//! Error types for the converter module.

use std::path::PathBuf;
use thiserror::Error;

/// Reasons a conversion process could not be spawned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProcessError {
    /// The conversion engine binary does not exist or is not executable.
    #[error("conversion engine not found: {program}")]
    EngineNotFound { program: PathBuf },

    /// A required input file is missing.
    #[error("input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Any other OS-level spawn failure.
    #[error("failed to spawn {program}: {reason}")]
    Spawn { program: PathBuf, reason: String },
}

impl ProcessError {
    pub(crate) fn from_spawn(program: PathBuf, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::EngineNotFound { program }
        } else {
            Self::Spawn {
                program,
                reason: err.to_string(),
            }
        }
    }
}

/// Errors raised while checking that a transcoder is usable.
#[derive(Debug, Error)]
pub enum TranscoderError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// The engine ran but reported a failure.
    #[error("FFmpeg self-check failed with exit code {code:?}")]
    SelfCheckFailed { code: Option<i32> },

    /// I/O error while running the self-check.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
