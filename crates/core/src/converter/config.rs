//! Configuration for the converter module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the ffmpeg-based transcoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Container/format name passed to ffmpeg's `-f`.
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Extension given to converted files (without the leading dot).
    #[serde(default = "default_target_extension")]
    pub target_extension: String,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional output arguments inserted before the output path.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_output_format() -> String {
    "mp3".to_string()
}

fn default_target_extension() -> String {
    "mp3".to_string()
}

fn default_log_level() -> String {
    "error".to_string()
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            output_format: default_output_format(),
            target_extension: default_target_extension(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl ConverterConfig {
    /// Creates a new config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the output format and the extension used for destination files.
    pub fn with_output(mut self, format: impl Into<String>, extension: impl Into<String>) -> Self {
        self.output_format = format.into();
        self.target_extension = extension.into();
        self
    }

    /// Appends extra ffmpeg output arguments.
    pub fn with_extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }
}
