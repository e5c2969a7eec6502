//! Job source configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where source files are read from and converted files written to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory scanned for source files.
    #[serde(default)]
    pub input_dir: Option<PathBuf>,

    /// Directory converted files are written to.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Extensions (without the dot, case-insensitive) eligible for conversion.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["wma".to_string(), "mp3".to_string()]
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            input_dir: None,
            output_dir: None,
            allowed_extensions: default_allowed_extensions(),
        }
    }
}
