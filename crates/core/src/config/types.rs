use serde::{Deserialize, Serialize};

use crate::batch::BatchConfig;
use crate::converter::ConverterConfig;
use crate::source::SourceConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
    /// Print the Prometheus text exposition when the run ends.
    #[serde(default)]
    pub print_metrics: bool,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.converter.target_extension, "mp3");
        assert_eq!(config.batch.poll_interval_ms, 1000);
        assert_eq!(config.source.allowed_extensions, vec!["wma", "mp3"]);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(!config.logging.print_metrics);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
[converter]
ffmpeg_path = "/usr/bin/ffmpeg"
output_format = "ogg"
target_extension = "ogg"

[batch]
max_workers = 3
poll_interval_ms = 500

[source]
input_dir = "/music/wma"
output_dir = "/music/ogg"

[logging]
format = "json"
print_metrics = true
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.converter.ffmpeg_path, PathBuf::from("/usr/bin/ffmpeg"));
        assert_eq!(config.converter.output_format, "ogg");
        assert_eq!(config.batch.max_workers, Some(3));
        assert_eq!(config.batch.poll_interval_ms, 500);
        assert_eq!(config.source.input_dir, Some(PathBuf::from("/music/wma")));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.logging.print_metrics);
    }

    #[test]
    fn test_unknown_log_format_fails() {
        let toml = r#"
[logging]
format = "xml"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
