use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Poll interval is not 0
/// - max_workers, when set, is not 0
/// - Extension lists are usable
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Batch validation
    if config.batch.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "batch.poll_interval_ms cannot be 0".to_string(),
        ));
    }
    if config.batch.max_workers == Some(0) {
        return Err(ConfigError::ValidationError(
            "batch.max_workers cannot be 0".to_string(),
        ));
    }

    // Converter validation
    let ext = &config.converter.target_extension;
    if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "converter.target_extension is invalid: {:?}",
            ext
        )));
    }
    if config.converter.output_format.is_empty() {
        return Err(ConfigError::ValidationError(
            "converter.output_format cannot be empty".to_string(),
        ));
    }

    // Source validation
    if config.source.allowed_extensions.is_empty()
        || config
            .source
            .allowed_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').is_empty())
    {
        return Err(ConfigError::ValidationError(
            "source.allowed_extensions must list at least one non-empty extension".to_string(),
        ));
    }

    Ok(())
}
