use super::{types::TranscoderConfig, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Adapter timeouts are not 0
/// - Adapter executable paths are not empty
/// - The logging filter is not empty
///
/// Creation modes need no check here: `FileMode` rejects out of range values
/// when it is deserialized.
pub fn validate_config(config: &TranscoderConfig) -> Result<(), ConfigError> {
    if let Some(ffmpeg) = &config.ffmpeg {
        check_adapter("ffmpeg", ffmpeg.path.as_os_str().is_empty(), ffmpeg.timeout_secs)?;
    }
    if let Some(handbrake) = &config.handbrake {
        check_adapter(
            "handbrake",
            handbrake.path.as_os_str().is_empty(),
            handbrake.timeout_secs,
        )?;
    }

    if config.logging.filter.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "logging.filter cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn check_adapter(name: &str, empty_path: bool, timeout_secs: u64) -> Result<(), ConfigError> {
    if empty_path {
        return Err(ConfigError::ValidationError(format!(
            "{name}.path cannot be empty"
        )));
    }
    if timeout_secs == 0 {
        return Err(ConfigError::ValidationError(format!(
            "{name}.timeout_secs cannot be 0"
        )));
    }
    Ok(())
}
