use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Scheduler admits at least one task and makes at least one attempt
/// - Every ffmpeg format entry is non-empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Scheduler validation
    if config.scheduler.max_running == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.max_running must be at least 1".to_string(),
        ));
    }
    if config.scheduler.retry_limit == 0 {
        return Err(ConfigError::ValidationError(
            "scheduler.retry_limit must be at least 1".to_string(),
        ));
    }

    // Plugin validation
    if let Some(idx) = config
        .ffmpeg
        .formats
        .iter()
        .position(|f| f.trim().trim_start_matches('.').is_empty())
    {
        return Err(ConfigError::ValidationError(format!(
            "ffmpeg.formats[{}] is empty",
            idx
        )));
    }

    Ok(())
}
