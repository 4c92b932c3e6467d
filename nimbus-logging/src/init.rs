use anyhow::Result;
use nimbus_config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Initialize simple tracing for basic console output
pub fn init_simple_tracing(log_level: &str) -> Result<()> {
    let env_filter = EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // try_init leaves an existing global subscriber in place
    if tracing_subscriber::fmt().with_env_filter(env_filter).try_init().is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Initialize logging from configuration
pub fn init_logging_from_config(config: &LoggingConfig) -> Result<()> {
    let env_filter = build_env_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    if result.is_err() {
        tracing::debug!("Global tracing subscriber already initialized, skipping");
    }

    Ok(())
}

/// Level directive followed by any extra filter directives
pub fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let directives = match &config.filter {
        Some(extra) => format!("{},{}", config.level, extra),
        None => config.level.to_string(),
    };
    EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{}': {}", directives, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nimbus_config::LogLevel;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_filter_with_directives() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            filter: Some("nimbus_queue=debug".to_string()),
            ..Default::default()
        };
        let filter = build_env_filter(&config).unwrap();
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_invalid_directive() {
        let config = LoggingConfig {
            filter: Some("nimbus_queue=[[".to_string()),
            ..Default::default()
        };
        assert!(build_env_filter(&config).is_err());
    }
}
