//! Log output setup.
//!
//! reportq logs through `tracing`. Applications that already install a
//! subscriber need nothing from this module; others can call
//! [`init_logging`] once at startup.

use crate::config::LoggingConfig;
use crate::error::{ReportError, ReportResult};

/// Install a global `fmt` subscriber configured from `config`.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> ReportResult<()> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(config.level))
        .with_target(config.include_targets)
        .with_ansi(config.colored);

    let result = if config.include_timestamps {
        builder.try_init()
    } else {
        builder.without_time().try_init()
    };

    result.map_err(|error| {
        ReportError::config(format!("Could not install log subscriber: {}", error))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_second_init_fails() {
        let config = LoggingConfig {
            level: LogLevel::Warn,
            colored: false,
            include_timestamps: false,
            include_targets: true,
        };

        // The first call may lose to another test; the second always fails
        let _ = init_logging(&config);
        assert!(matches!(
            init_logging(&config),
            Err(ReportError::ConfigError { .. })
        ));
    }
}
