//! Logging utilities and configuration for the insight pipeline.
//!
//! The library only emits `tracing` events; installing a subscriber is left to
//! the embedding application (see [`setup::init_logging`]).

use tracing::Level;

/// Logging configuration for pipeline runs.
///
/// Controls how chatty the stages are so that large uploads do not flood the
/// log with per-column or per-group detail in production.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to log the classification decision for every column
    pub log_column_decisions: bool,
    /// Whether to log stage summaries (row counts, removed duplicates, ...)
    pub log_stage_summaries: bool,
    /// Maximum length for logged field values (column names, sample values)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_column_decisions: false,
            log_stage_summaries: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            log_column_decisions: true,
            log_stage_summaries: true,
            max_field_length: 1024,
        }
    }

    /// Picks the configuration matching the subscriber level: verbose at
    /// DEBUG and TRACE, production at WARN and ERROR, the default at INFO.
    pub fn for_level(level: Level) -> Self {
        if level >= Level::DEBUG {
            Self::verbose()
        } else if level <= Level::WARN {
            Self::production()
        } else {
            Self::default()
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            log_column_decisions: false,
            log_stage_summaries: false,
            max_field_length: 128,
        }
    }
}

/// Macro for conditional per-column logging.
#[macro_export]
macro_rules! log_column {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_column_decisions {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional stage summary logging.
#[macro_export]
macro_rules! log_stage {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_stage_summaries {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for the logging subscriber.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for insight_core components specifically
        pub core_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                core_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                core_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                core_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for the application.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for insight_core components.
        pub fn with_core_level(mut self, level: Level) -> Self {
            self.core_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},insight_core={}",
                    self.level.as_str().to_lowercase(),
                    self.core_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Initializes the global subscriber.
    ///
    /// `RUST_LOG` takes precedence over the configured filter when set.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use insight_core::logging::setup::{LoggingConfig, init_logging};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert!(!config.log_column_decisions);
        assert!(config.log_stage_summaries);
        assert_eq!(config.max_field_length, 256);
    }

    #[test]
    fn test_log_config_production() {
        let config = LogConfig::production();
        assert!(!config.log_column_decisions);
        assert!(!config.log_stage_summaries);
        assert_eq!(config.max_field_length, 128);
    }

    #[test]
    fn test_log_config_for_level() {
        let debug = LogConfig::for_level(Level::DEBUG);
        assert!(debug.log_column_decisions);
        assert_eq!(debug.max_field_length, 1024);
        assert!(LogConfig::for_level(Level::TRACE).log_column_decisions);

        let info = LogConfig::for_level(Level::INFO);
        assert!(!info.log_column_decisions);
        assert!(info.log_stage_summaries);

        for quiet in [Level::WARN, Level::ERROR] {
            assert!(!LogConfig::for_level(quiet).log_stage_summaries);
        }
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text that should be truncated", 10),
            "this is a ...(truncated)"
        );
    }

    #[test]
    fn test_truncate_field_respects_char_boundaries() {
        // 'é' is two bytes; cutting at byte 2 would split it
        assert_eq!(truncate_field("aéb", 2), "a...(truncated)");
    }

    #[test]
    fn test_env_filter_string() {
        let config = LoggingConfig::default().with_core_level(Level::DEBUG);
        assert_eq!(config.env_filter(), "info,insight_core=debug");

        let config = LoggingConfig::default().with_env_filter("warn");
        assert_eq!(config.env_filter(), "warn");
    }
}
