//! Configuration types for reportq.
//!
//! This module contains the configuration structures used throughout reportq:
//! delivery options for the queued transport, the local queue and worker pool,
//! and logging.

use crate::error::{ReportError, ReportResult};
use crate::lookup::{Dsn, Lookup};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Option selecting the named task queue that receives delivery tasks.
pub const QUEUE_NAME_OPTION: &str = "async.queue.name";

/// Option defining the connection identifier of a queued transport.
///
/// Every queued transport opened in a deployment should get its own
/// identifier. When unset, an identifier is derived from the DSN and the
/// runtime version, and two transports for the same DSN will share it.
pub const CONNECTION_ID_OPTION: &str = "async.queue.connectionid";

/// Main configuration for reportq.
///
/// Consumed by [`QueueFactory::from_config`](crate::queue::QueueFactory::from_config),
/// [`TaskQueueExtension::from_config`](crate::extension::TaskQueueExtension::from_config),
/// [`WorkerPool::from_config`](crate::core::WorkerPool::from_config) and
/// [`init_logging`](crate::logging::init_logging). Metrics are configured
/// separately, see `metrics::install`.
///
/// # Examples
///
/// ```rust
/// use reportq::config::{DeliveryConfig, LocalQueueConfig, ReporterConfig};
///
/// // Use default configuration
/// let config = ReporterConfig::default();
///
/// // Custom configuration
/// let config = ReporterConfig {
///     delivery: DeliveryConfig::default().with_queue_name("error-queue"),
///     local_queue: LocalQueueConfig::with_workers(2),
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReporterConfig {
    /// Queued delivery options
    pub delivery: DeliveryConfig,

    /// In-memory queue and local worker pool
    pub local_queue: LocalQueueConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Redis queue configuration
    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    pub redis: Option<RedisConfig>,
}

/// Options of the queued transport.
///
/// Values found through a [`Lookup`] take precedence over these; this struct
/// supplies the fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Name of the task queue; `None` selects the platform default queue
    pub queue_name: Option<String>,

    /// Explicit connection identifier; `None` derives one
    pub connection_id: Option<String>,
}

impl DeliveryConfig {
    /// Read the delivery options through a lookup, scoped by DSN.
    ///
    /// Empty values count as unset. Lookup failures are returned unchanged.
    pub fn from_lookup(lookup: &dyn Lookup, dsn: &Dsn) -> ReportResult<Self> {
        let read = |key: &str| -> ReportResult<Option<String>> {
            Ok(lookup.get(key, dsn)?.filter(|value| !value.is_empty()))
        };

        Ok(Self {
            queue_name: read(QUEUE_NAME_OPTION)?,
            connection_id: read(CONNECTION_ID_OPTION)?,
        })
    }

    /// Set the queue name.
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.queue_name = Some(queue_name.into());
        self
    }

    /// Set the connection identifier.
    pub fn with_connection_id(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }

    /// Fill unset fields from `defaults`.
    pub fn or(self, defaults: &DeliveryConfig) -> Self {
        Self {
            queue_name: self.queue_name.or_else(|| defaults.queue_name.clone()),
            connection_id: self
                .connection_id
                .or_else(|| defaults.connection_id.clone()),
        }
    }
}

/// In-memory queue and local worker pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalQueueConfig {
    /// Number of workers spawned per queue
    pub num_workers: usize,

    /// Maximum pending tasks per named queue (0 = unlimited)
    pub max_queue_size: usize,

    /// Longest time an idle worker waits before polling again (in milliseconds)
    pub idle_timeout_ms: u64,

    /// Maximum time a delivery may run before it is abandoned (in seconds)
    pub task_timeout_secs: Option<u64>,

    /// Time to wait for workers to shutdown gracefully (in seconds)
    pub shutdown_timeout_secs: Option<u64>,
}

impl Default for LocalQueueConfig {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get().max(1),
            max_queue_size: 0,         // unlimited
            idle_timeout_ms: 1000,     // 1 second
            task_timeout_secs: Some(30),
            shutdown_timeout_secs: Some(10),
        }
    }
}

impl LocalQueueConfig {
    /// Create a configuration with a specific number of workers.
    pub fn with_workers(num_workers: usize) -> Self {
        Self {
            num_workers,
            ..Default::default()
        }
    }

    /// Set the maximum queue size.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_queue_size = max_size;
        self
    }

    /// Set the idle timeout.
    pub fn with_idle_timeout(mut self, timeout_ms: u64) -> Self {
        self.idle_timeout_ms = timeout_ms;
        self
    }

    /// Set the task timeout.
    pub fn with_task_timeout(mut self, timeout_secs: u64) -> Self {
        self.task_timeout_secs = Some(timeout_secs);
        self
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout_secs: u64) -> Self {
        self.shutdown_timeout_secs = Some(timeout_secs);
        self
    }
}

/// Redis queue configuration.
#[cfg(feature = "redis-queue")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection string (e.g., "redis://localhost:6379")
    pub connection_string: String,

    /// Key prefix for Redis keys
    pub key_prefix: String,

    /// Timeout for establishing the connection (in seconds)
    pub connect_timeout_secs: u64,
}

#[cfg(feature = "redis-queue")]
impl RedisConfig {
    /// Create a configuration for the given connection string.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            key_prefix: "reportq".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

/// Metrics configuration.
#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether delivery metrics are recorded
    pub enabled: bool,

    /// Prefix of every metric name
    pub namespace: String,
}

#[cfg(feature = "metrics")]
impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "reportq".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: LogLevel,

    /// Enable colored output
    pub colored: bool,

    /// Include timestamps in logs
    pub include_timestamps: bool,

    /// Include target module in logs
    pub include_targets: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            colored: true,
            include_timestamps: true,
            include_targets: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    /// Trace level
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warn level
    Warn,
    /// Error level
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Helper trait for converting durations in configuration.
pub trait DurationExt {
    /// Convert seconds to Duration
    fn secs(self) -> Duration;
    /// Convert milliseconds to Duration
    fn millis(self) -> Duration;
}

impl DurationExt for u64 {
    fn secs(self) -> Duration {
        Duration::from_secs(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }
}

impl ReporterConfig {
    /// Create a new configuration suited to development.
    pub fn development() -> Self {
        Self {
            local_queue: LocalQueueConfig {
                num_workers: 2,
                max_queue_size: 1000,
                idle_timeout_ms: 250,
                ..Default::default()
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: true,
                include_targets: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create a new configuration suited to production.
    pub fn production() -> Self {
        Self {
            local_queue: LocalQueueConfig {
                num_workers: num_cpus::get() * 2,
                max_queue_size: 0,
                shutdown_timeout_secs: Some(30),
                ..Default::default()
            },
            logging: LoggingConfig {
                level: LogLevel::Info,
                colored: false,
                include_timestamps: true,
                include_targets: false,
            },
            ..Default::default()
        }
    }

    /// Create a configuration for testing.
    pub fn testing() -> Self {
        Self {
            local_queue: LocalQueueConfig {
                num_workers: 1,
                max_queue_size: 100,
                idle_timeout_ms: 20,
                task_timeout_secs: Some(5),
                shutdown_timeout_secs: Some(5),
            },
            logging: LoggingConfig {
                level: LogLevel::Debug,
                colored: false,
                include_timestamps: false,
                include_targets: true,
            },
            ..Default::default()
        }
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.delivery.queue_name.as_deref() == Some("") {
            errors.push("Queue name must not be empty".to_string());
        }

        if self.delivery.connection_id.as_deref() == Some("") {
            errors.push("Connection identifier must not be empty".to_string());
        }

        if self.local_queue.num_workers == 0 {
            errors.push("Number of workers must be greater than 0".to_string());
        }

        if self.local_queue.num_workers > 1000 {
            errors.push("Number of workers should not exceed 1000".to_string());
        }

        if self.local_queue.idle_timeout_ms == 0 {
            errors.push("Idle timeout must be greater than 0".to_string());
        }

        if self.local_queue.task_timeout_secs == Some(0) {
            errors.push("Task timeout must be greater than 0".to_string());
        }

        #[cfg(feature = "redis-queue")]
        if let Some(redis) = &self.redis {
            if redis.connection_string.is_empty() {
                errors.push("Redis connection string must not be empty".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// [`validate`](Self::validate), folded into a [`ReportError::ConfigError`].
    pub fn ensure_valid(&self) -> ReportResult<()> {
        self.validate().map_err(|errors| {
            ReportError::config(format!("Invalid configuration: {}", errors.join("; ")))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MapLookup;

    struct FailingLookup;

    impl Lookup for FailingLookup {
        fn get(&self, key: &str, _dsn: &Dsn) -> ReportResult<Option<String>> {
            Err(ReportError::lookup(key, "malformed value"))
        }
    }

    fn dsn() -> Dsn {
        Dsn::new("https://public@reports.example.com/1").unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ReporterConfig::default();
        assert!(config.local_queue.num_workers > 0);
        assert_eq!(config.delivery, DeliveryConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_config() {
        let config = ReporterConfig::development();
        assert_eq!(config.local_queue.num_workers, 2);
        assert!(matches!(config.logging.level, LogLevel::Debug));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_production_config() {
        let config = ReporterConfig::production();
        assert!(config.local_queue.num_workers >= 2);
        assert!(matches!(config.logging.level, LogLevel::Info));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_testing_config() {
        let config = ReporterConfig::testing();
        assert_eq!(config.local_queue.num_workers, 1);
        assert_eq!(config.local_queue.max_queue_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ReporterConfig::default();
        assert!(config.validate().is_ok());

        config.local_queue.num_workers = 0;
        assert!(config.validate().is_err());

        config.local_queue.num_workers = 1;
        config.delivery.connection_id = Some(String::new());
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("Connection identifier")));
    }

    #[test]
    fn test_ensure_valid_collects_errors() {
        assert!(ReporterConfig::testing().ensure_valid().is_ok());

        let mut config = ReporterConfig::testing();
        config.local_queue.num_workers = 0;
        config.local_queue.idle_timeout_ms = 0;

        match config.ensure_valid().unwrap_err() {
            ReportError::ConfigError { message } => {
                assert!(message.contains("workers"));
                assert!(message.contains("Idle timeout"));
            }
            other => panic!("Expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn test_delivery_from_lookup() {
        let lookup = MapLookup::new()
            .with(QUEUE_NAME_OPTION, "error-queue")
            .with(CONNECTION_ID_OPTION, "conn-1");

        let config = DeliveryConfig::from_lookup(&lookup, &dsn()).unwrap();
        assert_eq!(config.queue_name.as_deref(), Some("error-queue"));
        assert_eq!(config.connection_id.as_deref(), Some("conn-1"));
    }

    #[test]
    fn test_delivery_from_lookup_ignores_empty_values() {
        let lookup = MapLookup::new().with(CONNECTION_ID_OPTION, "");
        let config = DeliveryConfig::from_lookup(&lookup, &dsn()).unwrap();
        assert_eq!(config, DeliveryConfig::default());
    }

    #[test]
    fn test_delivery_from_lookup_propagates_errors() {
        let result = DeliveryConfig::from_lookup(&FailingLookup, &dsn());
        assert!(matches!(result, Err(ReportError::LookupError { .. })));
    }

    #[test]
    fn test_delivery_defaults() {
        let defaults = DeliveryConfig::default()
            .with_queue_name("fallback")
            .with_connection_id("default-conn");
        let merged = DeliveryConfig::default()
            .with_queue_name("explicit")
            .or(&defaults);

        assert_eq!(merged.queue_name.as_deref(), Some("explicit"));
        assert_eq!(merged.connection_id.as_deref(), Some("default-conn"));
    }

    #[test]
    fn test_local_queue_builders() {
        let config = LocalQueueConfig::with_workers(8)
            .with_max_size(50)
            .with_task_timeout(600)
            .with_idle_timeout(100);

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.max_queue_size, 50);
        assert_eq!(config.task_timeout_secs, Some(600));
        assert_eq!(config.idle_timeout_ms, 100);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(tracing::Level::from(LogLevel::Warn), tracing::Level::WARN);
    }

    #[test]
    fn test_duration_ext() {
        assert_eq!(5u64.secs(), Duration::from_secs(5));
        assert_eq!(1500u64.millis(), Duration::from_millis(1500));
    }
}
