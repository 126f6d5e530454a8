//! Error types for reportq operations.

use thiserror::Error;

/// Result type used throughout reportq.
pub type ReportResult<T> = Result<T, ReportError>;

/// Boxed source error carried by the struct variants.
type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for reportq operations.
#[derive(Error, Debug)]
pub enum ReportError {
    /// Handing an event to the task queue failed
    #[error("Delivery failed: {message}")]
    DeliveryFailed {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<BoxedSource>,
    },

    /// A transport failed to transmit an event
    #[error("Transport error: {message}")]
    TransportError {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Queue backend error
    #[error("Queue error: {message}")]
    QueueError {
        /// Error message
        message: String,
        /// Optional underlying error
        #[source]
        source: Option<BoxedSource>,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// No transport is registered under the connection identifier
    #[error(
        "No connection registered for identifier '{}'",
        crate::utils::redact_credentials(.connection_id)
    )]
    ConnectionNotFound {
        /// The identifier that wasn't found
        connection_id: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Error message
        message: String,
    },

    /// An option lookup failed
    #[error("Lookup of option '{key}' failed: {message}")]
    LookupError {
        /// Option key being looked up
        key: String,
        /// Error message
        message: String,
    },

    /// The transport was closed
    #[error("Transport is closed")]
    Closed,

    /// Worker pool is already running
    #[error("Worker pool is already running")]
    AlreadyRunning,

    /// Worker pool is not running
    #[error("Worker pool is not running")]
    NotRunning,

    /// Metrics registration error
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[error("Metrics error: {message}")]
    MetricsError {
        /// Error message
        message: String,
    },

    /// Redis connection error
    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

impl ReportError {
    /// Create a delivery error
    pub fn delivery<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::DeliveryFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a transport error without an underlying cause
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new queue error
    pub fn queue<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::QueueError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a lookup error
    pub fn lookup(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LookupError {
            key: key.into(),
            message: message.into(),
        }
    }
}
