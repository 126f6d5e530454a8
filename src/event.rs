//! Error report events and the builder enrichers operate on.

use crate::error::ReportResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Unique identifier for an event
pub type EventId = String;

/// Severity of a reported event
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Something looks wrong
    Warning,
    /// An error occurred
    #[default]
    Error,
    /// The application cannot continue
    Fatal,
}

/// A finalized error report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Unique event identifier
    pub id: EventId,
    /// Human readable message
    pub message: String,
    /// Severity
    pub level: Level,
    /// When the event was created
    pub timestamp: SystemTime,
    /// Name of the logger that produced the event
    pub logger: Option<String>,
    /// Identity of the machine or instance that produced the event
    pub server_name: Option<String>,
    /// Indexed key/value tags
    pub tags: BTreeMap<String, String>,
    /// Arbitrary extra context
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Event {
    /// Serialize the event to JSON.
    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize an event from JSON.
    pub fn from_json(json: &str) -> ReportResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Get a tag value by key.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

/// Mutable event under construction.
///
/// Enrichers receive a `&mut EventBuilder` before the event is finalized
/// with [`EventBuilder::build`].
///
/// # Examples
///
/// ```rust
/// use reportq::event::{EventBuilder, Level};
///
/// let event = EventBuilder::new()
///     .with_message("disk full")
///     .with_level(Level::Fatal)
///     .with_tag("volume", "/var")
///     .build();
///
/// assert_eq!(event.tag("volume"), Some("/var"));
/// ```
#[derive(Debug, Clone)]
pub struct EventBuilder {
    event: Event,
}

impl EventBuilder {
    /// Start a new event with a fresh identifier and the current time.
    pub fn new() -> Self {
        Self {
            event: Event {
                id: uuid::Uuid::new_v4().simple().to_string(),
                message: String::new(),
                level: Level::default(),
                timestamp: SystemTime::now(),
                logger: None,
                server_name: None,
                tags: BTreeMap::new(),
                extra: BTreeMap::new(),
            },
        }
    }

    /// Set the message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.event.message = message.into();
        self
    }

    /// Set the level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.event.level = level;
        self
    }

    /// Set the logger name.
    pub fn with_logger(mut self, logger: impl Into<String>) -> Self {
        self.event.logger = Some(logger.into());
        self
    }

    /// Add or replace a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_tag(key, value);
        self
    }

    /// Add an extra context value.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.event.extra.insert(key.into(), value);
        self
    }

    /// Add or replace a tag in place.
    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.event.tags.insert(key.into(), value.into());
        self
    }

    /// Set the server name in place.
    pub fn set_server_name(&mut self, server_name: impl Into<String>) -> &mut Self {
        self.event.server_name = Some(server_name.into());
        self
    }

    /// Current value of a tag.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.event.tag(key)
    }

    /// Current server name.
    pub fn server_name(&self) -> Option<&str> {
        self.event.server_name.as_deref()
    }

    /// Identifier the built event will carry.
    pub fn id(&self) -> &str {
        &self.event.id
    }

    /// Finalize the event.
    pub fn build(self) -> Event {
        self.event
    }
}

impl Default for EventBuilder {
    fn default() -> Self {
        Self::new()
    }
}
