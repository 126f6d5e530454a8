//! Delivery tasks handed to the task queue.

use crate::core::registry::{ConnectionRegistry, connection_registry};
use crate::error::{ReportError, ReportResult};
use crate::event::Event;
use crate::utils::redact_credentials;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Unique identifier for a task
pub type TaskId = String;

/// Unit of work that delivers one event through a registered transport.
///
/// The task references its transport only by connection identifier, so it
/// can be serialized, stored by a queue backend and executed later on any
/// worker of the same process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryTask {
    /// Unique task identifier
    pub id: TaskId,
    /// Connection identifier of the queued transport that created the task
    pub connection_id: String,
    /// Queue the task was submitted to
    pub queue_name: String,
    /// Event to deliver
    pub event: Event,
    /// When the task was created
    pub created_at: SystemTime,
}

impl DeliveryTask {
    /// Create a task delivering `event` through `connection_id`.
    pub fn new(
        connection_id: impl Into<String>,
        queue_name: impl Into<String>,
        event: Event,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            connection_id: connection_id.into(),
            queue_name: queue_name.into(),
            event,
            created_at: SystemTime::now(),
        }
    }

    /// Execute the task against the global connection registry.
    pub async fn execute(&self) -> ReportResult<()> {
        self.execute_with(&connection_registry()).await
    }

    /// Execute the task against a specific registry.
    ///
    /// Fails with [`ReportError::ConnectionNotFound`] when the transport has
    /// been closed (or never existed in this process) and with the
    /// transport's own error when sending fails.
    pub async fn execute_with(&self, registry: &ConnectionRegistry) -> ReportResult<()> {
        let Some(transport) = registry.get(&self.connection_id) else {
            tracing::warn!(
                "No connection '{}' for task {}, it has probably been closed",
                redact_credentials(&self.connection_id),
                self.id
            );
            return Err(ReportError::ConnectionNotFound {
                connection_id: self.connection_id.clone(),
            });
        };

        tracing::debug!(
            "Delivering event {} (task {}) through connection '{}'",
            self.event.id,
            self.id,
            redact_credentials(&self.connection_id)
        );

        let result = transport.send(&self.event).await;

        #[cfg(feature = "metrics")]
        crate::metrics::record_execution(&self.queue_name, result.is_ok());

        result
    }
}
