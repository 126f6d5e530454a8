//! Queue-backed delivery decorator.
//!
//! [`QueuedTransport`] presents the same contract as the transport it wraps,
//! but `send` only submits a [`DeliveryTask`] to a [`TaskQueue`]. Whoever
//! runs the queue later executes the task, which finds the wrapped transport
//! again through the connection registry and sends the event there.
//!
//! ```text
//! send(event) ──► TaskQueue::enqueue(queue_name, task) ──► Ok(())
//!                                  ⋮  (later, on a queue worker)
//!                 DeliveryTask::execute ──► registry[connection_id].send(event)
//! ```

use super::{SharedTransport, Transport};
use crate::core::registry::{ConnectionRegistry, connection_registry};
use crate::error::{ReportError, ReportResult};
use crate::event::Event;
use crate::queue::{DEFAULT_QUEUE_NAME, SharedTaskQueue};
use crate::task::DeliveryTask;
use crate::utils::redact_credentials;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Transport decorator that defers delivery to a task queue.
///
/// The wrapped transport stays registered until [`close`](Transport::close)
/// is called or the `QueuedTransport` is dropped, whichever comes first.
/// Dropping does not close the wrapped transport; tasks still pending at that
/// point fail with `ConnectionNotFound`.
///
/// # Examples
///
/// ```rust
/// use reportq::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> ReportResult<()> {
/// let queue = QueueFactory::in_memory(LocalQueueConfig::default());
/// let transport = QueuedTransport::new("billing-errors", Arc::new(TracingTransport), queue.clone())?
///     .with_queue_name("error-queue");
///
/// let event = EventBuilder::new().with_message("payment declined").build();
/// transport.send(&event).await?;
///
/// assert_eq!(queue.len("error-queue").await, 1);
/// # Ok(())
/// # }
/// ```
pub struct QueuedTransport {
    /// Identifier the wrapped transport is registered under
    connection_id: String,
    /// Target queue; `None` selects the default queue
    queue_name: Option<String>,
    /// Wrapped transport performing the actual send
    transport: SharedTransport,
    /// Queue receiving delivery tasks
    queue: SharedTaskQueue,
    /// Registry resolving connection identifiers at execution time
    registry: Arc<ConnectionRegistry>,
    closed: AtomicBool,
}

impl QueuedTransport {
    /// Wrap `transport`, registering it in the global connection registry.
    ///
    /// The entry is removed again on `close` or drop.
    pub fn new(
        connection_id: impl Into<String>,
        transport: SharedTransport,
        queue: SharedTaskQueue,
    ) -> ReportResult<Self> {
        Self::with_registry(connection_id, transport, queue, connection_registry())
    }

    /// Wrap `transport`, registering it in a specific registry.
    ///
    /// Tasks produced by this transport must be executed against the same
    /// registry.
    pub fn with_registry(
        connection_id: impl Into<String>,
        transport: SharedTransport,
        queue: SharedTaskQueue,
        registry: Arc<ConnectionRegistry>,
    ) -> ReportResult<Self> {
        let connection_id = connection_id.into();
        if connection_id.is_empty() {
            return Err(ReportError::config("Connection identifier must not be empty"));
        }

        registry.register(&connection_id, Arc::clone(&transport));

        Ok(Self {
            connection_id,
            queue_name: None,
            transport,
            queue,
            registry,
            closed: AtomicBool::new(false),
        })
    }

    /// Select the queue receiving delivery tasks.
    pub fn set_queue_name(&mut self, queue_name: impl Into<String>) {
        self.queue_name = Some(queue_name.into());
    }

    /// Builder form of [`set_queue_name`](Self::set_queue_name).
    pub fn with_queue_name(mut self, queue_name: impl Into<String>) -> Self {
        self.set_queue_name(queue_name);
        self
    }

    /// Connection identifier of this transport.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Queue receiving delivery tasks.
    pub fn queue_name(&self) -> &str {
        self.queue_name.as_deref().unwrap_or(DEFAULT_QUEUE_NAME)
    }

    /// Whether [`close`](Transport::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl Transport for QueuedTransport {
    async fn send(&self, event: &Event) -> ReportResult<()> {
        if self.is_closed() {
            return Err(ReportError::Closed);
        }

        let queue_name = self.queue_name();
        let task = DeliveryTask::new(&self.connection_id, queue_name, event.clone());

        match self.queue.enqueue(queue_name, task).await {
            Ok(task_id) => {
                #[cfg(feature = "metrics")]
                crate::metrics::record_enqueued(queue_name);

                tracing::debug!(
                    "Event {} queued as task {} on '{}' (connection '{}')",
                    event.id,
                    task_id,
                    queue_name,
                    redact_credentials(&self.connection_id)
                );
                Ok(())
            }
            Err(error) => {
                #[cfg(feature = "metrics")]
                crate::metrics::record_enqueue_failure(queue_name);

                tracing::warn!(
                    "Failed to queue event {} on '{}': {}",
                    event.id,
                    queue_name,
                    error
                );
                Err(ReportError::delivery(
                    format!("could not queue event {} on '{}'", event.id, queue_name),
                    error,
                ))
            }
        }
    }

    async fn close(&self) -> ReportResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        // Pending tasks stay with the queue; once the registry entry is
        // gone they fail with ConnectionNotFound.
        self.registry.unregister(&self.connection_id, &self.transport);
        tracing::debug!(
            "Closed queued connection '{}'",
            redact_credentials(&self.connection_id)
        );

        self.transport.close().await
    }
}

impl Drop for QueuedTransport {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.registry.unregister(&self.connection_id, &self.transport);
        }
    }
}

impl std::fmt::Debug for QueuedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedTransport")
            .field("connection_id", &redact_credentials(&self.connection_id))
            .field("queue_name", &self.queue_name())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
