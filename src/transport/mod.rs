//! Delivery channels for reported events.
//!
//! A [`Transport`] transmits a finalized [`Event`] to the reporting backend.
//! The HTTP transport of a reporting SDK is one implementation; the
//! [`QueuedTransport`] decorator is another that defers the work to a task
//! queue.

use crate::error::ReportResult;
use crate::event::Event;
use async_trait::async_trait;
use std::sync::Arc;

pub mod queued;
pub use queued::QueuedTransport;

/// A channel able to transmit events.
///
/// Implementations must be safe to call concurrently: a queued transport
/// shares one wrapped transport between every delivery task of its
/// connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit an event.
    async fn send(&self, event: &Event) -> ReportResult<()>;

    /// Release resources held by the transport.
    async fn close(&self) -> ReportResult<()> {
        Ok(())
    }
}

/// Convenient type alias for a shared transport
pub type SharedTransport = Arc<dyn Transport>;

/// Transport that writes events to the `tracing` log instead of a backend.
#[derive(Debug, Clone, Default)]
pub struct TracingTransport;

#[async_trait]
impl Transport for TracingTransport {
    async fn send(&self, event: &Event) -> ReportResult<()> {
        tracing::info!(
            event_id = %event.id,
            level = ?event.level,
            server_name = event.server_name.as_deref().unwrap_or("-"),
            tags = ?event.tags,
            "{}",
            event.message
        );
        Ok(())
    }
}
