//! # reportq
//!
//! Queue-backed delivery for error reports.
//!
//! Sending an error report usually means an HTTP round trip on the request
//! that hit the error. reportq moves that work off the request path: a
//! [`QueuedTransport`] hands each event to a task queue and returns as soon as
//! the queue accepted it. A worker later executes the task, which finds the
//! original transport through the connection registry and sends the event.
//!
//! ## Features
//!
//! - **Drop-in transport**: [`QueuedTransport`] honours the same contract as
//!   the transport it wraps
//! - **Client extension**: [`TaskQueueExtension`] wires queued delivery and
//!   platform enrichment into a [`Client`] from its options
//! - **Local workers**: [`WorkerPool`] runs delivery tasks where no platform
//!   queue exists
//! - **Backends**: in-memory and Redis (`redis-queue` feature) task queues
//! - **Observability**: `tracing` logs and Prometheus counters (`metrics`
//!   feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use reportq::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> ReportResult<()> {
//!     let queue = QueueFactory::in_memory(LocalQueueConfig::default());
//!
//!     let client = Client::builder(Dsn::new("https://key@reports.example.com/42")?)
//!         .with_lookup(MapLookup::new().with(QUEUE_NAME_OPTION, "error-queue"))
//!         .with_transport(TracingTransport)
//!         .with_extension(TaskQueueExtension::new(queue.clone()))
//!         .build()?;
//!
//!     let mut pool = WorkerPool::new(LocalQueueConfig::with_workers(2), queue);
//!     pool.start("error-queue")?;
//!
//!     client.capture_message("upstream timed out", Level::Error).await?;
//!
//!     pool.stop().await?;
//!     client.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod enricher;
pub mod error;
pub mod event;
pub mod extension;
pub mod logging;
pub mod lookup;
pub mod queue;
pub mod task;
pub mod transport;
pub mod utils;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub mod metrics;

#[cfg(test)]
mod test_support;

pub mod prelude {
    pub use crate::config::*;
    pub use crate::core::{
        Client, ClientBuilder, ClientExtension, ConnectionRegistry, DrainReport, WorkerPool,
        WorkerStats, connection_registry, drain_queue,
    };
    pub use crate::enricher::{
        EnvPlatformIdentity, EventEnricher, PlatformEnricher, PlatformIdentityProvider,
        StaticPlatformIdentity,
    };
    pub use crate::error::{ReportError, ReportResult};
    pub use crate::event::{Event, EventBuilder, EventId, Level};
    pub use crate::extension::TaskQueueExtension;
    pub use crate::logging::init_logging;
    pub use crate::lookup::{ChainLookup, Dsn, DsnLookup, EnvLookup, Lookup, MapLookup};
    pub use crate::queue::{
        DEFAULT_QUEUE_NAME, InMemoryTaskQueue, QueueFactory, QueueHandle, SharedTaskQueue,
        TaskQueue, TaskSource,
    };
    pub use crate::task::{DeliveryTask, TaskId};
    pub use crate::transport::{QueuedTransport, SharedTransport, TracingTransport, Transport};
    pub use async_trait::async_trait;

    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    pub use crate::queue::RedisTaskQueue;

    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub use crate::metrics::DeliveryMetrics;
}

pub use crate::core::{Client, ClientBuilder, ClientExtension, WorkerPool};
pub use crate::error::{ReportError, ReportResult};
pub use crate::event::{Event, EventBuilder, Level};
pub use crate::extension::TaskQueueExtension;
pub use crate::lookup::{Dsn, Lookup};
pub use crate::queue::{TaskQueue, TaskSource};
pub use crate::task::DeliveryTask;
pub use crate::transport::{QueuedTransport, Transport};
pub use async_trait::async_trait;
