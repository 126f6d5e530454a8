//! Task queue backends for reportq.
//!
//! A [`TaskQueue`] accepts delivery tasks under a queue name; something else
//! (the platform, or the local [`WorkerPool`](crate::core::WorkerPool))
//! runs them later. Two backends ship with the crate:
//! - **In-Memory**: single-process, for development and tests
//! - **Redis**: tasks shared between processes through Redis lists
//!
//! # Examples
//!
//! ```rust,no_run
//! use reportq::prelude::*;
//!
//! # async fn example() -> ReportResult<()> {
//! // In-memory queue (default)
//! let queue = QueueFactory::in_memory(LocalQueueConfig::default());
//!
//! // Redis queue (requires redis-queue feature)
//! # #[cfg(feature = "redis-queue")]
//! let queue = QueueFactory::redis(RedisConfig::new("redis://localhost:6379")).await?;
//!
//! // Whatever the configuration selects
//! let handle = QueueFactory::from_config(&ReporterConfig::production()).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::{LocalQueueConfig, ReporterConfig};
use crate::error::ReportResult;
use crate::task::{DeliveryTask, TaskId};
use async_trait::async_trait;
use std::sync::Arc;

pub mod memory;
pub use memory::InMemoryTaskQueue;

#[cfg(feature = "redis-queue")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
pub mod redis;

#[cfg(feature = "redis-queue")]
#[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
pub use self::redis::RedisTaskQueue;

/// Name of the queue used when none is configured.
pub const DEFAULT_QUEUE_NAME: &str = "default";

/// Statistics about one named queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of tasks waiting to run
    pub pending: u64,
    /// Number of tasks ever accepted
    pub enqueued: u64,
    /// Number of tasks handed to a worker
    pub dispatched: u64,
}

/// Submission side of a task queue.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Submit a task to the named queue.
    ///
    /// Returns once the queue has accepted the task; the task runs later.
    async fn enqueue(&self, queue_name: &str, task: DeliveryTask) -> ReportResult<TaskId>;

    /// Health check for the queue backend
    async fn health_check(&self) -> ReportResult<()> {
        Ok(())
    }
}

/// Execution side of a task queue, used by the local worker pool.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Take the next task of the named queue, if any.
    async fn dequeue(&self, queue_name: &str) -> ReportResult<Option<DeliveryTask>>;
}

/// Convenient type alias for a shared queue backend
pub type SharedTaskQueue = Arc<dyn TaskQueue>;

/// Both sides of one queue backend: submission for clients, execution for
/// the local worker pool.
#[derive(Clone)]
pub struct QueueHandle {
    /// Submission side, handed to [`TaskQueueExtension`](crate::extension::TaskQueueExtension)
    pub queue: SharedTaskQueue,
    /// Execution side, handed to [`WorkerPool`](crate::core::WorkerPool)
    pub source: Arc<dyn TaskSource>,
}

impl QueueHandle {
    /// Share one backend between both sides.
    pub fn new<Q>(backend: Arc<Q>) -> Self
    where
        Q: TaskQueue + TaskSource + 'static,
    {
        Self {
            queue: backend.clone(),
            source: backend,
        }
    }
}

impl std::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueHandle").finish_non_exhaustive()
    }
}

/// Factory methods for creating queue backends
pub struct QueueFactory;

impl QueueFactory {
    /// Create an in-memory queue
    pub fn in_memory(config: LocalQueueConfig) -> Arc<InMemoryTaskQueue> {
        Arc::new(InMemoryTaskQueue::with_config(config))
    }

    /// Create the backend selected by a validated [`ReporterConfig`].
    ///
    /// A Redis queue when `redis` is set (with the `redis-queue` feature),
    /// an in-memory queue sized by `local_queue` otherwise.
    pub async fn from_config(config: &ReporterConfig) -> ReportResult<QueueHandle> {
        config.ensure_valid()?;

        #[cfg(feature = "redis-queue")]
        if let Some(redis) = &config.redis {
            return Ok(QueueHandle::new(Self::redis(redis.clone()).await?));
        }

        Ok(QueueHandle::new(Self::in_memory(config.local_queue.clone())))
    }

    /// Create a Redis queue
    #[cfg(feature = "redis-queue")]
    #[cfg_attr(docsrs, doc(cfg(feature = "redis-queue")))]
    pub async fn redis(config: crate::config::RedisConfig) -> ReportResult<Arc<RedisTaskQueue>> {
        let queue = RedisTaskQueue::new(config).await?;
        Ok(Arc::new(queue))
    }
}
