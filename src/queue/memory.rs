//! In-memory task queue for reportq.
//!
//! This backend keeps one FIFO per queue name in process memory. It is meant
//! for development, tests, and single-process deployments where the local
//! [`WorkerPool`](crate::core::WorkerPool) plays the role of the platform's
//! queue workers. Nothing survives a restart.

use super::{QueueStats, TaskQueue, TaskSource};
use crate::config::LocalQueueConfig;
use crate::error::{ReportError, ReportResult};
use crate::task::{DeliveryTask, TaskId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// In-memory queue backend implementation
#[derive(Debug)]
pub struct InMemoryTaskQueue {
    /// Pending tasks by queue name (FIFO)
    queues: RwLock<HashMap<String, VecDeque<DeliveryTask>>>,
    /// Statistics counters by queue name
    stats: RwLock<HashMap<String, QueueStats>>,
    /// Queue configuration
    config: LocalQueueConfig,
}

impl InMemoryTaskQueue {
    /// Create a new in-memory queue with default configuration
    pub fn new() -> Self {
        Self::with_config(LocalQueueConfig::default())
    }

    /// Create a new in-memory queue with custom configuration
    pub fn with_config(config: LocalQueueConfig) -> Self {
        Self {
            queues: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Number of pending tasks in a queue.
    pub async fn len(&self, queue_name: &str) -> usize {
        let queues = self.queues.read().await;
        queues.get(queue_name).map_or(0, VecDeque::len)
    }

    /// Whether a queue has no pending task.
    pub async fn is_empty(&self, queue_name: &str) -> bool {
        self.len(queue_name).await == 0
    }

    /// Snapshot of the pending tasks of a queue, oldest first.
    pub async fn pending(&self, queue_name: &str) -> Vec<DeliveryTask> {
        let queues = self.queues.read().await;
        queues
            .get(queue_name)
            .map(|queue| queue.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Names of every queue that ever received a task, sorted.
    pub async fn queue_names(&self) -> Vec<String> {
        let stats = self.stats.read().await;
        let mut names: Vec<String> = stats.keys().cloned().collect();
        names.sort();
        names
    }

    /// Statistics for a queue.
    pub async fn stats(&self, queue_name: &str) -> QueueStats {
        let stats = self.stats.read().await;
        stats.get(queue_name).cloned().unwrap_or_default()
    }

    /// Drop every pending task of a queue. Returns how many were dropped.
    pub async fn purge(&self, queue_name: &str) -> u64 {
        let purged = {
            let mut queues = self.queues.write().await;
            queues
                .get_mut(queue_name)
                .map_or(0, |queue| queue.drain(..).count()) as u64
        };

        if let Some(stats) = self.stats.write().await.get_mut(queue_name) {
            stats.pending = 0;
        }

        tracing::debug!("Purged {} tasks from queue '{}'", purged, queue_name);
        purged
    }
}

impl Default for InMemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, queue_name: &str, mut task: DeliveryTask) -> ReportResult<TaskId> {
        let task_id = task.id.clone();
        task.queue_name = queue_name.to_string();

        let pending = {
            let mut queues = self.queues.write().await;
            let queue = queues.entry(queue_name.to_string()).or_default();

            // Check queue size limit
            if self.config.max_queue_size != 0 && queue.len() >= self.config.max_queue_size {
                return Err(ReportError::QueueError {
                    message: format!(
                        "Queue '{}' is full (max size: {})",
                        queue_name, self.config.max_queue_size
                    ),
                    source: None,
                });
            }

            queue.push_back(task);
            queue.len() as u64
        };

        {
            let mut stats = self.stats.write().await;
            let stats = stats.entry(queue_name.to_string()).or_default();
            stats.enqueued += 1;
            stats.pending = pending;
        }

        tracing::debug!("Enqueued task {} on queue '{}'", task_id, queue_name);
        Ok(task_id)
    }

    async fn health_check(&self) -> ReportResult<()> {
        let queues = self.queues.read().await;
        let pending: usize = queues.values().map(VecDeque::len).sum();

        tracing::debug!(
            "Queue health check: {} queues, {} pending tasks",
            queues.len(),
            pending
        );

        Ok(())
    }
}

#[async_trait]
impl TaskSource for InMemoryTaskQueue {
    async fn dequeue(&self, queue_name: &str) -> ReportResult<Option<DeliveryTask>> {
        let (task, pending) = {
            let mut queues = self.queues.write().await;
            match queues.get_mut(queue_name) {
                Some(queue) => (queue.pop_front(), queue.len() as u64),
                None => (None, 0),
            }
        };

        if let Some(task) = &task {
            let mut stats = self.stats.write().await;
            let stats = stats.entry(queue_name.to_string()).or_default();
            stats.dispatched += 1;
            stats.pending = pending;

            tracing::debug!("Dequeued task {} from queue '{}'", task.id, queue_name);
        }

        Ok(task)
    }
}
