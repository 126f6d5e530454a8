//! Local worker pool for reportq.
//!
//! On a platform with managed task queues, the platform runs delivery tasks.
//! Everywhere else a [`WorkerPool`] plays that role: its workers poll a
//! [`TaskSource`], execute each task against the connection registry and
//! back off while the queue is empty.

use crate::config::{DurationExt, LocalQueueConfig, ReporterConfig};
use crate::core::registry::ConnectionRegistry;
use crate::error::{ReportError, ReportResult};
use crate::queue::TaskSource;
use crate::task::DeliveryTask;
use crate::utils::calculate_backoff;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{sleep, timeout};

/// Outcome of one task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The event reached the transport
    Delivered,
    /// The task failed (missing connection, transport error, or panic)
    Failed(String),
    /// The task ran past the task timeout and was abandoned
    TimedOut,
}

/// Statistics about worker pool activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Number of workers currently running
    pub active_workers: usize,
    /// Number of tasks delivered
    pub delivered: u64,
    /// Number of tasks that failed
    pub failed: u64,
    /// Number of tasks abandoned after the task timeout
    pub timed_out: u64,
    /// Average task processing time
    pub avg_task_duration: Option<Duration>,
}

impl WorkerStats {
    fn record(&mut self, outcome: &TaskOutcome, duration: Duration) {
        match outcome {
            TaskOutcome::Delivered => self.delivered += 1,
            TaskOutcome::Failed(_) => self.failed += 1,
            TaskOutcome::TimedOut => self.timed_out += 1,
        }

        // Simple moving average
        self.avg_task_duration = Some(match self.avg_task_duration {
            Some(avg) => (avg + duration) / 2,
            None => duration,
        });
    }

    /// Number of tasks processed, whatever their outcome.
    pub fn processed(&self) -> u64 {
        self.delivered + self.failed + self.timed_out
    }
}

/// Counts a worker as active for as long as it lives, aborted or not.
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(active: &Arc<AtomicUsize>) -> Self {
        active.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(active))
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Aborts the spawned delivery when the awaiting worker goes away.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Individual worker draining one queue
struct Worker {
    id: usize,
    queue_name: String,
    source: Arc<dyn TaskSource>,
    registry: Arc<ConnectionRegistry>,
    config: LocalQueueConfig,
    stats: Arc<Mutex<WorkerStats>>,
    active: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        tracing::debug!("Worker {} polling queue '{}'", self.id, self.queue_name);
        let _active = ActiveGuard::enter(&self.active);

        let mut empty_polls = 0u32;
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let idle = match self.source.dequeue(&self.queue_name).await {
                Ok(Some(task)) => {
                    empty_polls = 0;
                    self.process(task).await;
                    continue;
                }
                Ok(None) => {
                    empty_polls = empty_polls.saturating_add(1);
                    calculate_backoff(empty_polls, self.id as u64, self.config.idle_timeout_ms)
                }
                Err(error) => {
                    tracing::warn!(
                        "Worker {} could not poll queue '{}': {}",
                        self.id,
                        self.queue_name,
                        error
                    );
                    self.config.idle_timeout_ms
                }
            };

            tokio::select! {
                _ = sleep(idle.millis()) => {}
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::debug!("Worker {} stopped", self.id);
    }

    async fn process(&self, task: DeliveryTask) {
        let task_id = task.id.clone();
        let start_time = Instant::now();
        let outcome = execute_task(
            task,
            Arc::clone(&self.registry),
            self.config.task_timeout_secs.map(|secs| secs.secs()),
        )
        .await;
        let duration = start_time.elapsed();

        match &outcome {
            TaskOutcome::Delivered => {
                tracing::debug!(
                    "Worker {} delivered task {} in {:?}",
                    self.id,
                    task_id,
                    duration
                );
            }
            TaskOutcome::Failed(error) => {
                tracing::error!("Worker {} task {} failed: {}", self.id, task_id, error);
            }
            TaskOutcome::TimedOut => {
                tracing::error!("Worker {} task {} timed out", self.id, task_id);
            }
        }

        self.stats.lock().await.record(&outcome, duration);
    }
}

/// Execute a task on its own tokio task, so a panicking transport only
/// fails that task.
///
/// The delivery is aborted on timeout, and also when this future is dropped
/// (a worker aborted at shutdown), so it never outlives its worker.
async fn execute_task(
    task: DeliveryTask,
    registry: Arc<ConnectionRegistry>,
    task_timeout: Option<Duration>,
) -> TaskOutcome {
    let handle = tokio::spawn(async move { task.execute_with(&registry).await });
    let _abort = AbortOnDrop(handle.abort_handle());

    let joined = match task_timeout {
        Some(limit) => match timeout(limit, handle).await {
            Ok(joined) => joined,
            Err(_) => return TaskOutcome::TimedOut,
        },
        None => handle.await,
    };

    match joined {
        Ok(Ok(())) => TaskOutcome::Delivered,
        Ok(Err(error)) => TaskOutcome::Failed(error.to_string()),
        Err(join_error) => TaskOutcome::Failed(format!("Task panicked: {}", join_error)),
    }
}

/// Pool of workers executing the delivery tasks of one queue.
///
/// # Examples
///
/// ```rust
/// use reportq::prelude::*;
///
/// # async fn example() -> ReportResult<()> {
/// let queue = QueueFactory::in_memory(LocalQueueConfig::default());
/// let mut pool = WorkerPool::new(LocalQueueConfig::with_workers(2), queue.clone());
///
/// pool.start("error-queue")?;
/// // ... capture events through a client using `queue` ...
/// pool.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkerPool {
    config: LocalQueueConfig,
    source: Arc<dyn TaskSource>,
    registry: Arc<ConnectionRegistry>,
    stats: Arc<Mutex<WorkerStats>>,
    active: Arc<AtomicUsize>,
    queue_name: Option<String>,
    shutdown_tx: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a pool executing tasks against the global connection registry.
    pub fn new(config: LocalQueueConfig, source: Arc<dyn TaskSource>) -> Self {
        Self::with_registry(config, source, crate::core::registry::connection_registry())
    }

    /// Create a pool from the local queue settings of a [`ReporterConfig`].
    pub fn from_config(config: &ReporterConfig, source: Arc<dyn TaskSource>) -> Self {
        Self::new(config.local_queue.clone(), source)
    }

    /// Create a pool executing tasks against a specific registry.
    pub fn with_registry(
        config: LocalQueueConfig,
        source: Arc<dyn TaskSource>,
        registry: Arc<ConnectionRegistry>,
    ) -> Self {
        Self {
            config,
            source,
            registry,
            stats: Arc::new(Mutex::new(WorkerStats::default())),
            active: Arc::new(AtomicUsize::new(0)),
            queue_name: None,
            shutdown_tx: None,
            handles: Vec::new(),
        }
    }

    /// Spawn the workers on the named queue.
    pub fn start(&mut self, queue_name: impl Into<String>) -> ReportResult<()> {
        if self.is_running() {
            return Err(ReportError::AlreadyRunning);
        }

        let queue_name = queue_name.into();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        for id in 0..self.config.num_workers {
            let worker = Worker {
                id,
                queue_name: queue_name.clone(),
                source: Arc::clone(&self.source),
                registry: Arc::clone(&self.registry),
                config: self.config.clone(),
                stats: Arc::clone(&self.stats),
                active: Arc::clone(&self.active),
            };
            self.handles.push(tokio::spawn(worker.run(shutdown_rx.clone())));
        }

        tracing::info!(
            "Started {} workers on queue '{}'",
            self.config.num_workers,
            queue_name
        );

        self.queue_name = Some(queue_name);
        self.shutdown_tx = Some(shutdown_tx);
        Ok(())
    }

    /// Stop the workers, letting in-flight tasks finish.
    ///
    /// Workers still busy after the shutdown timeout are aborted.
    pub async fn stop(&mut self) -> ReportResult<()> {
        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            return Err(ReportError::NotRunning);
        };
        // Receivers may already be gone if every worker exited
        let _ = shutdown_tx.send(true);

        let handles = std::mem::take(&mut self.handles);
        let abort_handles: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let joined = futures::future::join_all(handles);
        tokio::pin!(joined);

        match self.config.shutdown_timeout_secs {
            Some(secs) => {
                if timeout(secs.secs(), joined.as_mut()).await.is_err() {
                    tracing::warn!("Workers did not stop within {}s, aborting", secs);
                    abort_handles.iter().for_each(AbortHandle::abort);
                    // Aborted workers resolve right away; wait so their guards have run.
                    joined.await;
                }
            }
            None => {
                joined.await;
            }
        }

        tracing::info!(
            "Stopped workers on queue '{}'",
            self.queue_name.take().unwrap_or_default()
        );
        Ok(())
    }

    /// Whether the workers are running.
    pub fn is_running(&self) -> bool {
        self.shutdown_tx.is_some()
    }

    /// Queue being drained, while running.
    pub fn queue_name(&self) -> Option<&str> {
        self.queue_name.as_deref()
    }

    /// Number of workers spawned by [`start`](Self::start).
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Current statistics.
    pub async fn stats(&self) -> WorkerStats {
        let mut stats = self.stats.lock().await.clone();
        stats.active_workers = self.active.load(Ordering::SeqCst);
        stats
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .field("queue_name", &self.queue_name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

/// Result of [`drain_queue`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Tasks whose event reached the transport
    pub delivered: u64,
    /// Tasks that failed
    pub failed: u64,
}

/// Execute every pending task of a queue on the current task, in order.
///
/// Task failures are counted, not returned; a failure to read the queue is.
pub async fn drain_queue(
    source: &dyn TaskSource,
    queue_name: &str,
    registry: &ConnectionRegistry,
) -> ReportResult<DrainReport> {
    let mut report = DrainReport::default();

    while let Some(task) = source.dequeue(queue_name).await? {
        match task.execute_with(registry).await {
            Ok(()) => report.delivered += 1,
            Err(error) => {
                tracing::warn!("Task {} failed: {}", task.id, error);
                report.failed += 1;
            }
        }
    }

    tracing::debug!(
        "Drained queue '{}': {} delivered, {} failed",
        queue_name,
        report.delivered,
        report.failed
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;
    use crate::queue::{InMemoryTaskQueue, TaskQueue};
    use crate::test_support::{BlockingTransport, FailingTransport, RecordingTransport};

    fn task(connection_id: &str) -> DeliveryTask {
        DeliveryTask::new(
            connection_id,
            "q",
            EventBuilder::new().with_message("boom").build(),
        )
    }

    fn fast_config(workers: usize) -> LocalQueueConfig {
        LocalQueueConfig::with_workers(workers)
            .with_idle_timeout(20)
            .with_task_timeout(1)
            .with_shutdown_timeout(5)
    }

    async fn wait_for_processed(pool: &WorkerPool, expected: u64) -> WorkerStats {
        for _ in 0..200 {
            let stats = pool.stats().await;
            if stats.processed() >= expected {
                return stats;
            }
            sleep(Duration::from_millis(10)).await;
        }
        pool.stats().await
    }

    #[tokio::test]
    async fn test_pool_delivers_queued_tasks() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let transport = Arc::new(RecordingTransport::new());
        registry.register("conn", transport.clone());

        for _ in 0..5 {
            queue.enqueue("q", task("conn")).await.unwrap();
        }

        let mut pool = WorkerPool::with_registry(fast_config(2), queue.clone(), registry);
        pool.start("q").unwrap();
        assert_eq!(pool.queue_name(), Some("q"));

        let stats = wait_for_processed(&pool, 5).await;
        pool.stop().await.unwrap();

        assert_eq!(stats.delivered, 5);
        assert_eq!(transport.sent_count(), 5);
        assert!(queue.is_empty("q").await);
        assert_eq!(pool.stats().await.active_workers, 0);
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let registry = Arc::new(ConnectionRegistry::new());
        registry.register("broken", Arc::new(FailingTransport));

        queue.enqueue("q", task("broken")).await.unwrap();
        queue.enqueue("q", task("closed")).await.unwrap();

        let mut pool = WorkerPool::with_registry(fast_config(1), queue, registry);
        pool.start("q").unwrap();
        let stats = wait_for_processed(&pool, 2).await;
        pool.stop().await.unwrap();

        assert_eq!(stats.failed, 2);
        assert_eq!(stats.delivered, 0);
    }

    #[tokio::test]
    async fn test_stuck_task_times_out() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let transport = Arc::new(BlockingTransport::new());
        registry.register("stuck", transport.clone());
        queue.enqueue("q", task("stuck")).await.unwrap();

        let mut pool = WorkerPool::with_registry(fast_config(1), queue, registry);
        pool.start("q").unwrap();
        let stats = wait_for_processed(&pool, 1).await;
        pool.stop().await.unwrap();

        assert_eq!(stats.timed_out, 1);
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_stop_aborts_busy_worker() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let transport = Arc::new(BlockingTransport::new());
        registry.register("stuck", transport.clone());
        queue.enqueue("q", task("stuck")).await.unwrap();

        let config = LocalQueueConfig {
            task_timeout_secs: None,
            ..fast_config(1).with_shutdown_timeout(1)
        };
        let mut pool = WorkerPool::with_registry(config, queue, registry.clone());
        pool.start("q").unwrap();

        for _ in 0..200 {
            if transport.calls() == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(transport.calls(), 1);
        assert_eq!(pool.stats().await.active_workers, 1);

        pool.stop().await.unwrap();
        assert!(!pool.is_running());
        assert_eq!(pool.stats().await.active_workers, 0);

        // The blocked delivery is aborted with its worker and releases the
        // transport it borrowed from the registry.
        registry.remove("stuck");
        for _ in 0..100 {
            if Arc::strong_count(&transport) == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(Arc::strong_count(&transport), 1);
    }

    #[tokio::test]
    async fn test_pool_from_config() {
        let config = ReporterConfig::testing();
        let pool = WorkerPool::from_config(&config, Arc::new(InMemoryTaskQueue::new()));

        assert_eq!(pool.num_workers(), config.local_queue.num_workers);
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_start_and_stop_state() {
        let queue = Arc::new(InMemoryTaskQueue::new());
        let mut pool = WorkerPool::with_registry(
            fast_config(3),
            queue,
            Arc::new(ConnectionRegistry::new()),
        );

        assert!(matches!(pool.stop().await, Err(ReportError::NotRunning)));

        pool.start("q").unwrap();
        assert!(pool.is_running());
        assert_eq!(pool.num_workers(), 3);
        assert!(matches!(pool.start("q"), Err(ReportError::AlreadyRunning)));

        pool.stop().await.unwrap();
        assert!(!pool.is_running());
        assert_eq!(pool.queue_name(), None);

        // Restartable on another queue
        pool.start("other").unwrap();
        pool.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_drain_queue() {
        let queue = InMemoryTaskQueue::new();
        let registry = ConnectionRegistry::new();
        let transport = Arc::new(RecordingTransport::new());
        registry.register("conn", transport.clone());

        queue.enqueue("q", task("conn")).await.unwrap();
        queue.enqueue("q", task("gone")).await.unwrap();
        queue.enqueue("q", task("conn")).await.unwrap();

        let report = drain_queue(&queue, "q", &registry).await.unwrap();

        assert_eq!(
            report,
            DrainReport {
                delivered: 2,
                failed: 1,
            }
        );
        assert_eq!(transport.sent_count(), 2);
        assert!(queue.is_empty("q").await);
    }

    #[test]
    fn test_stats_average() {
        let mut stats = WorkerStats::default();
        stats.record(&TaskOutcome::Delivered, Duration::from_millis(10));
        stats.record(&TaskOutcome::TimedOut, Duration::from_millis(30));

        assert_eq!(stats.processed(), 2);
        assert_eq!(stats.avg_task_duration, Some(Duration::from_millis(20)));
    }
}
