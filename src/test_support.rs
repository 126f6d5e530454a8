//! Test doubles shared by the unit tests.

use crate::error::{ReportError, ReportResult};
use crate::event::Event;
use crate::queue::TaskQueue;
use crate::task::{DeliveryTask, TaskId};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Transport that remembers every event it was asked to send.
#[derive(Default)]
pub struct RecordingTransport {
    sent: tokio::sync::Mutex<Vec<Event>>,
    sent_count: AtomicUsize,
    close_count: AtomicUsize,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Event> {
        self.sent.lock().await.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent_count.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, event: &Event) -> ReportResult<()> {
        self.sent.lock().await.push(event.clone());
        self.sent_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&self) -> ReportResult<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport whose `send` never completes.
#[derive(Default)]
pub struct BlockingTransport {
    calls: AtomicUsize,
}

impl BlockingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for BlockingTransport {
    async fn send(&self, _event: &Event) -> ReportResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Transport that always fails.
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _event: &Event) -> ReportResult<()> {
        Err(ReportError::transport("backend rejected the event"))
    }
}

/// Queue that records submissions without running them.
#[derive(Default)]
pub struct RecordingQueue {
    submitted: Mutex<Vec<(String, DeliveryTask)>>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submitted(&self) -> Vec<(String, DeliveryTask)> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, queue_name: &str, task: DeliveryTask) -> ReportResult<TaskId> {
        let task_id = task.id.clone();
        self.submitted
            .lock()
            .unwrap()
            .push((queue_name.to_string(), task));
        Ok(task_id)
    }
}

/// Queue that is never available.
pub struct FailingQueue;

#[async_trait]
impl TaskQueue for FailingQueue {
    async fn enqueue(&self, queue_name: &str, _task: DeliveryTask) -> ReportResult<TaskId> {
        Err(ReportError::QueueError {
            message: format!("queue '{}' is unavailable", queue_name),
            source: None,
        })
    }

    async fn health_check(&self) -> ReportResult<()> {
        Err(ReportError::QueueError {
            message: "queue is unavailable".to_string(),
            source: None,
        })
    }
}
