//! Redis queue implementation for reportq.
//!
//! Each named queue is a Redis list under `{prefix}:queue:{name}`. Tasks are
//! pushed on the left and popped on the right, so the list is a FIFO shared
//! by every process connected to the same Redis.
//!
//! A task only references its transport by connection identifier. The
//! process that pops it must have a transport registered under that
//! identifier, otherwise execution fails with `ConnectionNotFound`.

use super::{TaskQueue, TaskSource};
use crate::config::{DurationExt, RedisConfig};
use crate::error::{ReportError, ReportResult};
use crate::task::{DeliveryTask, TaskId};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::time::timeout;
use tracing::{debug, info};

/// Redis queue backend implementation
pub struct RedisTaskQueue {
    /// Redis connection manager
    conn: ConnectionManager,
    /// Redis configuration
    config: RedisConfig,
}

impl std::fmt::Debug for RedisTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTaskQueue")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RedisTaskQueue {
    /// Connect to Redis.
    pub async fn new(config: RedisConfig) -> ReportResult<Self> {
        let client = Client::open(config.connection_string.as_str())
            .map_err(|e| ReportError::queue(format!("Failed to create Redis client: {}", e), e))?;

        let conn = timeout(
            config.connect_timeout_secs.secs(),
            client.get_connection_manager(),
        )
        .await
        .map_err(|e| ReportError::queue("Timed out connecting to Redis", e))?
        .map_err(|e| {
            ReportError::queue(
                format!("Failed to create Redis connection manager: {}", e),
                e,
            )
        })?;

        info!("Connected to Redis with key prefix '{}'", config.key_prefix);

        Ok(Self { conn, config })
    }

    /// Redis key of a named queue.
    pub fn queue_key(&self, queue_name: &str) -> String {
        format!("{}:queue:{}", self.config.key_prefix, queue_name)
    }

    /// Number of pending tasks in a queue.
    pub async fn len(&self, queue_name: &str) -> ReportResult<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.llen(self.queue_key(queue_name)).await?)
    }

    /// Drop every pending task of a queue. Returns how many were dropped.
    pub async fn purge(&self, queue_name: &str) -> ReportResult<u64> {
        let key = self.queue_key(queue_name);
        let mut conn = self.conn.clone();

        let (purged, _): (u64, u64) = redis::pipe()
            .atomic()
            .llen(&key)
            .del(&key)
            .query_async(&mut conn)
            .await?;

        debug!("Purged {} tasks from Redis queue '{}'", purged, queue_name);
        Ok(purged)
    }
}

#[async_trait]
impl TaskQueue for RedisTaskQueue {
    async fn enqueue(&self, queue_name: &str, mut task: DeliveryTask) -> ReportResult<TaskId> {
        task.queue_name = queue_name.to_string();
        let task_id = task.id.clone();
        let payload = serde_json::to_string(&task)?;

        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(self.queue_key(queue_name), payload)
            .await
            .map_err(|e| {
                ReportError::queue(format!("Failed to enqueue task {}: {}", task_id, e), e)
            })?;

        debug!("Enqueued task {} on Redis queue '{}'", task_id, queue_name);
        Ok(task_id)
    }

    async fn health_check(&self) -> ReportResult<()> {
        let mut conn = self.conn.clone();

        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| ReportError::queue(format!("Redis health check failed: {}", e), e))?;

        if pong != "PONG" {
            return Err(ReportError::QueueError {
                message: "Redis health check failed: unexpected response".to_string(),
                source: None,
            });
        }

        debug!("Redis queue health check passed");
        Ok(())
    }
}

#[async_trait]
impl TaskSource for RedisTaskQueue {
    async fn dequeue(&self, queue_name: &str) -> ReportResult<Option<DeliveryTask>> {
        let mut conn = self.conn.clone();

        let payload: Option<String> = conn
            .rpop(self.queue_key(queue_name), None)
            .await
            .map_err(|e| ReportError::queue(format!("Failed to dequeue task: {}", e), e))?;

        payload
            .map(|payload| serde_json::from_str(&payload).map_err(ReportError::from))
            .transpose()
    }
}
