//! Prometheus counters for queued delivery.
//!
//! Counters are recorded only once [`install`] has registered them; until
//! then every recording call is a no-op.
//!
//! ```promql
//! # Share of queued events that reached the backend
//! sum(rate(reportq_deliveries_total{outcome="delivered"}[5m]))
//! / sum(rate(reportq_tasks_enqueued_total[5m]))
//! ```

use crate::config::MetricsConfig;
use crate::error::{ReportError, ReportResult};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::{Arc, OnceLock};

static METRICS: OnceLock<Arc<DeliveryMetrics>> = OnceLock::new();

/// Counters describing queued delivery.
#[derive(Debug, Clone)]
pub struct DeliveryMetrics {
    /// Tasks accepted by a queue, by queue name
    pub enqueued: IntCounterVec,
    /// Tasks a queue refused, by queue name
    pub enqueue_failures: IntCounterVec,
    /// Executed tasks, by queue name and outcome (`delivered` | `failed`)
    pub deliveries: IntCounterVec,
}

impl DeliveryMetrics {
    /// Create the counters under a namespace, without registering them.
    pub fn new(namespace: &str) -> ReportResult<Self> {
        let counter = |name: &str, help: &str, labels: &[&str]| {
            IntCounterVec::new(Opts::new(name, help).namespace(namespace), labels)
                .map_err(metrics_error)
        };

        Ok(Self {
            enqueued: counter(
                "tasks_enqueued_total",
                "Delivery tasks accepted by a task queue",
                &["queue"],
            )?,
            enqueue_failures: counter(
                "enqueue_failures_total",
                "Delivery tasks a task queue refused",
                &["queue"],
            )?,
            deliveries: counter(
                "deliveries_total",
                "Executed delivery tasks by outcome",
                &["queue", "outcome"],
            )?,
        })
    }

    fn register(&self, registry: &Registry) -> ReportResult<()> {
        for counter in [&self.enqueued, &self.enqueue_failures, &self.deliveries] {
            registry
                .register(Box::new(counter.clone()))
                .map_err(metrics_error)?;
        }
        Ok(())
    }
}

fn metrics_error(error: prometheus::Error) -> ReportError {
    ReportError::MetricsError {
        message: error.to_string(),
    }
}

/// Register the delivery counters in `registry` and start recording.
///
/// Returns `None` when metrics are disabled. Installing twice returns the
/// counters installed first.
pub fn install(
    config: &MetricsConfig,
    registry: &Registry,
) -> ReportResult<Option<Arc<DeliveryMetrics>>> {
    if !config.enabled {
        return Ok(None);
    }
    if let Some(metrics) = METRICS.get() {
        return Ok(Some(Arc::clone(metrics)));
    }

    let metrics = DeliveryMetrics::new(&config.namespace)?;
    metrics.register(registry)?;

    let metrics = Arc::clone(METRICS.get_or_init(|| Arc::new(metrics)));
    tracing::info!("Delivery metrics registered under '{}'", config.namespace);
    Ok(Some(metrics))
}

/// Installed counters, if any.
pub fn installed() -> Option<Arc<DeliveryMetrics>> {
    METRICS.get().cloned()
}

pub(crate) fn record_enqueued(queue_name: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.enqueued.with_label_values(&[queue_name]).inc();
    }
}

pub(crate) fn record_enqueue_failure(queue_name: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics.enqueue_failures.with_label_values(&[queue_name]).inc();
    }
}

pub(crate) fn record_execution(queue_name: &str, delivered: bool) {
    if let Some(metrics) = METRICS.get() {
        let outcome = if delivered { "delivered" } else { "failed" };
        metrics
            .deliveries
            .with_label_values(&[queue_name, outcome])
            .inc();
    }
}
