//! The reporting client and its builder.
//!
//! A [`Client`] turns captured events into transport sends. It is assembled
//! by a [`ClientBuilder`] from a base transport, enrichers, and
//! [`ClientExtension`]s. Extensions are the seams where behavior is plugged
//! in: each may wrap the transport and contribute enrichers. Queued delivery
//! is one such extension ([`TaskQueueExtension`](crate::extension::TaskQueueExtension)).

use crate::enricher::EventEnricher;
use crate::error::{ReportError, ReportResult};
use crate::event::{EventBuilder, EventId, Level};
use crate::lookup::{ChainLookup, Dsn, Lookup};
use crate::transport::{SharedTransport, Transport};
use std::sync::Arc;

pub mod registry;
pub mod worker;

pub use registry::{ConnectionRegistry, connection_registry};
pub use worker::{DrainReport, WorkerPool, WorkerStats, drain_queue};

/// Capability plugged into a [`ClientBuilder`].
pub trait ClientExtension: Send + Sync {
    /// Wrap the outbound transport of the client being built.
    ///
    /// `dsn` and `lookup` give access to the client's options.
    fn wrap_transport(
        &self,
        dsn: &Dsn,
        lookup: &dyn Lookup,
        transport: SharedTransport,
    ) -> ReportResult<SharedTransport> {
        let _ = (dsn, lookup);
        Ok(transport)
    }

    /// Enrichers to register with the client being built.
    fn enrichers(&self) -> Vec<Arc<dyn EventEnricher>> {
        Vec::new()
    }
}

/// Builder assembling a [`Client`].
///
/// # Examples
///
/// ```rust
/// use reportq::prelude::*;
///
/// # async fn example() -> ReportResult<()> {
/// let queue = QueueFactory::in_memory(LocalQueueConfig::default());
///
/// let client = Client::builder(Dsn::new("https://key@reports.example.com/1")?)
///     .with_lookup(MapLookup::new().with(QUEUE_NAME_OPTION, "error-queue"))
///     .with_transport(TracingTransport)
///     .with_extension(
///         TaskQueueExtension::new(queue.clone())
///             .with_identity(StaticPlatformIdentity::new("v1")),
///     )
///     .build()?;
///
/// client.capture_message("cache miss storm", Level::Warning).await?;
/// assert_eq!(queue.len("error-queue").await, 1);
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    dsn: Dsn,
    lookup: Arc<dyn Lookup>,
    transport: Option<SharedTransport>,
    enrichers: Vec<Arc<dyn EventEnricher>>,
    extensions: Vec<Arc<dyn ClientExtension>>,
}

impl ClientBuilder {
    /// Start building a client for `dsn`.
    ///
    /// Options are read from the environment, then from the DSN, unless
    /// another lookup is supplied.
    pub fn new(dsn: Dsn) -> Self {
        Self {
            dsn,
            lookup: Arc::new(ChainLookup::default()),
            transport: None,
            enrichers: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Use a specific option lookup.
    pub fn with_lookup(mut self, lookup: impl Lookup + 'static) -> Self {
        self.lookup = Arc::new(lookup);
        self
    }

    /// Set the base transport.
    pub fn with_transport(self, transport: impl Transport + 'static) -> Self {
        self.with_shared_transport(Arc::new(transport))
    }

    /// Set the base transport from a shared handle.
    pub fn with_shared_transport(mut self, transport: SharedTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Register an enricher.
    pub fn with_enricher(mut self, enricher: impl EventEnricher + 'static) -> Self {
        self.enrichers.push(Arc::new(enricher));
        self
    }

    /// Plug in an extension. Extensions apply in registration order.
    pub fn with_extension(mut self, extension: impl ClientExtension + 'static) -> Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    /// Build the client.
    ///
    /// Fails when no transport was set, and with whatever error an extension
    /// (or the option lookup it consults) returns.
    pub fn build(self) -> ReportResult<Client> {
        let mut transport = self
            .transport
            .ok_or_else(|| ReportError::config("No transport configured"))?;
        let mut enrichers = self.enrichers;

        for extension in &self.extensions {
            transport = extension.wrap_transport(&self.dsn, self.lookup.as_ref(), transport)?;
            enrichers.extend(extension.enrichers());
        }

        tracing::debug!(
            "Built client with {} enrichers and {} extensions",
            enrichers.len(),
            self.extensions.len()
        );

        Ok(Client {
            dsn: self.dsn,
            transport,
            enrichers,
        })
    }
}

/// Reporting client.
pub struct Client {
    dsn: Dsn,
    transport: SharedTransport,
    enrichers: Vec<Arc<dyn EventEnricher>>,
}

impl Client {
    /// Start building a client for `dsn`.
    pub fn builder(dsn: Dsn) -> ClientBuilder {
        ClientBuilder::new(dsn)
    }

    /// DSN of the client.
    pub fn dsn(&self) -> &Dsn {
        &self.dsn
    }

    /// Outbound transport, after every extension wrapped it.
    pub fn transport(&self) -> &SharedTransport {
        &self.transport
    }

    /// Register an additional enricher.
    pub fn add_enricher(&mut self, enricher: Arc<dyn EventEnricher>) {
        self.enrichers.push(enricher);
    }

    /// Number of registered enrichers.
    pub fn enricher_count(&self) -> usize {
        self.enrichers.len()
    }

    /// Enrich, finalize and send an event.
    pub async fn capture(&self, mut builder: EventBuilder) -> ReportResult<EventId> {
        for enricher in &self.enrichers {
            enricher.enrich(&mut builder);
        }

        let event = builder.build();
        self.transport.send(&event).await?;

        tracing::debug!("Captured event {}", event.id);
        Ok(event.id)
    }

    /// Capture a plain message.
    pub async fn capture_message(
        &self,
        message: impl Into<String>,
        level: Level,
    ) -> ReportResult<EventId> {
        self.capture(EventBuilder::new().with_message(message).with_level(level))
            .await
    }

    /// Close the outbound transport.
    pub async fn close(&self) -> ReportResult<()> {
        self.transport.close().await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("dsn", &self.dsn)
            .field("enrichers", &self.enrichers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MapLookup;
    use crate::test_support::{FailingTransport, RecordingTransport};

    struct TaggingExtension;

    impl ClientExtension for TaggingExtension {
        fn enrichers(&self) -> Vec<Arc<dyn EventEnricher>> {
            vec![Arc::new(|builder: &mut EventBuilder| {
                builder.set_tag("extension", "tagging");
            })]
        }
    }

    /// Replaces whatever transport it is given.
    struct SwapExtension(Arc<RecordingTransport>);

    impl ClientExtension for SwapExtension {
        fn wrap_transport(
            &self,
            _dsn: &Dsn,
            _lookup: &dyn Lookup,
            _transport: SharedTransport,
        ) -> ReportResult<SharedTransport> {
            Ok(self.0.clone())
        }
    }

    fn dsn() -> Dsn {
        Dsn::new("https://public@reports.example.com/3").unwrap()
    }

    #[test]
    fn test_build_requires_transport() {
        let result = Client::builder(dsn()).build();
        assert!(matches!(result, Err(ReportError::ConfigError { .. })));
    }

    #[tokio::test]
    async fn test_capture_runs_enrichers_before_send() {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::builder(dsn())
            .with_lookup(MapLookup::new())
            .with_shared_transport(transport.clone())
            .with_enricher(|builder: &mut EventBuilder| {
                builder.set_tag("service", "checkout");
            })
            .with_extension(TaggingExtension)
            .build()
            .unwrap();

        assert_eq!(client.enricher_count(), 2);
        let event_id = client
            .capture(EventBuilder::new().with_message("oops"))
            .await
            .unwrap();

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, event_id);
        assert_eq!(sent[0].tag("service"), Some("checkout"));
        assert_eq!(sent[0].tag("extension"), Some("tagging"));
    }

    #[tokio::test]
    async fn test_extension_wraps_transport() {
        let base = Arc::new(RecordingTransport::new());
        let replacement = Arc::new(RecordingTransport::new());
        let client = Client::builder(dsn())
            .with_shared_transport(base.clone())
            .with_extension(SwapExtension(replacement.clone()))
            .build()
            .unwrap();

        client.capture_message("routed", Level::Info).await.unwrap();

        assert_eq!(base.sent_count(), 0);
        let sent = replacement.sent().await;
        assert_eq!(sent[0].message, "routed");
        assert_eq!(sent[0].level, Level::Info);
    }

    #[tokio::test]
    async fn test_add_enricher_after_build() {
        let transport = Arc::new(RecordingTransport::new());
        let mut client = Client::builder(dsn())
            .with_shared_transport(transport.clone())
            .build()
            .unwrap();
        client.add_enricher(Arc::new(|builder: &mut EventBuilder| {
            builder.set_tag("late", "yes");
        }));

        client.capture_message("late", Level::Error).await.unwrap();
        assert_eq!(transport.sent().await[0].tag("late"), Some("yes"));
    }

    #[tokio::test]
    async fn test_capture_propagates_transport_failure() {
        let client = Client::builder(dsn())
            .with_transport(FailingTransport)
            .build()
            .unwrap();

        let result = client.capture_message("lost", Level::Error).await;
        assert!(matches!(result, Err(ReportError::TransportError { .. })));
    }

    #[tokio::test]
    async fn test_close_closes_transport() {
        let transport = Arc::new(RecordingTransport::new());
        let client = Client::builder(dsn())
            .with_shared_transport(transport.clone())
            .build()
            .unwrap();

        client.close().await.unwrap();
        assert_eq!(transport.close_count(), 1);
        assert_eq!(client.dsn(), &dsn());
    }
}
