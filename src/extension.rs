//! Client extension enabling queued delivery.
//!
//! [`TaskQueueExtension`] wraps the client's transport in a
//! [`QueuedTransport`] and registers a [`PlatformEnricher`]. Queue name and
//! connection identifier are read from the client's options
//! ([`QUEUE_NAME_OPTION`](crate::config::QUEUE_NAME_OPTION),
//! [`CONNECTION_ID_OPTION`](crate::config::CONNECTION_ID_OPTION)).

use crate::config::{DeliveryConfig, ReporterConfig};
use crate::core::ClientExtension;
use crate::core::registry::{ConnectionRegistry, connection_registry};
use crate::enricher::{
    EnvPlatformIdentity, EventEnricher, PlatformEnricher, PlatformIdentityProvider,
};
use crate::error::ReportResult;
use crate::lookup::{Dsn, Lookup};
use crate::queue::SharedTaskQueue;
use crate::transport::{QueuedTransport, SharedTransport};
use std::sync::Arc;

/// Prefix of derived connection identifiers.
pub const CONNECTION_ID_NAMESPACE: &str = "reportq::TaskQueueExtension";

/// Extension routing a client's events through a task queue.
pub struct TaskQueueExtension {
    queue: SharedTaskQueue,
    identity: Arc<dyn PlatformIdentityProvider>,
    registry: Arc<ConnectionRegistry>,
    defaults: DeliveryConfig,
}

impl TaskQueueExtension {
    /// Create an extension submitting to `queue`.
    ///
    /// Platform identity comes from the environment and transports are
    /// registered in the global connection registry.
    pub fn new(queue: SharedTaskQueue) -> Self {
        Self {
            queue,
            identity: Arc::new(EnvPlatformIdentity::new()),
            registry: connection_registry(),
            defaults: DeliveryConfig::default(),
        }
    }

    /// Create an extension taking its delivery defaults from a
    /// [`ReporterConfig`].
    ///
    /// Options found through the client's lookup still win over
    /// `config.delivery`.
    pub fn from_config(queue: SharedTaskQueue, config: &ReporterConfig) -> Self {
        Self::new(queue).with_defaults(config.delivery.clone())
    }

    /// Use a specific platform identity provider.
    pub fn with_identity(mut self, identity: impl PlatformIdentityProvider + 'static) -> Self {
        self.identity = Arc::new(identity);
        self
    }

    /// Register transports in a specific registry.
    pub fn with_registry(mut self, registry: Arc<ConnectionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Delivery options used when the client's options leave them unset.
    pub fn with_defaults(mut self, defaults: DeliveryConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Identifier derived for a DSN when none is configured.
    ///
    /// The namespace, the DSN and the runtime version are concatenated as is.
    /// Distinct inputs can in principle produce the same identifier. The DSN
    /// keeps its credentials, so the identifier must not be logged verbatim
    /// (see [`redact_credentials`](crate::utils::redact_credentials)).
    pub fn fallback_connection_id(&self, dsn: &Dsn) -> String {
        format!(
            "{}{}{}",
            CONNECTION_ID_NAMESPACE,
            dsn,
            self.identity.runtime_version().unwrap_or_default()
        )
    }

    /// Connection identifier for a client, configured or derived.
    pub fn connection_id(&self, dsn: &Dsn, lookup: &dyn Lookup) -> ReportResult<String> {
        let config = DeliveryConfig::from_lookup(lookup, dsn)?.or(&self.defaults);
        Ok(config
            .connection_id
            .unwrap_or_else(|| self.fallback_connection_id(dsn)))
    }

    /// Wrap `transport` in a queued transport configured from the options.
    pub fn wrap(
        &self,
        dsn: &Dsn,
        lookup: &dyn Lookup,
        transport: SharedTransport,
    ) -> ReportResult<QueuedTransport> {
        let config = DeliveryConfig::from_lookup(lookup, dsn)?.or(&self.defaults);
        let connection_id = config
            .connection_id
            .unwrap_or_else(|| self.fallback_connection_id(dsn));

        let mut queued = QueuedTransport::with_registry(
            connection_id,
            transport,
            Arc::clone(&self.queue),
            Arc::clone(&self.registry),
        )?;
        if let Some(queue_name) = config.queue_name {
            queued.set_queue_name(queue_name);
        }

        // Derived identifiers embed the full DSN; log the redacted form only.
        tracing::info!(
            "Queued delivery enabled for {} on queue '{}'",
            dsn.redacted(),
            queued.queue_name()
        );
        Ok(queued)
    }
}

impl ClientExtension for TaskQueueExtension {
    fn wrap_transport(
        &self,
        dsn: &Dsn,
        lookup: &dyn Lookup,
        transport: SharedTransport,
    ) -> ReportResult<SharedTransport> {
        Ok(Arc::new(self.wrap(dsn, lookup, transport)?))
    }

    fn enrichers(&self) -> Vec<Arc<dyn EventEnricher>> {
        vec![Arc::new(PlatformEnricher::new(Arc::clone(&self.identity)))]
    }
}

impl std::fmt::Debug for TaskQueueExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueueExtension")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
