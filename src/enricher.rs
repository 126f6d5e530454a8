//! Event enrichment with platform identity.
//!
//! Enrichers run on every event before it is finalized. The
//! [`PlatformEnricher`] stamps the runtime version, application id and
//! instance id of the hosting platform onto the event, reading them from an
//! injected [`PlatformIdentityProvider`].

use crate::event::EventBuilder;
use std::sync::Arc;

/// Tag carrying the runtime version of the platform.
pub const RUNTIME_VERSION_TAG: &str = "runtime.version";

/// Tag carrying the application identifier on the platform.
pub const APPLICATION_ID_TAG: &str = "runtime.application_id";

/// Hook invoked on every event under construction.
///
/// Implementations must be idempotent and touch nothing but the builder:
/// the same enricher runs concurrently for unrelated events.
pub trait EventEnricher: Send + Sync {
    /// Add fields to the event being built.
    fn enrich(&self, builder: &mut EventBuilder);
}

impl<F> EventEnricher for F
where
    F: Fn(&mut EventBuilder) + Send + Sync,
{
    fn enrich(&self, builder: &mut EventBuilder) {
        self(builder)
    }
}

/// Source of the ambient identity of the hosting platform.
pub trait PlatformIdentityProvider: Send + Sync {
    /// Version of the currently deployed runtime.
    fn runtime_version(&self) -> Option<String>;

    /// Identifier of the application on the platform.
    fn application_id(&self) -> Option<String> {
        None
    }

    /// Identifier of the instance serving the current request.
    fn instance_id(&self) -> Option<String> {
        None
    }
}

/// Reads platform identity from environment variables.
///
/// Defaults follow the variables App Engine sets for every instance.
#[derive(Debug, Clone)]
pub struct EnvPlatformIdentity {
    version_var: String,
    application_var: String,
    instance_var: String,
}

impl EnvPlatformIdentity {
    /// Variable holding the runtime version
    pub const VERSION_VAR: &'static str = "GAE_VERSION";
    /// Variable holding the application identifier
    pub const APPLICATION_VAR: &'static str = "GAE_APPLICATION";
    /// Variable holding the instance identifier
    pub const INSTANCE_VAR: &'static str = "GAE_INSTANCE";

    /// Create a provider reading the default variables.
    pub fn new() -> Self {
        Self::with_vars(Self::VERSION_VAR, Self::APPLICATION_VAR, Self::INSTANCE_VAR)
    }

    /// Create a provider reading custom variables.
    pub fn with_vars(
        version_var: impl Into<String>,
        application_var: impl Into<String>,
        instance_var: impl Into<String>,
    ) -> Self {
        Self {
            version_var: version_var.into(),
            application_var: application_var.into(),
            instance_var: instance_var.into(),
        }
    }

    fn read(name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|value| !value.is_empty())
    }
}

impl Default for EnvPlatformIdentity {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformIdentityProvider for EnvPlatformIdentity {
    fn runtime_version(&self) -> Option<String> {
        Self::read(&self.version_var)
    }

    fn application_id(&self) -> Option<String> {
        Self::read(&self.application_var)
    }

    fn instance_id(&self) -> Option<String> {
        Self::read(&self.instance_var)
    }
}

/// Fixed platform identity, for tests and non-platform deployments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticPlatformIdentity {
    /// Runtime version
    pub runtime_version: Option<String>,
    /// Application identifier
    pub application_id: Option<String>,
    /// Instance identifier
    pub instance_id: Option<String>,
}

impl StaticPlatformIdentity {
    /// Identity with only a runtime version.
    pub fn new(runtime_version: impl Into<String>) -> Self {
        Self {
            runtime_version: Some(runtime_version.into()),
            ..Default::default()
        }
    }

    /// Set the application identifier.
    pub fn with_application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }

    /// Set the instance identifier.
    pub fn with_instance_id(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }
}

impl PlatformIdentityProvider for StaticPlatformIdentity {
    fn runtime_version(&self) -> Option<String> {
        self.runtime_version.clone()
    }

    fn application_id(&self) -> Option<String> {
        self.application_id.clone()
    }

    fn instance_id(&self) -> Option<String> {
        self.instance_id.clone()
    }
}

/// Enricher stamping platform identity onto events.
///
/// Sets [`RUNTIME_VERSION_TAG`] and [`APPLICATION_ID_TAG`] and uses the
/// instance id as the event's server name. Values the provider does not know
/// are left untouched.
#[derive(Clone)]
pub struct PlatformEnricher {
    identity: Arc<dyn PlatformIdentityProvider>,
}

impl PlatformEnricher {
    /// Create an enricher reading from `identity`.
    pub fn new(identity: Arc<dyn PlatformIdentityProvider>) -> Self {
        Self { identity }
    }
}

impl EventEnricher for PlatformEnricher {
    fn enrich(&self, builder: &mut EventBuilder) {
        if let Some(version) = self.identity.runtime_version() {
            builder.set_tag(RUNTIME_VERSION_TAG, version);
        }
        if let Some(application_id) = self.identity.application_id() {
            builder.set_tag(APPLICATION_ID_TAG, application_id);
        }
        if let Some(instance_id) = self.identity.instance_id() {
            builder.set_server_name(instance_id);
        }
    }
}

impl std::fmt::Debug for PlatformEnricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformEnricher").finish_non_exhaustive()
    }
}
