//! Builder for configuring gateway instances

use std::sync::Arc;

use super::Gateway;
use crate::adapter::AdapterDescriptor;
use crate::cache::{CacheConfig, ResponseCache};
use crate::config::Config;
use crate::registry::AdapterRegistry;
use crate::retry::RetryLayer;
use crate::transport::{HttpTransport, Transport};
use crate::{BifrostError, Result};

/// Main entry point for creating gateway instances.
pub struct Bifrost;

impl Bifrost {
    /// Create a new builder for configuring the gateway.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    /// Build a gateway straight from a loaded configuration file.
    pub fn from_config(config: &Config) -> Result<Gateway> {
        Self::builder().config(config)?.build()
    }
}

/// Builder for configuring gateway instances.
#[derive(Default)]
pub struct GatewayBuilder {
    descriptors: Vec<AdapterDescriptor>,
    cache_config: CacheConfig,
    transport: Option<Arc<dyn Transport>>,
    http_client: Option<reqwest::Client>,
}

impl GatewayBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Validation happens in [`build()`](Self::build).
    pub fn adapter(mut self, descriptor: AdapterDescriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    /// Add several adapters.
    pub fn adapters(mut self, descriptors: impl IntoIterator<Item = AdapterDescriptor>) -> Self {
        self.descriptors.extend(descriptors);
        self
    }

    /// Configure the response cache (default: enabled, 5 min TTL, 1,000 entries).
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Take adapters and cache settings from a configuration file.
    pub fn config(self, config: &Config) -> Result<Self> {
        Ok(self
            .adapters(config.adapter_descriptors()?)
            .cache(config.cache_config()))
    }

    /// Use a custom transport instead of the reqwest-backed default.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a preconfigured reqwest client for the default transport.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Build the gateway.
    ///
    /// Fails on a malformed or duplicate adapter, so a bad configuration
    /// stops startup instead of surfacing on the first call.
    pub fn build(self) -> Result<Gateway> {
        let registry = AdapterRegistry::from_descriptors(self.descriptors)?;

        let transport = match (self.transport, self.http_client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Arc::new(HttpTransport::with_client(client)),
            (None, None) => {
                let client = reqwest::Client::builder()
                    .user_agent(concat!("bifrost/", env!("CARGO_PKG_VERSION")))
                    .build()
                    .map_err(|e| {
                        BifrostError::Configuration(format!("failed to build HTTP client: {e}"))
                    })?;
                Arc::new(HttpTransport::with_client(client))
            }
        };

        Ok(Gateway::new(
            Arc::new(registry),
            Arc::new(ResponseCache::new(self.cache_config)),
            Arc::new(RetryLayer::new()),
            transport,
        ))
    }
}
