//! Adapter registry.
//!
//! Holds every configured [`Adapter`] keyed by its logical name. The registry
//! is filled once at startup and shared read-only afterwards (the gateway
//! owns it behind an `Arc`), so lookups need no locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::adapter::{Adapter, AdapterDescriptor};
use crate::{BifrostError, Result};

/// Name-keyed set of validated adapters.
#[derive(Debug, Default, Clone)]
pub struct AdapterRegistry {
    adapters: BTreeMap<String, Arc<Adapter>>,
}

impl AdapterRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from descriptors, failing on the first invalid or
    /// duplicate entry.
    pub fn from_descriptors(descriptors: impl IntoIterator<Item = AdapterDescriptor>) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            registry.register(descriptor)?;
        }
        Ok(registry)
    }

    /// Validate and add an adapter.
    ///
    /// Returns [`BifrostError::DuplicateAdapter`] if the name is taken and
    /// [`BifrostError::Configuration`] if the descriptor is malformed.
    pub fn register(&mut self, descriptor: AdapterDescriptor) -> Result<()> {
        if self.adapters.contains_key(&descriptor.name) {
            return Err(BifrostError::DuplicateAdapter(descriptor.name));
        }
        let adapter = Adapter::compile(descriptor)?;
        info!(
            adapter = adapter.name(),
            base_url = %adapter.descriptor().base_url,
            max_retries = adapter.retry_policy().max_retries,
            "adapter registered"
        );
        self.adapters
            .insert(adapter.name().to_string(), Arc::new(adapter));
        Ok(())
    }

    /// Look up an adapter by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<Adapter>> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| BifrostError::AdapterNotFound(name.to_string()))
    }

    /// Registered adapter names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// Whether `name` is registered. No connectivity probe is made.
    pub fn is_healthy(&self, name: &str) -> bool {
        self.adapters.contains_key(name)
    }

    /// Health of every registered adapter.
    pub fn health_report(&self) -> BTreeMap<String, bool> {
        self.adapters
            .keys()
            .map(|name| (name.clone(), self.is_healthy(name)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
