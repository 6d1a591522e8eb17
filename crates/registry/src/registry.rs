//! PluginRegistry - destination type name to factory table
//!
//! Owned by the composition root and handed to the loader, not a process global.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use contracts::DestinationFactory;
use tracing::{debug, info};

use crate::error::RegistryError;

/// Registry of destination factories keyed by type name
///
/// Internally synchronized so it can be shared behind an `Arc` between the
/// loader (which caches resolved factories) and concurrent lookups.
#[derive(Default)]
pub struct PluginRegistry {
    factories: RwLock<HashMap<String, DestinationFactory>>,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with a bulk factory map
    pub fn with_factories(factories: HashMap<String, DestinationFactory>) -> Self {
        info!(count = factories.len(), "Plugin registry created with factories");
        Self {
            factories: RwLock::new(factories),
        }
    }

    /// Register a factory; fails if the type is already present
    pub fn register(
        &self,
        destination_type: impl Into<String>,
        factory: DestinationFactory,
    ) -> Result<(), RegistryError> {
        let destination_type = destination_type.into();
        let mut factories = self.factories.write().unwrap_or_else(PoisonError::into_inner);

        if factories.contains_key(&destination_type) {
            return Err(RegistryError::DuplicateType { destination_type });
        }

        debug!(destination_type = %destination_type, "Registered destination factory");
        factories.insert(destination_type, factory);
        Ok(())
    }

    /// Look up a factory
    pub fn get(&self, destination_type: &str) -> Option<DestinationFactory> {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(destination_type)
            .cloned()
    }

    pub fn contains(&self, destination_type: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(destination_type)
    }

    /// Registered type names, sorted
    pub fn list_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    pub fn count(&self) -> usize {
        self.factories
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Remove every registration
    pub fn clear(&self) {
        self.factories
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("types", &self.list_types())
            .finish()
    }
}
