//! DestinationLoader - resolves factories missing from the registry
//!
//! Resolution order: registry, then the destinations package. Anything found in
//! the package is cached back into the registry.

use std::sync::Arc;

use contracts::DestinationFactory;
use tracing::{debug, info, instrument, warn};

use crate::error::{LoaderError, RegistryError};
use crate::package::{DestinationPackage, PackageExport};
use crate::registry::PluginRegistry;

/// Loader over a shared registry and an optional destinations package
#[derive(Clone)]
pub struct DestinationLoader {
    registry: Arc<PluginRegistry>,
    package: Option<Arc<dyn DestinationPackage>>,
}

impl DestinationLoader {
    /// Create a loader. `package = None` means only pre-registered types resolve.
    pub fn new(
        registry: Arc<PluginRegistry>,
        package: Option<Arc<dyn DestinationPackage>>,
    ) -> Self {
        Self { registry, package }
    }

    pub fn registry(&self) -> &Arc<PluginRegistry> {
        &self.registry
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package.as_deref().map(|p| p.name())
    }

    /// Resolve a factory, caching package hits into the registry
    #[instrument(
        name = "loader_load",
        skip(self, destination_type),
        fields(destination_type = %destination_type)
    )]
    pub fn load(&self, destination_type: &str) -> Result<DestinationFactory, LoaderError> {
        if let Some(factory) = self.registry.get(destination_type) {
            return Ok(factory);
        }

        let factory = self.resolve_from_package(destination_type)?;

        match self.registry.register(destination_type, factory.clone()) {
            Ok(()) => {
                info!(destination_type, "Destination factory loaded from package");
                Ok(factory)
            }
            // Another task cached it first; use the registered one
            Err(RegistryError::DuplicateType { .. }) => {
                Ok(self.registry.get(destination_type).unwrap_or(factory))
            }
        }
    }

    /// True if `destination_type` is registered or resolvable from the package
    pub fn is_available(&self, destination_type: &str) -> bool {
        self.registry.contains(destination_type)
            || self.resolve_from_package(destination_type).is_ok()
    }

    /// Check a whole set of types before anything is loaded
    ///
    /// Returns `PackageUnavailable` when some type needs the package and the
    /// package cannot be used, otherwise `Unavailable` listing every missing type.
    #[instrument(name = "loader_validate_available", skip(self, types))]
    pub fn validate_available<I, S>(&self, types: I) -> Result<(), LoaderError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unregistered: Vec<String> = types
            .into_iter()
            .map(|t| t.as_ref().to_string())
            .filter(|t| !self.registry.contains(t))
            .collect();

        if unregistered.is_empty() {
            return Ok(());
        }

        let exports = self.package_exports()?;
        let mut missing: Vec<String> = unregistered
            .into_iter()
            .filter(|t| !exports.iter().any(|e| e.resolve(t).is_some()))
            .collect();

        if missing.is_empty() {
            debug!("All requested destination types available");
            return Ok(());
        }

        missing.sort();
        missing.dedup();
        warn!(missing = ?missing, "Destination types unavailable");
        Err(LoaderError::Unavailable { missing })
    }

    /// Every type the registry and package can provide, sorted
    pub fn available_types(&self) -> Vec<String> {
        let mut types = self.registry.list_types();
        if let Ok(exports) = self.package_exports() {
            types.extend(exports.iter().flat_map(PackageExport::provided_types));
        }
        types.sort();
        types.dedup();
        types
    }

    fn package_exports(&self) -> Result<Vec<PackageExport>, LoaderError> {
        let package = self
            .package
            .as_ref()
            .ok_or_else(|| LoaderError::package_unavailable("no destinations package configured"))?;
        package.exports()
    }

    fn resolve_from_package(
        &self,
        destination_type: &str,
    ) -> Result<DestinationFactory, LoaderError> {
        let exports = self.package_exports()?;
        // Explicit registry exports win over name-derived constructors
        let (registries, constructors): (Vec<_>, Vec<_>) = exports
            .iter()
            .partition(|e| matches!(e, PackageExport::Registry(_)));

        registries
            .into_iter()
            .chain(constructors)
            .find_map(|export| export.resolve(destination_type))
            .ok_or_else(|| {
                LoaderError::type_not_found(
                    destination_type,
                    self.package_name().unwrap_or("<none>"),
                )
            })
    }
}

impl std::fmt::Debug for DestinationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationLoader")
            .field("registry", &self.registry)
            .field("package", &self.package_name())
            .finish()
    }
}
