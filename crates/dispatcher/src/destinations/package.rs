//! BuiltinPackage - exports the built-in destinations to the loader

use std::collections::HashMap;

use contracts::{destination_factory, DestinationFactory};
use registry::{DestinationPackage, LoaderError, PackageExport};

use super::file::{FileDestination, FILE_DESTINATION_TYPE};
use super::log::{LogDestination, LOG_DESTINATION_TYPE};
use super::network::NetworkDestination;

pub const BUILTIN_PACKAGE_NAME: &str = "consent-relay-builtin";

/// Default destinations package
///
/// `log` and `file` come from a registry export; `network` is exported as the
/// `createNetworkDestination` constructor.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPackage;

impl BuiltinPackage {
    pub fn new() -> Self {
        Self
    }
}

impl DestinationPackage for BuiltinPackage {
    fn name(&self) -> &str {
        BUILTIN_PACKAGE_NAME
    }

    fn exports(&self) -> Result<Vec<PackageExport>, LoaderError> {
        let mut registry: HashMap<String, DestinationFactory> = HashMap::new();
        registry.insert(
            LOG_DESTINATION_TYPE.to_string(),
            destination_factory(|_| Ok(Box::new(LogDestination::new()))),
        );
        registry.insert(
            FILE_DESTINATION_TYPE.to_string(),
            destination_factory(|_| Ok(Box::new(FileDestination::new()))),
        );

        Ok(vec![
            PackageExport::Registry(registry),
            PackageExport::constructor(
                "createNetworkDestination",
                destination_factory(|_| Ok(Box::new(NetworkDestination::new()))),
            ),
        ])
    }
}
