//! # Registry
//!
//! Destination plugin registry and loader.
//!
//! Responsibilities:
//! - Map destination type names to factories (`PluginRegistry`)
//! - Resolve factories for unregistered types from a destinations package
//! - Fail-fast availability checks before any destination is loaded

mod error;
mod loader;
mod package;
mod registry;

pub use contracts::{destination_factory, DestinationFactory};
pub use error::{LoaderError, RegistryError};
pub use loader::DestinationLoader;
pub use package::{destination_type_from_export, DestinationPackage, PackageExport};
pub use registry::PluginRegistry;
