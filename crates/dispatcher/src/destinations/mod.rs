//! Built-in destinations
//!
//! Contains LogDestination, FileDestination and NetworkDestination, plus the
//! package that exports them to the loader.

#[macro_use]
mod macros;

mod file;
mod log;
mod network;
mod package;

pub use self::file::FileDestination;
pub use self::log::LogDestination;
pub use self::network::{NetworkDestination, NetworkFormat};
pub use self::package::BuiltinPackage;
