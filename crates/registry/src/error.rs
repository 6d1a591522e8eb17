//! Registry and loader error types

use thiserror::Error;

/// Plugin registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Type already registered; registration is exactly-once
    #[error("destination type '{destination_type}' is already registered")]
    DuplicateType { destination_type: String },
}

/// Destination loader errors
#[derive(Debug, Error)]
pub enum LoaderError {
    /// No destinations package was supplied, or it could not be opened
    #[error("destinations package unavailable: {message}")]
    PackageUnavailable { message: String },

    /// The package is available but exports nothing for this type
    #[error("destination type '{destination_type}' not found in package '{package}'")]
    TypeNotFound {
        destination_type: String,
        package: String,
    },

    /// One or more requested types cannot be resolved
    #[error("destination types unavailable: {}", missing.join(", "))]
    Unavailable { missing: Vec<String> },
}

impl LoaderError {
    pub fn package_unavailable(message: impl Into<String>) -> Self {
        Self::PackageUnavailable {
            message: message.into(),
        }
    }

    pub fn type_not_found(destination_type: impl Into<String>, package: impl Into<String>) -> Self {
        Self::TypeNotFound {
            destination_type: destination_type.into(),
            package: package.into(),
        }
    }

    /// True for configuration-level failures the operator must fix
    /// (package missing), as opposed to a single unknown type.
    pub fn is_package_error(&self) -> bool {
        matches!(self, Self::PackageUnavailable { .. })
    }
}
