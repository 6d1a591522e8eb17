//! Layered error definitions
//!
//! Categorized by source: config / plugin / delivery

use thiserror::Error;

/// Unified error type shared by plugins and the crates that drive them
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Plugin Errors =====
    /// Plugin settings are missing or malformed
    #[error("destination '{destination}' has invalid settings: {message}")]
    InvalidSettings {
        destination: String,
        message: String,
    },

    /// Plugin failed to initialize
    #[error("destination '{destination}' failed to initialize: {message}")]
    Initialization {
        destination: String,
        message: String,
    },

    // ===== Delivery Errors =====
    /// Destination rejected or failed to accept an event
    #[error("destination '{destination}' delivery error: {message}")]
    Delivery {
        destination: String,
        message: String,
    },

    /// Destination could not be reached
    #[error("destination '{destination}' connection error: {message}")]
    Connection {
        destination: String,
        message: String,
    },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create invalid settings error
    pub fn invalid_settings(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create initialization error
    pub fn initialization(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Initialization {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create delivery error
    pub fn delivery(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create connection error
    pub fn connection(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            destination: destination.into(),
            message: message.into(),
        }
    }
}
