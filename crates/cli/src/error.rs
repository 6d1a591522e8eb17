//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Batch file could not be read or parsed
    #[error("Invalid batch file {path}: {message}")]
    BatchFile { path: String, message: String },

    /// Every configured destination failed to load
    #[error("No destinations loaded ({failed} failed)")]
    NoDestinations { failed: usize },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn batch_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BatchFile {
            path: path.into(),
            message: message.into(),
        }
    }
}
