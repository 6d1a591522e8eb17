//! Dispatcher error types

use event_processor::ProcessorError;
use registry::LoaderError;
use thiserror::Error;

/// Dispatcher-specific errors
#[derive(Debug, Error)]
pub enum DispatcherError {
    /// Fail-fast availability check failed; nothing was loaded
    #[error("destination set unavailable: {0}")]
    DestinationsUnavailable(#[from] LoaderError),

    /// A single destination failed to load
    #[error("failed to load destination '{destination}': {message}")]
    Load {
        destination: String,
        message: String,
    },

    /// A destination failed some events of a batch
    #[error(
        "destination '{destination}' failed {failed} of {attempted} events, last error: {last_error}"
    )]
    DestinationFailed {
        destination: String,
        failed: usize,
        attempted: usize,
        last_error: String,
    },

    /// Batch rejected by the event processor
    #[error("event processing error: {0}")]
    Processor(#[from] ProcessorError),

    /// Plugin error (from contract)
    #[error("destination error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DispatcherError {
    /// Create a load error
    pub fn load(destination: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            destination: destination.into(),
            message: message.into(),
        }
    }
}
