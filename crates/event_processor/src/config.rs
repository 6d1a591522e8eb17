//! Processor configuration

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Default maximum events per batch
pub const DEFAULT_MAX_BATCH_SIZE: usize = 1000;

/// Independently toggleable processing stages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProcessorConfig {
    /// Drop structurally invalid events
    pub validate: bool,

    /// Merge session/request context into events
    pub enrich: bool,

    /// Apply batch-wide filters
    pub filter: bool,

    /// Honor consent in `filter_events_by_consent`; when off it passes events through
    pub consent_filter: bool,

    /// Larger batches are rejected outright
    #[validate(range(min = 1, message = "max_batch_size must be at least 1"))]
    pub max_batch_size: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            validate: true,
            enrich: true,
            filter: true,
            consent_filter: true,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}
