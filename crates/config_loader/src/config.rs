//! RelayConfig - the top-level relay configuration document

use contracts::DestinationConfig;
use event_processor::ProcessorConfig;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Relay configuration
///
/// ```toml
/// [processor]
/// max_batch_size = 500
///
/// [[destinations]]
/// type = "file"
/// required_consent = ["measurement"]
/// [destinations.settings]
/// path = "events.jsonl"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    #[serde(default)]
    #[validate(nested)]
    pub processor: ProcessorConfig,

    #[serde(default)]
    #[validate(nested)]
    pub destinations: Vec<DestinationConfig>,
}

impl RelayConfig {
    /// Configs with `enabled = true`, in file order
    pub fn enabled_destinations(&self) -> impl Iterator<Item = &DestinationConfig> {
        self.destinations.iter().filter(|d| d.enabled)
    }
}
