//! Relay composition root and batch file input.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use config_loader::RelayConfig;
use contracts::{AnalyticsEvent, EventContext};
use dispatcher::{BuiltinPackage, DestinationManager, LoadReport, Pipeline};
use event_processor::EventProcessor;
use registry::{DestinationLoader, PluginRegistry};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::CliError;

/// One batch as submitted by the consent platform
#[derive(Debug, Clone, Deserialize)]
pub struct Batch {
    pub context: EventContext,
    #[serde(default)]
    pub events: Vec<AnalyticsEvent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchInput {
    Many(Vec<Batch>),
    One(Batch),
}

/// Read a batch file holding one batch or an array of batches
pub fn read_batches(path: &Path) -> Result<Vec<Batch>, CliError> {
    let display = path.display().to_string();
    let content =
        std::fs::read_to_string(path).map_err(|e| CliError::batch_file(&display, e.to_string()))?;
    let input: BatchInput = serde_json::from_str(&content)
        .map_err(|e| CliError::batch_file(&display, e.to_string()))?;

    Ok(match input {
        BatchInput::Many(batches) => batches,
        BatchInput::One(batch) => vec![batch],
    })
}

/// Destination loader over a fresh registry and the built-in package
pub fn builtin_loader() -> DestinationLoader {
    DestinationLoader::new(
        Arc::new(PluginRegistry::new()),
        Some(Arc::new(BuiltinPackage::new())),
    )
}

/// Build the manager and load every enabled destination
#[instrument(name = "relay_load", skip(config))]
pub async fn load_manager(config: &RelayConfig) -> Result<(Arc<DestinationManager>, LoadReport)> {
    let manager = Arc::new(DestinationManager::new(builtin_loader()));
    let report = manager.load_destinations(&config.destinations).await?;

    let enabled = config.enabled_destinations().count();
    if enabled > 0 && report.loaded.is_empty() {
        return Err(CliError::NoDestinations {
            failed: report.failed.len(),
        }
        .into());
    }

    info!(
        loaded = ?report.loaded,
        failed = report.failed.len(),
        "Relay destinations ready"
    );
    Ok((manager, report))
}

/// Processor plus loaded manager
pub async fn build_pipeline(config: &RelayConfig) -> Result<(Pipeline, LoadReport)> {
    let (manager, report) = load_manager(config).await?;
    let processor = EventProcessor::new(config.processor.clone());
    Ok((Pipeline::new(processor, manager), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_single_batch() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "context": {{ "sessionId": "s1", "consent": {{ "necessary": true, "measurement": true }} }},
                "events": [ {{ "type": "track", "name": "Signup", "userId": "u1" }} ]
            }}"#
        )
        .unwrap();

        let batches = read_batches(file.path()).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].context.session_id, "s1");
        assert!(batches[0].context.consent.measurement);
        assert_eq!(batches[0].events.len(), 1);
    }

    #[test]
    fn test_read_batch_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[ {{ "context": {{ "sessionId": "a" }} }}, {{ "context": {{ "sessionId": "b" }}, "events": [] }} ]"#
        )
        .unwrap();

        let batches = read_batches(file.path()).unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[1].context.session_id, "b");
    }

    #[test]
    fn test_read_batch_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            read_batches(file.path()),
            Err(CliError::BatchFile { .. })
        ));
    }

    #[tokio::test]
    async fn test_build_pipeline_with_log_destination() {
        let config = RelayConfig {
            destinations: vec![contracts::DestinationConfig::new("log")],
            ..Default::default()
        };
        let (pipeline, report) = build_pipeline(&config).await.unwrap();
        assert_eq!(report.loaded, ["log"]);
        assert_eq!(pipeline.manager().loaded_destinations(), ["log"]);
    }
}
