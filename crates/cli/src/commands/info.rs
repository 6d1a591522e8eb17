//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::RelayConfig;
use contracts::ConsentPurpose;
use event_processor::ProcessorConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;
use crate::relay::builtin_loader;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    processor: ProcessorConfig,
    destinations: Vec<DestinationInfo>,
    available_types: Vec<String>,
}

#[derive(Serialize)]
struct DestinationInfo {
    #[serde(rename = "type")]
    destination_type: String,
    enabled: bool,
    available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    required_consent: Option<Vec<ConsentPurpose>>,
    setting_keys: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &RelayConfig) -> ConfigInfo {
    let loader = builtin_loader();

    let destinations = config
        .destinations
        .iter()
        .map(|d| {
            let mut setting_keys: Vec<String> = d.settings.keys().cloned().collect();
            setting_keys.sort();
            DestinationInfo {
                destination_type: d.destination_type.clone(),
                enabled: d.enabled,
                available: loader.is_available(&d.destination_type),
                required_consent: d.required_consent.clone(),
                setting_keys,
            }
        })
        .collect();

    ConfigInfo {
        processor: config.processor.clone(),
        destinations,
        available_types: loader.available_types(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Consent Relay Configuration                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let p = &info.processor;
    println!("⚙️  Processor");
    println!("   ├─ Validate: {}", p.validate);
    println!("   ├─ Enrich: {}", p.enrich);
    println!("   ├─ Filter: {}", p.filter);
    println!("   ├─ Consent filter: {}", p.consent_filter);
    println!("   └─ Max batch size: {}", p.max_batch_size);

    println!("\n📤 Destinations ({})", info.destinations.len());
    for (i, d) in info.destinations.iter().enumerate() {
        let is_last = i == info.destinations.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let state = match (d.enabled, d.available) {
            (false, _) => "disabled",
            (true, true) => "enabled",
            (true, false) => "enabled, unavailable",
        };
        let consent = match &d.required_consent {
            Some(purposes) => purposes
                .iter()
                .map(ConsentPurpose::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            None => "plugin default".to_string(),
        };
        println!(
            "   {} {} ({}; consent: {})",
            prefix, d.destination_type, state, consent
        );
    }

    println!("\n📦 Available types: {}", info.available_types.join(", "));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::DestinationConfig;

    #[test]
    fn test_build_config_info() {
        let config = RelayConfig {
            destinations: vec![
                DestinationConfig::new("file").with_setting("path", "x.jsonl"),
                DestinationConfig::new("segment").disabled(),
            ],
            ..Default::default()
        };

        let info = build_config_info(&config);
        assert_eq!(info.available_types, ["file", "log", "network"]);
        assert!(info.destinations[0].available);
        assert_eq!(info.destinations[0].setting_keys, ["path"]);
        assert!(!info.destinations[1].available);
        assert!(!info.destinations[1].enabled);
    }
}
