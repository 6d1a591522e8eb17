//! `run` command implementation.

use std::time::Instant;

use anyhow::{Context, Result};
use dispatcher::{DestinationManager, LoadReport, Pipeline};
use observability::RelayMetricsAggregator;
use tracing::{error, info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::relay::{build_pipeline, load_manager, read_batches, Batch};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        destinations = config.destinations.len(),
        enabled = config.enabled_destinations().count(),
        max_batch_size = config.processor.max_batch_size,
        "Configuration loaded"
    );

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    // Dry run - load destinations to check their settings, then exit
    if args.dry_run {
        info!("Dry run mode - loading destinations without dispatching");
        let (manager, report) = load_manager(&config).await?;
        print_load_report(&report);
        manager.shutdown().await;
        return Ok(());
    }

    let batch_path = args
        .batch
        .as_deref()
        .context("--batch is required unless --dry-run is set")?;
    let batches = read_batches(batch_path)?;
    info!(batches = batches.len(), path = %batch_path.display(), "Batch file loaded");

    let (pipeline, report) = build_pipeline(&config).await?;
    print_load_report(&report);

    let mut stats = RelayMetricsAggregator::new();

    tokio::select! {
        _ = process_batches(&pipeline, batches, &mut stats) => {
            info!("All batches processed");
        }
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping relay...");
        }
    }

    print_run_summary(&stats, pipeline.manager());
    pipeline.manager().shutdown().await;

    info!("Consent Relay finished");
    Ok(())
}

async fn process_batches(
    pipeline: &Pipeline,
    batches: Vec<Batch>,
    stats: &mut RelayMetricsAggregator,
) {
    for (index, batch) in batches.into_iter().enumerate() {
        let started = Instant::now();
        match pipeline.ingest(batch.events, &batch.context).await {
            Ok(report) => {
                stats.record_batch(report.received, report.accepted);
                stats.record_latency("ingest", started.elapsed().as_secs_f64() * 1000.0);
            }
            Err(e) => {
                error!(batch = index, error = %e, "Batch rejected");
                stats.record_rejected();
            }
        }
    }
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_load_report(report: &LoadReport) {
    println!("\n=== Destinations ===\n");
    println!("  Loaded: {}", report.loaded.join(", "));
    if !report.disabled.is_empty() {
        println!("  Disabled: {}", report.disabled.join(", "));
    }
    for (destination_type, reason) in &report.failed {
        println!("  Failed: {} ({})", destination_type, reason);
    }
}

fn print_run_summary(stats: &RelayMetricsAggregator, manager: &DestinationManager) {
    println!("\n{}", stats.summary());

    let health = manager.health_summary();
    println!("=== Destination Health ===");
    println!(
        "Destinations: {} loaded of {} tracked",
        health.loaded_destinations, health.total_destinations
    );
    println!(
        "Events processed: {} ({} errors across {} destinations)",
        health.total_events_processed, health.total_errors, health.destinations_with_errors
    );
    for status in manager.statuses() {
        print!(
            "  {}: processed={} errors={}",
            status.destination_type, status.events_processed, status.error_count
        );
        match status.last_error {
            Some(ref last_error) => println!(" last_error=\"{}\"", last_error),
            None => println!(),
        }
    }
    println!();
}
