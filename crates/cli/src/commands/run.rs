//! `run` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::{CancellationToken, SimulationBlueprint};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{failed_modes, print_summary, write_json, Harness};

/// Execute the `run` command
pub async fn run_benchmark(args: &RunArgs) -> Result<()> {
    let mut blueprint = load_blueprint(args)?;
    apply_overrides(&mut blueprint, args);
    ConfigLoader::validate(&blueprint).context("Invalid configuration after CLI overrides")?;

    info!(
        events = blueprint.simulation.events,
        batch_size = blueprint.batch_size(),
        queue_capacity = ?blueprint.dispatch.capacity(),
        backpressure = ?blueprint.dispatch.backpressure,
        modes = ?blueprint.modes,
        output_dir = %blueprint.storage.output_dir.display(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
        info!("Metrics endpoint available on port {}", args.metrics_port);
    }

    let cancel = CancellationToken::new();
    let modes_total = blueprint.modes.len();
    let harness = Harness::new(blueprint, cancel.clone());
    let mut task = tokio::task::spawn_blocking(move || harness.run());

    info!("Starting benchmark...");

    let report = tokio::select! {
        joined = &mut task => joined.map_err(|e| CliError::execution(e.to_string()))?,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, flushing partial batches...");
            cancel.cancel();
            task.await.map_err(|e| CliError::execution(e.to_string()))?
        }
    };

    print_summary(&report);
    if let Some(path) = &args.report {
        write_json(&report, path)?;
    }

    let failed = failed_modes(&report);
    if !failed.is_empty() {
        return Err(CliError::modes_failed(&failed, modes_total).into());
    }
    if cancel.is_cancelled() {
        warn!(completed = report.modes.len(), "Benchmark interrupted");
    } else {
        info!("Benchmark finished");
    }
    Ok(())
}

fn load_blueprint(args: &RunArgs) -> Result<SimulationBlueprint> {
    if !args.config.exists() {
        warn!(
            config = %args.config.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(SimulationBlueprint::default());
    }
    info!(config = %args.config.display(), "Loading configuration");
    ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))
}

fn apply_overrides(blueprint: &mut SimulationBlueprint, args: &RunArgs) {
    if let Some(events) = args.events {
        info!(events, "Overriding event count from CLI");
        blueprint.simulation.events = events;
    }
    if let Some(batch_size) = args.batch_size {
        info!(batch_size, "Overriding batch size from CLI");
        blueprint.consumer.batch_size = Some(batch_size);
    }
    if let Some(capacity) = args.queue_capacity {
        info!(capacity, "Overriding queue capacity from CLI");
        blueprint.dispatch.queue_capacity = capacity;
    }
    if let Some(selection) = args.mode {
        blueprint.modes = selection.modes();
    }
    if let Some(dir) = &args.output_dir {
        blueprint.storage.output_dir = dir.clone();
    }
    if args.seed.is_some() {
        blueprint.simulation.seed = args.seed;
    }
}

/// Wait for Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &SimulationBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Simulation:");
    println!("  Events: {}", blueprint.simulation.events);
    println!("  Account pool: {}", blueprint.simulation.account_pool);
    match blueprint.simulation.seed {
        Some(seed) => println!("  Seed: {seed}"),
        None => println!("  Seed: random"),
    }

    println!("\nDispatch:");
    match blueprint.dispatch.capacity() {
        Some(capacity) => println!(
            "  Queue: bounded ({capacity}), {:?} on full",
            blueprint.dispatch.backpressure
        ),
        None => println!("  Queue: unbounded"),
    }
    println!("  Push micro-batch: {}", blueprint.dispatch.push_batch_size);

    println!("\nConsumers:");
    println!("  Batch size: {}", blueprint.batch_size());
    println!("  Pull consumers: {}", blueprint.consumer.pull_consumers);
    println!("  Poll interval: {}ms", blueprint.consumer.poll_interval_ms);
    println!(
        "  Retry: {} attempt(s), {}ms backoff",
        blueprint.consumer.retry.max_attempts, blueprint.consumer.retry.backoff_ms
    );

    println!("\nModes ({}):", blueprint.modes.len());
    for mode in &blueprint.modes {
        println!(
            "  - {} -> {}",
            mode,
            blueprint.storage.db_path(*mode).display()
        );
    }
    println!();
}
