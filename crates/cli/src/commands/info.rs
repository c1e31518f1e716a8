//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::SimulationBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    simulation: SimulationInfo,
    dispatch: DispatchInfo,
    consumer: ConsumerInfo,
    modes: Vec<ModeInfo>,
}

#[derive(Serialize)]
struct SimulationInfo {
    events: u64,
    account_pool: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Serialize)]
struct DispatchInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    queue_capacity: Option<usize>,
    backpressure: String,
    push_batch_size: usize,
}

#[derive(Serialize)]
struct ConsumerInfo {
    batch_size: usize,
    batch_size_derived: bool,
    pull_consumers: usize,
    poll_interval_ms: u64,
    max_attempts: u32,
    backoff_ms: u64,
}

#[derive(Serialize)]
struct ModeInfo {
    mode: String,
    database: String,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.effective {
        let toml = ConfigLoader::to_toml(&blueprint).context("Failed to render configuration")?;
        println!("{toml}");
    } else if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

fn build_config_info(blueprint: &SimulationBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        simulation: SimulationInfo {
            events: blueprint.simulation.events,
            account_pool: blueprint.simulation.account_pool,
            seed: blueprint.simulation.seed,
        },
        dispatch: DispatchInfo {
            queue_capacity: blueprint.dispatch.capacity(),
            backpressure: format!("{:?}", blueprint.dispatch.backpressure),
            push_batch_size: blueprint.dispatch.push_batch_size,
        },
        consumer: ConsumerInfo {
            batch_size: blueprint.batch_size(),
            batch_size_derived: blueprint.consumer.batch_size.is_none(),
            pull_consumers: blueprint.consumer.pull_consumers,
            poll_interval_ms: blueprint.consumer.poll_interval_ms,
            max_attempts: blueprint.consumer.retry.max_attempts,
            backoff_ms: blueprint.consumer.retry.backoff_ms,
        },
        modes: blueprint
            .modes
            .iter()
            .map(|m| ModeInfo {
                mode: m.to_string(),
                database: blueprint.storage.db_path(*m).display().to_string(),
            })
            .collect(),
    }
}

fn print_config_info(blueprint: &SimulationBlueprint) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Dispatch Benchmark Configuration               ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let sim = &blueprint.simulation;
    println!("🏦 Simulation");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!("   ├─ Events: {}", sim.events);
    println!("   ├─ Account pool: {}", sim.account_pool);
    match sim.seed {
        Some(seed) => println!("   └─ Seed: {}", seed),
        None => println!("   └─ Seed: random"),
    }

    let dispatch = &blueprint.dispatch;
    println!("\n🔀 Dispatch");
    match dispatch.capacity() {
        Some(capacity) => {
            println!("   ├─ Queue capacity: {}", capacity);
            println!("   ├─ Backpressure: {:?}", dispatch.backpressure);
        }
        None => println!("   ├─ Queue capacity: unbounded"),
    }
    println!("   └─ Push micro-batch: {}", dispatch.push_batch_size);

    let consumer = &blueprint.consumer;
    println!("\n📥 Consumers");
    let derived = if consumer.batch_size.is_none() {
        " (derived)"
    } else {
        ""
    };
    println!("   ├─ Batch size: {}{}", blueprint.batch_size(), derived);
    println!("   ├─ Pull consumers: {}", consumer.pull_consumers);
    println!("   ├─ Poll interval: {}ms", consumer.poll_interval_ms);
    println!(
        "   └─ Retry: {} attempt(s), {}ms backoff",
        consumer.retry.max_attempts, consumer.retry.backoff_ms
    );

    println!("\n💾 Modes ({})", blueprint.modes.len());
    for (i, mode) in blueprint.modes.iter().enumerate() {
        let prefix = if i == blueprint.modes.len() - 1 {
            "└─"
        } else {
            "├─"
        };
        println!(
            "   {} {} -> {}",
            prefix,
            mode,
            blueprint.storage.db_path(*mode).display()
        );
    }

    println!();
}
