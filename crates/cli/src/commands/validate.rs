//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{BackpressurePolicy, SimulationBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    events: u64,
    batch_size: usize,
    modes: Vec<String>,
    queue_capacity: Option<usize>,
    databases: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    events: blueprint.simulation.events,
                    batch_size: blueprint.batch_size(),
                    modes: blueprint.modes.iter().map(|m| m.to_string()).collect(),
                    queue_capacity: blueprint.dispatch.capacity(),
                    databases: blueprint
                        .modes
                        .iter()
                        .map(|m| blueprint.storage.db_path(*m).display().to_string())
                        .collect(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &SimulationBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.dispatch.capacity().is_none() {
        warnings.push(
            "dispatch.queue_capacity is 0 - pull queue is unbounded, memory grows with a slow consumer"
                .to_string(),
        );
    } else if blueprint.dispatch.backpressure == BackpressurePolicy::DropNewest {
        warnings.push(
            "dispatch.backpressure = drop_newest - events may be dropped (counted in the report)"
                .to_string(),
        );
    }

    if blueprint.consumer.batch_size.is_none() {
        warnings.push(format!(
            "consumer.batch_size not set - derived from event count: {}",
            blueprint.batch_size()
        ));
    }

    if (blueprint.batch_size() as u64) > blueprint.simulation.events {
        warnings.push(
            "consumer.batch_size exceeds simulation.events - only the final flush will write"
                .to_string(),
        );
    }

    if blueprint.dispatch.push_batch_size > blueprint.batch_size() {
        warnings.push(
            "dispatch.push_batch_size exceeds consumer.batch_size - push flushes will overshoot"
                .to_string(),
        );
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Events: {}", summary.events);
            println!("  Batch size: {}", summary.batch_size);
            println!("  Modes: {}", summary.modes.join(", "));
            match summary.queue_capacity {
                Some(capacity) => println!("  Queue capacity: {}", capacity),
                None => println!("  Queue capacity: unbounded"),
            }
            for db in &summary.databases {
                println!("  Database: {}", db);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_blueprint_warns_about_unbounded_queue() {
        let warnings = collect_warnings(&SimulationBlueprint::default());
        assert!(warnings.iter().any(|w| w.contains("unbounded")));
        assert!(warnings.iter().any(|w| w.contains("derived")));
    }

    #[test]
    fn test_drop_newest_warning() {
        let mut bp = SimulationBlueprint::default();
        bp.dispatch.queue_capacity = 100;
        bp.dispatch.backpressure = BackpressurePolicy::DropNewest;
        bp.consumer.batch_size = Some(500);
        let warnings = collect_warnings(&bp);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("drop_newest"));
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let args = ValidateArgs {
            config: PathBuf::from("/nonexistent/bench.toml"),
            json: true,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_valid_file_summary() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        std::fs::write(
            &path,
            "modes = [\"push\"]\n[simulation]\nevents = 12000\n[consumer]\nbatch_size = 5000\n",
        )
        .unwrap();
        let result = validate_config(&ValidateArgs {
            config: path,
            json: false,
        });
        assert!(result.valid);
        let summary = result.summary.unwrap();
        assert_eq!(summary.events, 12_000);
        assert_eq!(summary.batch_size, 5000);
        assert_eq!(summary.modes, vec!["push".to_string()]);
        assert_eq!(summary.databases.len(), 1);
        assert!(summary.databases[0].ends_with("banking_events_push.db"));
    }
}
