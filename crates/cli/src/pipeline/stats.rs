//! Run summary output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use observability::{ComparisonReport, ModeOutcome};
use tracing::info;

/// Print the side-by-side table to stdout
pub fn print_summary(report: &ComparisonReport) {
    println!();
    print!("{report}");
    println!();
}

/// Write the comparison as pretty JSON
pub fn write_json(report: &ComparisonReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "comparison report written");
    Ok(())
}

/// Modes that failed, in run order (cancelled passes are not failures)
pub fn failed_modes(report: &ComparisonReport) -> Vec<contracts::DispatchMode> {
    report
        .modes
        .iter()
        .filter(|r| matches!(r.outcome, ModeOutcome::Failed { .. }))
        .map(|r| r.mode)
        .collect()
}
