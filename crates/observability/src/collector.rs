//! Metrics collector: phase timing, throughput, per-mode and comparison reports

use std::fmt;
use std::time::{Duration, Instant};

use contracts::DispatchMode;
use serde::Serialize;

use crate::metrics::StatsSummary;

/// Events per second
///
/// Never negative or NaN: `0.0` when no events were processed,
/// `f64::INFINITY` when events were processed in zero measurable time.
pub fn throughput(events: u64, elapsed: Duration) -> f64 {
    if events == 0 {
        return 0.0;
    }
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return f64::INFINITY;
    }
    events as f64 / secs
}

/// Start/stop instants of one phase
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseTimer {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timer already running
    pub fn started() -> Self {
        Self {
            started: Some(Instant::now()),
            stopped: None,
        }
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.stopped = None;
    }

    /// Stop and return the elapsed time; stopping twice keeps the first end
    pub fn stop(&mut self) -> Duration {
        if self.started.is_some() && self.stopped.is_none() {
            self.stopped = Some(Instant::now());
        }
        self.elapsed()
    }

    /// Zero before start, running time while started, final time once stopped
    pub fn elapsed(&self) -> Duration {
        match (self.started, self.stopped) {
            (Some(start), Some(stop)) => stop.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some() && self.stopped.is_none()
    }
}

/// Phase a failed mode stopped in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Setup,
    Generation,
    Processing,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunPhase::Setup => "setup",
            RunPhase::Generation => "generation",
            RunPhase::Processing => "processing",
        })
    }
}

/// How a mode pass ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ModeOutcome {
    Completed,
    Cancelled,
    Failed { phase: RunPhase, message: String },
}

impl ModeOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, ModeOutcome::Completed)
    }
}

impl fmt::Display for ModeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModeOutcome::Completed => write!(f, "completed"),
            ModeOutcome::Cancelled => write!(f, "cancelled"),
            ModeOutcome::Failed { phase, message } => {
                write!(f, "failed during {phase}: {message}")
            }
        }
    }
}

/// Counters and timings of one mode pass
#[derive(Debug, Clone, Serialize)]
pub struct ModeReport {
    pub mode: DispatchMode,
    /// Events generated
    pub produced: u64,
    /// Events accepted by the dispatch core
    pub submitted: u64,
    /// Events rejected by `DropNewest`
    pub dropped: u64,
    /// Events handed to the persister successfully
    pub processed: u64,
    /// Rows found in the store after the pass
    pub stored: u64,
    pub bulk_writes: u64,
    pub retries: u64,
    pub backpressure_waits: u64,
    pub queue_high_water: usize,
    pub generation: Duration,
    pub processing: Duration,
    pub total: Duration,
    pub flush_latency_ms: StatsSummary,
    pub outcome: ModeOutcome,
}

impl ModeReport {
    /// Empty report for `mode`, filled in as the pass progresses
    pub fn new(mode: DispatchMode) -> Self {
        Self {
            mode,
            produced: 0,
            submitted: 0,
            dropped: 0,
            processed: 0,
            stored: 0,
            bulk_writes: 0,
            retries: 0,
            backpressure_waits: 0,
            queue_high_water: 0,
            generation: Duration::ZERO,
            processing: Duration::ZERO,
            total: Duration::ZERO,
            flush_latency_ms: StatsSummary::default(),
            outcome: ModeOutcome::Completed,
        }
    }

    pub fn generation_throughput(&self) -> f64 {
        throughput(self.produced, self.generation)
    }

    pub fn processing_throughput(&self) -> f64 {
        throughput(self.processed, self.processing)
    }

    pub fn end_to_end_throughput(&self) -> f64 {
        throughput(self.stored, self.total)
    }

    /// Generated events neither stored nor reported as dropped
    pub fn unaccounted(&self) -> u64 {
        self.produced.saturating_sub(self.stored + self.dropped)
    }
}

/// Side-by-side comparison of all mode passes of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ComparisonReport {
    pub total_events: u64,
    pub batch_size: usize,
    pub modes: Vec<ModeReport>,
}

impl ComparisonReport {
    pub fn new(total_events: u64, batch_size: usize) -> Self {
        Self {
            total_events,
            batch_size,
            modes: Vec::new(),
        }
    }

    pub fn push(&mut self, report: ModeReport) {
        self.modes.push(report);
    }

    pub fn get(&self, mode: DispatchMode) -> Option<&ModeReport> {
        self.modes.iter().find(|r| r.mode == mode)
    }

    pub fn all_completed(&self) -> bool {
        self.modes.iter().all(|r| r.outcome.is_completed())
    }

    /// Mode with the highest end-to-end throughput among completed passes
    pub fn fastest(&self) -> Option<DispatchMode> {
        self.modes
            .iter()
            .filter(|r| r.outcome.is_completed())
            .max_by(|a, b| a.end_to_end_throughput().total_cmp(&b.end_to_end_throughput()))
            .map(|r| r.mode)
    }
}

fn rate(value: f64) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{value:.0}")
    }
}

fn secs(d: Duration) -> String {
    format!("{:.3}s", d.as_secs_f64())
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Pull vs Push Comparison ===")?;
        writeln!(
            f,
            "Events: {}  Batch size: {}",
            self.total_events, self.batch_size
        )?;
        if self.modes.is_empty() {
            return writeln!(f, "(no modes run)");
        }

        write!(f, "{:<24}", "")?;
        for r in &self.modes {
            write!(f, "{:>16}", r.mode.as_str().to_uppercase())?;
        }
        writeln!(f)?;

        let rows: [(&str, fn(&ModeReport) -> String); 14] = [
            ("produced", |r| r.produced.to_string()),
            ("submitted", |r| r.submitted.to_string()),
            ("dropped", |r| r.dropped.to_string()),
            ("processed", |r| r.processed.to_string()),
            ("stored", |r| r.stored.to_string()),
            ("bulk writes", |r| r.bulk_writes.to_string()),
            ("retries", |r| r.retries.to_string()),
            ("backpressure waits", |r| r.backpressure_waits.to_string()),
            ("generation time", |r| secs(r.generation)),
            ("processing time", |r| secs(r.processing)),
            ("total time", |r| secs(r.total)),
            ("generation ev/s", |r| rate(r.generation_throughput())),
            ("processing ev/s", |r| rate(r.processing_throughput())),
            ("end-to-end ev/s", |r| rate(r.end_to_end_throughput())),
        ];
        for (label, value) in rows {
            write!(f, "{label:<24}")?;
            for r in &self.modes {
                write!(f, "{:>16}", value(r))?;
            }
            writeln!(f)?;
        }

        for r in &self.modes {
            writeln!(
                f,
                "{} flush latency (ms): {}",
                r.mode.as_str().to_uppercase(),
                r.flush_latency_ms
            )?;
        }
        for r in &self.modes {
            if !r.outcome.is_completed() {
                writeln!(
                    f,
                    "{}: {} ({} of {} events stored)",
                    r.mode.as_str().to_uppercase(),
                    r.outcome,
                    r.stored,
                    r.produced
                )?;
            }
            if r.unaccounted() > 0 {
                writeln!(
                    f,
                    "{}: {} events unaccounted for",
                    r.mode.as_str().to_uppercase(),
                    r.unaccounted()
                )?;
            }
        }
        if let Some(mode) = self.fastest() {
            writeln!(f, "Fastest end-to-end: {}", mode.as_str().to_uppercase())?;
        }
        Ok(())
    }
}
