//! Benchmark execution: optional warm-up followed by N measured runs.
//!
//! A failing warm-up aborts the invocation with
//! [`BenchmarkError::WarmupFailed`]. A failing measured run is recorded and
//! excluded from statistics, and the loop carries on.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::cancel::CancellationToken;
use crate::error::{BenchmarkError, Result};
use crate::executor::ShellExecutor;
use crate::format::format_duration;
use crate::obs;
use crate::stats::{calculate_statistics, Statistics};

/// Configuration for one benchmark invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Shell command line to benchmark.
    pub command: String,

    /// Number of measured runs (warm-up excluded).
    pub runs: usize,

    /// Report name; used as the output file stem.
    pub name: String,

    /// Directory reports are written to.
    pub output_dir: PathBuf,

    /// Skip the warm-up run.
    pub skip_warmup: bool,

    /// Mirror command output live to the terminal.
    pub debug: bool,
}

impl BenchmarkConfig {
    pub fn new(command: impl Into<String>, runs: usize) -> Self {
        Self {
            command: command.into(),
            runs,
            name: default_name("benchmark"),
            output_dir: PathBuf::from("."),
            skip_warmup: false,
            debug: false,
        }
    }
}

/// `<prefix>_YYYYMMDD_HHMMSS` in local time.
pub fn default_name(prefix: &str) -> String {
    format!("{}_{}", prefix, chrono::Local::now().format("%Y%m%d_%H%M%S"))
}

/// Outcome of a single execution attempt. Index 0 is the warm-up.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_number: usize,
    pub duration: Duration,
    pub success: bool,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn seconds(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Complete result of one benchmark invocation.
#[derive(Debug, Clone)]
pub struct BenchmarkOutcome {
    pub config: BenchmarkConfig,
    pub warmup: Option<RunRecord>,
    pub runs: Vec<RunRecord>,
    pub statistics: Statistics,
    /// `100 * successful / configured runs`.
    pub success_rate: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_duration: Duration,
}

impl BenchmarkOutcome {
    pub fn successful_runs(&self) -> usize {
        self.runs.iter().filter(|r| r.success).count()
    }

    pub fn failed_runs(&self) -> usize {
        self.runs.len() - self.successful_runs()
    }

    /// True when every measured run succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.failed_runs() == 0
    }
}

/// Runs a command repeatedly through a [`ShellExecutor`].
pub struct BenchmarkRunner<'a> {
    executor: &'a dyn ShellExecutor,
    cancel: CancellationToken,
}

impl<'a> BenchmarkRunner<'a> {
    pub fn new(executor: &'a dyn ShellExecutor) -> Self {
        Self {
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe `cancel` between runs.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Execute the warm-up (if enabled) and exactly `config.runs` measured runs.
    pub async fn run(&self, config: &BenchmarkConfig) -> Result<BenchmarkOutcome> {
        if config.runs == 0 {
            return Err(BenchmarkError::InvalidRunCount);
        }
        if config.command.trim().is_empty() {
            return Err(BenchmarkError::EmptyCommand);
        }

        let start_time = Utc::now();
        let started = Instant::now();
        println!("Starting benchmark...\n");

        let warmup = if config.skip_warmup {
            None
        } else {
            Some(self.warmup(config).await?)
        };

        let mut runs = Vec::with_capacity(config.runs);
        for run_number in 1..=config.runs {
            if self.cancel.is_cancelled() {
                return Err(BenchmarkError::Cancelled {
                    completed: runs.len(),
                    total: config.runs,
                });
            }

            announce(config, &format!("Run {}/{}", run_number, config.runs));
            let record = self.execute(run_number, config).await;
            if record.success {
                conclude(
                    config,
                    &format!("Run {}/{}", run_number, config.runs),
                    &format!("✓ Completed in {}", format_duration(record.seconds())),
                );
            } else {
                conclude(
                    config,
                    &format!("Run {}/{}", run_number, config.runs),
                    &format!("✗ Failed: {}", record.error.as_deref().unwrap_or("unknown")),
                );
            }
            obs::emit_run_finished(run_number, record.seconds(), record.success);
            runs.push(record);
        }

        let durations: Vec<f64> = runs
            .iter()
            .filter(|r| r.success)
            .map(RunRecord::seconds)
            .collect();
        let statistics = calculate_statistics(&durations);
        let success_rate = durations.len() as f64 / config.runs as f64 * 100.0;

        Ok(BenchmarkOutcome {
            config: config.clone(),
            warmup,
            runs,
            statistics,
            success_rate,
            start_time,
            end_time: Utc::now(),
            total_duration: started.elapsed(),
        })
    }

    async fn warmup(&self, config: &BenchmarkConfig) -> Result<RunRecord> {
        announce(config, "Warm-up");
        let record = self.execute(0, config).await;
        if record.success {
            conclude(
                config,
                "Warm-up",
                &format!(
                    "✓ Completed in {} (excluded from stats)",
                    format_duration(record.seconds())
                ),
            );
            println!();
            Ok(record)
        } else {
            let detail = record.error.unwrap_or_else(|| "unknown error".to_string());
            conclude(config, "Warm-up", &format!("✗ Failed: {}", detail));
            Err(BenchmarkError::WarmupFailed { detail })
        }
    }

    async fn execute(&self, run_number: usize, config: &BenchmarkConfig) -> RunRecord {
        let started = Instant::now();
        let result = self.executor.run_shell(&config.command, config.debug).await;
        let duration = started.elapsed();

        let (success, error) = match result {
            Ok(out) if out.success() => (true, None),
            Ok(out) => (false, Some(out.failure_detail())),
            Err(err) => (false, Some(err.to_string())),
        };

        RunRecord {
            run_number,
            duration,
            success,
            error,
        }
    }
}

// With mirrored output the result goes on its own line; otherwise it
// completes the "Run i/N: " prefix.
fn announce(config: &BenchmarkConfig, label: &str) {
    if config.debug {
        println!("{}: (streaming output)", label);
    } else {
        print!("{}: ", label);
        let _ = std::io::stdout().flush();
    }
}

fn conclude(config: &BenchmarkConfig, label: &str, message: &str) {
    if config.debug {
        println!("{}: {}", label, message);
    } else {
        println!("{}", message);
    }
}
