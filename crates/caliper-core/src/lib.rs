//! Caliper Core Library
//!
//! Runs a shell command repeatedly, times every run, and summarises the
//! timing distribution. The runner is environment-agnostic: it drives any
//! [`ShellExecutor`], whether that is the host shell or a container.
//!
//! ## Modules
//!
//! - [`stats`]: mean / median / population stddev / interpolated percentiles
//! - [`runner`]: warm-up + measured runs, failure isolation per run
//! - [`executor`]: the shell capability and its host implementation
//! - [`report`]: persisted JSON/CSV/Markdown artifacts and console output
//! - [`cancel`]: cooperative cancellation token and signal listener

pub mod cancel;
pub mod error;
pub mod executor;
pub mod format;
pub mod obs;
pub mod report;
pub mod runner;
pub mod stats;
pub mod telemetry;

pub use cancel::{listen_for_shutdown, CancellationToken};
pub use error::{BenchmarkError, ExecError, Result};
pub use executor::{ExecOutput, HostShell, ShellExecutor};
pub use format::{format_duration, format_duration_detailed};
pub use report::{
    print_console, render_csv, render_markdown, save_csv, save_json, save_markdown,
    OutcomeDocument, RunDocument, SummaryDocument,
};
pub use runner::{default_name, BenchmarkConfig, BenchmarkOutcome, BenchmarkRunner, RunRecord};
pub use stats::{calculate_statistics, percentile, Statistics};
pub use telemetry::init_tracing;

/// Caliper version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
