//! Structured lifecycle events.
//!
//! Named `info!` events for runs, environments, and configurations. The
//! per-configuration `caliper.config` span is attached with `#[instrument]`
//! on the orchestrator future that drives each configuration.

use tracing::{info, warn};

/// A measured run finished.
pub fn emit_run_finished(run_number: usize, seconds: f64, success: bool) {
    info!(
        event = "benchmark.run_finished",
        run_number = run_number,
        seconds = seconds,
        success = success,
    );
}

/// The matrix started.
pub fn emit_matrix_started(image: &str, repo: &str, configs: usize) {
    info!(event = "matrix.started", image = %image, repo = %repo, configs = configs);
}

/// A configuration started.
pub fn emit_config_started(config: &str, index: usize, total: usize) {
    info!(event = "config.started", config = %config, index = index, total = total);
}

/// A configuration reached its terminal state.
pub fn emit_config_finished(config: &str, success: bool, reason: Option<&str>) {
    if success {
        info!(event = "config.finished", config = %config, success = true);
    } else {
        warn!(
            event = "config.finished",
            config = %config,
            success = false,
            reason = reason.unwrap_or(""),
        );
    }
}

/// An isolated environment was created.
pub fn emit_environment_created(id: &str, cpus: u32, memory_gb: u32) {
    info!(event = "environment.created", id = %id, cpus = cpus, memory_gb = memory_gb);
}

/// An isolated environment was torn down (or teardown failed).
pub fn emit_environment_destroyed(id: &str, error: Option<&dyn std::fmt::Display>) {
    match error {
        None => info!(event = "environment.destroyed", id = %id),
        Some(err) => warn!(event = "environment.destroy_failed", id = %id, error = %err),
    }
}
