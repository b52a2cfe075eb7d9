//! Sequential matrix orchestration.
//!
//! Each configuration walks `Pending → EnvironmentReady → RepositoryCloned
//! → ArtifactStaged → BenchmarkExecuting → ResultsCollected → TornDown`.
//! A failing step ends that configuration only; the environment is always
//! torn down and the matrix moves on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use caliper_core::obs;
use caliper_core::{format_duration, CancellationToken, OutcomeDocument};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::config::{MatrixConfig, ResourceConfig};
use crate::error::{OrchestratorError, Result};
use crate::isolation::{
    with_environment, ContainerRuntime, EnvironmentHandle, EnvironmentSpec, WORKSPACE_MOUNT,
};
use crate::result::{ConfigResult, MatrixResult};

/// Where the artifact lands inside the environment.
pub const ARTIFACT_PATH: &str = "/workspace/caliper";
/// Clone target inside the environment.
pub const REPO_PATH: &str = "/workspace/repo";
/// Nested benchmark output directory inside the environment.
pub const RESULTS_PATH: &str = "/workspace/results";

/// Lifecycle of one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigStage {
    Pending,
    EnvironmentReady,
    RepositoryCloned,
    ArtifactStaged,
    BenchmarkExecuting,
    ResultsCollected,
    TornDown,
}

impl ConfigStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStage::Pending => "pending",
            ConfigStage::EnvironmentReady => "environment ready",
            ConfigStage::RepositoryCloned => "repository cloned",
            ConfigStage::ArtifactStaged => "artifact staged",
            ConfigStage::BenchmarkExecuting => "benchmark executing",
            ConfigStage::ResultsCollected => "results collected",
            ConfigStage::TornDown => "torn down",
        }
    }
}

impl fmt::Display for ConfigStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A step that ended its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
struct StepFailure(String);

impl StepFailure {
    fn at(step: &str, reason: impl fmt::Display) -> Self {
        Self(format!("{} failed: {}", step, reason))
    }
}

/// Drives a [`MatrixConfig`] through a [`ContainerRuntime`].
pub struct MatrixOrchestrator<R: ContainerRuntime + ?Sized> {
    runtime: Arc<R>,
    artifact: PathBuf,
    cancel: CancellationToken,
}

impl<R: ContainerRuntime + ?Sized> MatrixOrchestrator<R> {
    /// `artifact` is the Linux executable staged into every environment.
    pub fn new(runtime: Arc<R>, artifact: impl Into<PathBuf>) -> Self {
        Self {
            runtime,
            artifact: artifact.into(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run every configuration in order.
    ///
    /// Returns `Err` only for failures that make the whole matrix
    /// meaningless (empty set, unreachable runtime, missing image or
    /// artifact, unusable host directories). Everything else is recorded on
    /// the per-configuration result.
    pub async fn run(&self, config: &MatrixConfig) -> Result<MatrixResult> {
        config.validate()?;
        if !self.artifact.is_file() {
            return Err(OrchestratorError::HostIo {
                path: self.artifact.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "artifact not found"),
            });
        }

        let started = Instant::now();
        self.runtime.ping().await?;

        print_header(config);
        obs::emit_matrix_started(&config.image, &config.repo_url, config.configs.len());

        self.runtime.ensure_image(&config.image).await?;

        std::fs::create_dir_all(&config.output_dir).map_err(|source| OrchestratorError::HostIo {
            path: config.output_dir.clone(),
            source,
        })?;
        let workspace = tempfile::Builder::new()
            .prefix("caliper-matrix-")
            .tempdir()
            .map_err(|source| OrchestratorError::HostIo {
                path: std::env::temp_dir(),
                source,
            })?;

        let total = config.configs.len();
        let mut results = Vec::with_capacity(total);
        for (index, resources) in config.configs.iter().enumerate() {
            if self.cancel.is_cancelled() {
                println!(
                    "✗ Configuration {}/{} skipped: {}",
                    index + 1,
                    total,
                    resources.label()
                );
                results.push(ConfigResult::failed(
                    *resources,
                    config.runs,
                    "cancelled before start",
                ));
                continue;
            }
            let result = self
                .run_config(config, resources, index, total, workspace.path())
                .await;
            results.push(result);
        }

        Ok(MatrixResult {
            config: config.clone(),
            results,
            cancelled: self.cancel.is_cancelled(),
            elapsed: started.elapsed(),
        })
    }

    #[instrument(name = "caliper.config", skip_all, fields(config = %resources.dir_name()))]
    async fn run_config(
        &self,
        config: &MatrixConfig,
        resources: &ResourceConfig,
        index: usize,
        total: usize,
        workspace_root: &Path,
    ) -> ConfigResult {
        let started = Instant::now();
        let label = resources.dir_name();
        obs::emit_config_started(&label, index + 1, total);

        println!();
        println!("========================================");
        println!("Configuration {}/{}: {}", index + 1, total, resources.label());
        println!("========================================");

        let host_mount = workspace_root.join(&label);
        let mut result = match std::fs::create_dir_all(&host_mount) {
            Err(err) => ConfigResult::failed(
                *resources,
                config.runs,
                format!("workspace setup failed: {}", err),
            ),
            Ok(()) => {
                let spec = EnvironmentSpec {
                    image: config.image.clone(),
                    resources: *resources,
                    host_mount,
                };
                println!("  Creating container...");
                match with_environment(&*self.runtime, &spec, |handle| {
                    self.drive(config, resources, handle)
                })
                .await
                {
                    Ok(Ok(result)) => result,
                    Ok(Err(StepFailure(reason))) => {
                        ConfigResult::failed(*resources, config.runs, reason)
                    }
                    Err(err) => ConfigResult::failed(
                        *resources,
                        config.runs,
                        format!("environment creation failed: {}", err),
                    ),
                }
            }
        };
        debug!(stage = %ConfigStage::TornDown, "stage");
        result.elapsed = started.elapsed();

        obs::emit_config_finished(&label, result.success, result.error.as_deref());
        match &result.error {
            None => println!(
                "✓ Configuration {}/{} completed successfully",
                index + 1,
                total
            ),
            Some(reason) if !result.success => {
                println!("✗ Configuration {}/{} failed: {}", index + 1, total, reason)
            }
            Some(reason) => println!(
                "✓ Configuration {}/{} completed with warning: {}",
                index + 1,
                total,
                reason
            ),
        }
        println!(
            "  Configuration time: {}",
            format_duration(result.elapsed.as_secs_f64())
        );
        result
    }

    async fn drive(
        &self,
        config: &MatrixConfig,
        resources: &ResourceConfig,
        handle: EnvironmentHandle,
    ) -> std::result::Result<ConfigResult, StepFailure> {
        let runtime = &*self.runtime;
        let mut stage = ConfigStage::Pending;
        self.advance(&mut stage, ConfigStage::EnvironmentReady)?;

        println!("  Cloning repository...");
        let clone = format!(
            "git clone --depth 1 {} {}",
            shell_quote(&config.repo_url),
            REPO_PATH
        );
        self.exec_step(&handle, &clone, WORKSPACE_MOUNT, "repository clone", config.debug)
            .await?;
        self.advance(&mut stage, ConfigStage::RepositoryCloned)?;

        println!("  Staging benchmark binary...");
        runtime
            .push_file(&handle, &self.artifact, ARTIFACT_PATH)
            .await
            .map_err(|e| StepFailure::at("artifact staging", e))?;
        let prepare = format!("chmod +x {} && mkdir -p {}", ARTIFACT_PATH, RESULTS_PATH);
        self.exec_step(&handle, &prepare, WORKSPACE_MOUNT, "artifact staging", config.debug)
            .await?;
        self.advance(&mut stage, ConfigStage::ArtifactStaged)?;

        let name = config.nested_name(resources);
        println!("  Running benchmark ({} runs)...", config.runs);
        // Nested output is mirrored regardless of --debug.
        let output = runtime
            .exec(&handle, &nested_command(config, &name), REPO_PATH, true)
            .await
            .map_err(|e| StepFailure::at("benchmark", e))?;
        self.advance(&mut stage, ConfigStage::BenchmarkExecuting)?;

        let host_results = config.output_dir.join(resources.dir_name());
        let document = match runtime
            .pull_directory(&handle, RESULTS_PATH, &host_results)
            .await
        {
            Ok(_) => read_document(&host_results.join(format!("{}.json", name))),
            Err(err) => Err(err.to_string()),
        };
        stage = ConfigStage::ResultsCollected;
        debug!(stage = %stage, "stage");

        Ok(fold_result(resources, config.runs, output.exit_code, document))
    }

    /// Record a transition, then honor cancellation.
    fn advance(
        &self,
        stage: &mut ConfigStage,
        next: ConfigStage,
    ) -> std::result::Result<(), StepFailure> {
        *stage = next;
        debug!(stage = %next, "stage");
        if self.cancel.is_cancelled() {
            return Err(StepFailure(format!("cancelled after {}", next)));
        }
        Ok(())
    }

    async fn exec_step(
        &self,
        handle: &EnvironmentHandle,
        command: &str,
        working_dir: &str,
        step: &str,
        mirror: bool,
    ) -> std::result::Result<(), StepFailure> {
        let out = self
            .runtime
            .exec(handle, command, working_dir, mirror)
            .await
            .map_err(|e| StepFailure::at(step, e))?;
        if out.success() {
            Ok(())
        } else {
            Err(StepFailure::at(step, out.failure_detail()))
        }
    }
}

/// Combine the nested exit code with whatever result document came back.
///
/// A readable document means the benchmark ran; a nonzero exit then only
/// signals failed runs, which the document's counts already carry.
fn fold_result(
    resources: &ResourceConfig,
    runs: usize,
    exit_code: i32,
    document: std::result::Result<OutcomeDocument, String>,
) -> ConfigResult {
    match (document, exit_code) {
        (Ok(doc), code) => {
            if code != 0 {
                debug!(
                    exit_code = code,
                    failed = doc.summary.failed,
                    "nested benchmark reported failed runs"
                );
            }
            ConfigResult {
                resources: *resources,
                success: true,
                error: None,
                total_runs: doc.summary.total_runs,
                success_runs: doc.summary.successful,
                success_rate: doc.summary.success_rate,
                statistics: Some(doc.statistics),
                elapsed: Default::default(),
            }
        }
        (Err(reason), 0) => {
            warn!(reason = %reason, "benchmark succeeded but its results could not be read");
            ConfigResult {
                resources: *resources,
                success: true,
                error: Some(format!("results unavailable: {}", reason)),
                total_runs: runs,
                success_runs: runs,
                success_rate: 100.0,
                statistics: None,
                elapsed: Default::default(),
            }
        }
        (Err(reason), code) => ConfigResult::failed(
            *resources,
            runs,
            format!("benchmark failed (exit code {}): {}", code, reason),
        ),
    }
}

fn read_document(path: &Path) -> std::result::Result<OutcomeDocument, String> {
    let raw = std::fs::read_to_string(path).map_err(|e| format!("read {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("parse {}: {}", path.display(), e))
}

/// The caliper invocation run inside the environment.
pub fn nested_command(config: &MatrixConfig, name: &str) -> String {
    let mut cmd = format!(
        "{} --runs {} --command {} --output-dir {} --name {}",
        ARTIFACT_PATH,
        config.runs,
        shell_quote(&config.command),
        RESULTS_PATH,
        shell_quote(name)
    );
    if config.skip_warmup {
        cmd.push_str(" --no-warmup");
    }
    if config.debug {
        cmd.push_str(" --debug");
    }
    cmd
}

/// Quote for `bash -c`; plain words pass through unchanged.
pub fn shell_quote(value: &str) -> String {
    let plain = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:@%+=,".contains(c));
    if plain {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

fn print_header(config: &MatrixConfig) {
    println!("Caliper Matrix: {}", config.kind.title());
    println!("========================================");
    println!("Image:          {}", config.image);
    println!("Repository:     {}", config.repo_url);
    println!("Command:        {}", config.command);
    println!("Runs per config: {}", config.runs);
    println!("Configurations: {}", config.configs.len());
}
