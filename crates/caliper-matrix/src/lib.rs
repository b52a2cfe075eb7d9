//! Caliper Matrix
//!
//! Benchmarks a repository's build command across a set of CPU/RAM
//! envelopes, one isolated container per envelope, and summarizes how wall
//! time scales with resources.
//!
//! ```text
//! MatrixConfig ──► MatrixOrchestrator ──► ContainerRuntime (docker / fake)
//!                        │                    create → clone → stage →
//!                        │                    nested caliper → pull → destroy
//!                        ▼
//!                   MatrixResult ──► report / chart
//! ```

pub mod artifact;
pub mod chart;
pub mod config;
pub mod error;
pub mod fakes;
pub mod isolation;
pub mod orchestrator;
pub mod report;
pub mod result;

pub use artifact::resolve_artifact;
pub use config::{
    grid, parse_configs, parse_int_list, repo_name, sweep_cpu, sweep_ram, MatrixConfig,
    MatrixKind, ResourceConfig,
};
pub use error::{
    ArtifactError, ConfigSetError, IsolationError, IsolationResult, OrchestratorError, Result,
};
pub use isolation::{
    with_environment, ContainerRuntime, DockerCli, EnvironmentHandle, EnvironmentShell,
    EnvironmentSpec, ResourceLimits,
};
pub use orchestrator::{ConfigStage, MatrixOrchestrator};
pub use report::{print_summary, save_summary};
pub use result::{ConfigResult, MatrixDocument, MatrixResult};
