//! Error types for caliper-matrix

use std::path::PathBuf;

use thiserror::Error;

/// Malformed resource configuration input. Raised before any environment
/// is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigSetError {
    /// A `CPU:MEM` pair did not split into two positive integers
    #[error("invalid config format {entry:?}: expected CPU:MEM with positive integers (e.g. 2:8)")]
    MalformedConfig { entry: String },

    /// An integer list entry was not a positive integer
    #[error("invalid list value {entry:?}: expected comma-separated positive integers")]
    MalformedList { entry: String },

    /// The resulting set of configurations is empty
    #[error("no configurations specified")]
    Empty,
}

/// Failures of the container runtime capability.
#[derive(Error, Debug)]
pub enum IsolationError {
    /// Runtime daemon unreachable or binary missing
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Image absent locally and the pull failed
    #[error("failed to fetch image {image}: {reason}")]
    ImageFetchFailed { image: String, reason: String },

    /// Creating or starting the environment failed
    #[error("failed to create environment: {0}")]
    EnvironmentCreateFailed(String),

    /// The exec primitive itself failed (not a non-zero exit)
    #[error("exec failed: {0}")]
    ExecFailed(String),

    /// Copying into or out of the environment failed
    #[error("transfer of {path} failed: {reason}")]
    TransferFailed { path: String, reason: String },

    /// Stop or remove failed
    #[error("failed to destroy environment {id}: {reason}")]
    DestroyFailed { id: String, reason: String },

    /// Handle does not refer to a live environment
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias for isolation operations.
pub type IsolationResult<T> = std::result::Result<T, IsolationError>;

/// Errors fatal to a whole matrix invocation. Per-configuration failures
/// are recorded on the result instead.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigSetError),

    #[error(transparent)]
    Isolation(#[from] IsolationError),

    /// Host-side workspace or output directory problem
    #[error("host filesystem error at {path}: {source}")]
    HostIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Resolving the executable staged into each environment failed.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact not found at {0}")]
    NotFound(PathBuf),

    #[error("cross-compilation failed: {0}")]
    BuildFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_names_entry() {
        let err = ConfigSetError::MalformedConfig {
            entry: "2:8:1".to_string(),
        };
        assert!(err.to_string().contains("\"2:8:1\""));
    }

    #[test]
    fn test_isolation_error_converts_to_orchestrator() {
        let err: OrchestratorError =
            IsolationError::RuntimeUnavailable("connection refused".to_string()).into();
        assert!(err.to_string().contains("connection refused"));
    }
}
