//! Error taxonomy for single-command benchmarking.

/// Errors produced while executing a shell command.
///
/// A non-zero exit status is *not* an `ExecError`; it is reported through
/// [`crate::ExecOutput::exit_code`] and interpreted by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn shell: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("execution environment error: {0}")]
    Environment(String),
}

/// Errors that abort a whole benchmark invocation.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkError {
    #[error("run count must be greater than 0")]
    InvalidRunCount,

    #[error("command must not be empty")]
    EmptyCommand,

    #[error("warm-up run failed: {detail}")]
    WarmupFailed { detail: String },

    #[error("benchmark cancelled after {completed} of {total} runs")]
    Cancelled { completed: usize, total: usize },
}

/// Result type for benchmark operations.
pub type Result<T> = std::result::Result<T, BenchmarkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warmup_failed_display() {
        let err = BenchmarkError::WarmupFailed {
            detail: "exit status 2".to_string(),
        };
        assert_eq!(err.to_string(), "warm-up run failed: exit status 2");
    }

    #[test]
    fn test_exec_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "bash not found");
        let err: ExecError = io.into();
        assert!(err.to_string().contains("failed to spawn shell"));
    }
}
