//! Shell execution capability.
//!
//! The benchmark runner only needs "run this command line through a POSIX
//! shell and tell me how it exited". [`HostShell`] does that on the local
//! machine; the matrix crate provides a container-backed implementation.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::ExecError;

/// Captured result of one shell invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code (0 = success, -1 when terminated by a signal).
    pub exit_code: i32,

    /// Captured stdout. Empty when output was mirrored to the terminal.
    pub stdout: String,

    /// Captured stderr. Empty when output was mirrored to the terminal.
    pub stderr: String,
}

impl ExecOutput {
    /// Whether the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Short human-readable description of a failed exit.
    pub fn failure_detail(&self) -> String {
        if self.exit_code < 0 {
            return "terminated by signal".to_string();
        }
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exit status {}", self.exit_code)
        } else {
            let last = stderr.lines().last().unwrap_or(stderr);
            format!("exit status {}: {}", self.exit_code, last)
        }
    }
}

/// Anything that can run a command line through a POSIX shell.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    /// Run `command` via `bash -c`.
    ///
    /// When `mirror` is true the command's output is shown live on the
    /// caller's terminal. The exit code is returned, not interpreted.
    async fn run_shell(&self, command: &str, mirror: bool) -> Result<ExecOutput, ExecError>;
}

/// Executes commands with the host's `bash`.
#[derive(Debug, Clone)]
pub struct HostShell {
    shell: String,
}

impl HostShell {
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }

    /// Use a different shell binary (must accept `-c <command>`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for HostShell {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellExecutor for HostShell {
    async fn run_shell(&self, command: &str, mirror: bool) -> Result<ExecOutput, ExecError> {
        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command).stdin(Stdio::null()).kill_on_drop(true);

        if mirror {
            let status = cmd
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()
                .await?;
            return Ok(ExecOutput {
                exit_code: status.code().unwrap_or(-1),
                stdout: String::new(),
                stderr: String::new(),
            });
        }

        let output = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_detail_uses_last_stderr_line() {
        let out = ExecOutput {
            exit_code: 2,
            stdout: String::new(),
            stderr: "warning: x\nerror: boom\n".to_string(),
        };
        assert_eq!(out.failure_detail(), "exit status 2: error: boom");
    }

    #[test]
    fn test_failure_detail_without_stderr() {
        let out = ExecOutput {
            exit_code: 1,
            ..Default::default()
        };
        assert_eq!(out.failure_detail(), "exit status 1");
    }

    #[tokio::test]
    async fn test_host_shell_supports_pipelines() {
        let out = HostShell::new()
            .run_shell("echo hello | tr a-z A-Z && echo done", false)
            .await
            .expect("shell failed");
        assert!(out.success());
        assert!(out.stdout.contains("HELLO"));
        assert!(out.stdout.contains("done"));
    }

    #[tokio::test]
    async fn test_host_shell_reports_exit_code() {
        let out = HostShell::new()
            .run_shell("echo oops >&2; exit 3", false)
            .await
            .expect("shell failed");
        assert_eq!(out.exit_code, 3);
        assert!(out.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_missing_shell_is_spawn_error() {
        let err = HostShell::with_shell("/definitely/not/a/shell")
            .run_shell("true", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn(_)));
    }
}
