//! Run the benchmark runner against an isolated environment.

use async_trait::async_trait;
use caliper_core::{ExecError, ExecOutput, ShellExecutor};

use super::{ContainerRuntime, EnvironmentHandle};

/// [`ShellExecutor`] that executes inside a live environment.
pub struct EnvironmentShell<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    handle: EnvironmentHandle,
    working_dir: String,
}

impl<'a, R: ContainerRuntime + ?Sized> EnvironmentShell<'a, R> {
    pub fn new(runtime: &'a R, handle: EnvironmentHandle, working_dir: impl Into<String>) -> Self {
        Self {
            runtime,
            handle,
            working_dir: working_dir.into(),
        }
    }
}

#[async_trait]
impl<R: ContainerRuntime + ?Sized> ShellExecutor for EnvironmentShell<'_, R> {
    async fn run_shell(&self, command: &str, mirror: bool) -> Result<ExecOutput, ExecError> {
        self.runtime
            .exec(&self.handle, command, &self.working_dir, mirror)
            .await
            .map_err(|e| ExecError::Environment(e.to_string()))
    }
}
