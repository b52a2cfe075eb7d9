//! Isolated, resource-bounded execution environments.
//!
//! [`ContainerRuntime`] is the capability the orchestrator depends on.
//! [`DockerCli`] drives a real daemon; `fakes::MemoryRuntime` is the
//! in-memory double used by tests. Use [`with_environment`] rather than
//! calling create/destroy directly: it guarantees teardown on every exit
//! path.

pub mod archive;
pub mod docker;
pub mod limits;
pub mod shell;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use caliper_core::ExecOutput;
use futures::FutureExt;

use crate::config::ResourceConfig;
use crate::error::IsolationResult;

pub use docker::DockerCli;
pub use limits::ResourceLimits;
pub use shell::EnvironmentShell;

/// Where the host workspace is bound inside every environment.
pub const WORKSPACE_MOUNT: &str = "/workspace";

/// What to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSpec {
    pub image: String,
    pub resources: ResourceConfig,
    /// Host directory bound at [`WORKSPACE_MOUNT`].
    pub host_mount: PathBuf,
}

/// Opaque identifier of a live environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvironmentHandle(String);

impl EnvironmentHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }

    /// First 12 characters, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for EnvironmentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

/// Container runtime capability.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check the runtime is reachable.
    async fn ping(&self) -> IsolationResult<()>;

    /// Make `image` available locally, pulling it if absent.
    async fn ensure_image(&self, image: &str) -> IsolationResult<()>;

    /// Create and start a bounded environment.
    async fn create_environment(&self, spec: &EnvironmentSpec)
        -> IsolationResult<EnvironmentHandle>;

    /// Run `command` via `bash -c` in `working_dir`. The exit code is
    /// returned, not interpreted.
    async fn exec(
        &self,
        handle: &EnvironmentHandle,
        command: &str,
        working_dir: &str,
        mirror: bool,
    ) -> IsolationResult<ExecOutput>;

    /// Copy one host file to the absolute path `dest` inside the environment.
    async fn push_file(
        &self,
        handle: &EnvironmentHandle,
        host_path: &Path,
        dest: &str,
    ) -> IsolationResult<()>;

    /// Copy a host directory to `dest` inside the environment.
    async fn push_directory(
        &self,
        handle: &EnvironmentHandle,
        host_dir: &Path,
        dest: &str,
    ) -> IsolationResult<()>;

    /// Copy the contents of `src` inside the environment into `host_dir`.
    /// Returns the number of files written.
    async fn pull_directory(
        &self,
        handle: &EnvironmentHandle,
        src: &str,
        host_dir: &Path,
    ) -> IsolationResult<usize>;

    /// Stop and force-remove the environment.
    async fn destroy(&self, handle: &EnvironmentHandle) -> IsolationResult<()>;
}

/// Create an environment, run `body` against it, and destroy it on every
/// exit path including panics inside `body`.
///
/// A failed destroy is logged, not returned; the body's result wins.
pub async fn with_environment<R, F, Fut, T>(
    runtime: &R,
    spec: &EnvironmentSpec,
    body: F,
) -> IsolationResult<T>
where
    R: ContainerRuntime + ?Sized,
    F: FnOnce(EnvironmentHandle) -> Fut,
    Fut: Future<Output = T>,
{
    let handle = runtime.create_environment(spec).await?;
    caliper_core::obs::emit_environment_created(
        handle.short(),
        spec.resources.cpus,
        spec.resources.memory_gb,
    );

    let outcome = AssertUnwindSafe(body(handle.clone())).catch_unwind().await;

    match runtime.destroy(&handle).await {
        Ok(()) => caliper_core::obs::emit_environment_destroyed(handle.short(), None),
        Err(err) => {
            caliper_core::obs::emit_environment_destroyed(handle.short(), Some(&err as &dyn fmt::Display))
        }
    }

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
