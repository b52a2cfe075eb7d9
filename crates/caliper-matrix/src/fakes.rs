//! In-memory fake container runtime (testing only)
//!
//! `MemoryRuntime` satisfies the [`ContainerRuntime`] contract without a
//! daemon. Every environment gets its own in-memory filesystem, every call
//! is recorded, and exec behavior is scripted by a closure.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use caliper_core::ExecOutput;

use crate::config::ResourceConfig;
use crate::error::{IsolationError, IsolationResult};
use crate::isolation::archive::{self, ArchiveFile};
use crate::isolation::{ContainerRuntime, EnvironmentHandle, EnvironmentSpec};

// ---------------------------------------------------------------------------
// FakeFs
// ---------------------------------------------------------------------------

/// Flat map of absolute path to file contents.
#[derive(Debug, Default, Clone)]
pub struct FakeFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl FakeFs {
    pub fn write(&mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), data.into());
    }

    pub fn read(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Files strictly below `dir`, as (relative path, contents).
    pub fn under(&self, dir: &str) -> Vec<(String, Vec<u8>)> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        self.files
            .iter()
            .filter_map(|(path, data)| {
                path.strip_prefix(&prefix)
                    .map(|rel| (rel.to_string(), data.clone()))
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Call log
// ---------------------------------------------------------------------------

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    Ping,
    EnsureImage(String),
    Create {
        handle: EnvironmentHandle,
        resources: ResourceConfig,
    },
    Exec {
        handle: EnvironmentHandle,
        command: String,
        working_dir: String,
        mirror: bool,
    },
    PushFile {
        handle: EnvironmentHandle,
        dest: String,
    },
    PushDirectory {
        handle: EnvironmentHandle,
        dest: String,
    },
    PullDirectory {
        handle: EnvironmentHandle,
        src: String,
    },
    Destroy(EnvironmentHandle),
}

/// What an exec handler sees.
#[derive(Debug, Clone)]
pub struct ExecCall {
    pub handle: EnvironmentHandle,
    pub resources: ResourceConfig,
    pub command: String,
    pub working_dir: String,
}

type ExecHandler = Box<dyn Fn(&ExecCall, &mut FakeFs) -> IsolationResult<ExecOutput> + Send + Sync>;
type CreatePredicate = Box<dyn Fn(&ResourceConfig) -> bool + Send + Sync>;

// ---------------------------------------------------------------------------
// MemoryRuntime
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Environment {
    resources: ResourceConfig,
    fs: FakeFs,
}

#[derive(Debug, Default)]
struct State {
    live: HashMap<EnvironmentHandle, Environment>,
    calls: Vec<RuntimeCall>,
    next_id: u64,
}

/// In-memory container runtime.
pub struct MemoryRuntime {
    state: Mutex<State>,
    exec_handler: ExecHandler,
    fail_create: Option<CreatePredicate>,
    unreachable: bool,
}

impl Default for MemoryRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRuntime {
    /// Every exec exits 0 with no output.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            exec_handler: Box::new(|_, _| Ok(ExecOutput::default())),
            fail_create: None,
            unreachable: false,
        }
    }

    /// Script exec behavior. The handler may mutate the environment's files.
    pub fn with_exec_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ExecCall, &mut FakeFs) -> IsolationResult<ExecOutput> + Send + Sync + 'static,
    {
        self.exec_handler = Box::new(handler);
        self
    }

    /// Fail environment creation for configs matching `predicate`.
    pub fn failing_create_when<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ResourceConfig) -> bool + Send + Sync + 'static,
    {
        self.fail_create = Some(Box::new(predicate));
        self
    }

    /// Fail `ping` as if no daemon were running.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every call so far.
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.lock().calls.clone()
    }

    /// Handles in creation order.
    pub fn created(&self) -> Vec<EnvironmentHandle> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Create { handle, .. } => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }

    /// Handles in destruction order.
    pub fn destroyed(&self) -> Vec<EnvironmentHandle> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Destroy(handle) => Some(handle.clone()),
                _ => None,
            })
            .collect()
    }

    /// Environments created but not yet destroyed.
    pub fn live_environments(&self) -> usize {
        self.lock().live.len()
    }

    /// Commands executed, in order.
    pub fn commands(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RuntimeCall::Exec { command, .. } => Some(command.clone()),
                _ => None,
            })
            .collect()
    }

    fn store(&self, handle: &EnvironmentHandle, dest_parent: &str, files: Vec<ArchiveFile>) -> IsolationResult<()> {
        let mut state = self.lock();
        let env = state
            .live
            .get_mut(handle)
            .ok_or_else(|| IsolationError::UnknownEnvironment(handle.id().to_string()))?;
        for file in files {
            env.fs
                .write(format!("{}/{}", dest_parent.trim_end_matches('/'), file.path), file.data);
        }
        Ok(())
    }
}

fn parent_of(path: &str) -> (&str, &str) {
    path.trim_end_matches('/')
        .rsplit_once('/')
        .unwrap_or(("", path))
}

fn transfer_failed(path: &str, err: impl ToString) -> IsolationError {
    IsolationError::TransferFailed {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl ContainerRuntime for MemoryRuntime {
    async fn ping(&self) -> IsolationResult<()> {
        self.lock().calls.push(RuntimeCall::Ping);
        if self.unreachable {
            return Err(IsolationError::RuntimeUnavailable(
                "Cannot connect to the Docker daemon".to_string(),
            ));
        }
        Ok(())
    }

    async fn ensure_image(&self, image: &str) -> IsolationResult<()> {
        self.lock()
            .calls
            .push(RuntimeCall::EnsureImage(image.to_string()));
        Ok(())
    }

    async fn create_environment(
        &self,
        spec: &EnvironmentSpec,
    ) -> IsolationResult<EnvironmentHandle> {
        if self.fail_create.as_ref().is_some_and(|f| f(&spec.resources)) {
            return Err(IsolationError::EnvironmentCreateFailed(format!(
                "scripted failure for {}",
                spec.resources.dir_name()
            )));
        }

        let mut state = self.lock();
        state.next_id += 1;
        let handle = EnvironmentHandle::new(format!(
            "{:012x}{}",
            state.next_id,
            uuid::Uuid::new_v4().simple()
        ));
        state.live.insert(
            handle.clone(),
            Environment {
                resources: spec.resources,
                fs: FakeFs::default(),
            },
        );
        state.calls.push(RuntimeCall::Create {
            handle: handle.clone(),
            resources: spec.resources,
        });
        Ok(handle)
    }

    async fn exec(
        &self,
        handle: &EnvironmentHandle,
        command: &str,
        working_dir: &str,
        mirror: bool,
    ) -> IsolationResult<ExecOutput> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Exec {
            handle: handle.clone(),
            command: command.to_string(),
            working_dir: working_dir.to_string(),
            mirror,
        });
        let env = state
            .live
            .get_mut(handle)
            .ok_or_else(|| IsolationError::UnknownEnvironment(handle.id().to_string()))?;
        let call = ExecCall {
            handle: handle.clone(),
            resources: env.resources,
            command: command.to_string(),
            working_dir: working_dir.to_string(),
        };
        (self.exec_handler)(&call, &mut env.fs)
    }

    async fn push_file(
        &self,
        handle: &EnvironmentHandle,
        host_path: &Path,
        dest: &str,
    ) -> IsolationResult<()> {
        self.lock().calls.push(RuntimeCall::PushFile {
            handle: handle.clone(),
            dest: dest.to_string(),
        });
        let (parent, name) = parent_of(dest);
        let tar = archive::encode_file(host_path, name).map_err(|e| transfer_failed(dest, e))?;
        let files = archive::read_files(&tar).map_err(|e| transfer_failed(dest, e))?;
        self.store(handle, parent, files)
    }

    async fn push_directory(
        &self,
        handle: &EnvironmentHandle,
        host_dir: &Path,
        dest: &str,
    ) -> IsolationResult<()> {
        self.lock().calls.push(RuntimeCall::PushDirectory {
            handle: handle.clone(),
            dest: dest.to_string(),
        });
        let (parent, name) = parent_of(dest);
        let tar = archive::encode_directory(host_dir, name).map_err(|e| transfer_failed(dest, e))?;
        let files = archive::read_files(&tar).map_err(|e| transfer_failed(dest, e))?;
        self.store(handle, parent, files)
    }

    async fn pull_directory(
        &self,
        handle: &EnvironmentHandle,
        src: &str,
        host_dir: &Path,
    ) -> IsolationResult<usize> {
        let files = {
            let mut state = self.lock();
            state.calls.push(RuntimeCall::PullDirectory {
                handle: handle.clone(),
                src: src.to_string(),
            });
            let env = state
                .live
                .get(handle)
                .ok_or_else(|| IsolationError::UnknownEnvironment(handle.id().to_string()))?;
            env.fs.under(src)
        };
        if files.is_empty() {
            return Err(transfer_failed(src, "no such directory in environment"));
        }

        let (_, root) = parent_of(src);
        let entries: Vec<ArchiveFile> = files
            .into_iter()
            .map(|(rel, data)| ArchiveFile {
                path: format!("{}/{}", root, rel),
                mode: 0o644,
                data,
            })
            .collect();
        let tar = archive::encode_files(&entries).map_err(|e| transfer_failed(src, e))?;
        archive::unpack_stripped(&tar, host_dir).map_err(|e| transfer_failed(src, e))
    }

    async fn destroy(&self, handle: &EnvironmentHandle) -> IsolationResult<()> {
        let mut state = self.lock();
        state.calls.push(RuntimeCall::Destroy(handle.clone()));
        state
            .live
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| IsolationError::UnknownEnvironment(handle.id().to_string()))
    }
}
