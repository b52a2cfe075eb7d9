//! [`ContainerRuntime`] backed by the `docker` CLI.
//!
//! Every operation shells out through `tokio::process`. File transfer
//! streams tar archives over `docker cp`'s stdin/stdout.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use caliper_core::ExecOutput;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use super::archive;
use super::{ContainerRuntime, EnvironmentHandle, EnvironmentSpec, ResourceLimits, WORKSPACE_MOUNT};
use crate::error::{IsolationError, IsolationResult};

/// Seconds `docker stop` waits before killing.
const STOP_TIMEOUT_SECS: &str = "10";

/// Drives a Docker daemon through its command-line client.
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl DockerCli {
    pub fn new() -> Self {
        Self::with_binary("docker")
    }

    /// Use an alternative client binary (e.g. `podman`).
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).kill_on_drop(true);
        cmd
    }

    async fn output(&self, args: &[&str]) -> IsolationResult<Output> {
        debug!(binary = %self.binary, args = ?args, "docker");
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))
    }

    /// Run and require exit status 0; the error carries trimmed stderr.
    async fn checked(&self, args: &[&str]) -> Result<String, String> {
        let out = self.output(args).await.map_err(|e| e.to_string())?;
        if out.status.success() {
            Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
        } else {
            Err(stderr_of(&out))
        }
    }

    fn spawn_error(&self, err: std::io::Error) -> IsolationError {
        if err.kind() == std::io::ErrorKind::NotFound {
            IsolationError::RuntimeUnavailable(format!("{} not found on PATH", self.binary))
        } else {
            IsolationError::Io(err)
        }
    }

    async fn copy_in(&self, handle: &EnvironmentHandle, parent: &str, tar: Vec<u8>) -> Result<(), String> {
        let target = format!("{}:{}", handle.id(), parent);
        let mut child = self
            .command(&["cp", "-", target.as_str()])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| e.to_string())?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&tar).await.map_err(|e| e.to_string())?;
            stdin.shutdown().await.map_err(|e| e.to_string())?;
        }

        let out = child.wait_with_output().await.map_err(|e| e.to_string())?;
        if out.status.success() {
            Ok(())
        } else {
            Err(stderr_of(&out))
        }
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

fn stderr_of(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exit status {}", out.status.code().unwrap_or(-1))
    } else {
        stderr
    }
}

/// Split an absolute container path into (parent, basename).
fn split_dest(dest: &str) -> (String, String) {
    let trimmed = dest.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/".to_string(), name.to_string()),
        Some((parent, name)) => (parent.to_string(), name.to_string()),
        None => (".".to_string(), trimmed.to_string()),
    }
}

/// Forward lines from `reader` to the terminal while keeping a copy.
///
/// Bytes that are not UTF-8 are replaced, never treated as end of stream.
async fn tee<R: AsyncRead + Unpin>(reader: R, to_stderr: bool) -> String {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(err) => {
                debug!(error = %err, "mirrored stream closed");
                break;
            }
        }
        let text = String::from_utf8_lossy(&buf);
        let line = text.trim_end_matches(['\n', '\r']);
        if to_stderr {
            eprintln!("{}", line);
        } else {
            println!("{}", line);
        }
        captured.push_str(line);
        captured.push('\n');
    }
    captured
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn ping(&self) -> IsolationResult<()> {
        let version = self
            .checked(&["version", "--format", "{{.Server.Version}}"])
            .await
            .map_err(IsolationError::RuntimeUnavailable)?;
        debug!(server_version = %version, "docker reachable");
        Ok(())
    }

    async fn ensure_image(&self, image: &str) -> IsolationResult<()> {
        if self.checked(&["image", "inspect", image]).await.is_ok() {
            return Ok(());
        }
        info!(image = %image, "pulling image");
        println!("Pulling image {}...", image);
        self.checked(&["pull", image])
            .await
            .map(|_| ())
            .map_err(|reason| IsolationError::ImageFetchFailed {
                image: image.to_string(),
                reason,
            })
    }

    async fn create_environment(
        &self,
        spec: &EnvironmentSpec,
    ) -> IsolationResult<EnvironmentHandle> {
        let limits = ResourceLimits::for_config(&spec.resources);
        let mount = format!("{}:{}", spec.host_mount.display(), WORKSPACE_MOUNT);
        let label = format!("caliper.config={}", spec.resources.dir_name());

        let mut args: Vec<String> = vec!["create".to_string()];
        args.extend(limits.docker_args());
        args.extend(
            [
                "--label",
                label.as_str(),
                "-v",
                mount.as_str(),
                "-w",
                WORKSPACE_MOUNT,
                spec.image.as_str(),
                "sleep",
                "infinity",
            ]
            .iter()
            .map(|s| s.to_string()),
        );
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let id = self
            .checked(&args)
            .await
            .map_err(IsolationError::EnvironmentCreateFailed)?;
        if id.is_empty() {
            return Err(IsolationError::EnvironmentCreateFailed(
                "runtime returned no container id".to_string(),
            ));
        }

        if let Err(reason) = self.checked(&["start", id.as_str()]).await {
            let _ = self.checked(&["rm", "-f", id.as_str()]).await;
            return Err(IsolationError::EnvironmentCreateFailed(reason));
        }
        Ok(EnvironmentHandle::new(id))
    }

    async fn exec(
        &self,
        handle: &EnvironmentHandle,
        command: &str,
        working_dir: &str,
        mirror: bool,
    ) -> IsolationResult<ExecOutput> {
        let args = ["exec", "-w", working_dir, handle.id(), "bash", "-c", command];
        debug!(id = %handle, command = %command, working_dir = %working_dir, "exec");

        if !mirror {
            let out = self.output(&args).await?;
            return Ok(ExecOutput {
                exit_code: out.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        }

        let mut child = self
            .command(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| IsolationError::ExecFailed("stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| IsolationError::ExecFailed("stderr not captured".to_string()))?;

        let (stdout, stderr, status) =
            tokio::join!(tee(stdout, false), tee(stderr, true), child.wait());
        let status = status.map_err(|e| IsolationError::ExecFailed(e.to_string()))?;

        Ok(ExecOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }

    async fn push_file(
        &self,
        handle: &EnvironmentHandle,
        host_path: &Path,
        dest: &str,
    ) -> IsolationResult<()> {
        let (parent, name) = split_dest(dest);
        let failed = |reason: String| IsolationError::TransferFailed {
            path: dest.to_string(),
            reason,
        };
        let tar = archive::encode_file(host_path, &name).map_err(|e| failed(e.to_string()))?;
        self.copy_in(handle, &parent, tar).await.map_err(failed)
    }

    async fn push_directory(
        &self,
        handle: &EnvironmentHandle,
        host_dir: &Path,
        dest: &str,
    ) -> IsolationResult<()> {
        let (parent, name) = split_dest(dest);
        let failed = |reason: String| IsolationError::TransferFailed {
            path: dest.to_string(),
            reason,
        };
        let dir = host_dir.to_path_buf();
        let tar = tokio::task::spawn_blocking(move || archive::encode_directory(&dir, &name))
            .await
            .map_err(|e| failed(e.to_string()))?
            .map_err(|e| failed(e.to_string()))?;
        self.copy_in(handle, &parent, tar).await.map_err(failed)
    }

    async fn pull_directory(
        &self,
        handle: &EnvironmentHandle,
        src: &str,
        host_dir: &Path,
    ) -> IsolationResult<usize> {
        let failed = |reason: String| IsolationError::TransferFailed {
            path: src.to_string(),
            reason,
        };
        let source = format!("{}:{}", handle.id(), src);
        let out = self.output(&["cp", source.as_str(), "-"]).await?;
        if !out.status.success() {
            return Err(failed(stderr_of(&out)));
        }

        let dest = host_dir.to_path_buf();
        tokio::task::spawn_blocking(move || archive::unpack_stripped(&out.stdout, &dest))
            .await
            .map_err(|e| failed(e.to_string()))?
            .map_err(|e| failed(e.to_string()))
    }

    async fn destroy(&self, handle: &EnvironmentHandle) -> IsolationResult<()> {
        if let Err(reason) = self.checked(&["stop", "-t", STOP_TIMEOUT_SECS, handle.id()]).await {
            debug!(id = %handle, reason = %reason, "stop failed, forcing removal");
        }
        self.checked(&["rm", "-f", handle.id()])
            .await
            .map(|_| ())
            .map_err(|reason| IsolationError::DestroyFailed {
                id: handle.id().to_string(),
                reason,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_dest() {
        assert_eq!(
            split_dest("/workspace/caliper"),
            ("/workspace".to_string(), "caliper".to_string())
        );
        assert_eq!(
            split_dest("/workspace/repo/"),
            ("/workspace".to_string(), "repo".to_string())
        );
        assert_eq!(split_dest("/tool"), ("/".to_string(), "tool".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_mirrored_exec_survives_invalid_utf8() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let client = dir.path().join("fake-docker");
        std::fs::write(
            &client,
            "#!/bin/sh\nprintf 'line1\\n\\377\\376 bad\\nline3 after\\n'\nprintf 'err\\377\\n' >&2\n",
        )
        .unwrap();
        std::fs::set_permissions(&client, std::fs::Permissions::from_mode(0o755)).unwrap();

        let docker = DockerCli::with_binary(client.to_string_lossy().into_owned());
        let out = docker
            .exec(&EnvironmentHandle::new("env"), "ignored", "/", true)
            .await
            .unwrap();

        assert_eq!(out.exit_code, 0);
        assert!(out.stdout.starts_with("line1\n"), "{:?}", out.stdout);
        assert!(out.stdout.contains("\u{FFFD}"), "{:?}", out.stdout);
        assert!(out.stdout.ends_with("line3 after\n"), "{:?}", out.stdout);
        assert_eq!(out.stderr, "err\u{FFFD}\n");
    }

    #[tokio::test]
    async fn test_missing_binary_is_runtime_unavailable() {
        let docker = DockerCli::with_binary("caliper-no-such-docker-binary");
        let err = docker.ping().await.unwrap_err();
        assert!(matches!(err, IsolationError::RuntimeUnavailable(_)), "{err:?}");
    }
}
