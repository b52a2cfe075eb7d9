//! Locate the Linux executable staged into every environment.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::info;

use crate::error::ArtifactError;

/// Musl target matching the host architecture, so the binary runs in any
/// Linux image.
pub fn linux_target() -> String {
    format!("{}-unknown-linux-musl", std::env::consts::ARCH)
}

/// Resolve the artifact in order: an explicit path, the running executable
/// on Linux hosts, then a release cross-build of this workspace.
pub async fn resolve_artifact(explicit: Option<&Path>) -> Result<PathBuf, ArtifactError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ArtifactError::NotFound(path.to_path_buf()))
        };
    }

    if cfg!(target_os = "linux") {
        return Ok(std::env::current_exe()?);
    }

    cross_build(&workspace_root()).await
}

fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

async fn cross_build(root: &Path) -> Result<PathBuf, ArtifactError> {
    let target = linux_target();
    info!(target = %target, "building linux artifact");
    println!("Building caliper for {}...", target);

    let output = Command::new("cargo")
        .args(["build", "--release", "-p", "caliper-cli", "--target", target.as_str()])
        .current_dir(root)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let last = stderr.lines().last().unwrap_or("").trim().to_string();
        return Err(ArtifactError::BuildFailed(format!(
            "cargo exited with {}: {}",
            output.status.code().unwrap_or(-1),
            last
        )));
    }

    let path = root
        .join("target")
        .join(&target)
        .join("release")
        .join("caliper");
    if path.is_file() {
        Ok(path)
    } else {
        Err(ArtifactError::NotFound(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_explicit_path_must_exist() {
        let err = resolve_artifact(Some(Path::new("/nonexistent/caliper")))
            .await
            .unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_explicit_path_wins() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = resolve_artifact(Some(file.path())).await.unwrap();
        assert_eq!(path, file.path());
    }

    #[test]
    fn test_linux_target_is_musl() {
        assert!(linux_target().ends_with("-unknown-linux-musl"));
    }
}
