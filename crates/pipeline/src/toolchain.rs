//! The external native-packaging toolchain.
//!
//! The pipeline only talks to [`Toolchain`]; [`CordovaCli`] drives a
//! Cordova-compatible command line. Only exit codes and the presence of
//! output files are observed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::subprocess::{run_command, SubprocessError};

/// Release binary location relative to the project directory.
pub const RELEASE_ARTIFACT: &str = "platforms/android/app/build/outputs/apk/release/app-release.apk";

/// Target platform every project is built for.
pub const PLATFORM: &str = "android";

#[derive(Debug, thiserror::Error)]
pub enum ToolchainError {
    #[error("failed to launch `{command}`: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with code {exit_code:?}")]
    Failed {
        command: String,
        exit_code: Option<i32>,
        output: String,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },
}

#[async_trait]
pub trait Toolchain: Send + Sync {
    /// Scaffold a new project at `project_dir`, which must not exist yet.
    async fn create_project(
        &self,
        project_dir: &Path,
        package_id: &str,
        app_name: &str,
    ) -> Result<(), ToolchainError>;

    /// Add the Android platform to an existing project.
    async fn add_platform(&self, project_dir: &Path) -> Result<(), ToolchainError>;

    /// Run a release build for Android.
    async fn build_release(&self, project_dir: &Path) -> Result<(), ToolchainError>;

    /// Where a successful release build leaves its binary.
    fn release_artifact(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(RELEASE_ARTIFACT)
    }
}

/// Drives the `cordova` CLI (or a compatible binary).
#[derive(Debug, Clone)]
pub struct CordovaCli {
    bin: String,
    timeout: Duration,
}

impl CordovaCli {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }

    async fn run(&self, cwd: &Path, args: &[&str]) -> Result<(), ToolchainError> {
        let command = std::iter::once(self.bin.as_str())
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::debug!(command = %command, cwd = %cwd.display(), "Running toolchain command");

        let mut cmd = Command::new(&self.bin);
        cmd.args(args).current_dir(cwd);

        let output = match run_command(&mut cmd, self.timeout).await {
            Ok(output) => output,
            Err(SubprocessError::Spawn(source)) | Err(SubprocessError::Wait(source)) => {
                return Err(ToolchainError::Launch { command, source });
            }
            Err(SubprocessError::Timeout { .. }) => {
                return Err(ToolchainError::Timeout {
                    command,
                    secs: self.timeout.as_secs(),
                });
            }
        };

        tracing::debug!(
            command = %command,
            exit_code = ?output.exit_code,
            duration_ms = output.duration_ms,
            "Toolchain command finished",
        );

        if output.success() {
            Ok(())
        } else {
            Err(ToolchainError::Failed {
                command,
                exit_code: output.exit_code,
                output: output.diagnostic().to_string(),
            })
        }
    }
}

#[async_trait]
impl Toolchain for CordovaCli {
    async fn create_project(
        &self,
        project_dir: &Path,
        package_id: &str,
        app_name: &str,
    ) -> Result<(), ToolchainError> {
        let parent = project_dir.parent().unwrap_or(Path::new("."));
        let dir = project_dir.to_string_lossy();
        self.run(parent, &["create", &dir, package_id, app_name]).await
    }

    async fn add_platform(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        self.run(project_dir, &["platform", "add", PLATFORM]).await
    }

    async fn build_release(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        self.run(project_dir, &["build", PLATFORM, "--release"]).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn nonzero_exit_is_reported_with_output() {
        let dir = tempfile::tempdir().unwrap();
        // `false` ignores its arguments and exits 1.
        let cli = CordovaCli::new("false", Duration::from_secs(5));
        let result = cli.build_release(dir.path()).await;
        assert_matches!(
            result,
            Err(ToolchainError::Failed { exit_code: Some(1), ref command, .. })
                if command == "false build android --release"
        );
    }

    #[tokio::test]
    async fn missing_binary_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let cli = CordovaCli::new("no-such-toolchain-binary", Duration::from_secs(5));
        assert_matches!(
            cli.add_platform(dir.path()).await,
            Err(ToolchainError::Launch { .. })
        );
    }

    #[test]
    fn release_artifact_is_under_platform_outputs() {
        let cli = CordovaCli::new("cordova", Duration::from_secs(1));
        let path = cli.release_artifact(Path::new("/work/project"));
        assert_eq!(
            path,
            Path::new("/work/project/platforms/android/app/build/outputs/apk/release/app-release.apk")
        );
    }
}
