//! Build Invoker: runs the release build and locates the produced binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use webapk_core::conversion::AppMode;

use crate::error::{PipelineError, PipelineErrorKind, Stage};
use crate::materializer::toolchain_error;
use crate::toolchain::Toolchain;

pub struct BuildInvoker {
    toolchain: Arc<dyn Toolchain>,
}

impl BuildInvoker {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self { toolchain }
    }

    /// Build `project_dir` in release mode and return the binary's path.
    ///
    /// A failing toolchain and a toolchain that exits cleanly without
    /// producing the binary are reported as different error kinds. No
    /// retries happen here.
    pub async fn build(
        &self,
        project_dir: &Path,
        app_name: &str,
        mode: AppMode,
    ) -> Result<PathBuf, PipelineError> {
        tracing::info!(app_name, mode = %mode, "Starting release build");

        self.toolchain
            .build_release(project_dir)
            .await
            .map_err(|e| toolchain_error(Stage::Build, e))?;

        let expected = self.toolchain.release_artifact(project_dir);
        if tokio::fs::try_exists(&expected).await.unwrap_or(false) {
            Ok(expected)
        } else {
            Err(PipelineError::new(
                Stage::Build,
                PipelineErrorKind::ArtifactNotProduced { expected },
            ))
        }
    }
}
