//! Native Project Materializer: scaffolds or refreshes the wrapper project.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;
use webapk_core::conversion::AppMode;
use webapk_core::naming::package_id;

use crate::error::{PipelineError, PipelineErrorKind, Stage};
use crate::icons::render_icon_set;
use crate::manifest::set_app_name;
use crate::toolchain::{Toolchain, ToolchainError, PLATFORM};

/// Project manifest file.
pub const CONFIG_FILE: &str = "config.xml";
/// Web asset directory the toolchain packages.
pub const WWW_DIR: &str = "www";
/// Launcher icon output directory, relative to the project.
pub const ICON_DIR: &str = "res/android";

/// Map a toolchain failure onto the pipeline taxonomy for `stage`.
pub(crate) fn toolchain_error(stage: Stage, err: ToolchainError) -> PipelineError {
    let kind = match err {
        ToolchainError::Failed {
            command,
            exit_code,
            output,
        } => PipelineErrorKind::Toolchain {
            command,
            exit_code,
            output: crate::error::truncate_output(&output),
        },
        ToolchainError::Timeout { command, secs } => PipelineErrorKind::Timeout { command, secs },
        ToolchainError::Launch { command, source } => PipelineErrorKind::Toolchain {
            command,
            exit_code: None,
            output: source.to_string(),
        },
    };
    PipelineError::new(stage, kind)
}

/// Copy the contents of `from` into `to`, creating directories as needed.
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Replace `www/` wholesale with the contents of `content_dir`. Blocking.
pub fn replace_web_assets(project_dir: &Path, content_dir: &Path) -> std::io::Result<()> {
    let www = project_dir.join(WWW_DIR);
    if www.exists() {
        std::fs::remove_dir_all(&www)?;
    }
    std::fs::create_dir_all(&www)?;
    copy_tree(content_dir, &www)
}

pub struct Materializer {
    toolchain: Arc<dyn Toolchain>,
}

impl Materializer {
    pub fn new(toolchain: Arc<dyn Toolchain>) -> Self {
        Self { toolchain }
    }

    /// Bring `project_dir` to a buildable state for `app_name`.
    ///
    /// Idempotent: scaffolding steps run only when their output is missing,
    /// web assets are replaced rather than merged, and icons and manifest
    /// are rewritten in place. `mode` does not change the project layout.
    pub async fn materialize(
        &self,
        project_dir: &Path,
        content_dir: &Path,
        app_name: &str,
        icon: Option<&Path>,
        mode: AppMode,
    ) -> Result<(), PipelineError> {
        tracing::debug!(
            project_dir = %project_dir.display(),
            mode = %mode,
            "Materializing native project",
        );

        self.ensure_skeleton(project_dir, app_name).await?;

        let project = project_dir.to_path_buf();
        let content = content_dir.to_path_buf();
        run_blocking(move || replace_web_assets(&project, &content))
            .await?
            .map_err(|e| PipelineError::storage(Stage::Materialize, format!("copying web assets: {e}")))?;

        if let Some(icon) = icon {
            let icon = icon.to_path_buf();
            let out_dir = project_dir.join(ICON_DIR);
            run_blocking(move || render_icon_set(&icon, &out_dir))
                .await?
                .map_err(PipelineError::materialize)?;
        }

        self.write_app_name(project_dir, app_name).await
    }

    async fn ensure_skeleton(&self, project_dir: &Path, app_name: &str) -> Result<(), PipelineError> {
        if !tokio::fs::try_exists(project_dir.join(CONFIG_FILE))
            .await
            .unwrap_or(false)
        {
            self.toolchain
                .create_project(project_dir, &package_id(app_name), app_name)
                .await
                .map_err(|e| toolchain_error(Stage::Materialize, e))?;
        }

        if !tokio::fs::try_exists(platform_dir(project_dir))
            .await
            .unwrap_or(false)
        {
            self.toolchain
                .add_platform(project_dir)
                .await
                .map_err(|e| toolchain_error(Stage::Materialize, e))?;
        }
        Ok(())
    }

    async fn write_app_name(&self, project_dir: &Path, app_name: &str) -> Result<(), PipelineError> {
        let config_path = project_dir.join(CONFIG_FILE);
        let xml = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| PipelineError::materialize(format!("reading {CONFIG_FILE}: {e}")))?;
        let updated = set_app_name(&xml, app_name).map_err(PipelineError::materialize)?;
        tokio::fs::write(&config_path, updated)
            .await
            .map_err(|e| PipelineError::storage(Stage::Materialize, format!("writing {CONFIG_FILE}: {e}")))
    }
}

fn platform_dir(project_dir: &Path) -> PathBuf {
    project_dir.join("platforms").join(PLATFORM)
}

async fn run_blocking<T, F>(f: F) -> Result<T, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PipelineError::storage(Stage::Materialize, format!("blocking task failed: {e}")))
}
