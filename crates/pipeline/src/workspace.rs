//! Scoped per-job scratch directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use webapk_core::types::DbId;

/// Subdirectory holding the resolved web content.
const CONTENT_DIR: &str = "content";
/// Subdirectory holding the native wrapper project.
const PROJECT_DIR: &str = "project";

/// A job's private scratch directory under the work root.
///
/// The directory and everything in it is removed when the value is
/// dropped, on success, failure and panic alike.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create `<work_root>/job-<job_id>-XXXXXX`, creating the root if needed.
    pub fn create(work_root: &Path, job_id: DbId) -> std::io::Result<Self> {
        std::fs::create_dir_all(work_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("job-{job_id}-"))
            .tempdir_in(work_root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the resolver places web content.
    pub fn content_dir(&self) -> PathBuf {
        self.dir.path().join(CONTENT_DIR)
    }

    /// Where the native project is scaffolded. Fresh for every job.
    pub fn project_dir(&self) -> PathBuf {
        self.dir.path().join(PROJECT_DIR)
    }
}
