//! Shared fixtures: a scripted toolchain, archive and icon builders.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use webapk_core::types::DbId;
use webapk_db::models::analytics::{AnalyticsEvent, CreateAnalyticsEvent};
use webapk_db::models::apk::{Apk, ApkUpdate, CreateApk};
use webapk_db::models::conversion_job::{ConversionJob, JobUpdate};
use webapk_db::models::status::JobStatus;
use webapk_db::store::{ConversionStore, MemoryStore, StoreResult};
use webapk_pipeline::toolchain::{Toolchain, ToolchainError};
use webapk_pipeline::{Orchestrator, PipelineConfig};

/// What the fake release build does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildBehavior {
    /// Write the artifact: a copy of the packaged `www/index.html`.
    Succeed,
    /// Exit non-zero with a diagnostic.
    Fail,
    /// Exit zero without producing anything.
    NoArtifact,
    /// Report a timeout.
    Timeout,
}

pub const BUILD_FAILURE_OUTPUT: &str = "BUILD FAILED: Android SDK not found";

/// Toolchain double that lays out just enough of a project on disk.
pub struct FakeToolchain {
    behavior: BuildBehavior,
    calls: Mutex<Vec<String>>,
}

impl FakeToolchain {
    pub fn new(behavior: BuildBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl Toolchain for FakeToolchain {
    async fn create_project(
        &self,
        project_dir: &Path,
        package_id: &str,
        _app_name: &str,
    ) -> Result<(), ToolchainError> {
        self.record(format!("create {package_id}"));
        std::fs::create_dir_all(project_dir.join("www")).unwrap();
        std::fs::write(project_dir.join("www/index.html"), "placeholder").unwrap();
        std::fs::write(
            project_dir.join("config.xml"),
            format!(
                "<?xml version='1.0' encoding='utf-8'?>\n\
                 <widget id=\"{package_id}\" version=\"1.0.0\">\n    \
                 <name>HelloCordova</name>\n</widget>\n"
            ),
        )
        .unwrap();
        Ok(())
    }

    async fn add_platform(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        self.record("platform add android");
        std::fs::create_dir_all(project_dir.join("platforms/android")).unwrap();
        Ok(())
    }

    async fn build_release(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        self.record("build android --release");
        match self.behavior {
            BuildBehavior::Succeed => {
                let artifact = self.release_artifact(project_dir);
                std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
                std::fs::copy(project_dir.join("www/index.html"), artifact).unwrap();
                Ok(())
            }
            BuildBehavior::Fail => Err(ToolchainError::Failed {
                command: "cordova build android --release".into(),
                exit_code: Some(1),
                output: BUILD_FAILURE_OUTPUT.into(),
            }),
            BuildBehavior::NoArtifact => Ok(()),
            BuildBehavior::Timeout => Err(ToolchainError::Timeout {
                command: "cordova build android --release".into(),
                secs: 1,
            }),
        }
    }
}

/// Temp directories plus an orchestrator wired to a memory store.
pub struct Harness {
    pub root: tempfile::TempDir,
    pub store: MemoryStore,
    pub toolchain: Arc<FakeToolchain>,
    pub orchestrator: Orchestrator,
}

impl Harness {
    pub fn new(behavior: BuildBehavior) -> Self {
        let store = MemoryStore::new();
        Self::with_store(behavior, store.clone(), Arc::new(store))
    }

    /// Harness whose orchestrator writes through a [`WatchedStore`].
    pub fn watched(behavior: BuildBehavior) -> (Self, Arc<WatchedStore>) {
        let store = MemoryStore::new();
        let watched = Arc::new(WatchedStore::new(store.clone()));
        (Self::with_store(behavior, store, watched.clone()), watched)
    }

    fn with_store(
        behavior: BuildBehavior,
        store: MemoryStore,
        backing: Arc<dyn ConversionStore>,
    ) -> Self {
        let root = tempfile::tempdir().unwrap();
        let toolchain = FakeToolchain::new(behavior);
        let config = PipelineConfig {
            work_root: root.path().join("work"),
            downloads_dir: root.path().join("downloads"),
            toolchain_bin: "fake".into(),
            build_timeout: Duration::from_secs(5),
            verify_url_reachable: false,
            url_probe_timeout: Duration::from_secs(1),
        };
        let orchestrator = Orchestrator::new(backing, toolchain.clone(), config).unwrap();
        Self {
            root,
            store,
            toolchain,
            orchestrator,
        }
    }

    pub fn uploads(&self) -> PathBuf {
        let dir = self.root.path().join("uploads");
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn work_root(&self) -> PathBuf {
        self.root.path().join("work")
    }

    /// Entries left behind in the work root.
    pub fn leftover_workspaces(&self) -> usize {
        match std::fs::read_dir(self.work_root()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

/// Store that checks, after every write, whether some artifact is
/// downloadable while its latest job is not completed.
pub struct WatchedStore {
    inner: MemoryStore,
    exposures: Mutex<Vec<String>>,
}

impl WatchedStore {
    pub fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            exposures: Mutex::new(Vec::new()),
        }
    }

    /// Observed states where a download would have been served early.
    pub fn exposures(&self) -> Vec<String> {
        self.exposures.lock().unwrap().clone()
    }

    async fn check(&self, apk_id: DbId) {
        let Some(apk) = self.inner.apk_by_id(apk_id).await.unwrap() else {
            return;
        };
        let job = self.inner.job_by_artifact(apk_id).await.unwrap();
        let job_done = matches!(&job, Some(job) if job.status == JobStatus::Completed);
        if apk.is_downloadable() && !job_done {
            self.exposures.lock().unwrap().push(format!(
                "apk {apk_id} downloadable while job is {:?}",
                job.map(|j| (j.status, j.progress))
            ));
        }
    }
}

#[async_trait]
impl ConversionStore for WatchedStore {
    async fn create_apk(&self, input: &CreateApk) -> StoreResult<Apk> {
        self.inner.create_apk(input).await
    }

    async fn apk_by_id(&self, id: DbId) -> StoreResult<Option<Apk>> {
        self.inner.apk_by_id(id).await
    }

    async fn apks_by_user(&self, user_id: DbId) -> StoreResult<Vec<Apk>> {
        self.inner.apks_by_user(user_id).await
    }

    async fn all_apks(&self) -> StoreResult<Vec<Apk>> {
        self.inner.all_apks().await
    }

    async fn update_apk(&self, id: DbId, update: &ApkUpdate) -> StoreResult<Option<Apk>> {
        let result = self.inner.update_apk(id, update).await;
        self.check(id).await;
        result
    }

    async fn delete_apk(&self, id: DbId) -> StoreResult<bool> {
        self.inner.delete_apk(id).await
    }

    async fn increment_download_count(&self, id: DbId) -> StoreResult<Option<i64>> {
        self.inner.increment_download_count(id).await
    }

    async fn record_analytics(&self, event: &CreateAnalyticsEvent) -> StoreResult<AnalyticsEvent> {
        self.inner.record_analytics(event).await
    }

    async fn create_job(&self, apk_id: DbId) -> StoreResult<ConversionJob> {
        self.inner.create_job(apk_id).await
    }

    async fn job_by_id(&self, id: DbId) -> StoreResult<Option<ConversionJob>> {
        self.inner.job_by_id(id).await
    }

    async fn job_by_artifact(&self, apk_id: DbId) -> StoreResult<Option<ConversionJob>> {
        self.inner.job_by_artifact(apk_id).await
    }

    async fn update_job(&self, job_id: DbId, update: &JobUpdate) -> StoreResult<Option<ConversionJob>> {
        let result = self.inner.update_job(job_id, update).await;
        if let Some(job) = self.inner.job_by_id(job_id).await.unwrap() {
            self.check(job.apk_id).await;
        }
        result
    }

    async fn complete_conversion(
        &self,
        job_id: DbId,
        apk_path: &str,
        size: &str,
    ) -> StoreResult<Option<(Apk, ConversionJob)>> {
        let result = self.inner.complete_conversion(job_id, apk_path, size).await;
        if let Some(job) = self.inner.job_by_id(job_id).await.unwrap() {
            self.check(job.apk_id).await;
        }
        result
    }

    async fn claim_next_queued(&self) -> StoreResult<Option<ConversionJob>> {
        self.inner.claim_next_queued().await
    }

    async fn jobs_with_status(&self, status: JobStatus) -> StoreResult<Vec<ConversionJob>> {
        self.inner.jobs_with_status(status).await
    }

    async fn health_check(&self) -> StoreResult<()> {
        self.inner.health_check().await
    }
}

/// Write a zip archive with the given `(name, contents)` entries.
pub fn write_zip(path: &Path, entries: &[(&str, &str)]) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, contents) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(contents.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

/// Write a solid-colour PNG of the given size.
pub fn write_png(path: &Path, width: u32, height: u32) {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
    img.save_with_format(path, image::ImageFormat::Png).unwrap();
}
