//! A toolchain double that tracks build concurrency.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use webapk_core::conversion::{AppMode, ConversionRequest};
use webapk_db::store::MemoryStore;
use webapk_pipeline::toolchain::{Toolchain, ToolchainError};
use webapk_pipeline::{Orchestrator, PipelineConfig};

pub struct SlowToolchain {
    build_time: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
    builds: AtomicUsize,
}

impl SlowToolchain {
    pub fn new(build_time: Duration) -> Arc<Self> {
        Arc::new(Self {
            build_time,
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
        })
    }

    /// Most builds observed running at the same time.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Toolchain for SlowToolchain {
    async fn create_project(
        &self,
        project_dir: &Path,
        package_id: &str,
        _app_name: &str,
    ) -> Result<(), ToolchainError> {
        std::fs::create_dir_all(project_dir.join("www")).unwrap();
        std::fs::write(
            project_dir.join("config.xml"),
            format!("<widget id=\"{package_id}\"><name>HelloCordova</name></widget>"),
        )
        .unwrap();
        Ok(())
    }

    async fn add_platform(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        std::fs::create_dir_all(project_dir.join("platforms/android")).unwrap();
        Ok(())
    }

    async fn build_release(&self, project_dir: &Path) -> Result<(), ToolchainError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.build_time).await;
        let artifact = self.release_artifact(project_dir);
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(&artifact, b"apk").unwrap();

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub root: tempfile::TempDir,
    pub store: MemoryStore,
    pub toolchain: Arc<SlowToolchain>,
    pub orchestrator: Arc<Orchestrator>,
}

impl Harness {
    pub fn new(build_time: Duration) -> Self {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let toolchain = SlowToolchain::new(build_time);
        let config = PipelineConfig {
            work_root: root.path().join("work"),
            downloads_dir: root.path().join("downloads"),
            toolchain_bin: "fake".into(),
            build_timeout: Duration::from_secs(5),
            verify_url_reachable: false,
            url_probe_timeout: Duration::from_secs(1),
        };
        let orchestrator =
            Orchestrator::new(Arc::new(store.clone()), toolchain.clone(), config).unwrap();
        Self {
            root,
            store,
            toolchain,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Submit `count` online conversions; returns their job ids.
    pub async fn submit(&self, count: usize) -> Vec<i64> {
        let mut ids = Vec::with_capacity(count);
        for n in 0..count {
            let request = ConversionRequest::new(
                &format!("App {n}"),
                AppMode::Online,
                None,
                Some(format!("https://example.com/{n}")),
                None,
            )
            .unwrap();
            let submission = self.orchestrator.submit(1, &request).await.unwrap();
            ids.push(submission.job.id);
        }
        ids
    }
}
