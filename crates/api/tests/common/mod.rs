//! Test app wiring: the production router over a memory store and a
//! scripted toolchain. Jobs are driven explicitly with [`TestApp::run_queued`].

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use webapk_api::config::ServerConfig;
use webapk_api::router::build_app_router;
use webapk_api::state::AppState;
use webapk_db::store::{ConversionStore, MemoryStore};
use webapk_pipeline::toolchain::{Toolchain, ToolchainError};
use webapk_pipeline::{JobOutcome, Orchestrator, PipelineConfig};

pub const BOUNDARY: &str = "webapk-test-boundary";

/// Toolchain double: scaffolds a minimal project and "packages" the
/// generated `www/index.html` as the artifact, or fails the build.
pub struct ScriptedToolchain {
    pub fail_build: bool,
}

#[async_trait]
impl Toolchain for ScriptedToolchain {
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
        if self.fail_build {
            return Err(ToolchainError::Failed {
                command: "cordova build android --release".into(),
                exit_code: Some(1),
                output: "BUILD FAILED".into(),
            });
        }
        let artifact = self.release_artifact(project_dir);
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::copy(project_dir.join("www/index.html"), artifact).unwrap();
        Ok(())
    }
}

pub fn test_config(uploads_dir: PathBuf) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        uploads_dir,
        embedded_worker: false,
    }
}

pub struct TestApp {
    pub root: tempfile::TempDir,
    pub store: MemoryStore,
    pub orchestrator: Arc<Orchestrator>,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_toolchain(ScriptedToolchain { fail_build: false })
    }

    pub fn failing() -> Self {
        Self::with_toolchain(ScriptedToolchain { fail_build: true })
    }

    fn with_toolchain(toolchain: ScriptedToolchain) -> Self {
        let root = tempfile::tempdir().unwrap();
        let store = MemoryStore::new();
        let pipeline_config = PipelineConfig {
            work_root: root.path().join("work"),
            downloads_dir: root.path().join("downloads"),
            toolchain_bin: "fake".into(),
            build_timeout: Duration::from_secs(5),
            verify_url_reachable: false,
            url_probe_timeout: Duration::from_secs(1),
        };
        let orchestrator = Arc::new(
            Orchestrator::new(Arc::new(store.clone()), Arc::new(toolchain), pipeline_config)
                .unwrap(),
        );

        let config = test_config(root.path().join("uploads"));
        let state = AppState {
            orchestrator: Arc::clone(&orchestrator),
            config: Arc::new(config.clone()),
            dispatcher: None,
        };
        let router = build_app_router(state, &config);

        Self {
            root,
            store,
            orchestrator,
            router,
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.path().join("uploads")
    }

    /// Files currently stored in the uploads directory.
    pub fn stored_uploads(&self) -> usize {
        match std::fs::read_dir(self.uploads_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    /// Claim and run every queued job to completion.
    pub async fn run_queued(&self) -> Vec<JobOutcome> {
        let mut outcomes = Vec::new();
        while let Some(job) = self.store.claim_next_queued().await.unwrap() {
            outcomes.push(self.orchestrator.run(job).await);
        }
        outcomes
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get_as(&self, uri: &str, user_id: i64) -> Response<Body> {
        self.send(as_user(Request::builder().method(Method::GET).uri(uri), user_id, false))
            .await
    }

    pub async fn get_as_admin(&self, uri: &str, user_id: i64) -> Response<Body> {
        self.send(as_user(Request::builder().method(Method::GET).uri(uri), user_id, true))
            .await
    }

    pub async fn delete_as(&self, uri: &str, user_id: i64) -> Response<Body> {
        self.send(as_user(Request::builder().method(Method::DELETE).uri(uri), user_id, false))
            .await
    }

    pub async fn submit_as(&self, user_id: i64, form: MultipartForm) -> Response<Body> {
        let (content_type, body) = form.finish();
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/apks")
            .header("content-type", content_type)
            .header("x-user-id", user_id.to_string())
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Submit an online conversion and return the new artifact id.
    pub async fn submit_online(&self, user_id: i64, name: &str) -> i64 {
        let form = MultipartForm::new()
            .text("name", name)
            .text("mode", "online")
            .text("url", "https://example.com");
        let response = self.submit_as(user_id, form).await;
        assert_eq!(response.status(), 201);
        body_json(response).await["data"]["apk"]["id"].as_i64().unwrap()
    }
}

fn as_user(builder: axum::http::request::Builder, user_id: i64, admin: bool) -> Request<Body> {
    let builder = builder.header("x-user-id", user_id.to_string());
    let builder = if admin {
        builder.header("x-user-role", "admin")
    } else {
        builder
    };
    builder.body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Minimal `multipart/form-data` encoder.
#[derive(Default)]
pub struct MultipartForm {
    body: Vec<u8>,
}

impl MultipartForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        write!(
            self.body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .unwrap();
        self
    }

    pub fn file(mut self, name: &str, file_name: &str, content_type: &str, data: &[u8]) -> Self {
        write!(
            self.body,
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; \
             filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .unwrap();
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> (String, Vec<u8>) {
        write!(self.body, "--{BOUNDARY}--\r\n").unwrap();
        (format!("multipart/form-data; boundary={BOUNDARY}"), self.body)
    }
}

/// Zip archive bytes with the given `(name, contents)` entries.
pub fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut cursor);
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    cursor.into_inner()
}

/// PNG bytes of a solid square.
pub fn png_bytes(size: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(size, size, image::Rgba([10, 120, 200, 255]));
    let mut cursor = std::io::Cursor::new(Vec::new());
    img.write_to(&mut cursor, image::ImageFormat::Png).unwrap();
    cursor.into_inner()
}
