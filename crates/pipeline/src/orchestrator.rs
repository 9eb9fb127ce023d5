//! Orchestrator: drives one conversion job through the pipeline.
//!
//! `queued -> processing -> completed | failed`. Progress is persisted at
//! each checkpoint in [`webapk_core::progress`]; every failure ends in a
//! single terminal `failed` write carrying the error description and kind.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;
use webapk_core::conversion::{ContentSource, ConversionRequest};
use webapk_core::error::CoreError;
use webapk_core::naming::{artifact_file_name, format_size_mb};
use webapk_core::progress;
use webapk_core::types::DbId;
use webapk_db::models::apk::{Apk, ApkUpdate, CreateApk};
use webapk_db::models::conversion_job::{ConversionJob, JobUpdate};
use webapk_db::models::status::{ApkStatus, JobStatus};
use webapk_db::store::{ConversionStore, StoreError};

use crate::builder::BuildInvoker;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineErrorKind, Stage};
use crate::materializer::Materializer;
use crate::resolver::{inspect_archive, SourceResolver, UrlProbe};
use crate::toolchain::Toolchain;
use crate::workspace::JobWorkspace;

/// Failure message for jobs whose artifact record disappeared.
pub const ARTIFACT_NOT_FOUND: &str = "artifact not found";

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { apk_path: PathBuf, size: String },
    Failed { message: String, kind: &'static str },
    /// The job was gone or already terminal; nothing was done.
    Skipped,
}

/// A freshly recorded submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub apk: Apk,
    pub job: ConversionJob,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The uploaded project can never build (bad structure, corrupt archive).
    #[error(transparent)]
    Rejected(#[from] PipelineError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SubmitError> for CoreError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Rejected(e) => match e.kind {
                PipelineErrorKind::InvalidProjectStructure(msg) => CoreError::Validation(msg),
                PipelineErrorKind::SourceResolution { message, .. } => CoreError::Validation(message),
                other => CoreError::Internal(other.to_string()),
            },
            SubmitError::Store(e) => e.into(),
        }
    }
}

struct Published {
    path: PathBuf,
    size: String,
}

pub struct Orchestrator {
    store: Arc<dyn ConversionStore>,
    resolver: SourceResolver,
    materializer: Materializer,
    builder: BuildInvoker,
    config: PipelineConfig,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ConversionStore>,
        toolchain: Arc<dyn Toolchain>,
        config: PipelineConfig,
    ) -> Result<Self, reqwest::Error> {
        let probe = if config.verify_url_reachable {
            Some(UrlProbe::new(config.url_probe_timeout)?)
        } else {
            None
        };
        Ok(Self {
            store,
            resolver: SourceResolver::new(probe),
            materializer: Materializer::new(Arc::clone(&toolchain)),
            builder: BuildInvoker::new(toolchain),
            config,
        })
    }

    pub fn store(&self) -> &Arc<dyn ConversionStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Record a new artifact and its queued job.
    ///
    /// Archive structure is checked first, so a project without a usable
    /// `index.html` is rejected before any record exists.
    pub async fn submit(
        &self,
        user_id: DbId,
        request: &ConversionRequest,
    ) -> Result<Submission, SubmitError> {
        if let ContentSource::Archive(path) = &request.source {
            let path = path.clone();
            tokio::task::spawn_blocking(move || inspect_archive(&path))
                .await
                .map_err(|e| PipelineError::storage(Stage::Submit, e))??;
        }

        let apk = self
            .store
            .create_apk(&CreateApk::from_request(user_id, request))
            .await?;
        let job = match self.store.create_job(apk.id).await {
            Ok(job) => job,
            Err(err) => {
                if let Err(cleanup) = self.store.delete_apk(apk.id).await {
                    tracing::error!(apk_id = apk.id, error = %cleanup, "Failed to roll back artifact");
                }
                return Err(err.into());
            }
        };

        tracing::info!(
            apk_id = apk.id,
            job_id = job.id,
            user_id,
            mode = %apk.mode,
            "Conversion submitted",
        );
        Ok(Submission { apk, job })
    }

    /// Delete an artifact record and its stored files.
    ///
    /// Refused with a conflict while a job for it is queued or processing.
    pub async fn delete_artifact(&self, apk: &Apk) -> Result<(), StoreError> {
        if let Some(job) = self.store.job_by_artifact(apk.id).await? {
            if job.status.is_active() {
                return Err(StoreError::Conflict(format!(
                    "apk {} has a conversion in progress",
                    apk.id
                )));
            }
        }
        self.store.delete_apk(apk.id).await?;

        remove_quietly(&self.config.downloads_dir.join(apk.id.to_string())).await;
        for stored in [&apk.file_path, &apk.icon_path].into_iter().flatten() {
            remove_quietly(Path::new(stored)).await;
        }
        tracing::info!(apk_id = apk.id, "Artifact deleted");
        Ok(())
    }

    /// Run one job to a terminal state. Never returns an error: every
    /// failure is persisted on the job and artifact instead.
    pub async fn run(&self, job: ConversionJob) -> JobOutcome {
        let span = tracing::info_span!("conversion_job", job_id = job.id, apk_id = job.apk_id);
        self.run_inner(job).instrument(span).await
    }

    async fn run_inner(&self, job: ConversionJob) -> JobOutcome {
        let (job_id, apk_id) = (job.id, job.apk_id);

        let pickup = if job.status == JobStatus::Queued {
            JobUpdate::processing(progress::PICKED_UP)
        } else {
            JobUpdate::progress(progress::PICKED_UP)
        };
        match self.store.update_job(job_id, &pickup).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!("Job vanished before pickup");
                return JobOutcome::Skipped;
            }
            Err(StoreError::Conflict(reason)) => {
                tracing::warn!(reason = %reason, "Job not runnable");
                return JobOutcome::Skipped;
            }
            Err(err) => {
                return self
                    .fail(job_id, apk_id, PipelineError::storage(Stage::Resolve, err))
                    .await;
            }
        }

        let apk = match self.store.apk_by_id(apk_id).await {
            Ok(Some(apk)) => apk,
            Ok(None) => {
                return self
                    .fail(
                        job_id,
                        apk_id,
                        PipelineError::new(
                            Stage::Resolve,
                            PipelineErrorKind::Storage(ARTIFACT_NOT_FOUND.to_string()),
                        ),
                    )
                    .await;
            }
            Err(err) => {
                return self
                    .fail(job_id, apk_id, PipelineError::storage(Stage::Resolve, err))
                    .await;
            }
        };

        if let Err(err) = self
            .store
            .update_apk(apk_id, &ApkUpdate::status(ApkStatus::Processing))
            .await
        {
            return self
                .fail(job_id, apk_id, PipelineError::storage(Stage::Resolve, err))
                .await;
        }
        tracing::info!(app_name = %apk.name, mode = %apk.mode, "Conversion started");

        let published = match self.execute(job_id, &apk).await {
            Ok(published) => published,
            Err(err) => return self.fail(job_id, apk_id, err).await,
        };

        let path_str = published.path.to_string_lossy();
        let finalize = self
            .store
            .complete_conversion(job_id, &path_str, &published.size)
            .await;
        let finalize_error = match finalize {
            Ok(Some(_)) => None,
            Ok(None) => Some(PipelineError::storage(Stage::Relocate, "job record disappeared")),
            Err(err) => Some(PipelineError::storage(Stage::Relocate, err)),
        };
        if let Some(err) = finalize_error {
            remove_quietly(&published.path).await;
            return self.fail(job_id, apk_id, err).await;
        }

        tracing::info!(
            apk_path = %published.path.display(),
            size = %published.size,
            "Conversion completed",
        );
        JobOutcome::Completed {
            apk_path: published.path,
            size: published.size,
        }
    }

    /// The stages between pickup and publication. The workspace is
    /// dropped, and so removed, on every return path.
    async fn execute(&self, job_id: DbId, apk: &Apk) -> Result<Published, PipelineError> {
        let workspace = JobWorkspace::create(&self.config.work_root, job_id)
            .map_err(|e| PipelineError::storage(Stage::Resolve, format!("creating workspace: {e}")))?;
        self.checkpoint(job_id, progress::WORKSPACE_READY, Stage::Resolve)
            .await?;

        let source = apk
            .content_source()
            .ok_or_else(|| PipelineError::resolution("artifact has no content source"))?;
        let resolved = self
            .resolver
            .resolve(&source, &workspace.content_dir())
            .await?;
        self.checkpoint(job_id, progress::SOURCE_RESOLVED, Stage::Resolve)
            .await?;

        let project_dir = workspace.project_dir();
        self.materializer
            .materialize(
                &project_dir,
                &resolved.web_root,
                &apk.name,
                apk.icon_path.as_deref().map(Path::new),
                apk.mode,
            )
            .await?;
        self.checkpoint(job_id, progress::PROJECT_MATERIALIZED, Stage::Materialize)
            .await?;

        let binary = self.builder.build(&project_dir, &apk.name, apk.mode).await?;
        self.checkpoint(job_id, progress::BUILD_FINISHED, Stage::Build)
            .await?;

        self.publish(&binary, apk).await
    }

    /// Copy the binary to `<downloads>/<apk_id>/<name>_<apk_id>.apk`.
    async fn publish(&self, binary: &Path, apk: &Apk) -> Result<Published, PipelineError> {
        let dest_dir = self.config.downloads_dir.join(apk.id.to_string());
        let dest = dest_dir.join(artifact_file_name(&apk.name, apk.id));
        let relocate_error = |e: std::io::Error| PipelineError::storage(Stage::Relocate, e);

        tokio::fs::create_dir_all(&dest_dir)
            .await
            .map_err(relocate_error)?;
        let bytes = tokio::fs::copy(binary, &dest).await.map_err(relocate_error)?;

        Ok(Published {
            path: dest,
            size: format_size_mb(bytes),
        })
    }

    async fn checkpoint(&self, job_id: DbId, value: i16, stage: Stage) -> Result<(), PipelineError> {
        match self.store.update_job(job_id, &JobUpdate::progress(value)).await {
            Ok(Some(_)) => {
                tracing::debug!(progress = value, stage = %stage, "Checkpoint reached");
                Ok(())
            }
            Ok(None) => Err(PipelineError::storage(stage, "job record disappeared")),
            Err(err) => Err(PipelineError::storage(stage, err)),
        }
    }

    async fn fail(&self, job_id: DbId, apk_id: DbId, err: PipelineError) -> JobOutcome {
        let message = err.to_string();
        let kind = err.kind_code();
        tracing::warn!(
            stage = %err.stage,
            kind,
            retryable = err.is_retryable(),
            error = %message,
            "Conversion failed",
        );

        if let Err(e) = self
            .store
            .update_job(job_id, &JobUpdate::failed(message.clone(), kind))
            .await
        {
            tracing::error!(error = %e, "Failed to record job failure");
        }
        if let Err(e) = self
            .store
            .update_apk(apk_id, &ApkUpdate::status(ApkStatus::Failed))
            .await
        {
            tracing::error!(error = %e, "Failed to mark artifact failed");
        }

        JobOutcome::Failed { message, kind }
    }
}

/// Remove a file or directory tree, logging anything but "not found".
async fn remove_quietly(path: &Path) {
    let result = match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove stored file");
        }
    }
}
