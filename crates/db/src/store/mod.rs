//! The store the pipeline and API are written against.
//!
//! [`ConversionStore`] is object safe and used as `Arc<dyn ConversionStore>`.
//! Every mutation is atomic: a single statement or row-locked transaction
//! in [`PgStore`], a single mutex critical section in [`MemoryStore`].

use async_trait::async_trait;
use webapk_core::error::CoreError;
use webapk_core::types::DbId;

use crate::models::analytics::{AnalyticsEvent, CreateAnalyticsEvent};
use crate::models::apk::{Apk, ApkUpdate, ApkUpdateError, CreateApk};
use crate::models::conversion_job::{ConversionJob, JobUpdate, JobUpdateError};
use crate::models::status::JobStatus;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// The write conflicts with the current state (active job exists,
    /// terminal job, invalid transition).
    #[error("{0}")]
    Conflict(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<JobUpdateError> for StoreError {
    fn from(err: JobUpdateError) -> Self {
        StoreError::Conflict(err.to_string())
    }
}

impl From<ApkUpdateError> for StoreError {
    fn from(err: ApkUpdateError) -> Self {
        StoreError::InvalidUpdate(err.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => CoreError::NotFound { entity, id },
            StoreError::Conflict(msg) => CoreError::Conflict(msg),
            StoreError::InvalidUpdate(msg) => CoreError::Validation(msg),
            StoreError::Database(e) => CoreError::Internal(e.to_string()),
        }
    }
}

/// Durable state for artifacts, their conversion jobs and analytics.
#[async_trait]
pub trait ConversionStore: Send + Sync {
    // -- artifacts --

    /// Insert an artifact with status `pending`.
    async fn create_apk(&self, input: &CreateApk) -> StoreResult<Apk>;

    async fn apk_by_id(&self, id: DbId) -> StoreResult<Option<Apk>>;

    /// Artifacts owned by `user_id`, newest first.
    async fn apks_by_user(&self, user_id: DbId) -> StoreResult<Vec<Apk>>;

    /// Every artifact, newest first.
    async fn all_apks(&self) -> StoreResult<Vec<Apk>>;

    /// Merge a partial update. `None` when the artifact does not exist.
    async fn update_apk(&self, id: DbId, update: &ApkUpdate) -> StoreResult<Option<Apk>>;

    /// Delete an artifact and, by cascade, its jobs. `false` if absent.
    async fn delete_apk(&self, id: DbId) -> StoreResult<bool>;

    /// Bump the download counter; returns the new count.
    async fn increment_download_count(&self, id: DbId) -> StoreResult<Option<i64>>;

    async fn record_analytics(&self, event: &CreateAnalyticsEvent) -> StoreResult<AnalyticsEvent>;

    // -- conversion jobs --

    /// Create a queued job at progress 0.
    ///
    /// Fails with [`StoreError::Conflict`] if the artifact already has a
    /// queued or processing job.
    async fn create_job(&self, apk_id: DbId) -> StoreResult<ConversionJob>;

    async fn job_by_id(&self, id: DbId) -> StoreResult<Option<ConversionJob>>;

    /// Latest job for an artifact (highest id).
    async fn job_by_artifact(&self, apk_id: DbId) -> StoreResult<Option<ConversionJob>>;

    /// Merge a partial update following [`ConversionJob::apply`].
    ///
    /// `None` when the job does not exist. Updates against terminal jobs
    /// and invalid transitions fail with [`StoreError::Conflict`].
    async fn update_job(&self, job_id: DbId, update: &JobUpdate) -> StoreResult<Option<ConversionJob>>;

    /// Publish a finished build in one atomic write: the job's artifact
    /// becomes `completed` with `apk_path` and `size`, and the job becomes
    /// `completed` at 100.
    ///
    /// `None` when the job or its artifact does not exist. If the job
    /// transition is rejected, neither record changes.
    async fn complete_conversion(
        &self,
        job_id: DbId,
        apk_path: &str,
        size: &str,
    ) -> StoreResult<Option<(Apk, ConversionJob)>>;

    /// Move the oldest queued job to `processing` at the pickup checkpoint.
    async fn claim_next_queued(&self) -> StoreResult<Option<ConversionJob>>;

    async fn jobs_with_status(&self, status: JobStatus) -> StoreResult<Vec<ConversionJob>>;

    /// Verify the backing storage is reachable.
    async fn health_check(&self) -> StoreResult<()>;
}
