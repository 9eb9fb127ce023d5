//! Repository for the `conversion_jobs` table.
//!
//! State changes other than creation and claiming go through
//! [`ConversionJobRepo::lock`] and [`ConversionJobRepo::write_state`] inside a
//! single transaction, so the transition rules in
//! [`ConversionJob::apply`] run against a row no one else can touch.

use sqlx::{PgConnection, PgPool};
use webapk_core::progress::PICKED_UP;
use webapk_core::types::DbId;

use crate::models::conversion_job::ConversionJob;
use crate::models::status::JobStatus;

/// Column list for `conversion_jobs` queries.
const COLUMNS: &str = "\
    id, apk_id, status, progress, error_message, error_kind, created_at, completed_at";

/// Provides operations for conversion jobs.
pub struct ConversionJobRepo;

impl ConversionJobRepo {
    /// Insert a queued job unless the artifact already has an active one.
    ///
    /// Returns `None` when an active job exists. Two racing inserts that
    /// both pass the check are stopped by `uq_conversion_jobs_active_apk`.
    pub async fn create_if_idle(
        pool: &PgPool,
        apk_id: DbId,
    ) -> Result<Option<ConversionJob>, sqlx::Error> {
        let query = format!(
            "INSERT INTO conversion_jobs (apk_id, status, progress) \
             SELECT $1, $2, 0 \
             WHERE NOT EXISTS ( \
                 SELECT 1 FROM conversion_jobs \
                 WHERE apk_id = $1 AND status IN ($2, $3) \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(apk_id)
            .bind(JobStatus::Queued.as_str())
            .bind(JobStatus::Processing.as_str())
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ConversionJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM conversion_jobs WHERE id = $1");
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The most recent job for an artifact.
    pub async fn latest_for_apk(
        pool: &PgPool,
        apk_id: DbId,
    ) -> Result<Option<ConversionJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM conversion_jobs \
             WHERE apk_id = $1 \
             ORDER BY id DESC \
             LIMIT 1"
        );
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(apk_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn list_by_status(
        pool: &PgPool,
        status: JobStatus,
    ) -> Result<Vec<ConversionJob>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM conversion_jobs WHERE status = $1 ORDER BY created_at, id"
        );
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(status.as_str())
            .fetch_all(pool)
            .await
    }

    /// Atomically move the oldest queued job to `processing`.
    ///
    /// Uses `SELECT FOR UPDATE SKIP LOCKED` so concurrent dispatchers never
    /// claim the same job.
    pub async fn claim_next_queued(pool: &PgPool) -> Result<Option<ConversionJob>, sqlx::Error> {
        let query = format!(
            "UPDATE conversion_jobs \
             SET status = $1, progress = GREATEST(progress, $3) \
             WHERE id = ( \
                 SELECT id FROM conversion_jobs \
                 WHERE status = $2 \
                 ORDER BY created_at, id \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(JobStatus::Processing.as_str())
            .bind(JobStatus::Queued.as_str())
            .bind(PICKED_UP)
            .fetch_optional(pool)
            .await
    }

    /// Fetch a job and hold a row lock until the transaction ends.
    pub async fn lock(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<ConversionJob>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM conversion_jobs WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Persist the mutable fields of a job previously fetched with [`Self::lock`].
    pub async fn write_state(
        conn: &mut PgConnection,
        job: &ConversionJob,
    ) -> Result<ConversionJob, sqlx::Error> {
        let query = format!(
            "UPDATE conversion_jobs \
             SET status = $2, progress = $3, error_message = $4, error_kind = $5, \
                 completed_at = $6 \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ConversionJob>(&query)
            .bind(job.id)
            .bind(job.status.as_str())
            .bind(job.progress)
            .bind(&job.error_message)
            .bind(&job.error_kind)
            .bind(job.completed_at)
            .fetch_one(conn)
            .await
    }
}
