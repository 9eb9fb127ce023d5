//! [`ConversionStore`] backed by Postgres through the repositories.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use webapk_core::types::DbId;

use crate::models::analytics::{AnalyticsEvent, CreateAnalyticsEvent};
use crate::models::apk::{Apk, ApkUpdate, CreateApk};
use crate::models::conversion_job::{ConversionJob, JobUpdate};
use crate::models::status::JobStatus;
use crate::repositories::{AnalyticsRepo, ApkRepo, ConversionJobRepo};

use super::{ConversionStore, StoreError, StoreResult};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn active_job_conflict(apk_id: DbId) -> StoreError {
    StoreError::Conflict(format!("apk {apk_id} already has an active conversion job"))
}

#[async_trait]
impl ConversionStore for PgStore {
    async fn create_apk(&self, input: &CreateApk) -> StoreResult<Apk> {
        Ok(ApkRepo::create(&self.pool, input).await?)
    }

    async fn apk_by_id(&self, id: DbId) -> StoreResult<Option<Apk>> {
        Ok(ApkRepo::find_by_id(&self.pool, id).await?)
    }

    async fn apks_by_user(&self, user_id: DbId) -> StoreResult<Vec<Apk>> {
        Ok(ApkRepo::list_by_user(&self.pool, user_id).await?)
    }

    async fn all_apks(&self) -> StoreResult<Vec<Apk>> {
        Ok(ApkRepo::list_all(&self.pool).await?)
    }

    async fn update_apk(&self, id: DbId, update: &ApkUpdate) -> StoreResult<Option<Apk>> {
        update.validate()?;
        let mut conn = self.pool.acquire().await?;
        Ok(ApkRepo::update(&mut *conn, id, update).await?)
    }

    async fn delete_apk(&self, id: DbId) -> StoreResult<bool> {
        Ok(ApkRepo::delete(&self.pool, id).await?)
    }

    async fn increment_download_count(&self, id: DbId) -> StoreResult<Option<i64>> {
        Ok(ApkRepo::increment_download_count(&self.pool, id).await?)
    }

    async fn record_analytics(&self, event: &CreateAnalyticsEvent) -> StoreResult<AnalyticsEvent> {
        Ok(AnalyticsRepo::record(&self.pool, event).await?)
    }

    async fn create_job(&self, apk_id: DbId) -> StoreResult<ConversionJob> {
        match ConversionJobRepo::create_if_idle(&self.pool, apk_id).await {
            Ok(Some(job)) => Ok(job),
            Ok(None) => Err(active_job_conflict(apk_id)),
            Err(err) => match db_error_code(&err).as_deref() {
                Some(UNIQUE_VIOLATION) => Err(active_job_conflict(apk_id)),
                Some(FOREIGN_KEY_VIOLATION) => Err(StoreError::NotFound {
                    entity: "apk",
                    id: apk_id,
                }),
                _ => Err(err.into()),
            },
        }
    }

    async fn job_by_id(&self, id: DbId) -> StoreResult<Option<ConversionJob>> {
        Ok(ConversionJobRepo::find_by_id(&self.pool, id).await?)
    }

    async fn job_by_artifact(&self, apk_id: DbId) -> StoreResult<Option<ConversionJob>> {
        Ok(ConversionJobRepo::latest_for_apk(&self.pool, apk_id).await?)
    }

    async fn update_job(&self, job_id: DbId, update: &JobUpdate) -> StoreResult<Option<ConversionJob>> {
        let mut tx = self.pool.begin().await?;
        let Some(mut job) = ConversionJobRepo::lock(&mut *tx, job_id).await? else {
            return Ok(None);
        };
        job.apply(update, Utc::now())?;
        let stored = ConversionJobRepo::write_state(&mut *tx, &job).await?;
        tx.commit().await?;
        Ok(Some(stored))
    }

    async fn complete_conversion(
        &self,
        job_id: DbId,
        apk_path: &str,
        size: &str,
    ) -> StoreResult<Option<(Apk, ConversionJob)>> {
        let mut tx = self.pool.begin().await?;
        let Some(mut job) = ConversionJobRepo::lock(&mut *tx, job_id).await? else {
            return Ok(None);
        };
        job.apply(&JobUpdate::completed(), Utc::now())?;

        let published = ApkUpdate::completed(apk_path, size);
        let Some(apk) = ApkRepo::update(&mut *tx, job.apk_id, &published).await? else {
            return Ok(None);
        };
        let job = ConversionJobRepo::write_state(&mut *tx, &job).await?;
        tx.commit().await?;
        Ok(Some((apk, job)))
    }

    async fn claim_next_queued(&self) -> StoreResult<Option<ConversionJob>> {
        Ok(ConversionJobRepo::claim_next_queued(&self.pool).await?)
    }

    async fn jobs_with_status(&self, status: JobStatus) -> StoreResult<Vec<ConversionJob>> {
        Ok(ConversionJobRepo::list_by_status(&self.pool, status).await?)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(crate::health_check(&self.pool).await?)
    }
}
