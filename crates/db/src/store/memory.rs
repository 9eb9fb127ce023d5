//! In-memory [`ConversionStore`] for tests and database-less runs.
//!
//! All state sits behind one async mutex; every trait method is a single
//! critical section. Every successful job write is also appended to a
//! per-job history so tests can inspect the sequence of states a job went
//! through.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use webapk_core::types::DbId;

use crate::models::analytics::{AnalyticsEvent, CreateAnalyticsEvent};
use crate::models::apk::{Apk, ApkUpdate, CreateApk};
use crate::models::conversion_job::{ConversionJob, JobUpdate};
use crate::models::status::{ApkStatus, JobStatus};

use super::{ConversionStore, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    apks: BTreeMap<DbId, Apk>,
    jobs: BTreeMap<DbId, ConversionJob>,
    analytics: Vec<AnalyticsEvent>,
    history: HashMap<DbId, Vec<ConversionJob>>,
    next_apk_id: DbId,
    next_job_id: DbId,
    next_event_id: DbId,
}

impl Inner {
    fn record(&mut self, job: &ConversionJob) {
        self.history.entry(job.id).or_default().push(job.clone());
    }
}

fn next_id(counter: &mut DbId) -> DbId {
    *counter += 1;
    *counter
}

fn newest_first(mut apks: Vec<Apk>) -> Vec<Apk> {
    apks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    apks
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored state of a job, oldest first, starting at creation.
    pub async fn job_history(&self, job_id: DbId) -> Vec<ConversionJob> {
        let inner = self.inner.lock().await;
        inner.history.get(&job_id).cloned().unwrap_or_default()
    }

    /// All recorded analytics events, in insertion order.
    pub async fn analytics_events(&self) -> Vec<AnalyticsEvent> {
        self.inner.lock().await.analytics.clone()
    }
}

#[async_trait]
impl ConversionStore for MemoryStore {
    async fn create_apk(&self, input: &CreateApk) -> StoreResult<Apk> {
        let mut inner = self.inner.lock().await;
        let apk = Apk {
            id: next_id(&mut inner.next_apk_id),
            user_id: input.user_id,
            name: input.name.clone(),
            original_url: input.original_url.clone(),
            file_path: input.file_path.clone(),
            icon_path: input.icon_path.clone(),
            mode: input.mode,
            status: ApkStatus::Pending,
            download_count: 0,
            size: None,
            apk_path: None,
            created_at: Utc::now(),
        };
        inner.apks.insert(apk.id, apk.clone());
        Ok(apk)
    }

    async fn apk_by_id(&self, id: DbId) -> StoreResult<Option<Apk>> {
        Ok(self.inner.lock().await.apks.get(&id).cloned())
    }

    async fn apks_by_user(&self, user_id: DbId) -> StoreResult<Vec<Apk>> {
        let inner = self.inner.lock().await;
        let owned = inner
            .apks
            .values()
            .filter(|apk| apk.user_id == user_id)
            .cloned()
            .collect();
        Ok(newest_first(owned))
    }

    async fn all_apks(&self) -> StoreResult<Vec<Apk>> {
        let inner = self.inner.lock().await;
        Ok(newest_first(inner.apks.values().cloned().collect()))
    }

    async fn update_apk(&self, id: DbId, update: &ApkUpdate) -> StoreResult<Option<Apk>> {
        let mut inner = self.inner.lock().await;
        let Some(apk) = inner.apks.get_mut(&id) else {
            return Ok(None);
        };
        apk.apply(update)?;
        Ok(Some(apk.clone()))
    }

    async fn delete_apk(&self, id: DbId) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        if inner.apks.remove(&id).is_none() {
            return Ok(false);
        }
        inner.jobs.retain(|_, job| job.apk_id != id);
        for event in inner.analytics.iter_mut() {
            if event.apk_id == Some(id) {
                event.apk_id = None;
            }
        }
        Ok(true)
    }

    async fn increment_download_count(&self, id: DbId) -> StoreResult<Option<i64>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.apks.get_mut(&id).map(|apk| {
            apk.download_count += 1;
            apk.download_count
        }))
    }

    async fn record_analytics(&self, event: &CreateAnalyticsEvent) -> StoreResult<AnalyticsEvent> {
        let mut inner = self.inner.lock().await;
        let stored = AnalyticsEvent {
            id: next_id(&mut inner.next_event_id),
            user_id: event.user_id,
            apk_id: event.apk_id,
            action: event.action,
            timestamp: Utc::now(),
        };
        inner.analytics.push(stored.clone());
        Ok(stored)
    }

    async fn create_job(&self, apk_id: DbId) -> StoreResult<ConversionJob> {
        let mut inner = self.inner.lock().await;
        if !inner.apks.contains_key(&apk_id) {
            return Err(StoreError::NotFound { entity: "apk", id: apk_id });
        }
        let has_active = inner
            .jobs
            .values()
            .any(|job| job.apk_id == apk_id && job.status.is_active());
        if has_active {
            return Err(StoreError::Conflict(format!(
                "apk {apk_id} already has an active conversion job"
            )));
        }

        let job = ConversionJob {
            id: next_id(&mut inner.next_job_id),
            apk_id,
            status: JobStatus::Queued,
            progress: 0,
            error_message: None,
            error_kind: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        inner.jobs.insert(job.id, job.clone());
        inner.record(&job);
        Ok(job)
    }

    async fn job_by_id(&self, id: DbId) -> StoreResult<Option<ConversionJob>> {
        Ok(self.inner.lock().await.jobs.get(&id).cloned())
    }

    async fn job_by_artifact(&self, apk_id: DbId) -> StoreResult<Option<ConversionJob>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .jobs
            .values()
            .filter(|job| job.apk_id == apk_id)
            .max_by_key(|job| job.id)
            .cloned())
    }

    async fn update_job(&self, job_id: DbId, update: &JobUpdate) -> StoreResult<Option<ConversionJob>> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get_mut(&job_id) else {
            return Ok(None);
        };
        job.apply(update, Utc::now())?;
        let stored = job.clone();
        inner.record(&stored);
        Ok(Some(stored))
    }

    async fn complete_conversion(
        &self,
        job_id: DbId,
        apk_path: &str,
        size: &str,
    ) -> StoreResult<Option<(Apk, ConversionJob)>> {
        let mut inner = self.inner.lock().await;
        let Some(mut job) = inner.jobs.get(&job_id).cloned() else {
            return Ok(None);
        };
        let Some(mut apk) = inner.apks.get(&job.apk_id).cloned() else {
            return Ok(None);
        };
        job.apply(&JobUpdate::completed(), Utc::now())?;
        apk.apply(&ApkUpdate::completed(apk_path, size))?;

        inner.apks.insert(apk.id, apk.clone());
        inner.jobs.insert(job.id, job.clone());
        inner.record(&job);
        Ok(Some((apk, job)))
    }

    async fn claim_next_queued(&self) -> StoreResult<Option<ConversionJob>> {
        let mut inner = self.inner.lock().await;
        let Some(job) = inner
            .jobs
            .values_mut()
            .filter(|job| job.status == JobStatus::Queued)
            .min_by_key(|job| (job.created_at, job.id))
        else {
            return Ok(None);
        };
        job.apply(&JobUpdate::processing(webapk_core::progress::PICKED_UP), Utc::now())?;
        let claimed = job.clone();
        inner.record(&claimed);
        Ok(Some(claimed))
    }

    async fn jobs_with_status(&self, status: JobStatus) -> StoreResult<Vec<ConversionJob>> {
        let inner = self.inner.lock().await;
        let mut jobs: Vec<ConversionJob> = inner
            .jobs
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| (job.created_at, job.id));
        Ok(jobs)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}
