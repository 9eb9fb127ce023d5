//! Startup recovery for jobs orphaned by a crashed process.
//!
//! Assumes this process is the only one running builds: anything still
//! `processing` at startup has no owner. Queued jobs need no recovery.

use webapk_db::models::apk::ApkUpdate;
use webapk_db::models::conversion_job::JobUpdate;
use webapk_db::models::status::{ApkStatus, JobStatus};
use webapk_db::store::{ConversionStore, StoreError, StoreResult};

pub const INTERRUPTED_MESSAGE: &str = "interrupted by restart";
pub const INTERRUPTED_KIND: &str = "interrupted";

/// Fail every `processing` job and its artifact. Returns the number of
/// jobs failed.
pub async fn fail_interrupted_jobs(store: &dyn ConversionStore) -> StoreResult<usize> {
    let orphaned = store.jobs_with_status(JobStatus::Processing).await?;
    let mut failed = 0;

    for job in orphaned {
        let update = JobUpdate::failed(INTERRUPTED_MESSAGE, INTERRUPTED_KIND);
        match store.update_job(job.id, &update).await {
            Ok(Some(_)) => {}
            Ok(None) => continue,
            // Finished between the listing and the update.
            Err(StoreError::Conflict(_)) => continue,
            Err(e) => return Err(e),
        }
        store
            .update_apk(job.apk_id, &ApkUpdate::status(ApkStatus::Failed))
            .await?;
        tracing::warn!(job_id = job.id, apk_id = job.apk_id, "Failed interrupted job");
        failed += 1;
    }

    if failed > 0 {
        tracing::info!(count = failed, "Startup recovery complete");
    }
    Ok(failed)
}
