//! Conversion job rows and the partial-update rules both stores share.

use serde::Serialize;
use sqlx::FromRow;
use webapk_core::progress::{clamp_progress, COMPLETE};
use webapk_core::types::{DbId, Timestamp};

use super::status::JobStatus;

/// Stored when a job fails without a message.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// A row from the `conversion_jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ConversionJob {
    pub id: DbId,
    pub apk_id: DbId,
    #[sqlx(try_from = "String")]
    pub status: JobStatus,
    pub progress: i16,
    pub error_message: Option<String>,
    /// Machine-readable failure category, e.g. `toolchain`.
    pub error_kind: Option<String>,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

/// Partial update of a job; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<i16>,
    pub error_message: Option<String>,
    pub error_kind: Option<String>,
}

impl JobUpdate {
    /// Progress-only update.
    pub fn progress(progress: i16) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    /// Move to `processing` and record a checkpoint.
    pub fn processing(progress: i16) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn completed() -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(COMPLETE),
            ..Self::default()
        }
    }

    pub fn failed(message: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error_message: Some(message.into()),
            error_kind: Some(kind.into()),
            ..Self::default()
        }
    }
}

/// Rejected job update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobUpdateError {
    #[error("job is already {status} and can no longer change")]
    Terminal { status: JobStatus },

    #[error("invalid job transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl ConversionJob {
    /// Apply `update` in place.
    ///
    /// - terminal jobs are immutable;
    /// - progress never decreases and is clamped to `0..=100`;
    /// - completion forces progress to 100;
    /// - an error message is kept only on failure;
    /// - `completed_at` is stamped exactly when a terminal state is entered.
    ///
    /// The Postgres store encodes the same rules in a single `UPDATE`.
    pub fn apply(&mut self, update: &JobUpdate, now: Timestamp) -> Result<(), JobUpdateError> {
        if self.status.is_terminal() {
            return Err(JobUpdateError::Terminal {
                status: self.status,
            });
        }
        let next = update.status.unwrap_or(self.status);
        if !self.status.can_transition_to(next) {
            return Err(JobUpdateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        if let Some(progress) = update.progress {
            self.progress = self.progress.max(clamp_progress(progress));
        }
        if next == JobStatus::Completed {
            self.progress = COMPLETE;
        }

        if next == JobStatus::Failed {
            self.error_message = Some(
                update
                    .error_message
                    .clone()
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            );
            self.error_kind = update.error_kind.clone().or(self.error_kind.take());
        } else {
            self.error_message = None;
            self.error_kind = None;
        }

        if next.is_terminal() {
            self.completed_at = Some(now);
        }
        self.status = next;
        Ok(())
    }
}
