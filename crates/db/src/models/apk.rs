//! Build artifact models and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use webapk_core::conversion::{AppMode, ContentSource, ConversionRequest};
use webapk_core::types::{DbId, Timestamp};

use super::status::ApkStatus;

/// A row from the `apks` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Apk {
    pub id: DbId,
    pub user_id: DbId,
    pub name: String,
    pub original_url: Option<String>,
    /// Stored upload path of the project archive, for archive submissions.
    pub file_path: Option<String>,
    pub icon_path: Option<String>,
    #[sqlx(try_from = "String")]
    pub mode: AppMode,
    #[sqlx(try_from = "String")]
    pub status: ApkStatus,
    pub download_count: i64,
    /// Human-readable size, set only once the artifact is completed.
    pub size: Option<String>,
    /// Published artifact path, set only once the artifact is completed.
    pub apk_path: Option<String>,
    pub created_at: Timestamp,
}

impl Apk {
    /// Rebuild the conversion request this artifact was created from.
    ///
    /// Returns `None` when the row carries no content source, which the
    /// table constraints rule out.
    pub fn content_source(&self) -> Option<ContentSource> {
        match (&self.file_path, &self.original_url) {
            (Some(path), _) => Some(ContentSource::Archive(path.into())),
            (None, Some(url)) => Some(ContentSource::Url(url.clone())),
            (None, None) => None,
        }
    }

    /// Whether the published file may be served.
    pub fn is_downloadable(&self) -> bool {
        self.status == ApkStatus::Completed && self.apk_path.is_some()
    }

    /// Merge a partial update into this row.
    ///
    /// Moving away from `Completed` clears path and size, so a record that
    /// is not completed never exposes an artifact path.
    pub fn apply(&mut self, update: &ApkUpdate) -> Result<(), ApkUpdateError> {
        update.validate()?;
        let next = update.status.unwrap_or(self.status);

        if next != ApkStatus::Completed {
            self.apk_path = None;
            self.size = None;
        }
        if let Some(path) = &update.apk_path {
            self.apk_path = Some(path.clone());
        }
        if let Some(size) = &update.size {
            self.size = Some(size.clone());
        }
        self.status = next;
        Ok(())
    }
}

/// Rejected artifact update.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApkUpdateError {
    #[error("artifact path and size can only be set together with status 'completed'")]
    ArtifactWithoutCompletion,
}

/// DTO for creating a new artifact record.
#[derive(Debug, Clone)]
pub struct CreateApk {
    pub user_id: DbId,
    pub name: String,
    pub original_url: Option<String>,
    pub file_path: Option<String>,
    pub icon_path: Option<String>,
    pub mode: AppMode,
}

impl CreateApk {
    pub fn from_request(user_id: DbId, request: &ConversionRequest) -> Self {
        let (original_url, file_path) = match &request.source {
            ContentSource::Url(url) => (Some(url.clone()), None),
            ContentSource::Archive(path) => (None, Some(path.to_string_lossy().into_owned())),
        };
        Self {
            user_id,
            name: request.name.clone(),
            original_url,
            file_path,
            icon_path: request
                .icon
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            mode: request.mode,
        }
    }
}

/// Partial update of an artifact; `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct ApkUpdate {
    pub status: Option<ApkStatus>,
    pub apk_path: Option<String>,
    pub size: Option<String>,
}

impl ApkUpdate {
    pub fn status(status: ApkStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Path and size are only accepted alongside an explicit `Completed`.
    pub fn validate(&self) -> Result<(), ApkUpdateError> {
        let sets_artifact = self.apk_path.is_some() || self.size.is_some();
        if sets_artifact && self.status != Some(ApkStatus::Completed) {
            return Err(ApkUpdateError::ArtifactWithoutCompletion);
        }
        Ok(())
    }

    pub fn completed(apk_path: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            status: Some(ApkStatus::Completed),
            apk_path: Some(apk_path.into()),
            size: Some(size.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;

    fn pending_apk() -> Apk {
        Apk {
            id: 1,
            user_id: 9,
            name: "Demo".into(),
            original_url: Some("https://example.com".into()),
            file_path: None,
            icon_path: None,
            mode: AppMode::Online,
            status: ApkStatus::Pending,
            download_count: 0,
            size: None,
            apk_path: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn path_is_rejected_without_completion() {
        let mut apk = pending_apk();
        let update = ApkUpdate {
            status: Some(ApkStatus::Processing),
            apk_path: Some("/downloads/x.apk".into()),
            size: None,
        };
        assert_matches!(
            apk.apply(&update),
            Err(ApkUpdateError::ArtifactWithoutCompletion)
        );
        assert!(apk.apk_path.is_none());
    }

    #[test]
    fn completion_sets_path_and_size() {
        let mut apk = pending_apk();
        apk.apply(&ApkUpdate::completed("/downloads/1/demo_1.apk", "1.00 MB"))
            .unwrap();
        assert!(apk.is_downloadable());
        assert_eq!(apk.size.as_deref(), Some("1.00 MB"));
    }

    #[test]
    fn content_source_prefers_archive() {
        let mut apk = pending_apk();
        assert_eq!(
            apk.content_source(),
            Some(ContentSource::Url("https://example.com".into()))
        );
        apk.original_url = None;
        apk.file_path = Some("/uploads/site.zip".into());
        assert_matches!(apk.content_source(), Some(ContentSource::Archive(_)));
    }
}
