//! Multipart submission parsing and upload storage.
//!
//! Files are streamed to `uploads_dir` under generated names, never the
//! client-supplied ones, and checked against their size limits while
//! being written.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart, MultipartError};
use axum::http::StatusCode;
use tokio::io::AsyncWriteExt;
use webapk_core::conversion::{
    is_archive_file_name, AppMode, ConversionForm, ACCEPTED_ICON_TYPES, ARCHIVE_EXTENSION,
    MAX_ARCHIVE_BYTES, MAX_ICON_BYTES,
};
use webapk_core::error::CoreError;

use crate::error::{AppError, AppResult};

/// Multipart field names of the submission form.
pub const FIELD_NAME: &str = "name";
pub const FIELD_MODE: &str = "mode";
pub const FIELD_URL: &str = "url";
pub const FIELD_ARCHIVE: &str = "file";
pub const FIELD_ICON: &str = "icon";

/// Files stored for one submission.
#[derive(Debug, Default)]
pub struct StoredFiles {
    pub archive: Option<PathBuf>,
    pub icon: Option<PathBuf>,
}

impl StoredFiles {
    /// Remove whatever was stored, e.g. after a rejected submission.
    pub async fn discard(self) {
        for path in [self.archive, self.icon].into_iter().flatten() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to discard upload");
            }
        }
    }
}

/// A parsed submission: text fields plus stored files.
#[derive(Debug, Default)]
pub struct SubmissionUpload {
    pub name: Option<String>,
    pub mode: Option<String>,
    pub url: Option<String>,
    pub files: StoredFiles,
}

impl SubmissionUpload {
    /// The text fields as a form. Validation happens in
    /// [`ConversionForm::into_request`].
    pub fn form(&self) -> Result<ConversionForm, CoreError> {
        let name = self.name.clone().unwrap_or_default();
        let mode = self
            .mode
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| CoreError::Validation("mode is required".into()))?
            .parse::<AppMode>()
            .map_err(|e| CoreError::Validation(e.to_string()))?;

        Ok(ConversionForm {
            name,
            mode,
            url: self.url.clone(),
        })
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// Read the whole submission form, storing files under `uploads_dir`.
///
/// On error every file stored so far is removed again.
pub async fn read_submission(
    multipart: &mut Multipart,
    uploads_dir: &Path,
) -> AppResult<SubmissionUpload> {
    let mut upload = SubmissionUpload::default();
    match read_fields(multipart, uploads_dir, &mut upload).await {
        Ok(()) => Ok(upload),
        Err(err) => {
            upload.files.discard().await;
            Err(err)
        }
    }
}

async fn read_fields(
    multipart: &mut Multipart,
    uploads_dir: &Path,
    upload: &mut SubmissionUpload,
) -> AppResult<()> {
    tokio::fs::create_dir_all(uploads_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create uploads dir: {e}")))?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(field_name) = field.name().map(str::to_string) else {
            continue;
        };

        match field_name.as_str() {
            FIELD_NAME => upload.name = Some(field.text().await.map_err(multipart_error)?),
            FIELD_MODE => upload.mode = Some(field.text().await.map_err(multipart_error)?),
            FIELD_URL => upload.url = Some(field.text().await.map_err(multipart_error)?),
            FIELD_ARCHIVE => {
                // Browsers send an empty part for an unused file input.
                let Some(file_name) = field.file_name().filter(|n| !n.is_empty()) else {
                    continue;
                };
                if upload.files.archive.is_some() {
                    return Err(AppError::BadRequest("Only one archive may be uploaded".into()));
                }
                if !is_archive_file_name(file_name) {
                    return Err(AppError::Core(CoreError::Validation(
                        "Only .zip archives are accepted".into(),
                    )));
                }
                let path = uploads_dir.join(stored_name(ARCHIVE_EXTENSION));
                write_limited(field, &path, MAX_ARCHIVE_BYTES, "Archive").await?;
                upload.files.archive = Some(path);
            }
            FIELD_ICON => {
                if field.file_name().filter(|n| !n.is_empty()).is_none() {
                    continue;
                }
                if upload.files.icon.is_some() {
                    return Err(AppError::BadRequest("Only one icon may be uploaded".into()));
                }
                let extension = field
                    .content_type()
                    .and_then(icon_extension)
                    .ok_or_else(|| {
                        AppError::Core(CoreError::Validation(format!(
                            "Icon must be one of: {}",
                            ACCEPTED_ICON_TYPES.join(", ")
                        )))
                    })?;
                let path = uploads_dir.join(stored_name(extension));
                write_limited(field, &path, MAX_ICON_BYTES, "Icon").await?;
                upload.files.icon = Some(path);
            }
            other => {
                tracing::debug!(field = other, "Ignoring unknown multipart field");
            }
        }
    }
    Ok(())
}

fn stored_name(extension: &str) -> String {
    format!("{}.{extension}", uuid::Uuid::new_v4())
}

/// File extension for an accepted icon MIME type.
pub fn icon_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Stream a field to `path`, failing once more than `limit` bytes arrive.
/// A partially written file is removed before returning an error.
async fn write_limited(
    mut field: Field<'_>,
    path: &Path,
    limit: usize,
    label: &str,
) -> AppResult<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;

    let mut written: usize = 0;
    let result = async {
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            written += chunk.len();
            if written > limit {
                return Err(AppError::PayloadTooLarge(format!(
                    "{label} exceeds the {} MB limit",
                    limit / (1024 * 1024)
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))
    }
    .await;

    match result {
        Ok(()) => Ok(written as u64),
        Err(err) => {
            drop(file);
            if let Err(e) = tokio::fs::remove_file(path).await {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
            }
            Err(err)
        }
    }
}
