//! Handlers for the `/apks` resource.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use webapk_core::error::CoreError;
use webapk_core::types::DbId;
use webapk_db::models::analytics::CreateAnalyticsEvent;
use webapk_db::models::apk::Apk;
use webapk_db::models::conversion_job::ConversionJob;
use webapk_db::models::status::JobStatus;

use crate::error::{AppError, AppResult};
use crate::middleware::identity::CallerIdentity;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::uploads::read_submission;

/// MIME type of Android packages.
pub const APK_CONTENT_TYPE: &str = "application/vnd.android.package-archive";

/// Returned by `POST /apks`: the new artifact and its queued job.
#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub apk: Apk,
    pub job: ConversionJob,
}

/// Load an artifact the caller may access. Missing is 404, foreign is 403.
pub(crate) async fn find_accessible_apk(
    state: &AppState,
    caller: &CallerIdentity,
    id: DbId,
) -> AppResult<Apk> {
    let apk = state
        .store()
        .apk_by_id(id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound { entity: "Apk", id }))?;
    caller.authorize(&apk)?;
    Ok(apk)
}

/// POST /api/v1/apks
///
/// Accept a multipart submission, store its uploads and queue a conversion.
pub async fn create_apk(
    caller: CallerIdentity,
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SubmissionResponse>>)> {
    let upload = read_submission(&mut multipart, &state.config.uploads_dir).await?;

    let request = match upload.form().and_then(|form| {
        form.into_request(upload.files.archive.clone(), upload.files.icon.clone())
    }) {
        Ok(request) => request,
        Err(err) => {
            upload.files.discard().await;
            return Err(err.into());
        }
    };

    let submission = match state.orchestrator.submit(caller.user_id, &request).await {
        Ok(submission) => submission,
        Err(err) => {
            upload.files.discard().await;
            return Err(err.into());
        }
    };
    state.notify_queued();

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: SubmissionResponse {
                apk: submission.apk,
                job: submission.job,
            },
        }),
    ))
}

/// GET /api/v1/apks
///
/// The caller's artifacts, newest first. Admins see every artifact.
pub async fn list_apks(
    caller: CallerIdentity,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<Apk>>>> {
    let apks = if caller.is_admin {
        state.store().all_apks().await?
    } else {
        state.store().apks_by_user(caller.user_id).await?
    };
    Ok(Json(DataResponse { data: apks }))
}

/// GET /api/v1/apks/{id}
pub async fn get_apk(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Apk>>> {
    let apk = find_accessible_apk(&state, &caller, id).await?;
    Ok(Json(DataResponse { data: apk }))
}

/// DELETE /api/v1/apks/{id}
///
/// Removes the record, the published artifact and the stored uploads.
/// Refused with 409 while a conversion is queued or running.
pub async fn delete_apk(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let apk = find_accessible_apk(&state, &caller, id).await?;
    state.orchestrator.delete_artifact(&apk).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/apks/{id}/download
///
/// Streams a completed artifact whose latest job is completed. Anything
/// else is 404 `NOT_READY`.
pub async fn download_apk(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Response> {
    let apk = find_accessible_apk(&state, &caller, id).await?;
    let not_ready = || AppError::Core(CoreError::NotReady("APK not ready for download".into()));
    let apk_path = match &apk.apk_path {
        Some(path) if apk.is_downloadable() => std::path::PathBuf::from(path),
        _ => return Err(not_ready()),
    };
    let job = state.store().job_by_artifact(id).await?;
    if !matches!(job, Some(ref job) if job.status == JobStatus::Completed) {
        return Err(not_ready());
    }

    let file = match tokio::fs::File::open(&apk_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(apk_id = id, path = %apk_path.display(), "Published artifact missing");
            return Err(AppError::Core(CoreError::NotReady(
                "APK file is no longer available".into(),
            )));
        }
        Err(e) => return Err(AppError::InternalError(e.to_string())),
    };
    let file_size = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    let store = state.store();
    store.increment_download_count(id).await?;
    store
        .record_analytics(&CreateAnalyticsEvent::download(caller.user_id, id))
        .await?;
    tracing::info!(apk_id = id, user_id = caller.user_id, "APK downloaded");

    let file_name = apk_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("app_{id}.apk"));

    Ok((
        [
            (header::CONTENT_TYPE, APK_CONTENT_TYPE.to_string()),
            (header::CONTENT_LENGTH, file_size.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
