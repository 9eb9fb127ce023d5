//! Handlers for the `/conversion-jobs` resource.

use axum::extract::{Path, State};
use axum::Json;
use webapk_core::error::CoreError;
use webapk_core::types::DbId;
use webapk_db::models::conversion_job::ConversionJob;

use super::apks::find_accessible_apk;
use crate::error::{AppError, AppResult};
use crate::middleware::identity::CallerIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/conversion-jobs/{apk_id}
///
/// Latest conversion job of an artifact: status, progress and error.
pub async fn get_latest_job(
    caller: CallerIdentity,
    State(state): State<AppState>,
    Path(apk_id): Path<DbId>,
) -> AppResult<Json<DataResponse<ConversionJob>>> {
    find_accessible_apk(&state, &caller, apk_id).await?;
    let job = state
        .store()
        .job_by_artifact(apk_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "ConversionJob",
            id: apk_id,
        }))?;
    Ok(Json(DataResponse { data: job }))
}
