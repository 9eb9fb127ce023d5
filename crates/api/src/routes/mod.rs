pub mod apks;
pub mod conversion_jobs;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /apks                         list, submit (multipart)
/// /apks/{id}                    get, delete
/// /apks/{id}/download           download a completed artifact
///
/// /conversion-jobs/{apk_id}     latest conversion job
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/apks", apks::router())
        .nest("/conversion-jobs", conversion_jobs::router())
}
