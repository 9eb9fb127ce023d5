use axum::routing::get;
use axum::Router;

use crate::handlers::conversion_jobs;
use crate::state::AppState;

/// ```text
/// GET    /{apk_id}          -> get_latest_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/{apk_id}", get(conversion_jobs::get_latest_job))
}
