use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use webapk_core::conversion::{MAX_ARCHIVE_BYTES, MAX_ICON_BYTES};

use crate::handlers::apks;
use crate::state::AppState;

/// Room for the text fields and multipart framing on top of both files.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Artifact routes.
///
/// ```text
/// GET    /                  -> list_apks
/// POST   /                  -> create_apk
/// GET    /{id}              -> get_apk
/// DELETE /{id}              -> delete_apk
/// GET    /{id}/download     -> download_apk
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(apks::list_apks)
                .post(apks::create_apk)
                .layer(DefaultBodyLimit::max(
                    MAX_ARCHIVE_BYTES + MAX_ICON_BYTES + FORM_OVERHEAD_BYTES,
                )),
        )
        .route("/{id}", get(apks::get_apk).delete(apks::delete_apk))
        .route("/{id}/download", get(apks::download_apk))
}
