//! Caller identity supplied by the fronting auth gateway.
//!
//! The gateway authenticates the user and forwards `x-user-id` (integer)
//! and optionally `x-user-role`. This service trusts those headers and
//! performs no authentication of its own.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use webapk_core::error::CoreError;
use webapk_core::types::DbId;
use webapk_db::models::apk::Apk;

use crate::error::AppError;
use crate::state::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const ROLE_ADMIN: &str = "admin";

/// The user a request acts on behalf of.
///
/// ```ignore
/// async fn my_handler(caller: CallerIdentity) -> AppResult<Json<()>> {
///     tracing::info!(user_id = caller.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: DbId,
    pub is_admin: bool,
}

impl CallerIdentity {
    /// Owners and admins may see and manage an artifact.
    pub fn can_access(&self, apk: &Apk) -> bool {
        self.is_admin || apk.user_id == self.user_id
    }

    /// Reject with 403 unless the caller may access `apk`.
    pub fn authorize(&self, apk: &Apk) -> Result<(), AppError> {
        if self.can_access(apk) {
            Ok(())
        } else {
            Err(AppError::Core(CoreError::Forbidden("Access denied".into())))
        }
    }
}

impl FromRequestParts<AppState> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Authentication required".into()))
            })?
            .trim()
            .parse::<DbId>()
            .map_err(|_| {
                AppError::Core(CoreError::Unauthorized(format!(
                    "Invalid {USER_ID_HEADER} header"
                )))
            })?;

        let is_admin = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.trim().eq_ignore_ascii_case(ROLE_ADMIN));

        Ok(CallerIdentity { user_id, is_admin })
    }
}
