//! Analytics event rows (downloads, views, shares).

use serde::Serialize;
use sqlx::FromRow;
use webapk_core::types::{DbId, Timestamp};

use super::status::AnalyticsAction;

/// A row from the `analytics` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnalyticsEvent {
    pub id: DbId,
    pub user_id: Option<DbId>,
    pub apk_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub action: AnalyticsAction,
    pub timestamp: Timestamp,
}

/// DTO for recording an analytics event.
#[derive(Debug, Clone)]
pub struct CreateAnalyticsEvent {
    pub user_id: Option<DbId>,
    pub apk_id: Option<DbId>,
    pub action: AnalyticsAction,
}

impl CreateAnalyticsEvent {
    pub fn download(user_id: DbId, apk_id: DbId) -> Self {
        Self {
            user_id: Some(user_id),
            apk_id: Some(apk_id),
            action: AnalyticsAction::Download,
        }
    }
}
