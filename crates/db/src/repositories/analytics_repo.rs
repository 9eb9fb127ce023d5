//! Repository for the `analytics` table.

use sqlx::PgPool;
use webapk_core::types::DbId;

use crate::models::analytics::{AnalyticsEvent, CreateAnalyticsEvent};
use crate::models::status::AnalyticsAction;

const COLUMNS: &str = "id, user_id, apk_id, action, timestamp";

pub struct AnalyticsRepo;

impl AnalyticsRepo {
    pub async fn record(
        pool: &PgPool,
        input: &CreateAnalyticsEvent,
    ) -> Result<AnalyticsEvent, sqlx::Error> {
        let query = format!(
            "INSERT INTO analytics (user_id, apk_id, action) \
             VALUES ($1, $2, $3) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnalyticsEvent>(&query)
            .bind(input.user_id)
            .bind(input.apk_id)
            .bind(input.action.as_str())
            .fetch_one(pool)
            .await
    }

    /// Count events of one kind for an artifact.
    pub async fn count_for_apk(
        pool: &PgPool,
        apk_id: DbId,
        action: AnalyticsAction,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM analytics WHERE apk_id = $1 AND action = $2")
            .bind(apk_id)
            .bind(action.as_str())
            .fetch_one(pool)
            .await
    }
}
