//! Repository for the `apks` table.

use sqlx::{PgConnection, PgPool};
use webapk_core::types::DbId;

use crate::models::apk::{Apk, ApkUpdate, CreateApk};
use crate::models::status::ApkStatus;

/// Column list for `apks` queries.
const COLUMNS: &str = "\
    id, user_id, name, original_url, file_path, icon_path, mode, status, \
    download_count, size, apk_path, created_at";

/// Provides CRUD operations for build artifacts.
pub struct ApkRepo;

impl ApkRepo {
    /// Insert a new artifact with status `pending`.
    pub async fn create(pool: &PgPool, input: &CreateApk) -> Result<Apk, sqlx::Error> {
        let query = format!(
            "INSERT INTO apks (user_id, name, original_url, file_path, icon_path, mode, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Apk>(&query)
            .bind(input.user_id)
            .bind(&input.name)
            .bind(&input.original_url)
            .bind(&input.file_path)
            .bind(&input.icon_path)
            .bind(input.mode.as_str())
            .bind(ApkStatus::Pending.as_str())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Apk>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM apks WHERE id = $1");
        sqlx::query_as::<_, Apk>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// All artifacts owned by a user, newest first.
    pub async fn list_by_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Apk>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM apks WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Apk>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Every artifact, newest first. Admin listing.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<Apk>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM apks ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Apk>(&query).fetch_all(pool).await
    }

    /// Apply a partial update. Path and size survive only while the
    /// resulting status is `completed`. Callers validate the update first.
    ///
    /// Takes a connection so it can join a caller's transaction.
    pub async fn update(
        conn: &mut PgConnection,
        id: DbId,
        input: &ApkUpdate,
    ) -> Result<Option<Apk>, sqlx::Error> {
        let query = format!(
            "UPDATE apks SET \
                 status = COALESCE($2, status), \
                 apk_path = CASE WHEN COALESCE($2, status) = $5 THEN COALESCE($3, apk_path) END, \
                 size = CASE WHEN COALESCE($2, status) = $5 THEN COALESCE($4, size) END \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Apk>(&query)
            .bind(id)
            .bind(input.status.map(ApkStatus::as_str))
            .bind(&input.apk_path)
            .bind(&input.size)
            .bind(ApkStatus::Completed.as_str())
            .fetch_optional(conn)
            .await
    }

    /// Delete an artifact. Its jobs cascade; analytics keep a null `apk_id`.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM apks WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically bump the download counter, returning the new value.
    pub async fn increment_download_count(
        pool: &PgPool,
        id: DbId,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE apks SET download_count = download_count + 1 \
             WHERE id = $1 \
             RETURNING download_count",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }
}
