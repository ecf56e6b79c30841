//! Screenshot retention: keep the latest per device plus a rolling window
//! (see DESIGN.md for the resolved retention policy).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::Screenshot;

pub struct ScreenshotRepository {
    pool: PgPool,
}

impl ScreenshotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        device_stable_id: &str,
        current_url: Option<&str>,
        image_jpeg_base64: &str,
    ) -> AppResult<Screenshot> {
        let screenshot = sqlx::query_as!(
            Screenshot,
            r#"
            INSERT INTO screenshots (device_stable_id, current_url, image_jpeg_base64)
            VALUES ($1, $2, $3)
            RETURNING id, device_stable_id, current_url, image_jpeg_base64, created_at
            "#,
            device_stable_id,
            current_url,
            image_jpeg_base64
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(screenshot)
    }

    pub async fn latest_for_device(
        &self,
        device_stable_id: &str,
    ) -> AppResult<Option<Screenshot>> {
        let screenshot = sqlx::query_as!(
            Screenshot,
            r#"
            SELECT id, device_stable_id, current_url, image_jpeg_base64, created_at
            FROM screenshots
            WHERE device_stable_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            device_stable_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(screenshot)
    }

    /// Deletes everything older than `before`, except each device's single
    /// most recent row.
    pub async fn prune_older_than(&self, before: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query!(
            r#"
            DELETE FROM screenshots s
            WHERE s.created_at < $1
            AND s.id NOT IN (
                SELECT DISTINCT ON (device_stable_id) id
                FROM screenshots
                ORDER BY device_stable_id, created_at DESC
            )
            "#,
            before
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
