//! Broadcast Override persistence: save/restore of prior playlist position.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::DeviceBroadcastState;

pub struct BroadcastRepository {
    pool: PgPool,
}

impl BroadcastRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, device_id: Uuid) -> AppResult<Option<DeviceBroadcastState>> {
        let state = sqlx::query_as!(
            DeviceBroadcastState,
            r#"
            SELECT device_id, saved_playlist_id, saved_item_index, saved_elapsed_ms,
                   broadcast_url, started_at, expires_at
            FROM device_broadcast_state
            WHERE device_id = $1
            "#,
            device_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn start(
        &self,
        device_id: Uuid,
        saved_playlist_id: Option<Uuid>,
        saved_item_index: i32,
        saved_elapsed_ms: i64,
        broadcast_url: &str,
        started_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<DeviceBroadcastState> {
        let state = sqlx::query_as!(
            DeviceBroadcastState,
            r#"
            INSERT INTO device_broadcast_state
                (device_id, saved_playlist_id, saved_item_index, saved_elapsed_ms,
                 broadcast_url, started_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (device_id) DO UPDATE SET
                saved_playlist_id = EXCLUDED.saved_playlist_id,
                saved_item_index = EXCLUDED.saved_item_index,
                saved_elapsed_ms = EXCLUDED.saved_elapsed_ms,
                broadcast_url = EXCLUDED.broadcast_url,
                started_at = EXCLUDED.started_at,
                expires_at = EXCLUDED.expires_at
            RETURNING device_id, saved_playlist_id, saved_item_index, saved_elapsed_ms,
                      broadcast_url, started_at, expires_at
            "#,
            device_id,
            saved_playlist_id,
            saved_item_index,
            saved_elapsed_ms,
            broadcast_url,
            started_at,
            expires_at
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(state)
    }

    pub async fn end(&self, device_id: Uuid) -> AppResult<()> {
        sqlx::query!(
            "DELETE FROM device_broadcast_state WHERE device_id = $1",
            device_id
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Device ids whose broadcast override has passed its `expires_at`.
    pub async fn expired(&self, now: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar!(
            "SELECT device_id FROM device_broadcast_state WHERE expires_at IS NOT NULL AND expires_at <= $1",
            now
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
