//! Playlist Model persistence.

use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{Playlist, PlaylistItemRow};
use sqlx::PgPool;

pub struct PlaylistRepository {
    pool: PgPool,
}

impl PlaylistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<Playlist>> {
        let playlist = sqlx::query_as!(
            Playlist,
            "SELECT id, name, is_active, created_at FROM playlists WHERE id = $1",
            id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(playlist)
    }

    /// Items ordered by `orderIndex` ascending, ties broken by id ascending.
    pub async fn items_for(&self, playlist_id: Uuid) -> AppResult<Vec<PlaylistItemRow>> {
        let items = sqlx::query_as!(
            PlaylistItemRow,
            r#"
            SELECT id, playlist_id, content_id, url, duration_seconds, order_index,
                   time_window_start, time_window_end, days_of_week
            FROM playlist_items
            WHERE playlist_id = $1
            ORDER BY order_index ASC, id ASC
            "#,
            playlist_id
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    pub async fn assigned_playlist_for_device(
        &self,
        device_id: Uuid,
    ) -> AppResult<Option<(Playlist, Vec<PlaylistItemRow>)>> {
        let Some(assigned_id) = sqlx::query_scalar!(
            r#"SELECT assigned_playlist_id FROM device_records WHERE id = $1"#,
            device_id
        )
        .fetch_optional(&self.pool)
        .await?
        .flatten() else {
            return Ok(None);
        };

        let Some(playlist) = self.find_by_id(assigned_id).await? else {
            return Ok(None);
        };
        let items = self.items_for(assigned_id).await?;
        Ok(Some((playlist, items)))
    }

    pub async fn create(&self, name: &str) -> AppResult<Playlist> {
        let playlist = sqlx::query_as!(
            Playlist,
            "INSERT INTO playlists (name) VALUES ($1) RETURNING id, name, is_active, created_at",
            name
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(playlist)
    }

    pub async fn devices_assigned(&self, playlist_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar!(
            "SELECT id FROM device_records WHERE assigned_playlist_id = $1",
            playlist_id
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}
