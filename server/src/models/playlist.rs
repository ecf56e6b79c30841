//! Playlist persistence rows, convertible to the wire shapes in
//! `signage_protocol`.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlaylistItemRow {
    pub id: Uuid,
    pub playlist_id: Uuid,
    pub content_id: Option<Uuid>,
    pub url: String,
    pub duration_seconds: i32,
    pub order_index: i64,
    pub time_window_start: Option<NaiveTime>,
    pub time_window_end: Option<NaiveTime>,
    pub days_of_week: Option<Vec<i16>>,
}

impl From<PlaylistItemRow> for protocol::PlaylistItem {
    fn from(row: PlaylistItemRow) -> Self {
        protocol::PlaylistItem {
            id: row.id,
            playlist_id: row.playlist_id,
            content_id: row.content_id,
            url: row.url,
            duration_seconds: row.duration_seconds.max(0) as u32,
            order_index: row.order_index,
            time_window_start: row.time_window_start,
            time_window_end: row.time_window_end,
            days_of_week: row
                .days_of_week
                .map(|days| days.into_iter().map(|d| d as u8).collect()),
        }
    }
}
