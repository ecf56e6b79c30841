//! Persisted broadcast-override state, saved so a device can be restored to
//! its prior playlist position when the override ends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeviceBroadcastState {
    pub device_id: Uuid,
    pub saved_playlist_id: Option<Uuid>,
    pub saved_item_index: i32,
    pub saved_elapsed_ms: i64,
    pub broadcast_url: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}
