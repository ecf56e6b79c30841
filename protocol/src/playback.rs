//! Transient, streamed playback and health shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_broadcasting: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_item_id: Option<Uuid>,
    pub current_item_index: usize,
    pub playlist_id: Uuid,
    pub total_items: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub current_url: Option<String>,
    pub time_remaining_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSample {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub disk_percent: f32,
    pub timestamp: DateTime<Utc>,
}
