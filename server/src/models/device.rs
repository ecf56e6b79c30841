//! Device identity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A registered display endpoint. `token_hash` is a salted hash of the
/// opaque token handed to the device at creation time; the plaintext token
/// is never persisted and is re-shown only via explicit rotation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeviceRecord {
    pub id: Uuid,
    pub stable_device_id: String,
    pub display_name: String,
    #[serde(skip_serializing)]
    pub token_hash: String,
    pub viewport_w: i32,
    pub viewport_h: i32,
    pub kiosk_mode: bool,
    pub assigned_playlist_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Returned only at creation/rotation time, when the plaintext token exists.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecordWithToken {
    pub record: DeviceRecord,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceConfigPatch {
    pub display_width: Option<i32>,
    pub display_height: Option<i32>,
    pub kiosk_mode: Option<bool>,
}
