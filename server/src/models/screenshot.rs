//! Screenshot upload model. Retention is implementation-defined (§3); this
//! core keeps the latest per device plus a configurable rolling window (see
//! DESIGN.md for the resolved policy).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Screenshot {
    pub id: Uuid,
    pub device_stable_id: String,
    pub current_url: Option<String>,
    pub image_jpeg_base64: String,
    pub created_at: DateTime<Utc>,
}
