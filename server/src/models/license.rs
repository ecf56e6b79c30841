//! License row model and grace-window state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "license_tier", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LicenseTierKind {
    Free,
    Pro,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct License {
    pub id: Uuid,
    pub license_key: String,
    #[serde(skip_serializing)]
    pub key_hash: String,
    pub tier: LicenseTierKind,
    pub max_devices: i32,
    pub current_device_count: i32,
    pub company_name: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl License {
    pub fn has_capacity(&self) -> bool {
        self.current_device_count < self.max_devices
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|e| e < now)
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct GraceWindow {
    pub license_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Outcome of [`crate::services::license_service::LicenseService::validate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Admit,
    AdmitGrace { grace_period_ends_at: DateTime<Utc> },
    Deny { reason: String },
}
