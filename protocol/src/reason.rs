//! Session role and structured close/error reasons.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Device,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "device" => Ok(Role::Device),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unrecognized role: {other}")),
        }
    }
}

/// Structured reason a session was closed or a command denied, surfaced to
/// the affected client rather than silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseReason {
    /// Bad or missing token; not retried by the core.
    AuthFailed,
    /// Device rejected by the license service.
    LicenseDenied { reason: String },
    /// A prior session for the same device id was replaced by a new one.
    Superseded,
    /// No inbound traffic within the idle window.
    Idle,
    /// Write timeout or a full control queue.
    Transient,
    /// An invariant was violated; only this session is affected.
    Fatal { detail: String },
}

/// Non-fatal admission notice mirrored to the device and to admins when a
/// license is over its cap but within its grace window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseGraceNotice {
    pub grace_period_ends_at: DateTime<Utc>,
}
