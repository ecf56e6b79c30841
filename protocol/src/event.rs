//! The `{event, payload}` envelope and its full catalog.
//!
//! Every variant corresponds to one row of the wire event table. Unknown
//! fields in any payload must be ignored by both sides — payloads are
//! additive — which is why every optional field below is `Option` with
//! `#[serde(default)]` rather than required.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::playback::PlaybackState;
use crate::playlist::PlaylistSnapshot;
use crate::reason::LicenseGraceNotice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum KeyModifier {
    Control,
    Shift,
    Alt,
    Meta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigUpdatePayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kiosk_mode: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RotationControlPayload {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub respect_constraints: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreencastMetadata {
    pub session_id: Uuid,
    pub timestamp_ms: i64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReportPayload {
    pub cpu: f32,
    pub memory: f32,
    pub disk: f32,
    pub timestamp: i64,
}

/// The full server↔device↔admin event catalog, framed as a single tagged
/// enum so a central dispatcher can route each variant to a typed handler
/// without reflection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum Event {
    // ---- server -> device ----
    #[serde(rename = "content:update")]
    ContentUpdate(PlaylistSnapshot),

    #[serde(rename = "config:update")]
    ConfigUpdate(ConfigUpdatePayload),

    #[serde(rename = "display:navigate")]
    DisplayNavigate { url: String },

    #[serde(rename = "display:refresh")]
    DisplayRefresh {},

    #[serde(rename = "screenshot:request")]
    ScreenshotRequest {},

    #[serde(rename = "device:restart")]
    DeviceRestart {},

    #[serde(rename = "remote:click")]
    RemoteClick {
        x: i32,
        y: i32,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        button: Option<String>,
    },

    #[serde(rename = "remote:type")]
    RemoteType {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        selector: Option<String>,
    },

    #[serde(rename = "remote:key")]
    RemoteKey {
        key: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        modifiers: Option<Vec<KeyModifier>>,
    },

    #[serde(rename = "remote:scroll")]
    RemoteScroll { x: i32, y: i32 },

    #[serde(rename = "playlist:pause")]
    PlaylistPause(RotationControlPayload),

    #[serde(rename = "playlist:resume")]
    PlaylistResume(RotationControlPayload),

    #[serde(rename = "playlist:next")]
    PlaylistNext(RotationControlPayload),

    #[serde(rename = "playlist:previous")]
    PlaylistPrevious(RotationControlPayload),

    #[serde(rename = "screencast:start")]
    ScreencastStart {},

    #[serde(rename = "screencast:stop")]
    ScreencastStop {},

    #[serde(rename = "license:grace")]
    LicenseGrace(LicenseGraceNotice),

    /// Server -> device: tells the rotation engine to restore the playlist
    /// position it saved when the broadcast override now ending was started.
    #[serde(rename = "broadcast:end")]
    BroadcastEnd {},

    // ---- admin -> server (stream subscription, not part of the
    // device-facing catalog) ----
    #[serde(rename = "screencast:subscribe")]
    ScreencastSubscribe {},

    #[serde(rename = "screencast:unsubscribe")]
    ScreencastUnsubscribe {},

    /// Admin -> server, addressed to one device via [`AdminCommand`]: install
    /// a broadcast override. The Hub persists `DeviceBroadcastState` and
    /// pushes the resulting single-item `content:update` to the device.
    #[serde(rename = "broadcast:start")]
    BroadcastStart {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        duration_secs: Option<i64>,
    },

    // ---- device -> server ----
    #[serde(rename = "device:register")]
    DeviceRegister { token: String },

    #[serde(rename = "health:report")]
    HealthReport(HealthReportPayload),

    #[serde(rename = "playback:state:update")]
    PlaybackStateUpdate(PlaybackState),

    #[serde(rename = "screenshot:upload")]
    ScreenshotUpload {
        image: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        current_url: Option<String>,
    },

    #[serde(rename = "screencast:frame")]
    ScreencastFrame {
        data: String,
        metadata: ScreencastMetadata,
    },

    #[serde(rename = "error:report")]
    ErrorReport {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        context: Option<serde_json::Value>,
    },

    // ---- server -> admin ----
    #[serde(rename = "admin:device:status")]
    AdminDeviceStatus {
        device_id: Uuid,
        online: bool,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        last_seen: Option<chrono::DateTime<chrono::Utc>>,
    },

    #[serde(rename = "admin:playback:state")]
    AdminPlaybackState {
        device_id: Uuid,
        #[serde(flatten)]
        state: PlaybackState,
    },

    #[serde(rename = "admin:screencast:frame")]
    AdminScreencastFrame {
        device_id: Uuid,
        data: String,
        metadata: ScreencastMetadata,
    },

    #[serde(rename = "admin:license:grace")]
    AdminLicenseGrace {
        device_id: Uuid,
        #[serde(flatten)]
        notice: LicenseGraceNotice,
    },
}

impl Event {
    /// The `event` discriminator string as it appears on the wire, useful for
    /// logging without re-serializing the whole envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ContentUpdate(_) => "content:update",
            Event::ConfigUpdate(_) => "config:update",
            Event::DisplayNavigate { .. } => "display:navigate",
            Event::DisplayRefresh {} => "display:refresh",
            Event::ScreenshotRequest {} => "screenshot:request",
            Event::DeviceRestart {} => "device:restart",
            Event::RemoteClick { .. } => "remote:click",
            Event::RemoteType { .. } => "remote:type",
            Event::RemoteKey { .. } => "remote:key",
            Event::RemoteScroll { .. } => "remote:scroll",
            Event::PlaylistPause(_) => "playlist:pause",
            Event::PlaylistResume(_) => "playlist:resume",
            Event::PlaylistNext(_) => "playlist:next",
            Event::PlaylistPrevious(_) => "playlist:previous",
            Event::ScreencastStart {} => "screencast:start",
            Event::ScreencastStop {} => "screencast:stop",
            Event::LicenseGrace(_) => "license:grace",
            Event::BroadcastEnd {} => "broadcast:end",
            Event::ScreencastSubscribe {} => "screencast:subscribe",
            Event::ScreencastUnsubscribe {} => "screencast:unsubscribe",
            Event::BroadcastStart { .. } => "broadcast:start",
            Event::DeviceRegister { .. } => "device:register",
            Event::HealthReport(_) => "health:report",
            Event::PlaybackStateUpdate(_) => "playback:state:update",
            Event::ScreenshotUpload { .. } => "screenshot:upload",
            Event::ScreencastFrame { .. } => "screencast:frame",
            Event::ErrorReport { .. } => "error:report",
            Event::AdminDeviceStatus { .. } => "admin:device:status",
            Event::AdminPlaybackState { .. } => "admin:playback:state",
            Event::AdminScreencastFrame { .. } => "admin:screencast:frame",
            Event::AdminLicenseGrace { .. } => "admin:license:grace",
        }
    }

    /// Events that must never be dropped under backpressure (see the Hub's
    /// control/stream queue split).
    pub fn is_control_priority(&self) -> bool {
        !matches!(
            self,
            Event::ScreencastFrame { .. }
                | Event::AdminScreencastFrame { .. }
                | Event::HealthReport(_)
        )
    }
}

/// Wire shape for an admin-originated command: every admin message is
/// addressed to one device, wrapping the same envelope device connections
/// use so both sides dispatch through a single `Event` match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCommand {
    pub device_id: Uuid,
    #[serde(flatten)]
    pub event: Event,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_colon_event_names() {
        let event = Event::DisplayRefresh {};
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "display:refresh");
    }

    #[test]
    fn round_trips_content_update() {
        let event = Event::ContentUpdate(PlaylistSnapshot {
            playlist_id: Uuid::nil(),
            items: vec![],
            broadcast: false,
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }

    #[test]
    fn unknown_fields_in_payload_are_ignored() {
        let raw = r#"{"event":"display:navigate","payload":{"url":"https://a","extra":"ignored"}}"#;
        let event: Event = serde_json::from_str(raw).unwrap();
        assert!(matches!(event, Event::DisplayNavigate { url } if url == "https://a"));
    }

    #[test]
    fn control_priority_excludes_streamed_frames() {
        assert!(!Event::ScreencastFrame {
            data: String::new(),
            metadata: ScreencastMetadata {
                session_id: Uuid::nil(),
                timestamp_ms: 0,
                width: 0,
                height: 0,
            },
        }
        .is_control_priority());
        assert!(Event::DeviceRestart {}.is_control_priority());
    }
}
