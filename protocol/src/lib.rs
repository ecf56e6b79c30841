//! Shared wire types for the session hub and the device client: the
//! `{event, payload}` envelope, playlist/playback/health shapes, and the
//! structured reasons a session closes.

mod event;
mod playback;
mod playlist;
mod reason;

pub use event::{
    AdminCommand, ConfigUpdatePayload, Event, HealthReportPayload, KeyModifier,
    RotationControlPayload, ScreencastMetadata,
};
pub use playback::{HealthSample, PlaybackState};
pub use playlist::{weekday_to_wire, DayOfWeek, PlaylistItem, PlaylistSnapshot};
pub use reason::{CloseReason, LicenseGraceNotice, Role};
