mod broadcast;
mod device;
mod license;
mod log_entry;
mod playlist;
mod screenshot;

pub use broadcast::DeviceBroadcastState;
pub use device::{DeviceConfigPatch, DeviceRecord, DeviceRecordWithToken};
pub use license::{Admission, GraceWindow, License, LicenseTierKind};
pub use log_entry::{LogEntry, LogFilter, LogLevel, NewLogEntry};
pub use playlist::{Playlist, PlaylistItemRow};
pub use screenshot::Screenshot;
