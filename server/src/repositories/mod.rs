mod audit_repo;
mod broadcast_repo;
mod device_repo;
mod license_repo;
mod playlist_repo;
mod screenshot_repo;

pub use audit_repo::AuditRepository;
pub use broadcast_repo::BroadcastRepository;
pub use device_repo::DeviceRepository;
pub use license_repo::LicenseRepository;
pub use playlist_repo::PlaylistRepository;
pub use screenshot_repo::ScreenshotRepository;
