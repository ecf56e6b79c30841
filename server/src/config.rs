//! Server configuration, loaded from the environment (with `.env` support).

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub database: DatabaseSettings,
    pub redis: RedisSettings,
    pub license: LicenseSettings,
    pub session: SessionSettings,
    pub audit: AuditSettings,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub env: String,
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct LicenseSettings {
    /// HMAC key used to sign/verify V2 license keys.
    pub signing_secret: String,
    /// Default `maxDevices` for the implicit free tier.
    pub free_tier_default_devices: u32,
    /// Grace window duration once a license's device count exceeds its cap.
    pub grace_window_days: i64,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Expected cadence of `health:report` from a device, in seconds.
    pub health_interval_secs: u64,
    /// Idle timeout is this multiple of `health_interval_secs`.
    pub idle_timeout_multiplier: u64,
    /// Write timeout applied to every outbound send.
    pub write_timeout_secs: u64,
    /// Bound on each session's stream queue (screencast frames, health).
    pub stream_queue_capacity: usize,
    /// Bound on each session's control queue (commands, config, playlists).
    pub control_queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct AuditSettings {
    pub retention_days: i64,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Settings {
            app: AppSettings {
                env: env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()?,
                host: env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            database: DatabaseSettings {
                url: env::var("DATABASE_URL")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "20".to_string())
                    .parse()?,
            },
            redis: RedisSettings {
                url: env::var("REDIS_URL")?,
            },
            license: LicenseSettings {
                signing_secret: env::var("LICENSE_SIGNING_SECRET")?,
                free_tier_default_devices: env::var("FREE_TIER_DEFAULT_DEVICES")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                grace_window_days: env::var("LICENSE_GRACE_WINDOW_DAYS")
                    .unwrap_or_else(|_| "7".to_string())
                    .parse()?,
            },
            session: SessionSettings {
                health_interval_secs: env::var("HEALTH_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
                idle_timeout_multiplier: env::var("IDLE_TIMEOUT_MULTIPLIER")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
                write_timeout_secs: env::var("WRITE_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
                stream_queue_capacity: env::var("STREAM_QUEUE_CAPACITY")
                    .unwrap_or_else(|_| "32".to_string())
                    .parse()?,
                control_queue_capacity: env::var("CONTROL_QUEUE_CAPACITY")
                    .unwrap_or_else(|_| "256".to_string())
                    .parse()?,
            },
            audit: AuditSettings {
                retention_days: env::var("AUDIT_RETENTION_DAYS")
                    .unwrap_or_else(|_| "90".to_string())
                    .parse()?,
            },
        })
    }

    pub fn idle_timeout_secs(&self) -> u64 {
        self.session.health_interval_secs * self.session.idle_timeout_multiplier
    }
}
