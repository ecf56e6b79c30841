//! Device client configuration, loaded from the environment (with `.env`
//! support), the same shape as the hub's own `Settings`.

use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub health: HealthSettings,
    pub screenshot: ScreenshotSettings,
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// e.g. `ws://hub.example.com:8080/ws`
    pub server_url: String,
    pub device_token: String,
    /// Base URL relative playlist item URLs resolve against.
    pub content_base_url: String,
    pub reconnect_backoff_base_secs: u64,
    pub max_reconnect_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct HealthSettings {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ScreenshotSettings {
    pub interval_secs: u64,
    pub initial_delay_secs: u64,
    pub post_navigation_delay_secs: u64,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Settings {
            connection: ConnectionSettings {
                server_url: env::var("SIGNAGE_SERVER_URL")?,
                device_token: env::var("SIGNAGE_DEVICE_TOKEN")?,
                content_base_url: env::var("SIGNAGE_CONTENT_BASE_URL")
                    .unwrap_or_else(|_| String::new()),
                reconnect_backoff_base_secs: env::var("RECONNECT_BACKOFF_BASE_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                max_reconnect_attempts: env::var("MAX_RECONNECT_ATTEMPTS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
            },
            health: HealthSettings {
                interval_secs: env::var("HEALTH_INTERVAL_SECS")
                    .unwrap_or_else(|_| "60".to_string())
                    .parse()?,
                initial_delay_secs: env::var("HEALTH_INITIAL_DELAY_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()?,
            },
            screenshot: ScreenshotSettings {
                interval_secs: env::var("SCREENSHOT_INTERVAL_SECS")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()?,
                initial_delay_secs: env::var("SCREENSHOT_INITIAL_DELAY_SECS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()?,
                post_navigation_delay_secs: env::var("SCREENSHOT_POST_NAVIGATION_DELAY_SECS")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()?,
            },
        })
    }
}
