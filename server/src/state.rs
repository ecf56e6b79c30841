//! Shared application state handed to every route and WebSocket handler.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use sqlx::PgPool;

use crate::config::Settings;
use crate::services::hub::Hub;
use crate::services::license_service::LicenseService;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub redis: ConnectionManager,
    pub hub: Arc<Hub>,
    pub license_service: Arc<LicenseService>,
    pub settings: Arc<Settings>,
}
