//! Background jobs that are ambient rather than request-driven: the audit
//! log's retention compactor and the license-revocation watcher that
//! disconnects affected devices.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use protocol::CloseReason;

use crate::config::AuditSettings;
use crate::repositories::AuditRepository;
use crate::services::hub::Hub;
use crate::services::license_service::LicenseService;

/// Runs forever, deleting log entries older than the configured retention
/// window once per day. Intended to be spawned once at startup.
pub async fn run_retention_compactor(repo: AuditRepository, settings: AuditSettings) {
    let mut interval = tokio::time::interval(Duration::from_secs(24 * 60 * 60));
    loop {
        interval.tick().await;
        let before = Utc::now() - ChronoDuration::days(settings.retention_days);
        match repo.compact(before).await {
            Ok(deleted) => {
                if deleted > 0 {
                    tracing::info!(deleted, "compacted audit log");
                }
            }
            Err(e) => tracing::error!(error = %e, "audit log compaction failed"),
        }
    }
}

/// Subscribes to license revocations and disconnects every device bound to
/// the revoked license, per the data model's "revocation ... disconnects
/// affected devices on next validation" lifecycle rule.
pub async fn run_revocation_watcher(hub: Arc<Hub>, license_service: Arc<LicenseService>) {
    let mut revocations = license_service.subscribe_revocations();
    loop {
        match revocations.recv().await {
            Ok(event) => {
                hub.disconnect_devices_for_license(
                    event.license_id,
                    CloseReason::LicenseDenied {
                        reason: "license revoked".to_string(),
                    },
                )
                .await;
            }
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "revocation watcher lagged behind broadcast channel");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Ends broadcast overrides whose `expiresAt` has passed, per the data
/// model's "broadcast ends explicitly or automatically after a duration"
/// lifecycle rule.
pub async fn run_broadcast_expiry_watcher(hub: Arc<Hub>) {
    let mut interval = tokio::time::interval(Duration::from_secs(10));
    loop {
        interval.tick().await;
        if let Err(e) = hub.expire_broadcasts().await {
            tracing::error!(error = %e, "broadcast expiry sweep failed");
        }
    }
}
