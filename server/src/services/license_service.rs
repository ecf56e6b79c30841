//! License Service: activation, per-device admission, and grace-window
//! bookkeeping. All count mutations serialize per license via the row lock
//! taken inside [`LicenseRepository`]'s increment/decrement methods.

use chrono::{Duration, Utc};
use license_codec::{DecodedLicense, LicenseCodecError};
use sqlx::PgPool;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::LicenseSettings;
use crate::errors::{AppError, AppResult};
use crate::models::{Admission, License, LicenseTierKind, LogLevel, NewLogEntry};
use crate::repositories::{AuditRepository, LicenseRepository};

/// Emitted on revocation so the Hub can re-validate every connected device
/// and disconnect those no longer admitted.
#[derive(Debug, Clone)]
pub struct LicenseRevoked {
    pub license_id: Uuid,
}

pub struct LicenseService {
    db: PgPool,
    settings: LicenseSettings,
    revoked_tx: broadcast::Sender<LicenseRevoked>,
}

impl LicenseService {
    pub fn new(db: PgPool, settings: LicenseSettings) -> Self {
        let (revoked_tx, _) = broadcast::channel(16);
        Self {
            db,
            settings,
            revoked_tx,
        }
    }

    pub fn subscribe_revocations(&self) -> broadcast::Receiver<LicenseRevoked> {
        self.revoked_tx.subscribe()
    }

    fn license_repo(&self) -> LicenseRepository {
        LicenseRepository::new(self.db.clone())
    }

    fn audit_repo(&self) -> AuditRepository {
        AuditRepository::new(self.db.clone())
    }

    /// Decode and upsert a license key. Idempotent: re-activating the same
    /// key returns the existing row unchanged.
    pub async fn activate(&self, key: &str) -> AppResult<License> {
        let decoded = license_codec::decode(key, self.settings.signing_secret.as_bytes())
            .map_err(|e| AppError::License(license_error_message(e)))?;

        let (tier, max_devices, company, expires_at) = match decoded {
            DecodedLicense::V2(payload) => {
                if let Some(expiry) = payload.e {
                    let expiry_end_of_day = expiry
                        .and_hms_opt(23, 59, 59)
                        .unwrap()
                        .and_utc();
                    if expiry_end_of_day < Utc::now() {
                        return Err(AppError::License("license has already expired".to_string()));
                    }
                }
                let tier_kind = match payload.t {
                    license_codec::Tier::Free => LicenseTierKind::Free,
                    license_codec::Tier::Pro(_) => LicenseTierKind::Pro,
                };
                let expires_at = payload
                    .e
                    .map(|d| d.and_hms_opt(23, 59, 59).unwrap().and_utc());
                (tier_kind, payload.d as i32, payload.c, expires_at)
            }
            DecodedLicense::V1 { tier } => {
                let max_devices = match tier {
                    license_codec::Tier::Free => self.settings.free_tier_default_devices,
                    license_codec::Tier::Pro(n) => n,
                };
                let tier_kind = match tier {
                    license_codec::Tier::Free => LicenseTierKind::Free,
                    license_codec::Tier::Pro(_) => LicenseTierKind::Pro,
                };
                (tier_kind, max_devices as i32, None, None)
            }
        };

        let license_repo = self.license_repo();
        let license = license_repo
            .upsert(key, tier, max_devices, company.as_deref(), expires_at)
            .await?;

        self.audit_repo()
            .log(NewLogEntry {
                level: LogLevel::Info,
                message: format!("license activated: {}", license.id),
                device_id: None,
                source: Some("license_service".to_string()),
                stack_trace: None,
                additional_data: Some(serde_json::json!({ "licenseId": license.id })),
            })
            .await?;

        Ok(license)
    }

    /// Determines the effective license and whether a device may connect.
    /// Called on every device connect, before the session is registered.
    pub async fn validate(&self) -> AppResult<(License, Admission)> {
        let license_repo = self.license_repo();
        let license = self.effective_license(&license_repo).await?;

        let now = Utc::now();
        if license.is_expired(now) {
            license_repo.set_active(license.id, false).await?;
            return Ok((
                license,
                Admission::Deny {
                    reason: "license expired".to_string(),
                },
            ));
        }

        if license.has_capacity() {
            return Ok((license, Admission::Admit));
        }

        let window = license_repo.find_grace_window(license.id).await?;
        let admission = match window {
            None => {
                let ends_at = now + Duration::days(self.settings.grace_window_days);
                license_repo.open_grace_window(license.id, now, ends_at).await?;
                Admission::AdmitGrace {
                    grace_period_ends_at: ends_at,
                }
            }
            Some(w) if w.ends_at >= now => Admission::AdmitGrace {
                grace_period_ends_at: w.ends_at,
            },
            Some(_) => Admission::Deny {
                reason: "license device cap exceeded and grace window elapsed".to_string(),
            },
        };

        Ok((license, admission))
    }

    async fn effective_license(&self, repo: &LicenseRepository) -> AppResult<License> {
        if let Some(license) = repo.find_effective().await? {
            return Ok(license);
        }

        // No license activated yet: the implicit free tier, materialized as
        // a real row so its device count and grace window persist normally.
        repo.upsert(
            "LK-0-implicit-free",
            LicenseTierKind::Free,
            self.settings.free_tier_default_devices as i32,
            None,
            None,
        )
        .await
    }

    pub async fn register_device(&self, license_id: Uuid) -> AppResult<()> {
        self.license_repo().increment_device_count(license_id).await?;
        Ok(())
    }

    pub async fn unregister_device(&self, license_id: Uuid) -> AppResult<()> {
        self.license_repo().decrement_device_count(license_id).await?;
        Ok(())
    }

    pub async fn revoke(&self, license_id: Uuid) -> AppResult<()> {
        self.license_repo().set_active(license_id, false).await?;

        self.audit_repo()
            .log(NewLogEntry {
                level: LogLevel::Warning,
                message: format!("license revoked: {license_id}"),
                device_id: None,
                source: Some("license_service".to_string()),
                stack_trace: None,
                additional_data: None,
            })
            .await?;

        let _ = self.revoked_tx.send(LicenseRevoked { license_id });
        Ok(())
    }
}

fn license_error_message(e: LicenseCodecError) -> String {
    match e {
        LicenseCodecError::MalformedKey(detail) => format!("malformed license key: {detail}"),
        LicenseCodecError::InvalidSignature => "license key signature is invalid".to_string(),
        LicenseCodecError::UnsupportedVersion(v) => format!("unsupported license key version: {v}"),
    }
}
