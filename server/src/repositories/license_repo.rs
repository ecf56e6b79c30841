//! License Repository: rows, device-count mutation, and grace-window state.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{GraceWindow, License, LicenseTierKind};

pub struct LicenseRepository {
    pool: PgPool,
}

fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}

impl LicenseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_key(&self, license_key: &str) -> AppResult<Option<License>> {
        let license = sqlx::query_as!(
            License,
            r#"
            SELECT id, license_key, key_hash,
                   tier as "tier: LicenseTierKind",
                   max_devices, current_device_count, company_name,
                   is_active, expires_at, notes, created_at
            FROM licenses
            WHERE license_key = $1
            "#,
            license_key
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(license)
    }

    /// The currently-effective license: the active row with the largest
    /// `maxDevices`. Used by `LicenseService::validate`.
    pub async fn find_effective(&self) -> AppResult<Option<License>> {
        let license = sqlx::query_as!(
            License,
            r#"
            SELECT id, license_key, key_hash,
                   tier as "tier: LicenseTierKind",
                   max_devices, current_device_count, company_name,
                   is_active, expires_at, notes, created_at
            FROM licenses
            WHERE is_active = TRUE
            ORDER BY max_devices DESC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(license)
    }

    /// Idempotent upsert keyed by `license_key`: if an identical key already
    /// exists, its row is returned unchanged.
    pub async fn upsert(
        &self,
        license_key: &str,
        tier: LicenseTierKind,
        max_devices: i32,
        company_name: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> AppResult<License> {
        let key_hash = hash_key(license_key);

        let license = sqlx::query_as!(
            License,
            r#"
            INSERT INTO licenses (license_key, key_hash, tier, max_devices, company_name, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (license_key) DO UPDATE SET license_key = EXCLUDED.license_key
            RETURNING id, license_key, key_hash,
                      tier as "tier: LicenseTierKind",
                      max_devices, current_device_count, company_name,
                      is_active, expires_at, notes, created_at
            "#,
            license_key,
            key_hash,
            tier as LicenseTierKind,
            max_devices,
            company_name,
            expires_at
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(license)
    }

    pub async fn set_active(&self, id: Uuid, is_active: bool) -> AppResult<()> {
        sqlx::query!(
            "UPDATE licenses SET is_active = $2 WHERE id = $1",
            id,
            is_active
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Atomically increments `current_device_count`, serialized per license
    /// by the row lock `SELECT ... FOR UPDATE` takes inside the transaction.
    pub async fn increment_device_count(&self, id: Uuid) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        sqlx::query!(
            "SELECT current_device_count FROM licenses WHERE id = $1 FOR UPDATE",
            id
        )
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query!(
            r#"
            UPDATE licenses SET current_device_count = current_device_count + 1
            WHERE id = $1
            RETURNING current_device_count
            "#,
            id
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.current_device_count)
    }

    pub async fn decrement_device_count(&self, id: Uuid) -> AppResult<i32> {
        let mut tx = self.pool.begin().await?;

        sqlx::query!(
            "SELECT current_device_count FROM licenses WHERE id = $1 FOR UPDATE",
            id
        )
        .fetch_one(&mut *tx)
        .await?;

        let row = sqlx::query!(
            r#"
            UPDATE licenses
            SET current_device_count = GREATEST(current_device_count - 1, 0)
            WHERE id = $1
            RETURNING current_device_count
            "#,
            id
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.current_device_count)
    }

    pub async fn find_grace_window(&self, license_id: Uuid) -> AppResult<Option<GraceWindow>> {
        let window = sqlx::query_as!(
            GraceWindow,
            "SELECT license_id, started_at, ends_at FROM license_grace_windows WHERE license_id = $1",
            license_id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(window)
    }

    pub async fn open_grace_window(
        &self,
        license_id: Uuid,
        started_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
    ) -> AppResult<GraceWindow> {
        let window = sqlx::query_as!(
            GraceWindow,
            r#"
            INSERT INTO license_grace_windows (license_id, started_at, ends_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (license_id) DO UPDATE SET license_id = EXCLUDED.license_id
            RETURNING license_id, started_at, ends_at
            "#,
            license_id,
            started_at,
            ends_at
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(window)
    }

    pub async fn close_grace_window(&self, license_id: Uuid) -> AppResult<()> {
        sqlx::query!(
            "DELETE FROM license_grace_windows WHERE license_id = $1",
            license_id
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
