//! Device Record Store.
//!
//! Exposes the minimal contract the Hub needs: resolve identity by token,
//! fetch the assigned playlist, and apply config patches. Persistence
//! technology is an implementation detail behind this repository.

use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{DeviceConfigPatch, DeviceRecord, DeviceRecordWithToken};

pub struct DeviceRepository {
    pool: PgPool,
}

fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    hex::encode(digest)
}

impl DeviceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve a device by its opaque bearer token. The plaintext token is
    /// never stored, so this hashes first and looks up by hash.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<DeviceRecord>> {
        let token_hash = hash_token(token);
        let device = sqlx::query_as!(
            DeviceRecord,
            r#"
            SELECT id, stable_device_id, display_name, token_hash,
                   viewport_w, viewport_h, kiosk_mode, assigned_playlist_id, created_at
            FROM device_records
            WHERE token_hash = $1
            "#,
            token_hash
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    pub async fn find_by_id(&self, id: Uuid) -> AppResult<Option<DeviceRecord>> {
        let device = sqlx::query_as!(
            DeviceRecord,
            r#"
            SELECT id, stable_device_id, display_name, token_hash,
                   viewport_w, viewport_h, kiosk_mode, assigned_playlist_id, created_at
            FROM device_records
            WHERE id = $1
            "#,
            id
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Create a device record with a freshly generated opaque token. The
    /// token is returned once; only its hash is persisted.
    pub async fn create(
        &self,
        stable_device_id: &str,
        display_name: &str,
        viewport_w: i32,
        viewport_h: i32,
        kiosk_mode: bool,
    ) -> AppResult<DeviceRecordWithToken> {
        let token = generate_opaque_token();
        let token_hash = hash_token(&token);

        let record = sqlx::query_as!(
            DeviceRecord,
            r#"
            INSERT INTO device_records
                (stable_device_id, display_name, token_hash, viewport_w, viewport_h, kiosk_mode)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, stable_device_id, display_name, token_hash,
                      viewport_w, viewport_h, kiosk_mode, assigned_playlist_id, created_at
            "#,
            stable_device_id,
            display_name,
            token_hash,
            viewport_w,
            viewport_h,
            kiosk_mode
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DeviceRecordWithToken { record, token })
    }

    /// Rotate a device's token. The new plaintext is shown once, same as
    /// creation.
    pub async fn rotate_token(&self, id: Uuid) -> AppResult<DeviceRecordWithToken> {
        let token = generate_opaque_token();
        let token_hash = hash_token(&token);

        let record = sqlx::query_as!(
            DeviceRecord,
            r#"
            UPDATE device_records SET token_hash = $2
            WHERE id = $1
            RETURNING id, stable_device_id, display_name, token_hash,
                      viewport_w, viewport_h, kiosk_mode, assigned_playlist_id, created_at
            "#,
            id,
            token_hash
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(DeviceRecordWithToken { record, token })
    }

    pub async fn assign_playlist(&self, id: Uuid, playlist_id: Option<Uuid>) -> AppResult<()> {
        sqlx::query!(
            "UPDATE device_records SET assigned_playlist_id = $2 WHERE id = $1",
            id,
            playlist_id
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn update_config(&self, id: Uuid, patch: &DeviceConfigPatch) -> AppResult<()> {
        sqlx::query!(
            r#"
            UPDATE device_records
            SET viewport_w = COALESCE($2, viewport_w),
                viewport_h = COALESCE($3, viewport_h),
                kiosk_mode = COALESCE($4, kiosk_mode)
            WHERE id = $1
            "#,
            id,
            patch.display_width,
            patch.display_height,
            patch.kiosk_mode
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        sqlx::query!("DELETE FROM device_records WHERE id = $1", id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn generate_opaque_token() -> String {
    use uuid::Uuid;
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
