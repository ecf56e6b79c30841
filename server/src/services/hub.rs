//! Session Hub: the concurrent device/admin registry and event router.
//!
//! The two maps are the only place live session state lives; every other
//! component reaches sessions only through the methods below.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::Utc;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use protocol::{CloseReason, Event};

use crate::config::Settings;
use crate::errors::AppResult;
use crate::models::{DeviceRecord, LogLevel};
use crate::repositories::{AuditRepository, BroadcastRepository, PlaylistRepository};
use crate::services::license_service::LicenseService;
use crate::ws::session::{new_session_handle, AdminSession, DeviceSession, RouteError, SessionHandle};

pub struct Hub {
    devices: RwLock<HashMap<Uuid, DeviceSession>>,
    admins: RwLock<HashMap<Uuid, AdminSession>>,
    db: PgPool,
    license_service: Arc<LicenseService>,
    settings: Arc<Settings>,
}

impl Hub {
    pub fn new(db: PgPool, license_service: Arc<LicenseService>, settings: Arc<Settings>) -> Self {
        Self {
            devices: RwLock::new(HashMap::new()),
            admins: RwLock::new(HashMap::new()),
            db,
            license_service,
            settings,
        }
    }

    fn playlist_repo(&self) -> PlaylistRepository {
        PlaylistRepository::new(self.db.clone())
    }

    fn audit_repo(&self) -> AuditRepository {
        AuditRepository::new(self.db.clone())
    }

    /// Registers a newly admitted device session. If a prior session exists
    /// for the same stable device id, it is closed with `Superseded` before
    /// the new one is inserted, so admins never observe two live sessions
    /// for one device.
    pub async fn register_device(
        &self,
        device: &DeviceRecord,
        license_id: Uuid,
    ) -> AppResult<(Uuid, SessionSetup)> {
        let (handle, control_rx, shutdown_rx) = new_session_handle(
            self.settings.session.control_queue_capacity,
            self.settings.session.stream_queue_capacity,
        );
        let stream = handle.stream.clone();

        let session_id = device.id;
        let session = DeviceSession {
            id: session_id,
            stable_device_id: device.stable_device_id.clone(),
            license_id,
            handle,
            screencast_subscribers: std::sync::atomic::AtomicUsize::new(0),
            last_playback: std::sync::Mutex::new(None),
        };

        {
            let mut devices = self.devices.write().await;
            if let Some(prior) = devices.remove(&session_id) {
                prior.handle.close(CloseReason::Superseded);
            }
            devices.insert(session_id, session);
        }

        self.broadcast_to_admins(Event::AdminDeviceStatus {
            device_id: session_id,
            online: true,
            last_seen: Some(Utc::now()),
        })
        .await;

        // Immediately push the assigned playlist, per the registration
        // contract — reconnects must not depend on any buffered state.
        if let Some((playlist, items)) = self
            .playlist_repo()
            .assigned_playlist_for_device(session_id)
            .await?
        {
            let snapshot = protocol::PlaylistSnapshot {
                playlist_id: playlist.id,
                items: items.into_iter().map(Into::into).collect(),
                broadcast: false,
            };
            self.route_to_device(session_id, Event::ContentUpdate(snapshot))
                .await
                .ok();
        }

        self.audit_repo()
            .device_log(session_id, LogLevel::Info, "device connected")
            .await?;

        Ok((
            session_id,
            SessionSetup {
                control_rx,
                shutdown_rx,
                stream,
            },
        ))
    }

    pub async fn deregister_device(&self, device_id: Uuid) -> AppResult<()> {
        let removed = {
            let mut devices = self.devices.write().await;
            devices.remove(&device_id)
        };

        let Some(session) = removed else {
            return Ok(());
        };

        self.license_service
            .unregister_device(session.license_id)
            .await?;

        self.broadcast_to_admins(Event::AdminDeviceStatus {
            device_id,
            online: false,
            last_seen: Some(Utc::now()),
        })
        .await;

        self.audit_repo()
            .device_log(device_id, LogLevel::Info, "device disconnected")
            .await?;

        Ok(())
    }

    pub async fn register_admin(&self) -> (Uuid, SessionSetup) {
        let (handle, control_rx, shutdown_rx) = new_session_handle(
            self.settings.session.control_queue_capacity,
            self.settings.session.stream_queue_capacity,
        );
        let stream = handle.stream.clone();
        let admin_id = Uuid::new_v4();
        let session = AdminSession {
            id: admin_id,
            handle,
            screencast_subscriptions: std::sync::Mutex::new(std::collections::HashSet::new()),
        };

        self.admins.write().await.insert(admin_id, session);

        (
            admin_id,
            SessionSetup {
                control_rx,
                shutdown_rx,
                stream,
            },
        )
    }

    pub async fn deregister_admin(&self, admin_id: Uuid) {
        let removed = self.admins.write().await.remove(&admin_id);
        let Some(session) = removed else { return };

        let subs = session
            .screencast_subscriptions
            .lock()
            .expect("poisoned")
            .clone();
        for device_id in subs {
            let _ = self.unsubscribe_screencast(admin_id, device_id).await;
        }
    }

    /// Looks up the device session; `DeviceOffline` if not present.
    /// Delivery is at-most-once: if the connection drops, queued frames are
    /// simply dropped with the session.
    pub async fn route_to_device(&self, device_id: Uuid, event: Event) -> Result<(), RouteError> {
        let devices = self.devices.read().await;
        let session = devices.get(&device_id).ok_or(RouteError::DeviceOffline)?;
        dispatch(&session.handle, event);
        Ok(())
    }

    pub async fn broadcast_to_admins(&self, event: Event) {
        let admins = self.admins.read().await;
        for session in admins.values() {
            dispatch(&session.handle, event.clone());
        }
    }

    pub async fn mirror_playback_to_admins(&self, device_id: Uuid, state: protocol::PlaybackState) {
        {
            let devices = self.devices.read().await;
            if let Some(session) = devices.get(&device_id) {
                *session.last_playback.lock().expect("poisoned") = Some(state.clone());
            }
        }
        self.broadcast_to_admins(Event::AdminPlaybackState { device_id, state })
            .await;
    }

    fn broadcast_repo(&self) -> BroadcastRepository {
        BroadcastRepository::new(self.db.clone())
    }

    /// Installs a broadcast override on `device_id` (component J): snapshots
    /// the device's last mirrored playback position into
    /// `device_broadcast_state`, then pushes a transient single-item
    /// `content:update` carrying the broadcast marker.
    pub async fn start_broadcast(
        &self,
        device_id: Uuid,
        broadcast_url: String,
        duration_secs: Option<i64>,
    ) -> AppResult<()> {
        let last = {
            let devices = self.devices.read().await;
            devices
                .get(&device_id)
                .map(|session| session.last_playback.lock().expect("poisoned").clone())
        };
        let Some(last) = last else {
            return Err(crate::errors::AppError::NotFound("device not connected".to_string()));
        };

        let (saved_playlist_id, saved_item_index, saved_elapsed_ms) = match &last {
            Some(state) => {
                let elapsed_ms = self.elapsed_ms_for_playback(state).await.unwrap_or(0);
                (Some(state.playlist_id), state.current_item_index as i32, elapsed_ms)
            }
            None => (None, 0, 0),
        };

        let now = Utc::now();
        let expires_at = duration_secs.map(|secs| now + chrono::Duration::seconds(secs));

        self.broadcast_repo()
            .start(
                device_id,
                saved_playlist_id,
                saved_item_index,
                saved_elapsed_ms,
                &broadcast_url,
                now,
                expires_at,
            )
            .await?;

        let item = protocol::PlaylistItem {
            id: Uuid::new_v4(),
            playlist_id: Uuid::nil(),
            content_id: None,
            url: broadcast_url,
            duration_seconds: duration_secs.map(|s| s.max(0) as u32).unwrap_or(0),
            order_index: 0,
            time_window_start: None,
            time_window_end: None,
            days_of_week: None,
        };
        let snapshot = protocol::PlaylistSnapshot {
            playlist_id: Uuid::nil(),
            items: vec![item],
            broadcast: true,
        };

        self.route_to_device(device_id, Event::ContentUpdate(snapshot))
            .await
            .map_err(|_| crate::errors::AppError::NotFound("device not connected".to_string()))?;

        self.audit_repo()
            .device_log(device_id, LogLevel::Info, "broadcast override started")
            .await?;

        Ok(())
    }

    /// Ends the active broadcast override on `device_id`, telling its engine
    /// to restore the playlist position it saved at `start_broadcast` time.
    pub async fn end_broadcast(&self, device_id: Uuid) -> AppResult<()> {
        let repo = self.broadcast_repo();
        if repo.find(device_id).await?.is_none() {
            return Ok(());
        }
        repo.end(device_id).await?;

        self.route_to_device(device_id, Event::BroadcastEnd {})
            .await
            .ok();

        self.audit_repo()
            .device_log(device_id, LogLevel::Info, "broadcast override ended")
            .await?;

        Ok(())
    }

    /// Best-effort elapsed time into the currently playing item, derived from
    /// its known duration and the last reported `timeRemainingMs`.
    async fn elapsed_ms_for_playback(&self, state: &protocol::PlaybackState) -> Option<i64> {
        let item_id = state.current_item_id?;
        let items = self.playlist_repo().items_for(state.playlist_id).await.ok()?;
        let item = items.into_iter().find(|i| i.id == item_id)?;
        if item.duration_seconds <= 0 {
            return Some(0);
        }
        Some((item.duration_seconds as i64 * 1000) - state.time_remaining_ms as i64)
    }

    /// Ends every broadcast override whose `expiresAt` has passed. Run on an
    /// interval alongside the other ambient background jobs.
    pub async fn expire_broadcasts(&self) -> AppResult<()> {
        let expired = self.broadcast_repo().expired(Utc::now()).await?;
        for device_id in expired {
            self.end_broadcast(device_id).await?;
        }
        Ok(())
    }

    pub async fn relay_screencast_frame(
        &self,
        device_id: Uuid,
        data: String,
        metadata: protocol::ScreencastMetadata,
    ) {
        let admins = self.admins.read().await;
        for session in admins.values() {
            let subscribed = session
                .screencast_subscriptions
                .lock()
                .expect("poisoned")
                .contains(&device_id);
            if subscribed {
                session.handle.send_stream(Event::AdminScreencastFrame {
                    device_id,
                    data: data.clone(),
                    metadata: metadata.clone(),
                });
            }
        }
    }

    /// First subscriber triggers `screencast:start` to the device; later
    /// subscribers just attach.
    pub async fn subscribe_screencast(&self, admin_id: Uuid, device_id: Uuid) -> Result<(), RouteError> {
        {
            let admins = self.admins.read().await;
            if let Some(admin) = admins.get(&admin_id) {
                admin
                    .screencast_subscriptions
                    .lock()
                    .expect("poisoned")
                    .insert(device_id);
            }
        }

        let devices = self.devices.read().await;
        let device = devices.get(&device_id).ok_or(RouteError::DeviceOffline)?;
        let was_zero = device.screencast_subscribers.fetch_add(1, Ordering::SeqCst) == 0;
        if was_zero {
            dispatch(&device.handle, Event::ScreencastStart {});
        }
        Ok(())
    }

    pub async fn unsubscribe_screencast(&self, admin_id: Uuid, device_id: Uuid) -> Result<(), RouteError> {
        {
            let admins = self.admins.read().await;
            if let Some(admin) = admins.get(&admin_id) {
                admin
                    .screencast_subscriptions
                    .lock()
                    .expect("poisoned")
                    .remove(&device_id);
            }
        }

        let devices = self.devices.read().await;
        if let Some(device) = devices.get(&device_id) {
            let prev = device.screencast_subscribers.fetch_sub(1, Ordering::SeqCst);
            if prev == 1 {
                dispatch(&device.handle, Event::ScreencastStop {});
            }
        }
        Ok(())
    }

    pub async fn is_device_online(&self, device_id: Uuid) -> bool {
        self.devices.read().await.contains_key(&device_id)
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Closes every live session bound to `license_id`. Used when a license
    /// is revoked: the affected devices are disconnected on next validation
    /// rather than waiting for their own idle timeout.
    pub async fn disconnect_devices_for_license(&self, license_id: Uuid, reason: CloseReason) {
        let devices = self.devices.read().await;
        for session in devices.values() {
            if session.license_id == license_id {
                session.handle.close(reason.clone());
            }
        }
    }
}

fn dispatch(handle: &SessionHandle, event: Event) {
    if event.is_control_priority() {
        if handle.send_control(event).is_err() {
            // Control queue full: the session is unhealthy per the
            // backpressure policy.
            handle.close(CloseReason::Transient);
        }
    } else {
        handle.send_stream(event);
    }
}

pub struct SessionSetup {
    pub control_rx: tokio::sync::mpsc::Receiver<Event>,
    pub shutdown_rx: tokio::sync::watch::Receiver<Option<CloseReason>>,
    pub stream: Arc<crate::ws::session::StreamQueue>,
}
