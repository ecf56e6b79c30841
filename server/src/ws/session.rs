//! Session handles held by the Hub: everything needed to route an event to
//! a connection without the Hub ever touching the socket itself.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

pub use super::queue::StreamQueue;
use protocol::CloseReason;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RouteError {
    #[error("device offline")]
    DeviceOffline,
}

/// Shared shape of a registered connection's outbound plumbing.
pub struct SessionHandle {
    pub control_tx: mpsc::Sender<protocol::Event>,
    pub stream: Arc<StreamQueue>,
    pub shutdown: watch::Sender<Option<CloseReason>>,
    pub connected_at: DateTime<Utc>,
}

impl SessionHandle {
    /// Enqueues a control-priority event; never drops, but signals the
    /// caller when the control queue itself is saturated (an unhealthy
    /// session, per the backpressure policy).
    pub fn send_control(&self, event: protocol::Event) -> Result<(), mpsc::error::TrySendError<protocol::Event>> {
        self.control_tx.try_send(event)
    }

    pub fn send_stream(&self, event: protocol::Event) {
        self.stream.push(event);
    }

    pub fn close(&self, reason: CloseReason) {
        let _ = self.shutdown.send(Some(reason));
    }
}

pub struct DeviceSession {
    pub id: Uuid,
    pub stable_device_id: String,
    pub license_id: Uuid,
    pub handle: SessionHandle,
    pub screencast_subscribers: std::sync::atomic::AtomicUsize,
    /// Last `playback:state:update` mirrored from this device, used to seed
    /// a broadcast override's saved position.
    pub last_playback: std::sync::Mutex<Option<protocol::PlaybackState>>,
}

pub struct AdminSession {
    pub id: Uuid,
    pub handle: SessionHandle,
    /// Device ids this admin currently has a screencast subscription open
    /// against, so the Hub can clean up on disconnect.
    pub screencast_subscriptions: std::sync::Mutex<std::collections::HashSet<Uuid>>,
}

pub fn new_session_handle(
    control_capacity: usize,
    stream_capacity: usize,
) -> (
    SessionHandle,
    mpsc::Receiver<protocol::Event>,
    watch::Receiver<Option<CloseReason>>,
) {
    let (control_tx, control_rx) = mpsc::channel(control_capacity);
    let (shutdown, shutdown_rx) = watch::channel(None);
    let handle = SessionHandle {
        control_tx,
        stream: Arc::new(StreamQueue::new(stream_capacity)),
        shutdown,
        connected_at: Utc::now(),
    };
    (handle, control_rx, shutdown_rx)
}
