//! Device-side half of the Screencast Relay: while active, streams periodic
//! screenshots to the hub as `screencast:frame` events. Toggled by
//! `screencast:start`/`screencast:stop`, which the WebSocket client
//! intercepts before they would otherwise reach the rotation engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Duration;
use uuid::Uuid;

use protocol::{Event, ScreencastMetadata};

use crate::browser::BrowserController;

const FRAME_INTERVAL_MS: u64 = 500;

pub struct ScreencastController {
    active: Arc<AtomicBool>,
}

impl ScreencastController {
    pub fn spawn<B: BrowserController + ?Sized + 'static>(
        browser: Arc<B>,
        out_tx: mpsc::Sender<Event>,
    ) -> (Self, tokio::task::JoinHandle<()>) {
        let active = Arc::new(AtomicBool::new(false));
        let task_active = active.clone();

        let join = tokio::spawn(async move {
            let session_id = Uuid::new_v4();
            let mut interval = tokio::time::interval(Duration::from_millis(FRAME_INTERVAL_MS));
            loop {
                interval.tick().await;
                if !task_active.load(Ordering::Relaxed) {
                    continue;
                }
                if browser.is_blank_or_closed().await {
                    continue;
                }
                match browser.screenshot().await {
                    Ok(Some(bytes)) => {
                        use base64::Engine;
                        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
                        let metadata = ScreencastMetadata {
                            session_id,
                            timestamp_ms: chrono::Utc::now().timestamp_millis(),
                            width: 0,
                            height: 0,
                        };
                        if out_tx
                            .send(Event::ScreencastFrame { data, metadata })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(error = %e, "screencast capture failed"),
                }
            }
        });

        (Self { active }, join)
    }

    pub fn start(&self) {
        self.active.store(true, Ordering::Relaxed);
    }

    pub fn stop(&self) {
        self.active.store(false, Ordering::Relaxed);
    }
}
