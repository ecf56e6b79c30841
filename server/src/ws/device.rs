//! Per-device connection loop: one read task interleaved with the control
//! and stream queues via `select!`, built on axum's `ws` extractor.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::time;

use protocol::{CloseReason, Event, LicenseGraceNotice};

use crate::models::{Admission, LogLevel};
use crate::repositories::{DeviceRepository, ScreenshotRepository};
use crate::state::AppState;

pub async fn run(socket: WebSocket, state: AppState, token: String) {
    let (mut sink, mut stream) = socket.split();

    let device_repo = DeviceRepository::new(state.db.clone());
    let device = match device_repo.find_by_token(&token).await {
        Ok(Some(device)) => device,
        Ok(None) => {
            close_unregistered(&mut sink, CloseReason::AuthFailed).await;
            return;
        }
        Err(e) => {
            tracing::error!(error = %e, "device lookup failed");
            close_unregistered(&mut sink, CloseReason::Fatal {
                detail: "device lookup failed".to_string(),
            })
            .await;
            return;
        }
    };

    let (license, admission) = match state.license_service.validate().await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "license validation failed");
            close_unregistered(&mut sink, CloseReason::Fatal {
                detail: "license validation failed".to_string(),
            })
            .await;
            return;
        }
    };

    let grace_notice = match admission {
        Admission::Deny { reason } => {
            close_unregistered(&mut sink, CloseReason::LicenseDenied { reason }).await;
            return;
        }
        Admission::Admit => None,
        Admission::AdmitGrace { grace_period_ends_at } => {
            Some(LicenseGraceNotice { grace_period_ends_at })
        }
    };

    let already_online = state.hub.is_device_online(device.id).await;
    if !already_online {
        if let Err(e) = state.license_service.register_device(license.id).await {
            tracing::error!(error = %e, "failed to register device against license");
            close_unregistered(&mut sink, CloseReason::Fatal {
                detail: "license registration failed".to_string(),
            })
            .await;
            return;
        }
    }

    let device_id = device.id;
    let (session_id, setup) = match state.hub.register_device(&device, license.id).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(error = %e, "failed to register device session");
            return;
        }
    };
    let crate::services::hub::SessionSetup {
        mut control_rx,
        mut shutdown_rx,
        stream: stream_queue,
    } = setup;

    if let Some(notice) = grace_notice {
        let _ = state
            .hub
            .route_to_device(device_id, Event::LicenseGrace(notice.clone()))
            .await;
        state
            .hub
            .broadcast_to_admins(Event::AdminLicenseGrace {
                device_id,
                notice,
            })
            .await;
    }

    let write_timeout = Duration::from_secs(state.settings.session.write_timeout_secs);
    let idle_timeout = Duration::from_secs(state.settings.idle_timeout_secs());
    let screenshot_repo = ScreenshotRepository::new(state.db.clone());

    let close_reason = loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Event>(&text) {
                            Ok(event) => {
                                handle_inbound(&state, &screenshot_repo, device_id, &device.stable_device_id, event).await;
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, device_id = %device_id, "malformed inbound frame");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Idle,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, device_id = %device_id, "websocket read error");
                        break CloseReason::Transient;
                    }
                }
            }
            control = control_rx.recv() => {
                match control {
                    Some(event) => {
                        if !send_with_timeout(&mut sink, &event, write_timeout).await {
                            break CloseReason::Transient;
                        }
                    }
                    None => break CloseReason::Fatal { detail: "control channel closed".to_string() },
                }
            }
            event = stream_queue.recv() => {
                if !send_with_timeout(&mut sink, &event, write_timeout).await {
                    break CloseReason::Transient;
                }
            }
            _ = shutdown_rx.changed() => {
                if let Some(reason) = shutdown_rx.borrow().clone() {
                    break reason;
                }
            }
            _ = time::sleep(idle_timeout) => {
                break CloseReason::Idle;
            }
        }
    };

    let reason_json = serde_json::to_string(&close_reason).unwrap_or_default();
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: 1000,
            reason: reason_json.into(),
        })))
        .await;

    if !matches!(close_reason, CloseReason::Superseded) {
        if let Err(e) = state.hub.deregister_device(session_id).await {
            tracing::error!(error = %e, device_id = %device_id, "failed to deregister device");
        }
    }
}

async fn handle_inbound(
    state: &AppState,
    screenshot_repo: &ScreenshotRepository,
    device_id: uuid::Uuid,
    stable_device_id: &str,
    event: Event,
) {
    match event {
        Event::DeviceRegister { .. } => {
            // Already authenticated via the connect-time token; this is a
            // confirmation frame and carries no further action.
        }
        Event::HealthReport(_) => {
            // Health doubles as heartbeat; no persistence, the idle timer
            // resets simply by this frame having arrived.
        }
        Event::PlaybackStateUpdate(playback_state) => {
            state.hub.mirror_playback_to_admins(device_id, playback_state).await;
        }
        Event::ScreenshotUpload { image, current_url } => {
            if let Err(e) = screenshot_repo
                .insert(stable_device_id, current_url.as_deref(), &image)
                .await
            {
                tracing::error!(error = %e, device_id = %device_id, "failed to persist screenshot");
            }
        }
        Event::ScreencastFrame { data, metadata } => {
            state.hub.relay_screencast_frame(device_id, data, metadata).await;
        }
        Event::ErrorReport { message, context } => {
            tracing::warn!(device_id = %device_id, message = %message, ?context, "device error report");
            let repo = crate::repositories::AuditRepository::new(state.db.clone());
            let _ = repo.device_log(device_id, LogLevel::Warning, message).await;
        }
        other => {
            tracing::warn!(device_id = %device_id, event = other.kind(), "unexpected event on device channel");
        }
    }
}

async fn send_with_timeout(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    event: &Event,
    timeout: Duration,
) -> bool {
    let Ok(json) = serde_json::to_string(event) else {
        return true;
    };
    matches!(
        time::timeout(timeout, sink.send(Message::Text(json))).await,
        Ok(Ok(()))
    )
}

async fn close_unregistered(
    sink: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    reason: CloseReason,
) {
    let reason_json = serde_json::to_string(&reason).unwrap_or_default();
    let _ = sink
        .send(Message::Close(Some(CloseFrame {
            code: 4001,
            reason: reason_json.into(),
        })))
        .await;
}
