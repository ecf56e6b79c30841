//! Admin connection loop. An admin session observes device status/playback
//! mirrors and screencast frames, and issues device-addressed commands.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::time;

use protocol::{AdminCommand, CloseReason, Event};

use crate::state::AppState;
use crate::ws::session::RouteError;

pub async fn run(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (admin_id, setup) = state.hub.register_admin().await;
    let crate::services::hub::SessionSetup {
        mut control_rx,
        mut shutdown_rx,
        stream: stream_queue,
    } = setup;

    let write_timeout = Duration::from_secs(state.settings.session.write_timeout_secs);
    let idle_timeout = Duration::from_secs(state.settings.idle_timeout_secs());

    let close_reason = loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<AdminCommand>(&text) {
                            Ok(command) => dispatch_command(&state, admin_id, command).await,
                            Err(e) => {
                                tracing::warn!(error = %e, admin_id = %admin_id, "malformed admin command");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break CloseReason::Idle,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, admin_id = %admin_id, "websocket read error");
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

    state.hub.deregister_admin(admin_id).await;
}

async fn dispatch_command(state: &AppState, admin_id: uuid::Uuid, command: AdminCommand) {
    let device_id = command.device_id;

    match command.event {
        Event::ScreencastSubscribe {} => {
            if let Err(RouteError::DeviceOffline) =
                state.hub.subscribe_screencast(admin_id, device_id).await
            {
                tracing::debug!(admin_id = %admin_id, device_id = %device_id, "subscribe addressed to offline device");
            }
        }
        Event::ScreencastUnsubscribe {} => {
            if let Err(RouteError::DeviceOffline) =
                state.hub.unsubscribe_screencast(admin_id, device_id).await
            {
                tracing::debug!(admin_id = %admin_id, device_id = %device_id, "unsubscribe addressed to offline device");
            }
        }
        Event::BroadcastStart { url, duration_secs } => {
            if let Err(e) = state.hub.start_broadcast(device_id, url, duration_secs).await {
                tracing::warn!(admin_id = %admin_id, device_id = %device_id, error = %e, "broadcast start failed");
            }
        }
        Event::BroadcastEnd {} => {
            if let Err(e) = state.hub.end_broadcast(device_id).await {
                tracing::warn!(admin_id = %admin_id, device_id = %device_id, error = %e, "broadcast end failed");
            }
        }
        event => {
            if let Err(RouteError::DeviceOffline) = state.hub.route_to_device(device_id, event).await {
                tracing::debug!(admin_id = %admin_id, device_id = %device_id, "command addressed to offline device");
            }
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
