//! WebSocket transport: connects to the hub, forwards inbound frames to the
//! rotation engine, and relays engine/health/screenshot output back out.
//! Reconnects with exponential backoff (`backoff_base_secs`,
//! `max_reconnect_attempts`).

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::MaybeTlsStream;

use protocol::Event;

use crate::config::ConnectionSettings;
use crate::engine::EngineCommand;
use crate::screencast::ScreencastController;

/// Why [`run`] returned; callers use this to decide whether to simply exit
/// (a device `restart` is cooperative: the process exits and a supervisor
/// restarts it) rather than loop forever inside this module.
pub enum ExitReason {
    Restart,
}

enum SessionEnd {
    Restart,
    Closed(&'static str),
}

pub async fn run(
    settings: ConnectionSettings,
    engine_commands: mpsc::Sender<EngineCommand>,
    mut outbound: mpsc::Receiver<Event>,
    screencast: ScreencastController,
    screenshot_request_tx: mpsc::Sender<()>,
) -> ExitReason {
    let mut attempt: u32 = 0;

    loop {
        let url = format!(
            "{}?role=device&token={}",
            settings.server_url, settings.device_token
        );

        match tokio_tungstenite::connect_async(&url).await {
            Ok((socket, _response)) => {
                tracing::info!(attempt, "connected to signage hub");
                attempt = 0;
                match run_session(
                    socket,
                    &engine_commands,
                    &mut outbound,
                    &screencast,
                    &screenshot_request_tx,
                )
                .await
                {
                    SessionEnd::Restart => return ExitReason::Restart,
                    SessionEnd::Closed(reason) => {
                        tracing::warn!(reason, "session ended, reconnecting");
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "connect failed");
            }
        }

        attempt += 1;
        if attempt > settings.max_reconnect_attempts {
            tracing::error!(attempt, "exceeded max reconnect attempts, retrying at max backoff");
        }
        let exponent = attempt.min(settings.max_reconnect_attempts).saturating_sub(1).min(5);
        let backoff = settings.reconnect_backoff_base_secs * 2u64.pow(exponent);
        tokio::time::sleep(Duration::from_secs(backoff.max(1))).await;
    }
}

async fn run_session(
    socket: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    engine_commands: &mpsc::Sender<EngineCommand>,
    outbound: &mut mpsc::Receiver<Event>,
    screencast: &ScreencastController,
    screenshot_request_tx: &mpsc::Sender<()>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<Event>(&text) {
                            Ok(Event::DeviceRestart {}) => {
                                let _ = sink.send(Message::Close(None)).await;
                                return SessionEnd::Restart;
                            }
                            Ok(Event::ScreencastStart {}) => screencast.start(),
                            Ok(Event::ScreencastStop {}) => screencast.stop(),
                            Ok(Event::ScreenshotRequest {}) => {
                                let _ = screenshot_request_tx.send(()).await;
                            }
                            Ok(Event::ContentUpdate(snapshot)) if snapshot.broadcast => {
                                if engine_commands
                                    .send(EngineCommand::StartBroadcast(snapshot))
                                    .await
                                    .is_err()
                                {
                                    return SessionEnd::Closed("engine channel closed");
                                }
                            }
                            Ok(Event::BroadcastEnd {}) => {
                                if engine_commands.send(EngineCommand::EndBroadcast).await.is_err() {
                                    return SessionEnd::Closed("engine channel closed");
                                }
                            }
                            Ok(event) => {
                                if engine_commands.send(EngineCommand::Inbound(event)).await.is_err() {
                                    return SessionEnd::Closed("engine channel closed");
                                }
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "malformed frame from hub");
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return SessionEnd::Closed("closed by server"),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket read error");
                        return SessionEnd::Closed("read error");
                    }
                }
            }
            event = outbound.recv() => {
                match event {
                    Some(event) => {
                        let Ok(json) = serde_json::to_string(&event) else { continue };
                        if sink.send(Message::Text(json)).await.is_err() {
                            return SessionEnd::Closed("write error");
                        }
                    }
                    None => return SessionEnd::Closed("outbound channel closed"),
                }
            }
        }
    }
}
