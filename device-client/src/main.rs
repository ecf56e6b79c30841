//! Headless signage device client: connects to the hub over `/ws?role=
//! device`, runs the playlist rotation engine, and samples health and
//! screenshots on their own cadences.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod browser;
mod config;
mod engine;
mod errors;
mod health;
mod screencast;
mod ws_client;

use browser::NullBrowser;
use config::Settings;
use engine::Engine;
use screencast::ScreencastController;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let file_appender = tracing_appender::rolling::daily("./logs", "device-client.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage_device_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    tracing::info!("starting signage device client");

    let settings = Settings::from_env()?;

    let browser = Arc::new(NullBrowser::new());
    let (outbound_tx, outbound_rx) = mpsc::channel(64);

    let (engine_handle, engine_task) = Engine::spawn(
        browser.clone(),
        settings.connection.content_base_url.clone(),
        outbound_tx.clone(),
    );

    let health_task = tokio::spawn(health::run_health_sampler(
        settings.health.clone(),
        outbound_tx.clone(),
    ));

    let (screenshot_request_tx, screenshot_request_rx) = mpsc::channel(4);

    let screenshot_task = tokio::spawn(health::run_screenshot_collector(
        settings.screenshot.clone(),
        browser.clone(),
        outbound_tx.clone(),
        engine_handle.item_changed.clone(),
        screenshot_request_rx,
    ));

    let (screencast, screencast_task) = ScreencastController::spawn(browser.clone(), outbound_tx.clone());

    let exit_reason = ws_client::run(
        settings.connection.clone(),
        engine_handle.commands.clone(),
        outbound_rx,
        screencast,
        screenshot_request_tx,
    )
    .await;

    match exit_reason {
        ws_client::ExitReason::Restart => {
            tracing::info!("restart requested by hub, exiting for supervisor restart");
        }
    }

    engine_task.abort();
    health_task.abort();
    screenshot_task.abort();
    screencast_task.abort();

    Ok(())
}
