//! Health and screenshot sampling, each on its own cadence per the
//! component's health-check timer idiom, generalized from peer liveness to
//! device vitals.

use std::sync::Arc;

use sysinfo::System;
use tokio::sync::{mpsc, watch};
use tokio::time::Duration;

use protocol::{Event, HealthReportPayload};

use crate::browser::BrowserController;
use crate::config::{HealthSettings, ScreenshotSettings};

/// Samples cpu/memory/disk at `interval_secs` after an initial delay and
/// reports them as `health:report` frames. Runs until `out_tx` is dropped.
pub async fn run_health_sampler(settings: HealthSettings, out_tx: mpsc::Sender<Event>) {
    tokio::time::sleep(Duration::from_secs(settings.initial_delay_secs)).await;

    let mut system = System::new_all();
    let mut interval = tokio::time::interval(Duration::from_secs(settings.interval_secs));

    loop {
        interval.tick().await;
        system.refresh_cpu_usage();
        system.refresh_memory();

        let cpu = if system.cpus().is_empty() {
            0.0
        } else {
            system.cpus().iter().map(|c| c.cpu_usage()).sum::<f32>() / system.cpus().len() as f32
        };
        let memory = if system.total_memory() > 0 {
            system.used_memory() as f32 / system.total_memory() as f32 * 100.0
        } else {
            0.0
        };

        let payload = HealthReportPayload {
            cpu,
            memory,
            // A coarse placeholder: disk pressure is a soft signal here and
            // a full per-volume breakdown is not part of this wire shape.
            disk: 0.0,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };

        if out_tx.send(Event::HealthReport(payload)).await.is_err() {
            break;
        }
    }
}

/// Captures a screenshot on its own cadence, once ~3s after every playlist
/// item change settles, and immediately on an admin's `screenshot:request`.
/// Skipped whenever the page is blank or the browser is closed.
pub async fn run_screenshot_collector<B: BrowserController + ?Sized>(
    settings: ScreenshotSettings,
    browser: Arc<B>,
    out_tx: mpsc::Sender<Event>,
    mut item_changed: watch::Receiver<u64>,
    mut on_demand: mpsc::Receiver<()>,
) {
    tokio::time::sleep(Duration::from_secs(settings.initial_delay_secs)).await;

    let mut interval = tokio::time::interval(Duration::from_secs(settings.interval_secs));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                capture_and_send(&browser, &out_tx).await;
            }
            changed = item_changed.changed() => {
                if changed.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_secs(settings.post_navigation_delay_secs)).await;
                capture_and_send(&browser, &out_tx).await;
            }
            requested = on_demand.recv() => {
                if requested.is_none() {
                    break;
                }
                capture_and_send(&browser, &out_tx).await;
            }
        }
    }
}

async fn capture_and_send<B: BrowserController + ?Sized>(browser: &Arc<B>, out_tx: &mpsc::Sender<Event>) {
    if browser.is_blank_or_closed().await {
        return;
    }
    match browser.screenshot().await {
        Ok(Some(image_bytes)) => {
            use base64::Engine;
            let image = base64::engine::general_purpose::STANDARD.encode(image_bytes);
            let current_url = browser.current_url().await;
            let _ = out_tx
                .send(Event::ScreenshotUpload { image, current_url })
                .await;
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "screenshot capture failed"),
    }
}
