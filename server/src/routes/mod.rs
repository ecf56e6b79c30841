//! The deliberately thin HTTP surface: health, metrics, and the `/ws`
//! upgrade. Device/playlist/license CRUD is a REST collaborator layered on
//! top of this core and is out of scope here.

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::state::AppState;
use crate::ws;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics))
        .route("/ws", get(ws::upgrade))
}

async fn healthz(axum::extract::State(state): axum::extract::State<AppState>) -> impl IntoResponse {
    let db_ok = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.db)
        .await
        .is_ok();

    let status = if db_ok { "ok" } else { "degraded" };
    Json(json!({ "status": status }))
}

async fn prometheus_metrics(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Response {
    let devices = state.hub.device_count().await;

    let body = format!(
        "# HELP signage_connected_devices Number of currently connected device sessions.\n\
         # TYPE signage_connected_devices gauge\n\
         signage_connected_devices {devices}\n"
    );

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
