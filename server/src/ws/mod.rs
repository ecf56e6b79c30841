//! WebSocket upgrade entry point: parses the `role`/`token` query pair and
//! dispatches to the device or admin connection loop.

mod admin;
mod device;
mod queue;
pub mod session;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use protocol::Role;

use crate::state::AppState;

pub use session::{AdminSession, DeviceSession};

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub role: String,
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
) -> Response {
    let role: Result<Role, String> = query.role.parse();

    match role {
        Ok(Role::Device) => {
            let Some(token) = query.token else {
                return axum::http::StatusCode::BAD_REQUEST.into_response();
            };
            ws.on_upgrade(move |socket| device::run(socket, state, token))
        }
        Ok(Role::Admin) => ws.on_upgrade(move |socket| admin::run(socket, state)),
        Err(_) => axum::http::StatusCode::BAD_REQUEST.into_response(),
    }
}
