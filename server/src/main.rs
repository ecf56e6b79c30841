//! Signage control-plane server entry point: brings up the database pool,
//! Redis connection, Session Hub and License Service, then serves the
//! router until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, Method};
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod errors;
mod models;
mod repositories;
mod routes;
mod services;
mod state;
mod ws;

use config::Settings;
use repositories::AuditRepository;
use services::hub::Hub;
use services::license_service::LicenseService;
use state::AppState;

async fn build_state(settings: Settings) -> anyhow::Result<AppState> {
    let db = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await?;

    tracing::info!("database connected");

    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("migrations applied");

    let redis_client = redis::Client::open(settings.redis.url.as_str())?;
    let redis = redis::aio::ConnectionManager::new(redis_client).await?;
    tracing::info!("redis connected");

    let settings = Arc::new(settings);
    let license_service = Arc::new(LicenseService::new(db.clone(), settings.license.clone()));
    let hub = Arc::new(Hub::new(db.clone(), license_service.clone(), settings.clone()));

    Ok(AppState {
        db,
        redis,
        hub,
        license_service,
        settings,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting signage control-plane server");

    let settings = Settings::from_env()?;
    let app_port = settings.app.port;
    let app_host = settings.app.host.clone();
    let audit_settings = settings.audit.clone();

    let state = build_state(settings).await?;

    tokio::spawn(services::audit::run_retention_compactor(
        AuditRepository::new(state.db.clone()),
        audit_settings,
    ));
    tokio::spawn(services::audit::run_revocation_watcher(
        state.hub.clone(),
        state.license_service.clone(),
    ));
    tokio::spawn(services::audit::run_broadcast_expiry_watcher(state.hub.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app: Router = routes::router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors);

    let addr: SocketAddr = format!("{app_host}:{app_port}").parse()?;
    tracing::info!(%addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
