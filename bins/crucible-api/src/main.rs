mod handlers;
mod metrics;
mod routes;

use axum::Router;
use crucible_common::config::EngineConfig;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub struct AppState {
    pub redis: ConnectionManager,
    pub cfg: EngineConfig,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Crucible API booting");

    let cfg = EngineConfig::from_env();
    let client = redis::Client::open(cfg.redis_url.as_str()).expect("failed to create Redis client");
    let redis_conn = ConnectionManager::new(client)
        .await
        .expect("failed to connect to Redis");
    info!(redis = %cfg.redis_url, "connected to Redis");

    let state = Arc::new(AppState {
        redis: redis_conn,
        cfg,
    });

    let app = Router::new().merge(routes::routes()).with_state(state);

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await.expect("failed to bind address");
    info!(addr = %addr, "HTTP server listening");
    info!("ready to accept submissions");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .expect("server error");

    info!("API shutdown complete");
}
