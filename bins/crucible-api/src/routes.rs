use crate::handlers;
use crate::AppState;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/submit", post(handlers::submit))
        .route("/status/:id", get(handlers::status))
        .route("/results/:id", get(handlers::results))
        .route("/cancel/:id", delete(handlers::cancel))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
}
