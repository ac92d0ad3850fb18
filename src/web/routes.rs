use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - JSON only, no UI is served
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Natural-language questions
            .route("/ai/chat", post(handlers::api::chat))

            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
