//! Route Definitions
//!
//! Maps URLs to handlers with type-safe routing.

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Build the API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Round lifecycle
        .route("/api/mines/start", post(start_round_handler))
        .route("/api/mines/reveal", post(reveal_handler))
        .route("/api/mines/cashout", post(cash_out_handler))
        // Read-only queries
        .route("/api/mines/active/:player_id", get(active_round_handler))
        .route("/api/mines/history/:player_id", get(history_handler))
        .route("/api/ledger/:player_id", get(ledger_handler))
        .with_state(state)
}
