//! Dashboard HTTP API
//!
//! Read-only REST view of the price feed.

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use super::types::*;
use crate::oracle::PriceFeed;

/// Create the API router with all endpoints
pub fn create_router(feed: Arc<PriceFeed>) -> Router {
    Router::new()
        .route("/api/price", get(get_price))
        .route("/api/status", get(get_status))
        .route("/api/health", get(get_health))
        .with_state(feed)
        // CORS for frontend
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

// ─────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────

/// GET /api/price - Run a feed request and return its price
async fn get_price(State(feed): State<Arc<PriceFeed>>) -> impl IntoResponse {
    let price = feed.fetch_price().await;
    let state = feed.status().await;
    Json(ApiResponse::success(PriceResponse {
        price,
        display: price.to_string(),
        state,
        timestamp: chrono::Utc::now().timestamp(),
    }))
}

/// GET /api/status - Current state and last good price
async fn get_status(State(feed): State<Arc<PriceFeed>>) -> impl IntoResponse {
    let state = feed.status().await;
    let last_good_price = feed.last_good_price().await;
    let settings = feed.settings();
    Json(ApiResponse::success(StatusResponse {
        state,
        state_id: state.id(),
        nominal: state.is_nominal(),
        last_good_price,
        display: last_good_price.to_string(),
        pair: format!("{}/{}", settings.base_symbol, settings.quote_symbol),
    }))
}

/// GET /api/health - Liveness
async fn get_health() -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        ok: true,
        updated_at: chrono::Utc::now().timestamp(),
    }))
}
