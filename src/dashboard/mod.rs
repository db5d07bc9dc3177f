//! Dashboard Module
//!
//! Provides an HTTP API for monitoring the price feed.
//! Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;

pub use api::create_router;
pub use types::*;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::oracle::PriceFeed;

/// Serve the dashboard API until the task is cancelled
pub async fn serve(feed: Arc<PriceFeed>, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind dashboard on {}", bind))?;
    info!(bind = %bind, "Dashboard API listening");
    axum::serve(listener, create_router(feed))
        .await
        .context("Dashboard server failed")
}
