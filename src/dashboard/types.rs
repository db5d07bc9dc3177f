//! Dashboard response types

use serde::Serialize;

use crate::oracle::NormalizedPrice;
use crate::types::TrustState;

/// Price returned by a feed request
#[derive(Debug, Clone, Serialize)]
pub struct PriceResponse {
    /// Raw 18-digit integer
    pub price: NormalizedPrice,
    /// Human-readable price
    pub display: String,
    pub state: TrustState,
    pub timestamp: i64,
}

/// Feed state without polling the sources
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub state: TrustState,
    pub state_id: u8,
    pub nominal: bool,
    pub last_good_price: NormalizedPrice,
    pub display: String,
    pub pair: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub updated_at: i64,
}

// ─────────────────────────────────────────────────────────────────
// Response Types
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}
