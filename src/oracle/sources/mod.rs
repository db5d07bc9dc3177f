//! Price source adapters (Chainlink primary, Band secondary)
//!
//! Adapters talk to the outside world and may fail in any way. Their
//! results cross into the core only through [`primary_quote`] and
//! [`secondary_quote`], which turn every failure into an unavailable
//! [`Quote`]. No error travels past this boundary.

mod band;
mod chainlink;

pub use band::BandReferenceClient;
pub use chainlink::ChainlinkAggregatorClient;

use async_trait::async_trait;
use ethers::types::{I256, U256};
use std::future::Future;
use std::time::Duration;

use crate::oracle::Quote;
use crate::types::SourceKind;

/// One round as reported by the primary aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundData {
    pub precision: u8,
    pub round_id: u128,
    pub answer: I256,
    pub updated_at: u64,
}

/// Reference rate as reported by the secondary, 18 fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceData {
    pub rate: U256,
    pub last_updated_at: u64,
}

/// Failure of a single adapter call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceFailure {
    #[error("call failed: {0}")]
    Call(String),
    #[error("call timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },
}

/// Trait for the round-based primary source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrimarySource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Latest round
    async fn current_reading(&self) -> Result<RoundData, SourceFailure>;

    /// A specific earlier round
    async fn reading_at(&self, round_id: u128) -> Result<RoundData, SourceFailure>;
}

/// Trait for the reference-data secondary source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecondarySource: Send + Sync {
    /// Get the source name
    fn name(&self) -> &'static str;

    /// Rate of `base` quoted in `quote`
    async fn reference_data(&self, base: &str, quote: &str)
        -> Result<ReferenceData, SourceFailure>;
}

/// Collapse a primary adapter result into a quote
pub fn primary_quote(source: &str, result: Result<RoundData, SourceFailure>) -> Quote {
    match result {
        Ok(round) => Quote::primary(round.precision, round.round_id, round.answer, round.updated_at),
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "Primary read failed");
            Quote::unavailable(SourceKind::Primary)
        }
    }
}

/// Collapse a secondary adapter result into a quote
pub fn secondary_quote(source: &str, result: Result<ReferenceData, SourceFailure>) -> Quote {
    match result {
        Ok(data) => Quote::secondary(data.rate, data.last_updated_at),
        Err(e) => {
            tracing::warn!(source = %source, error = %e, "Secondary read failed");
            Quote::unavailable(SourceKind::Secondary)
        }
    }
}

/// Read the primary's current round and the one before it.
///
/// The previous round is only requested when the current round was
/// retrieved with a usable round id.
pub async fn read_primary(source: &dyn PrimarySource) -> (Quote, Quote) {
    let current = primary_quote(source.name(), source.current_reading().await);

    let previous = match current.round_id() {
        Some(id) if current.retrieved() && id > 0 => {
            primary_quote(source.name(), source.reading_at(id - 1).await)
        }
        _ => Quote::unavailable(SourceKind::Primary),
    };

    (current, previous)
}

/// Read the secondary's rate for a symbol pair
pub async fn read_secondary(source: &dyn SecondarySource, base: &str, quote: &str) -> Quote {
    secondary_quote(source.name(), source.reference_data(base, quote).await)
}

/// Bound an adapter call by a timeout
pub(crate) async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, SourceFailure>
where
    F: Future<Output = Result<T, SourceFailure>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| SourceFailure::Timeout {
            after_ms: limit.as_millis() as u64,
        })?
}

/// On-chain timestamps are 256-bit; anything past `u64::MAX` reads as far future
pub(crate) fn clamp_timestamp(raw: U256) -> u64 {
    u64::try_from(raw).unwrap_or(u64::MAX)
}
