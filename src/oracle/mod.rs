//! Oracle module - Redundant two-source price feed
//!
//! Polls a round-based primary aggregator and a reference-data secondary
//! provider, classifies each reading, and runs the failover state machine
//! that decides which price to trust on every request.

mod deviation;
mod feed;
mod machine;
mod scaler;
pub mod sources;
mod validator;

pub use deviation::{both_live_and_similar, round_over_round_excessive, sources_similar};
pub use feed::{Clock, FeedError, FeedSettings, PriceFeed, SystemClock};
pub use machine::{Assessment, Evaluation, PriceChoice, Transition};
pub use scaler::{scale, scale_to};
pub use validator::{classify, classify_primary_pair, classify_secondary, Fault, QuoteStatus};

use ethers::types::{I256, U256};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;

use crate::config::OracleConfig;
use crate::types::SourceKind;

/// Number of fractional digits every price is normalized to
pub const CANONICAL_PRECISION: u8 = 18;

/// Primary is frozen once its latest round is older than this (seconds)
pub const PRIMARY_TIMEOUT_SECS: u64 = 14_400;

/// Secondary is frozen once older than this (seconds)
pub const SECONDARY_FROZEN_SECS: u64 = 14_400;

/// Secondary is broken once older than this (seconds)
pub const SECONDARY_BROKEN_SECS: u64 = 28_800;

/// 50% in 18-digit fixed point
pub const MAX_ROUND_DEVIATION: u128 = 500_000_000_000_000_000;

/// 5% in 18-digit fixed point
pub const MAX_SOURCE_DIFFERENCE: u128 = 50_000_000_000_000_000;

/// A price expressed with [`CANONICAL_PRECISION`] fractional digits
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NormalizedPrice(U256);

impl NormalizedPrice {
    pub const ZERO: NormalizedPrice = NormalizedPrice(U256([0; 4]));

    pub fn new(raw: U256) -> Self {
        Self(raw)
    }

    /// Whole units, e.g. `from_units(3000)` is 3000.0
    pub fn from_units(units: u64) -> Self {
        Self(U256::from(units).saturating_mul(one()))
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Human-readable value, if it fits a `Decimal`
    pub fn to_decimal(&self) -> Option<Decimal> {
        let raw = u128::try_from(self.0).ok()?;
        let signed = i128::try_from(raw).ok()?;
        Decimal::try_from_i128_with_scale(signed, CANONICAL_PRECISION as u32)
            .ok()
            .map(|d| d.normalize())
    }
}

impl From<U256> for NormalizedPrice {
    fn from(raw: U256) -> Self {
        Self(raw)
    }
}

impl fmt::Display for NormalizedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Some(d) => write!(f, "{}", d),
            None => write!(f, "{}e-{}", self.0, CANONICAL_PRECISION),
        }
    }
}

impl Serialize for NormalizedPrice {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

/// 1.0 in canonical fixed point
pub(crate) fn one() -> U256 {
    U256::exp10(CANONICAL_PRECISION as usize)
}

/// A single reading from one source.
///
/// Quotes are built once per request by the adapter boundary and never
/// mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    source: SourceKind,
    value: I256,
    precision: u8,
    round_id: Option<u128>,
    observed_at: u64,
    retrieved: bool,
}

impl Quote {
    /// A successfully retrieved primary round
    pub fn primary(precision: u8, round_id: u128, value: I256, observed_at: u64) -> Self {
        Self {
            source: SourceKind::Primary,
            value,
            precision,
            round_id: Some(round_id),
            observed_at,
            retrieved: true,
        }
    }

    /// A successfully retrieved secondary rate, already in canonical precision
    pub fn secondary(rate: U256, observed_at: u64) -> Self {
        Self {
            source: SourceKind::Secondary,
            value: I256::try_from(rate).unwrap_or(I256::MAX),
            precision: CANONICAL_PRECISION,
            round_id: None,
            observed_at,
            retrieved: true,
        }
    }

    /// A failed read: zeroed fields, `retrieved = false`
    pub fn unavailable(source: SourceKind) -> Self {
        Self {
            source,
            value: I256::zero(),
            precision: 0,
            round_id: match source {
                SourceKind::Primary => Some(0),
                SourceKind::Secondary => None,
            },
            observed_at: 0,
            retrieved: false,
        }
    }

    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn value(&self) -> I256 {
        self.value
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn round_id(&self) -> Option<u128> {
        self.round_id
    }

    pub fn observed_at(&self) -> u64 {
        self.observed_at
    }

    pub fn retrieved(&self) -> bool {
        self.retrieved
    }

    /// The quote's magnitude in canonical precision; zero when non-positive
    pub fn normalized(&self) -> NormalizedPrice {
        if !self.value.is_positive() {
            return NormalizedPrice::ZERO;
        }
        scale(self.value.into_raw(), self.precision)
    }
}

/// Thresholds the validator and deviation analyzer work with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedParams {
    /// Max age of the primary's latest round before it counts as frozen
    pub primary_timeout: u64,
    /// Max round-over-round move of the primary, 18-digit fraction
    pub max_round_deviation: U256,
    /// Max difference between sources to call them similar, 18-digit fraction
    pub max_source_difference: U256,
    pub secondary_frozen_after: u64,
    pub secondary_broken_after: u64,
}

impl Default for FeedParams {
    fn default() -> Self {
        Self {
            primary_timeout: PRIMARY_TIMEOUT_SECS,
            max_round_deviation: U256::from(MAX_ROUND_DEVIATION),
            max_source_difference: U256::from(MAX_SOURCE_DIFFERENCE),
            secondary_frozen_after: SECONDARY_FROZEN_SECS,
            secondary_broken_after: SECONDARY_BROKEN_SECS,
        }
    }
}

impl FeedParams {
    /// Build thresholds from configuration, rejecting inconsistent values
    pub fn from_config(cfg: &OracleConfig) -> Result<Self, FeedError> {
        if cfg.primary_timeout_secs == 0 {
            return Err(FeedError::InvalidParams(
                "primary_timeout_secs must be non-zero".to_string(),
            ));
        }
        if cfg.secondary_frozen_secs == 0 || cfg.secondary_frozen_secs >= cfg.secondary_broken_secs
        {
            return Err(FeedError::InvalidParams(format!(
                "secondary_frozen_secs ({}) must be non-zero and below secondary_broken_secs ({})",
                cfg.secondary_frozen_secs, cfg.secondary_broken_secs
            )));
        }

        Ok(Self {
            primary_timeout: cfg.primary_timeout_secs,
            max_round_deviation: fraction_to_fixed("max_round_deviation", cfg.max_round_deviation)?,
            max_source_difference: fraction_to_fixed(
                "max_source_difference",
                cfg.max_source_difference,
            )?,
            secondary_frozen_after: cfg.secondary_frozen_secs,
            secondary_broken_after: cfg.secondary_broken_secs,
        })
    }
}

/// Convert a fraction in (0, 1] to 18-digit fixed point
fn fraction_to_fixed(name: &str, fraction: Decimal) -> Result<U256, FeedError> {
    if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
        return Err(FeedError::InvalidParams(format!(
            "{} must be in (0, 1], got {}",
            name, fraction
        )));
    }
    let scaled = (fraction * Decimal::from(10u64.pow(CANONICAL_PRECISION as u32))).trunc();
    scaled
        .to_u128()
        .map(U256::from)
        .ok_or_else(|| FeedError::InvalidParams(format!("{} is out of range", name)))
}
