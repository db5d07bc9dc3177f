//! Quote Validator - Classifies single readings as broken, frozen or live
//!
//! A quote is `Broken` when it cannot be used at all, `Frozen` when it is
//! well-formed but older than its source's freshness window, and `Live`
//! otherwise. Nothing here fails: every anomaly becomes a classification.

use std::fmt;

use super::{FeedParams, Quote};

/// Why a quote was classified as broken
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// The call to the source failed outright
    Unavailable,
    /// Round identifier is the zero sentinel
    ZeroRound,
    ZeroTimestamp,
    /// Timestamp is after the request time
    FutureTimestamp,
    /// Magnitude is zero or negative
    NonPositive,
    /// Older than the source's broken threshold
    Expired,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Unavailable => write!(f, "UNAVAILABLE"),
            Fault::ZeroRound => write!(f, "ZERO_ROUND"),
            Fault::ZeroTimestamp => write!(f, "ZERO_TIMESTAMP"),
            Fault::FutureTimestamp => write!(f, "FUTURE_TIMESTAMP"),
            Fault::NonPositive => write!(f, "NON_POSITIVE"),
            Fault::Expired => write!(f, "EXPIRED"),
        }
    }
}

/// Classification of a quote (or of the primary's pair of rounds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteStatus {
    Broken(Fault),
    Frozen,
    Live,
}

impl QuoteStatus {
    pub fn is_broken(&self) -> bool {
        matches!(self, QuoteStatus::Broken(_))
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, QuoteStatus::Frozen)
    }

    pub fn is_live(&self) -> bool {
        matches!(self, QuoteStatus::Live)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuoteStatus::Broken(fault) => write!(f, "BROKEN({})", fault),
            QuoteStatus::Frozen => write!(f, "FROZEN"),
            QuoteStatus::Live => write!(f, "LIVE"),
        }
    }
}

/// Structural checks shared by both sources
fn structural_fault(quote: &Quote, now: u64) -> Option<Fault> {
    if !quote.retrieved() {
        return Some(Fault::Unavailable);
    }
    if quote.round_id() == Some(0) {
        return Some(Fault::ZeroRound);
    }
    if quote.observed_at() == 0 {
        return Some(Fault::ZeroTimestamp);
    }
    if quote.observed_at() > now {
        return Some(Fault::FutureTimestamp);
    }
    if !quote.value().is_positive() {
        return Some(Fault::NonPositive);
    }
    None
}

fn age(quote: &Quote, now: u64) -> u64 {
    now.saturating_sub(quote.observed_at())
}

/// Classify one quote against a single freshness window
pub fn classify(quote: &Quote, now: u64, max_age: u64) -> QuoteStatus {
    if let Some(fault) = structural_fault(quote, now) {
        return QuoteStatus::Broken(fault);
    }
    if age(quote, now) > max_age {
        return QuoteStatus::Frozen;
    }
    QuoteStatus::Live
}

/// Classify the primary's current round together with the preceding one.
///
/// The pair is broken if either round is broken; only the current round's
/// age decides whether it is frozen.
pub fn classify_primary_pair(
    current: &Quote,
    previous: &Quote,
    now: u64,
    params: &FeedParams,
) -> QuoteStatus {
    if let Some(fault) = structural_fault(current, now) {
        return QuoteStatus::Broken(fault);
    }
    if let Some(fault) = structural_fault(previous, now) {
        return QuoteStatus::Broken(fault);
    }
    classify(current, now, params.primary_timeout)
}

/// Classify the secondary with its two-tier freshness window
pub fn classify_secondary(quote: &Quote, now: u64, params: &FeedParams) -> QuoteStatus {
    match classify(quote, now, params.secondary_frozen_after) {
        QuoteStatus::Frozen if age(quote, now) > params.secondary_broken_after => {
            QuoteStatus::Broken(Fault::Expired)
        }
        status => status,
    }
}
