//! Core types used throughout the price feed
//!
//! Defines the trust state of the failover machine, source identities and
//! the notifications emitted to observers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::oracle::NormalizedPrice;

/// Which of the two external price sources a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// Round-based aggregator (Source A)
    Primary,
    /// Reference-data provider (Source B)
    Secondary,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Primary => write!(f, "primary"),
            SourceKind::Secondary => write!(f, "secondary"),
        }
    }
}

/// Persistent trust state of the failover machine.
///
/// Exactly one state is active at any time. The machine starts in
/// [`TrustState::PrimaryTrusted`] once setup has accepted a primary reading
/// and never reaches a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrustState {
    /// Primary is working and its price is returned
    PrimaryTrusted,
    /// Primary is untrusted; secondary is used while it stays healthy
    SecondaryOverridePrimaryUntrusted,
    /// Neither source is trusted; the last good price is returned
    BothUntrusted,
    /// Primary stopped updating; secondary is used while it stays healthy
    SecondaryOverridePrimaryFrozen,
    /// Secondary is untrusted; primary is used on its own
    PrimaryOverrideSecondaryUntrusted,
}

impl TrustState {
    pub const ALL: [TrustState; 5] = [
        TrustState::PrimaryTrusted,
        TrustState::SecondaryOverridePrimaryUntrusted,
        TrustState::BothUntrusted,
        TrustState::SecondaryOverridePrimaryFrozen,
        TrustState::PrimaryOverrideSecondaryUntrusted,
    ];

    /// Stable numeric identifier, used in notifications and the journal
    pub fn id(&self) -> u8 {
        match self {
            TrustState::PrimaryTrusted => 0,
            TrustState::SecondaryOverridePrimaryUntrusted => 1,
            TrustState::BothUntrusted => 2,
            TrustState::SecondaryOverridePrimaryFrozen => 3,
            TrustState::PrimaryOverrideSecondaryUntrusted => 4,
        }
    }

    /// Whether the primary source is fully trusted in this state
    pub fn is_nominal(&self) -> bool {
        matches!(self, TrustState::PrimaryTrusted)
    }
}

impl fmt::Display for TrustState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustState::PrimaryTrusted => write!(f, "PRIMARY_TRUSTED"),
            TrustState::SecondaryOverridePrimaryUntrusted => {
                write!(f, "SECONDARY_OVERRIDE_PRIMARY_UNTRUSTED")
            }
            TrustState::BothUntrusted => write!(f, "BOTH_UNTRUSTED"),
            TrustState::SecondaryOverridePrimaryFrozen => {
                write!(f, "SECONDARY_OVERRIDE_PRIMARY_FROZEN")
            }
            TrustState::PrimaryOverrideSecondaryUntrusted => {
                write!(f, "PRIMARY_OVERRIDE_SECONDARY_UNTRUSTED")
            }
        }
    }
}

/// Notification emitted by the feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedEvent {
    /// A newly computed price was stored as the last good price
    PriceUpdated { price: NormalizedPrice },
    /// The trust state changed value
    StateChanged { from: TrustState, to: TrustState },
}

impl FeedEvent {
    /// Short label used by the journal
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::PriceUpdated { .. } => "PRICE_UPDATED",
            FeedEvent::StateChanged { .. } => "STATE_CHANGED",
        }
    }
}
