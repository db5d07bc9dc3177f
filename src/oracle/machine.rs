//! Failover State Machine - The transition table
//!
//! Every request is reduced to an [`Assessment`] of both sources, and the
//! current [`TrustState`] maps it to exactly one next state and one price
//! choice. The mapping is a single exhaustive `match`, so an unhandled
//! combination does not compile.

use super::{
    both_live_and_similar, classify_primary_pair, classify_secondary, round_over_round_excessive,
    sources_similar, FeedParams, NormalizedPrice, Quote, QuoteStatus,
};
use crate::types::TrustState;

/// Classified view of one request's quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    /// Status of the primary's current and previous rounds together
    pub primary: QuoteStatus,
    pub secondary: QuoteStatus,
    /// Primary moved too far since the previous round
    pub primary_excessive: bool,
    /// Current primary and secondary prices are within tolerance
    pub similar: bool,
}

impl Assessment {
    pub fn both_live_and_similar(&self) -> bool {
        both_live_and_similar(self.primary, self.secondary, self.similar)
    }
}

/// Which price the request returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceChoice {
    /// Return the stored last good price, leave it untouched
    LastGood,
    /// Store and return the primary's current price
    Primary,
    /// Store and return the secondary's price
    Secondary,
}

/// Outcome of one step of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: TrustState,
    pub choice: PriceChoice,
}

impl Transition {
    fn to(next: TrustState, choice: PriceChoice) -> Self {
        Self { next, choice }
    }
}

/// Classified quotes plus their normalized prices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub assessment: Assessment,
    pub primary_price: NormalizedPrice,
    pub secondary_price: NormalizedPrice,
}

impl Evaluation {
    pub fn evaluate(
        current: &Quote,
        previous: &Quote,
        secondary: &Quote,
        now: u64,
        params: &FeedParams,
    ) -> Self {
        let primary = classify_primary_pair(current, previous, now, params);
        let secondary_status = classify_secondary(secondary, now, params);

        let primary_price = current.normalized();
        let secondary_price = secondary.normalized();

        let primary_excessive = !primary.is_broken()
            && round_over_round_excessive(
                primary_price,
                previous.normalized(),
                params.max_round_deviation,
            );
        let similar = !primary.is_broken()
            && !secondary_status.is_broken()
            && sources_similar(primary_price, secondary_price, params.max_source_difference);

        Self {
            assessment: Assessment {
                primary,
                secondary: secondary_status,
                primary_excessive,
                similar,
            },
            primary_price,
            secondary_price,
        }
    }

    /// The fresh price a choice refers to, `None` for [`PriceChoice::LastGood`]
    pub fn price_for(&self, choice: PriceChoice) -> Option<NormalizedPrice> {
        match choice {
            PriceChoice::LastGood => None,
            PriceChoice::Primary => Some(self.primary_price),
            PriceChoice::Secondary => Some(self.secondary_price),
        }
    }
}

impl TrustState {
    /// Apply the transition table to one assessment
    pub fn transition(self, a: &Assessment) -> Transition {
        use PriceChoice::{LastGood, Primary, Secondary};
        use QuoteStatus::{Broken, Frozen, Live};
        use TrustState::*;

        let stay = |choice| Transition::to(self, choice);

        match self {
            PrimaryTrusted => match (a.primary, a.secondary) {
                (Broken(_), Broken(_)) => Transition::to(BothUntrusted, LastGood),
                (Broken(_), Frozen) => Transition::to(SecondaryOverridePrimaryUntrusted, LastGood),
                (Broken(_), Live) => Transition::to(SecondaryOverridePrimaryUntrusted, Secondary),

                (Frozen, Broken(_)) => Transition::to(PrimaryOverrideSecondaryUntrusted, LastGood),
                (Frozen, Frozen) => Transition::to(SecondaryOverridePrimaryFrozen, LastGood),
                (Frozen, Live) => Transition::to(SecondaryOverridePrimaryFrozen, Secondary),

                (Live, Broken(_)) if a.primary_excessive => Transition::to(BothUntrusted, LastGood),
                (Live, Frozen) if a.primary_excessive => {
                    Transition::to(SecondaryOverridePrimaryUntrusted, LastGood)
                }
                (Live, Live) if a.primary_excessive && a.similar => stay(Primary),
                (Live, Live) if a.primary_excessive => {
                    Transition::to(SecondaryOverridePrimaryUntrusted, Secondary)
                }

                (Live, Broken(_)) => Transition::to(PrimaryOverrideSecondaryUntrusted, Primary),
                (Live, Frozen | Live) => stay(Primary),
            },

            SecondaryOverridePrimaryUntrusted => {
                if a.both_live_and_similar() {
                    return Transition::to(PrimaryTrusted, Primary);
                }
                match a.secondary {
                    Broken(_) => Transition::to(BothUntrusted, LastGood),
                    Frozen => stay(LastGood),
                    Live => stay(Secondary),
                }
            }

            BothUntrusted => {
                if a.both_live_and_similar() {
                    Transition::to(PrimaryTrusted, Primary)
                } else {
                    stay(LastGood)
                }
            }

            SecondaryOverridePrimaryFrozen => match (a.primary, a.secondary) {
                (Broken(_), Broken(_)) => Transition::to(BothUntrusted, LastGood),
                (Broken(_), Frozen) => Transition::to(SecondaryOverridePrimaryUntrusted, LastGood),
                (Broken(_), Live) => Transition::to(SecondaryOverridePrimaryUntrusted, Secondary),

                (Frozen, Broken(_)) => Transition::to(PrimaryOverrideSecondaryUntrusted, LastGood),
                (Frozen, Frozen) => stay(LastGood),
                (Frozen, Live) => stay(Secondary),

                (Live, Broken(_)) => Transition::to(PrimaryOverrideSecondaryUntrusted, Primary),
                (Live, Frozen) => stay(LastGood),
                (Live, Live) if a.similar => Transition::to(PrimaryTrusted, Primary),
                (Live, Live) => Transition::to(SecondaryOverridePrimaryUntrusted, Secondary),
            },

            PrimaryOverrideSecondaryUntrusted => match a.primary {
                Broken(_) => Transition::to(BothUntrusted, LastGood),
                Frozen => stay(LastGood),
                Live if a.both_live_and_similar() => Transition::to(PrimaryTrusted, Primary),
                Live if a.primary_excessive => Transition::to(BothUntrusted, LastGood),
                Live => stay(Primary),
            },
        }
    }
}
