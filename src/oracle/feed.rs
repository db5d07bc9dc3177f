//! Price Feed - Setup, the public request operation and the last good price
//!
//! `PriceFeed` exclusively owns the trust state and the last good price.
//! Each call to [`PriceFeed::fetch_price`] reads both sources, classifies
//! them, applies the transition table and commits the result while holding
//! a single lock, so concurrent requests never interleave.

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use super::sources::{read_primary, read_secondary, PrimarySource, SecondarySource};
use super::{classify_primary_pair, Evaluation, FeedParams, NormalizedPrice, QuoteStatus};
use crate::types::{FeedEvent, TrustState};

/// Errors surfaced by the feed. Only setup can fail.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The primary could not be trusted when the feed was set up
    #[error("primary source is not usable at setup: {status}")]
    UntrustedPrimary { status: QuoteStatus },

    #[error("invalid feed parameters: {0}")]
    InvalidParams(String),
}

/// Source of the request time, in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        chrono::Utc::now().timestamp().max(0) as u64
    }
}

/// Everything setup needs besides the sources
#[derive(Debug, Clone)]
pub struct FeedSettings {
    pub params: FeedParams,
    pub base_symbol: String,
    pub quote_symbol: String,
    /// Capacity of the notification channel
    pub event_capacity: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            params: FeedParams::default(),
            base_symbol: "ETH".to_string(),
            quote_symbol: "USD".to_string(),
            event_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FeedState {
    status: TrustState,
    last_good_price: NormalizedPrice,
}

/// Redundant price feed with primary/secondary failover
pub struct PriceFeed {
    primary: Arc<dyn PrimarySource>,
    secondary: Arc<dyn SecondarySource>,
    clock: Arc<dyn Clock>,
    settings: FeedSettings,
    state: Mutex<FeedState>,
    events: broadcast::Sender<FeedEvent>,
}

impl PriceFeed {
    /// Set up the feed against the wall clock
    pub async fn setup(
        primary: Arc<dyn PrimarySource>,
        secondary: Arc<dyn SecondarySource>,
        settings: FeedSettings,
    ) -> Result<Self, FeedError> {
        Self::setup_with_clock(primary, secondary, settings, Arc::new(SystemClock)).await
    }

    /// Set up the feed.
    ///
    /// Reads the primary once; fails unless its current and previous rounds
    /// are neither broken nor frozen. On success the feed starts in
    /// [`TrustState::PrimaryTrusted`] with the primary's price stored.
    pub async fn setup_with_clock(
        primary: Arc<dyn PrimarySource>,
        secondary: Arc<dyn SecondarySource>,
        settings: FeedSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, FeedError> {
        let now = clock.now();
        let (current, previous) = read_primary(primary.as_ref()).await;

        let status = classify_primary_pair(&current, &previous, now, &settings.params);
        if !status.is_live() {
            warn!(source = %primary.name(), status = %status, "Refusing to start feed");
            return Err(FeedError::UntrustedPrimary { status });
        }

        let price = current.normalized();
        let (events, _) = broadcast::channel(settings.event_capacity.max(1));
        let _ = events.send(FeedEvent::PriceUpdated { price });

        info!(
            primary = %primary.name(),
            secondary = %secondary.name(),
            pair = %format!("{}/{}", settings.base_symbol, settings.quote_symbol),
            price = %price,
            "Price feed initialized"
        );

        Ok(Self {
            primary,
            secondary,
            clock,
            settings,
            state: Mutex::new(FeedState {
                status: TrustState::PrimaryTrusted,
                last_good_price: price,
            }),
            events,
        })
    }

    /// Return the current trusted price.
    ///
    /// Never fails: when no source can be trusted this round the last good
    /// price is returned unchanged.
    pub async fn fetch_price(&self) -> NormalizedPrice {
        let mut state = self.state.lock().await;

        let now = self.clock.now();
        let (current, previous) = read_primary(self.primary.as_ref()).await;
        let secondary = read_secondary(
            self.secondary.as_ref(),
            &self.settings.base_symbol,
            &self.settings.quote_symbol,
        )
        .await;

        let eval = Evaluation::evaluate(&current, &previous, &secondary, now, &self.settings.params);
        let transition = state.status.transition(&eval.assessment);

        debug!(
            state = %state.status,
            primary = %eval.assessment.primary,
            secondary = %eval.assessment.secondary,
            excessive = eval.assessment.primary_excessive,
            similar = eval.assessment.similar,
            next = %transition.next,
            choice = ?transition.choice,
            "Feed decision"
        );

        if transition.next != state.status {
            self.log_transition(state.status, transition.next);
            let _ = self.events.send(FeedEvent::StateChanged {
                from: state.status,
                to: transition.next,
            });
            state.status = transition.next;
        }

        match eval.price_for(transition.choice) {
            Some(price) => {
                state.last_good_price = price;
                let _ = self.events.send(FeedEvent::PriceUpdated { price });
                price
            }
            None => state.last_good_price,
        }
    }

    fn log_transition(&self, from: TrustState, to: TrustState) {
        if from.is_nominal() || to == TrustState::BothUntrusted {
            warn!(from = %from, to = %to, "Feed state changed");
        } else {
            info!(from = %from, to = %to, "Feed state changed");
        }
    }

    /// Current trust state
    pub async fn status(&self) -> TrustState {
        self.state.lock().await.status
    }

    /// Price returned when no source can be trusted
    pub async fn last_good_price(&self) -> NormalizedPrice {
        self.state.lock().await.last_good_price
    }

    /// Subscribe to price and state notifications
    pub fn subscribe(&self) -> broadcast::Receiver<FeedEvent> {
        self.events.subscribe()
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::sources::{
        MockPrimarySource, MockSecondarySource, ReferenceData, RoundData, SourceFailure,
    };
    use crate::oracle::Fault;
    use ethers::types::{I256, U256};

    const NOW: u64 = 1_700_000_000;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    fn healthy_primary(answer: i64, updated_at: u64) -> MockPrimarySource {
        let mut mock = MockPrimarySource::new();
        mock.expect_name().return_const("mock-primary");
        mock.expect_current_reading().returning(move || {
            Ok(RoundData {
                precision: 8,
                round_id: 10,
                answer: I256::from(answer),
                updated_at,
            })
        });
        mock.expect_reading_at().returning(move |id| {
            Ok(RoundData {
                precision: 8,
                round_id: id,
                answer: I256::from(answer),
                updated_at: updated_at.saturating_sub(60),
            })
        });
        mock
    }

    fn secondary(rate_units: u64, last_updated_at: u64) -> MockSecondarySource {
        let mut mock = MockSecondarySource::new();
        mock.expect_name().return_const("mock-secondary");
        mock.expect_reference_data().returning(move |_, _| {
            Ok(ReferenceData {
                rate: U256::from(rate_units) * U256::exp10(18),
                last_updated_at,
            })
        });
        mock
    }

    async fn setup(
        primary: MockPrimarySource,
        secondary: MockSecondarySource,
    ) -> Result<PriceFeed, FeedError> {
        PriceFeed::setup_with_clock(
            Arc::new(primary),
            Arc::new(secondary),
            FeedSettings::default(),
            Arc::new(FixedClock(NOW)),
        )
        .await
    }

    #[tokio::test]
    async fn test_setup_stores_primary_price() {
        let feed = setup(healthy_primary(300_000_000_000, NOW), secondary(3000, NOW))
            .await
            .unwrap();
        assert_eq!(feed.status().await, TrustState::PrimaryTrusted);
        assert_eq!(
            feed.last_good_price().await,
            NormalizedPrice::from_units(3000)
        );
    }

    #[tokio::test]
    async fn test_setup_rejects_frozen_primary() {
        let err = setup(healthy_primary(300_000_000_000, NOW - 20_000), secondary(3000, NOW))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            FeedError::UntrustedPrimary {
                status: QuoteStatus::Frozen
            }
        ));
    }

    #[tokio::test]
    async fn test_setup_rejects_unavailable_primary() {
        let mut primary = MockPrimarySource::new();
        primary.expect_name().return_const("mock-primary");
        primary
            .expect_current_reading()
            .returning(|| Err(SourceFailure::Call("connection refused".to_string())));

        let err = setup(primary, secondary(3000, NOW)).await.err().unwrap();
        assert!(matches!(
            err,
            FeedError::UntrustedPrimary {
                status: QuoteStatus::Broken(Fault::Unavailable)
            }
        ));
    }

    #[tokio::test]
    async fn test_fetch_emits_price_but_no_state_change_when_nominal() {
        let feed = setup(healthy_primary(300_000_000_000, NOW), secondary(3010, NOW))
            .await
            .unwrap();
        let mut rx = feed.subscribe();

        let price = feed.fetch_price().await;
        assert_eq!(price, NormalizedPrice::from_units(3000));
        assert_eq!(rx.try_recv().unwrap(), FeedEvent::PriceUpdated { price });
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_secondary_and_primary_failure_keeps_last_good() {
        let mut primary = MockPrimarySource::new();
        primary.expect_name().return_const("mock-primary");
        let mut calls = 0;
        primary.expect_current_reading().returning(move || {
            calls += 1;
            if calls == 1 {
                Ok(RoundData {
                    precision: 8,
                    round_id: 10,
                    answer: I256::from(300_000_000_000i64),
                    updated_at: NOW,
                })
            } else {
                Err(SourceFailure::Call("execution reverted".to_string()))
            }
        });
        primary.expect_reading_at().returning(|id| {
            Ok(RoundData {
                precision: 8,
                round_id: id,
                answer: I256::from(300_000_000_000i64),
                updated_at: NOW - 60,
            })
        });

        let feed = setup(primary, secondary(2000, NOW - 20_000)).await.unwrap();
        let mut rx = feed.subscribe();

        let price = feed.fetch_price().await;
        assert_eq!(price, NormalizedPrice::from_units(3000));
        assert_eq!(
            feed.status().await,
            TrustState::SecondaryOverridePrimaryUntrusted
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            FeedEvent::StateChanged {
                from: TrustState::PrimaryTrusted,
                to: TrustState::SecondaryOverridePrimaryUntrusted,
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
