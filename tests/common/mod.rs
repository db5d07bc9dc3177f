//! Scripted sources and a manual clock for driving the feed end to end

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{I256, U256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use pricefeed::oracle::sources::{
    PrimarySource, ReferenceData, RoundData, SecondarySource, SourceFailure,
};
use pricefeed::oracle::{Clock, FeedSettings, NormalizedPrice, PriceFeed};

pub const T0: u64 = 1_700_000_000;
pub const PRIMARY_DECIMALS: u8 = 8;

// ============================================================================
// Clock
// ============================================================================

#[derive(Debug)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(start: u64) -> Arc<Self> {
        Arc::new(Self(AtomicU64::new(start)))
    }

    pub fn advance(&self, secs: u64) -> u64 {
        self.0.fetch_add(secs, Ordering::SeqCst) + secs
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> u64 {
        self.get()
    }
}

// ============================================================================
// Primary
// ============================================================================

#[derive(Debug, Default)]
struct PrimaryScript {
    rounds: Vec<RoundData>,
    failing: bool,
}

/// Aggregator whose rounds are appended by the test
#[derive(Debug, Default)]
pub struct ScriptedPrimary {
    script: Mutex<PrimaryScript>,
}

impl ScriptedPrimary {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish a new round priced in whole units; ids start at 1
    pub fn push_round(&self, units: i64, updated_at: u64) {
        let mut script = self.script.lock().unwrap();
        let round_id = script.rounds.len() as u128 + 1;
        script.rounds.push(RoundData {
            precision: PRIMARY_DECIMALS,
            round_id,
            answer: I256::from(units * 10i64.pow(PRIMARY_DECIMALS as u32)),
            updated_at,
        });
    }

    pub fn set_failing(&self, failing: bool) {
        self.script.lock().unwrap().failing = failing;
    }
}

#[async_trait]
impl PrimarySource for ScriptedPrimary {
    fn name(&self) -> &'static str {
        "scripted-primary"
    }

    async fn current_reading(&self) -> Result<RoundData, SourceFailure> {
        let script = self.script.lock().unwrap();
        if script.failing {
            return Err(SourceFailure::Call("execution reverted".to_string()));
        }
        script
            .rounds
            .last()
            .copied()
            .ok_or_else(|| SourceFailure::Call("no rounds published".to_string()))
    }

    async fn reading_at(&self, round_id: u128) -> Result<RoundData, SourceFailure> {
        let script = self.script.lock().unwrap();
        if script.failing {
            return Err(SourceFailure::Call("execution reverted".to_string()));
        }
        script
            .rounds
            .iter()
            .find(|r| r.round_id == round_id)
            .copied()
            .ok_or_else(|| SourceFailure::Call(format!("round {} not found", round_id)))
    }
}

// ============================================================================
// Secondary
// ============================================================================

/// Reference contract whose answer is set by the test
#[derive(Debug)]
pub struct ScriptedSecondary {
    answer: Mutex<Result<ReferenceData, SourceFailure>>,
}

impl ScriptedSecondary {
    pub fn new(units: u64, last_updated_at: u64) -> Arc<Self> {
        Arc::new(Self {
            answer: Mutex::new(Ok(reference(units, last_updated_at))),
        })
    }

    pub fn set(&self, units: u64, last_updated_at: u64) {
        *self.answer.lock().unwrap() = Ok(reference(units, last_updated_at));
    }

    pub fn set_failing(&self) {
        *self.answer.lock().unwrap() = Err(SourceFailure::Timeout { after_ms: 5000 });
    }
}

fn reference(units: u64, last_updated_at: u64) -> ReferenceData {
    ReferenceData {
        rate: U256::from(units) * U256::exp10(18),
        last_updated_at,
    }
}

#[async_trait]
impl SecondarySource for ScriptedSecondary {
    fn name(&self) -> &'static str {
        "scripted-secondary"
    }

    async fn reference_data(
        &self,
        _base: &str,
        _quote: &str,
    ) -> Result<ReferenceData, SourceFailure> {
        self.answer.lock().unwrap().clone()
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub primary: Arc<ScriptedPrimary>,
    pub secondary: Arc<ScriptedSecondary>,
    pub clock: Arc<ManualClock>,
    pub feed: PriceFeed,
}

impl Harness {
    /// Feed set up at `T0` with both sources fresh and agreeing on `units`
    pub async fn start(units: u64) -> Self {
        let primary = ScriptedPrimary::new();
        primary.push_round(units as i64, T0 - 3600);
        primary.push_round(units as i64, T0);
        let secondary = ScriptedSecondary::new(units, T0);
        let clock = ManualClock::new(T0);

        let feed = PriceFeed::setup_with_clock(
            primary.clone(),
            secondary.clone(),
            FeedSettings::default(),
            clock.clone(),
        )
        .await
        .expect("setup with healthy primary");

        Self {
            primary,
            secondary,
            clock,
            feed,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.get()
    }

    /// Both sources fresh at the current time
    pub fn refresh(&self, primary_units: i64, secondary_units: u64) {
        let now = self.now();
        self.primary.push_round(primary_units, now);
        self.secondary.set(secondary_units, now);
    }
}

pub fn units(n: u64) -> NormalizedPrice {
    NormalizedPrice::from_units(n)
}
