//! Deviation Analyzer - Compares normalized prices
//!
//! Round-over-round movement is measured against the larger price, so a
//! rise and a fall of the same size score the same. Cross-source
//! difference is measured against the smaller price, the stricter bar.

use ethers::types::U256;

use super::{one, NormalizedPrice, QuoteStatus};

/// `(max - min) * 1e18 / denominator`, `None` if the denominator is zero
fn relative_difference(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Some((hi - lo).saturating_mul(one()) / denominator)
}

/// True if the move from `previous` to `current` exceeds `max_deviation`
pub fn round_over_round_excessive(
    current: NormalizedPrice,
    previous: NormalizedPrice,
    max_deviation: U256,
) -> bool {
    let (a, b) = (current.raw(), previous.raw());
    relative_difference(a, b, a.max(b))
        .map(|deviation| deviation > max_deviation)
        .unwrap_or(false)
}

/// True if the two prices differ by at most `max_difference`
pub fn sources_similar(a: NormalizedPrice, b: NormalizedPrice, max_difference: U256) -> bool {
    let (a, b) = (a.raw(), b.raw());
    relative_difference(a, b, a.min(b))
        .map(|difference| difference <= max_difference)
        .unwrap_or(false)
}

/// The only condition that returns the feed to full primary trust
pub fn both_live_and_similar(primary: QuoteStatus, secondary: QuoteStatus, similar: bool) -> bool {
    primary.is_live() && secondary.is_live() && similar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{Fault, MAX_ROUND_DEVIATION, MAX_SOURCE_DIFFERENCE};

    fn max_round() -> U256 {
        U256::from(MAX_ROUND_DEVIATION)
    }

    fn max_diff() -> U256 {
        U256::from(MAX_SOURCE_DIFFERENCE)
    }

    fn units(n: u64) -> NormalizedPrice {
        NormalizedPrice::from_units(n)
    }

    #[test]
    fn test_small_move_not_excessive() {
        assert!(!round_over_round_excessive(units(2010), units(2000), max_round()));
    }

    #[test]
    fn test_deviation_measured_against_larger_price() {
        // 1100 / 3100 = 35.5%, although 1100 / 2000 would be 55%
        assert!(!round_over_round_excessive(units(3100), units(2000), max_round()));
        // 2100 / 4100 = 51.2%
        assert!(round_over_round_excessive(units(4100), units(2000), max_round()));
    }

    #[test]
    fn test_exactly_fifty_percent_is_not_excessive() {
        assert!(!round_over_round_excessive(units(2000), units(1000), max_round()));
    }

    #[test]
    fn test_round_over_round_is_symmetric() {
        let pairs = [(1000, 2500), (3100, 2000), (1, 1), (7, 700)];
        for (a, b) in pairs {
            assert_eq!(
                round_over_round_excessive(units(a), units(b), max_round()),
                round_over_round_excessive(units(b), units(a), max_round())
            );
        }
    }

    #[test]
    fn test_zero_prices_are_not_excessive() {
        assert!(!round_over_round_excessive(
            NormalizedPrice::ZERO,
            NormalizedPrice::ZERO,
            max_round()
        ));
    }

    #[test]
    fn test_similarity_threshold_uses_smaller_price() {
        // (2100 - 2000) / 2000 = 5% exactly
        assert!(sources_similar(units(2000), units(2100), max_diff()));
        // (2101 - 2000) / 2000 > 5%, although / 2101 would be under
        assert!(!sources_similar(units(2000), units(2101), max_diff()));
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let pairs = [(2000, 2050), (3100, 2050), (100, 105), (100, 106)];
        for (a, b) in pairs {
            assert_eq!(
                sources_similar(units(a), units(b), max_diff()),
                sources_similar(units(b), units(a), max_diff())
            );
        }
    }

    #[test]
    fn test_zero_price_is_never_similar() {
        assert!(!sources_similar(NormalizedPrice::ZERO, units(1), max_diff()));
        assert!(!sources_similar(NormalizedPrice::ZERO, NormalizedPrice::ZERO, max_diff()));
    }

    #[test]
    fn test_both_live_and_similar_requires_everything() {
        assert!(both_live_and_similar(QuoteStatus::Live, QuoteStatus::Live, true));
        assert!(!both_live_and_similar(QuoteStatus::Live, QuoteStatus::Live, false));
        assert!(!both_live_and_similar(QuoteStatus::Frozen, QuoteStatus::Live, true));
        assert!(!both_live_and_similar(
            QuoteStatus::Live,
            QuoteStatus::Broken(Fault::Expired),
            true
        ));
    }
}
