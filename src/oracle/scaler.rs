//! Price Scaler - Normalizes source-native precision to canonical precision

use ethers::types::U256;

use super::{NormalizedPrice, CANONICAL_PRECISION};

/// Rescale `magnitude` from `precision` fractional digits to the canonical 18.
///
/// Scaling down truncates; scaling up saturates at `U256::MAX`.
pub fn scale(magnitude: U256, precision: u8) -> NormalizedPrice {
    NormalizedPrice::new(scale_to(magnitude, precision, CANONICAL_PRECISION))
}

/// Rescale `magnitude` between two arbitrary precisions
pub fn scale_to(magnitude: U256, from: u8, to: u8) -> U256 {
    if from >= to {
        let factor = pow10(from - to);
        if factor.is_zero() {
            return U256::zero();
        }
        magnitude / factor
    } else {
        magnitude.saturating_mul(pow10(to - from))
    }
}

/// 10^digits, or zero if it does not fit (only when digits > 77)
fn pow10(digits: u8) -> U256 {
    if digits > 77 {
        return U256::zero();
    }
    U256::exp10(digits as usize)
}
