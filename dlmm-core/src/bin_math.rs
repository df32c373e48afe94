//! Bin math utilities for DLMM calculations
//!
//! Prices are geometric in the bin id: every step up multiplies the price by
//! `1 + bin_step / 10_000`. All prices here are relative to the pool's current
//! price, which is pinned to the active bin.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::error::LiquidityError;
use crate::types::{BinSide, PoolContext};
use crate::LiquidityResult;

/// Basis point denominator
pub const BASIS_POINT_MAX: u16 = 10_000;
/// Bin step bounds (in basis points)
pub const MIN_BIN_STEP: u16 = 1; // 0.01%
pub const MAX_BIN_STEP: u16 = 1000; // 10%

/// Bin steps offered when creating a pool, doubling as its fee tier
pub const BIN_STEP_TIERS: [u16; 4] = [1, 10, 20, 100];

/// Convert basis points to decimal
pub fn bps_to_decimal(bps: u16) -> Decimal {
    Decimal::from(bps) / Decimal::from(BASIS_POINT_MAX)
}

/// Reject bin steps outside `MIN_BIN_STEP..=MAX_BIN_STEP`
pub fn validate_bin_step(bin_step: u16) -> LiquidityResult<u16> {
    if !(MIN_BIN_STEP..=MAX_BIN_STEP).contains(&bin_step) {
        return Err(LiquidityError::InvalidBinStep(bin_step));
    }
    Ok(bin_step)
}

/// Reject bin steps that are out of bounds or not one of `BIN_STEP_TIERS`
pub fn validate_bin_step_tier(bin_step: u16) -> LiquidityResult<u16> {
    validate_bin_step(bin_step)?;
    if !BIN_STEP_TIERS.contains(&bin_step) {
        return Err(LiquidityError::InvalidBinStep(bin_step));
    }
    Ok(bin_step)
}

/// `(1 + bin_step/10000)^exponent` by repeated squaring.
///
/// Returns `None` when the positive power overflows `Decimal`.
fn step_multiplier(bin_step: u16, exponent: i64) -> Option<Decimal> {
    let base = Decimal::ONE + bps_to_decimal(bin_step);
    let mut result = Decimal::ONE;
    let mut square = base;
    let mut remaining = exponent.unsigned_abs();

    while remaining > 0 {
        if remaining & 1 == 1 {
            result = result.checked_mul(square)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            square = square.checked_mul(square)?;
        }
    }

    if exponent < 0 {
        Decimal::ONE.checked_div(result)
    } else {
        Some(result)
    }
}

/// Convert bin ID to price.
///
/// Total over all inputs: a multiplier that overflows saturates to
/// `Decimal::MAX`, one that underflows (far below the active bin) gives zero.
pub fn price_of_bin(
    bin_id: i32,
    active_bin_id: i32,
    current_price: Decimal,
    bin_step: u16,
) -> Decimal {
    if current_price.is_zero() {
        return Decimal::ZERO;
    }

    let exponent = i64::from(bin_id) - i64::from(active_bin_id);
    let saturated = if current_price.is_sign_negative() {
        Decimal::MIN
    } else {
        Decimal::MAX
    };

    match step_multiplier(bin_step, exponent) {
        Some(multiplier) => current_price.checked_mul(multiplier).unwrap_or(saturated),
        None if exponent > 0 => saturated,
        None => Decimal::ZERO,
    }
}

/// Convert price to bin ID, rounding to the nearest bin.
///
/// Returns `None` for non-positive prices, a zero bin step, or an offset that
/// does not fit in an `i32`.
pub fn bin_of_price(
    price: Decimal,
    active_bin_id: i32,
    current_price: Decimal,
    bin_step: u16,
) -> Option<i32> {
    if price <= Decimal::ZERO || current_price <= Decimal::ZERO || bin_step == 0 {
        return None;
    }

    let ratio = price.checked_div(current_price)?.to_f64()?;
    if ratio <= 0.0 {
        return None;
    }
    let step_ln = (1.0 + f64::from(bin_step) / f64::from(BASIS_POINT_MAX)).ln();
    let offset = (ratio.ln() / step_ln).round();
    if !offset.is_finite() {
        return None;
    }

    i32::try_from(i64::from(active_bin_id) + offset as i64).ok()
}

/// Half-open price band `[price(bin), price(bin + 1))` covered by a bin
pub fn bin_price_range(
    bin_id: i32,
    active_bin_id: i32,
    current_price: Decimal,
    bin_step: u16,
) -> (Decimal, Decimal) {
    (
        price_of_bin(bin_id, active_bin_id, current_price, bin_step),
        price_of_bin(bin_id.saturating_add(1), active_bin_id, current_price, bin_step),
    )
}

/// Which tokens a bin may hold, relative to the active bin
pub fn bin_side(bin_id: i32, active_bin_id: i32) -> BinSide {
    match bin_id.cmp(&active_bin_id) {
        std::cmp::Ordering::Less => BinSide::BelowActive,
        std::cmp::Ordering::Equal => BinSide::Active,
        std::cmp::Ordering::Greater => BinSide::AboveActive,
    }
}

impl PoolContext {
    pub fn price_of_bin(&self, bin_id: i32) -> Decimal {
        price_of_bin(bin_id, self.active_bin_id, self.current_price, self.bin_step)
    }

    pub fn bin_of_price(&self, price: Decimal) -> Option<i32> {
        bin_of_price(price, self.active_bin_id, self.current_price, self.bin_step)
    }

    pub fn bin_price_range(&self, bin_id: i32) -> (Decimal, Decimal) {
        bin_price_range(bin_id, self.active_bin_id, self.current_price, self.bin_step)
    }

    pub fn bin_side(&self, bin_id: i32) -> BinSide {
        bin_side(bin_id, self.active_bin_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    const ACTIVE: i32 = 8_388_608;

    #[test]
    fn test_active_bin_is_current_price() {
        for &step in &[0u16, 1, 10, 25, 100, 1000] {
            for &price in &[dec!(0.012), dec!(1), dec!(2450.50)] {
                assert_eq!(price_of_bin(ACTIVE, ACTIVE, price, step), price);
                assert_eq!(price_of_bin(-7, -7, price, step), price);
            }
        }
    }

    #[test]
    fn test_price_one_step_up_and_down() {
        let up = price_of_bin(ACTIVE + 1, ACTIVE, dec!(100), 20);
        assert_eq!(up, dec!(100.2));

        let down = price_of_bin(ACTIVE - 1, ACTIVE, dec!(100), 20);
        assert!(down < dec!(100));
        assert_relative_eq!(down.to_f64().unwrap(), 100.0 / 1.002, epsilon = 1e-9);
    }

    #[test]
    fn test_price_strictly_increasing_over_window() {
        for &step in &[1u16, 10, 20, 25] {
            let prices: Vec<Decimal> = (ACTIVE - 30..ACTIVE + 30)
                .map(|id| price_of_bin(id, ACTIVE, dec!(2450), step))
                .collect();
            assert!(prices.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }

    #[test]
    fn test_price_matches_direct_exponentiation() {
        let price = price_of_bin(ACTIVE + 29, ACTIVE, dec!(2450), 25);
        let direct = 2450.0 * 1.0025_f64.powi(29);
        assert_relative_eq!(price.to_f64().unwrap(), direct, max_relative = 1e-12);

        let price = price_of_bin(ACTIVE - 30, ACTIVE, dec!(2450), 25);
        let direct = 2450.0 * 1.0025_f64.powi(-30);
        assert_relative_eq!(price.to_f64().unwrap(), direct, max_relative = 1e-12);
    }

    #[test]
    fn test_zero_price_and_saturation() {
        assert_eq!(price_of_bin(ACTIVE + 5, ACTIVE, Decimal::ZERO, 20), Decimal::ZERO);
        assert_eq!(price_of_bin(i32::MAX, i32::MIN, dec!(1), 1000), Decimal::MAX);
        assert_eq!(price_of_bin(i32::MIN, i32::MAX, dec!(1), 1000), Decimal::ZERO);
    }

    #[test]
    fn test_price_bin_round_trip() {
        for &step in &[1u16, 10, 20, 100] {
            for bin in ACTIVE - 30..ACTIVE + 30 {
                let price = price_of_bin(bin, ACTIVE, dec!(2450.5), step);
                assert_eq!(bin_of_price(price, ACTIVE, dec!(2450.5), step), Some(bin));
            }
        }
    }

    #[test]
    fn test_bin_of_price_rejects_bad_input() {
        assert_eq!(bin_of_price(Decimal::ZERO, ACTIVE, dec!(100), 20), None);
        assert_eq!(bin_of_price(dec!(-1), ACTIVE, dec!(100), 20), None);
        assert_eq!(bin_of_price(dec!(100), ACTIVE, Decimal::ZERO, 20), None);
        assert_eq!(bin_of_price(dec!(100), ACTIVE, dec!(100), 0), None);
    }

    #[test]
    fn test_bin_price_range() {
        let ctx = PoolContext {
            active_bin_id: ACTIVE,
            bin_step: 10,
            current_price: dec!(2450),
        };
        let (low, high) = ctx.bin_price_range(ACTIVE);
        assert_eq!(low, dec!(2450));
        assert_eq!(high, dec!(2452.45));
    }

    #[test]
    fn test_bin_side() {
        assert_eq!(bin_side(95, 100), BinSide::BelowActive);
        assert_eq!(bin_side(100, 100), BinSide::Active);
        assert_eq!(bin_side(105, 100), BinSide::AboveActive);
        assert!(BinSide::Active.accepts_x() && BinSide::Active.accepts_y());
        assert!(!BinSide::BelowActive.accepts_x());
        assert!(!BinSide::AboveActive.accepts_y());
    }

    #[test]
    fn test_validate_bin_step() {
        assert!(validate_bin_step(20).is_ok());
        assert_eq!(validate_bin_step(0), Err(LiquidityError::InvalidBinStep(0)));
        assert_eq!(validate_bin_step(1001), Err(LiquidityError::InvalidBinStep(1001)));

        for tier in BIN_STEP_TIERS {
            assert_eq!(validate_bin_step_tier(tier), Ok(tier));
        }
        assert_eq!(validate_bin_step_tier(25), Err(LiquidityError::InvalidBinStep(25)));
        assert_eq!(validate_bin_step_tier(0), Err(LiquidityError::InvalidBinStep(0)));
    }
}
