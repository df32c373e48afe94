//! Position aggregation: totals, per-bin composition and range status
//!
//! Every bin is valued at the pool's single current price (token Y terms),
//! not at the bin's own price band. That is a display valuation; settlement
//! at band prices would differ for out-of-range bins.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{RangeStatus, UserBinPosition};

/// Composition and value of one bin position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinComposition {
    pub bin_id: i32,
    pub amount_x: Decimal,
    pub amount_y: Decimal,
    /// Token X holdings expressed in token Y
    pub value_x: Decimal,
    pub value_y: Decimal,
    pub value: Decimal,
    pub pct_x: Decimal,
    pub pct_y: Decimal,
    pub price_min: Decimal,
    pub price_max: Decimal,
    pub status: RangeStatus,
}

/// Aggregate view over all of a user's bin positions
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_value: Decimal,
    pub total_amount_x: Decimal,
    pub total_amount_y: Decimal,
    pub active_bins: usize,
    pub out_of_range_bins: usize,
    /// Ordered by ascending bin id
    pub bins: Vec<BinComposition>,
}

impl PortfolioSummary {
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
}

/// Value of a position in token Y at `current_price`
pub fn position_value(position: &UserBinPosition, current_price: Decimal) -> Decimal {
    position.amount_x * current_price + position.amount_y
}

/// `part / whole * 100`, defined as zero when `whole` is zero
fn percentage_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part / whole * Decimal::ONE_HUNDRED
}

pub fn range_status(bin_id: i32, active_bin_id: i32) -> RangeStatus {
    if bin_id == active_bin_id {
        RangeStatus::Active
    } else {
        RangeStatus::OutOfRange
    }
}

/// Composition of a single position
pub fn compose(
    position: &UserBinPosition,
    current_price: Decimal,
    active_bin_id: i32,
) -> BinComposition {
    let value_x = position.amount_x * current_price;
    let value_y = position.amount_y;
    let value = value_x + value_y;

    BinComposition {
        bin_id: position.bin_id,
        amount_x: position.amount_x,
        amount_y: position.amount_y,
        value_x,
        value_y,
        value,
        pct_x: percentage_of(value_x, value),
        pct_y: percentage_of(value_y, value),
        price_min: position.price_min,
        price_max: position.price_max,
        status: range_status(position.bin_id, active_bin_id),
    }
}

/// Fold positions into totals and per-bin composition
pub fn summarize<'a, I>(
    positions: I,
    current_price: Decimal,
    active_bin_id: i32,
) -> PortfolioSummary
where
    I: IntoIterator<Item = &'a UserBinPosition>,
{
    let mut summary = PortfolioSummary::default();

    for position in positions {
        let composition = compose(position, current_price, active_bin_id);

        summary.total_value += composition.value;
        summary.total_amount_x += position.amount_x;
        summary.total_amount_y += position.amount_y;
        match composition.status {
            RangeStatus::Active => summary.active_bins += 1,
            RangeStatus::OutOfRange => summary.out_of_range_bins += 1,
        }
        summary.bins.push(composition);
    }

    summary.bins.sort_by_key(|bin| bin.bin_id);
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(bin_id: i32, amount_x: Decimal, amount_y: Decimal) -> UserBinPosition {
        UserBinPosition {
            bin_id,
            amount_x,
            amount_y,
            price_min: Decimal::ZERO,
            price_max: Decimal::ZERO,
            is_active: false,
        }
    }

    #[test]
    fn test_totals() {
        let positions = vec![
            position(100, dec!(0.5), dec!(1000)),
            position(95, Decimal::ZERO, dec!(2000)),
        ];

        let summary = summarize(&positions, dec!(2000), 100);

        assert_eq!(summary.total_amount_x, dec!(0.5));
        assert_eq!(summary.total_amount_y, dec!(3000));
        assert_eq!(summary.total_value, dec!(4000));
        assert_eq!(summary.active_bins, 1);
        assert_eq!(summary.out_of_range_bins, 1);
    }

    #[test]
    fn test_bins_sorted_by_id() {
        let positions = vec![
            position(108, dec!(1.25), Decimal::ZERO),
            position(95, Decimal::ZERO, dec!(2500)),
            position(100, dec!(0.5), dec!(1240)),
        ];

        let summary = summarize(&positions, dec!(2450), 100);
        let ids: Vec<i32> = summary.bins.iter().map(|b| b.bin_id).collect();
        assert_eq!(ids, vec![95, 100, 108]);
    }

    #[test]
    fn test_composition_percentages() {
        let composition = compose(&position(100, dec!(0.5), dec!(1000)), dec!(2000), 100);
        assert_eq!(composition.value, dec!(2000));
        assert_eq!(composition.pct_x, dec!(50));
        assert_eq!(composition.pct_y, dec!(50));
        assert_eq!(composition.status, RangeStatus::Active);
    }

    #[test]
    fn test_empty_composition_is_zero() {
        let composition = compose(&position(90, Decimal::ZERO, Decimal::ZERO), dec!(2000), 100);
        assert_eq!(composition.pct_x, Decimal::ZERO);
        assert_eq!(composition.pct_y, Decimal::ZERO);
        assert_eq!(composition.status, RangeStatus::OutOfRange);
    }

    #[test]
    fn test_zero_price_degrades_to_zero() {
        let positions = vec![position(110, dec!(1.25), Decimal::ZERO)];
        let summary = summarize(&positions, Decimal::ZERO, 100);

        assert_eq!(summary.total_value, Decimal::ZERO);
        assert_eq!(summary.bins[0].pct_x, Decimal::ZERO);
        assert_eq!(summary.bins[0].pct_y, Decimal::ZERO);
    }

    #[test]
    fn test_empty_input() {
        let summary = summarize(&Vec::new(), dec!(2000), 100);
        assert!(summary.is_empty());
        assert_eq!(summary.total_value, Decimal::ZERO);
    }
}
