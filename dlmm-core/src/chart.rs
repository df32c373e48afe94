//! Chart projection of market and user liquidity

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;

use crate::bin_math::bps_to_decimal;
use crate::types::{Bin, PoolContext, UserBinPosition};

/// One bar of the liquidity chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub bin_id: i32,
    /// Axis label, two decimals
    pub price_label: String,
    pub price_start: Decimal,
    pub price_end: Decimal,
    /// liquidity_x + liquidity_y of the market bin
    pub liquidity_total: Decimal,
    /// Value of the user's position in this bin at the bin's price, zero if none
    pub user_liquidity: Decimal,
    pub is_active: bool,
}

/// Renderable series ordered by ascending bin id
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    /// Index of the active bin, for the reference marker
    pub fn active_index(&self) -> Option<usize> {
        self.points.iter().position(|point| point.is_active)
    }

    pub fn active_point(&self) -> Option<&ChartPoint> {
        self.active_index().map(|index| &self.points[index])
    }

    pub fn max_liquidity(&self) -> Decimal {
        self.points
            .iter()
            .map(|point| point.liquidity_total)
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn user_bins(&self) -> impl Iterator<Item = &ChartPoint> {
        self.points.iter().filter(|point| !point.user_liquidity.is_zero())
    }
}

/// Merge the bin window with the user's positions
pub fn project<'a, I>(bins: &[Bin], positions: I, ctx: &PoolContext) -> ChartSeries
where
    I: IntoIterator<Item = &'a UserBinPosition>,
{
    let by_bin: HashMap<i32, &UserBinPosition> = positions
        .into_iter()
        .map(|position| (position.bin_id, position))
        .collect();
    let step_multiplier = Decimal::ONE + bps_to_decimal(ctx.bin_step);

    let mut ordered: Vec<&Bin> = bins.iter().collect();
    ordered.sort_by_key(|bin| bin.id);

    let points = ordered
        .into_iter()
        .map(|bin| {
            let user_liquidity = by_bin
                .get(&bin.id)
                .map(|position| position.amount_x * bin.price + position.amount_y)
                .unwrap_or(Decimal::ZERO);

            ChartPoint {
                bin_id: bin.id,
                price_label: format!("{:.2}", bin.price),
                price_start: bin.price,
                price_end: bin.price * step_multiplier,
                liquidity_total: bin.total_liquidity(),
                user_liquidity,
                is_active: bin.id == ctx.active_bin_id,
            }
        })
        .collect();

    ChartSeries { points }
}

/// Horizontal text bar chart, one line per bin, highest price first
pub fn render_ascii(series: &ChartSeries, width: usize) -> String {
    let max = series.max_liquidity();
    let label_width = series
        .points
        .iter()
        .map(|point| point.price_label.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for point in series.points.iter().rev() {
        let bar_len = if max.is_zero() {
            0
        } else {
            (point.liquidity_total / max * Decimal::from(width))
                .round()
                .to_usize()
                .unwrap_or(0)
        };
        let marker = if point.is_active { '>' } else { ' ' };
        let _ = write!(
            out,
            "{}{:>label_width$} |{:<width$}|",
            marker,
            point.price_label,
            "=".repeat(bar_len),
        );
        if !point.user_liquidity.is_zero() {
            let _ = write!(out, " * {:.2}", point.user_liquidity);
        }
        out.push('\n');
    }
    out
}
