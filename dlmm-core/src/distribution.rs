//! Liquidity shape generation around the active bin
//!
//! A shape is a weighting function of the distance from the active bin. The
//! generator materializes a bounded window of bins and splits each weight
//! into token X (above the active bin), token Y (below it), or half of each
//! (the active bin itself).

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::bin_math::bin_side;
use crate::error::LiquidityError;
use crate::types::{Bin, BinSide, PoolContext};
use crate::LiquidityResult;

/// Radius bounds (bins on each side of the active bin)
pub const MIN_RADIUS: u32 = 1;
pub const MAX_RADIUS: u32 = 30;
pub const DEFAULT_RADIUS: u32 = 15;

/// Number of bins materialized around the active bin
pub const DEFAULT_WINDOW_WIDTH: u32 = 60;

/// Weight handed to a full-density bin
pub const DEFAULT_UNIT: Decimal = dec!(100);

/// Density of the Wide shape relative to a full bin
const WIDE_DENSITY: Decimal = dec!(0.3);

/// Named weighting functions for spreading a deposit across bins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LiquidityShape {
    /// Concentrated on the active bin and its direct neighbours
    Spot,
    /// Triangular decay reaching zero at the radius
    Curve,
    /// Flat envelope across the whole radius
    #[serde(rename = "Bid-Ask")]
    BidAsk,
    /// Flat, low-density spread across the whole radius
    Wide,
}

impl LiquidityShape {
    pub const ALL: [LiquidityShape; 4] = [
        LiquidityShape::Spot,
        LiquidityShape::Curve,
        LiquidityShape::BidAsk,
        LiquidityShape::Wide,
    ];

    /// Weight of a bin `distance` bins away from the active bin
    pub fn weight(self, distance: u32, radius: Radius, unit: Decimal) -> Decimal {
        let radius = radius.get();
        if distance > radius {
            return Decimal::ZERO;
        }

        match self {
            LiquidityShape::Spot => {
                if distance < 2 {
                    unit
                } else {
                    Decimal::ZERO
                }
            }
            LiquidityShape::Curve => {
                let decay = unit * Decimal::from(distance) / Decimal::from(radius);
                (unit - decay).max(Decimal::ZERO)
            }
            LiquidityShape::BidAsk => unit,
            LiquidityShape::Wide => unit * WIDE_DENSITY,
        }
    }
}

impl fmt::Display for LiquidityShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LiquidityShape::Spot => "Spot",
            LiquidityShape::Curve => "Curve",
            LiquidityShape::BidAsk => "Bid-Ask",
            LiquidityShape::Wide => "Wide",
        };
        f.write_str(label)
    }
}

impl FromStr for LiquidityShape {
    type Err = LiquidityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spot" => Ok(LiquidityShape::Spot),
            "curve" => Ok(LiquidityShape::Curve),
            "bid-ask" | "bidask" | "bid_ask" => Ok(LiquidityShape::BidAsk),
            "wide" => Ok(LiquidityShape::Wide),
            _ => Err(LiquidityError::UnknownShape(s.to_string())),
        }
    }
}

/// Concentration radius, always within `MIN_RADIUS..=MAX_RADIUS`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Radius(u32);

impl Radius {
    pub fn new(radius: u32) -> LiquidityResult<Self> {
        if !(MIN_RADIUS..=MAX_RADIUS).contains(&radius) {
            return Err(LiquidityError::InvalidRadius(radius));
        }
        Ok(Self(radius))
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl Default for Radius {
    fn default() -> Self {
        Self(DEFAULT_RADIUS)
    }
}

impl TryFrom<u32> for Radius {
    type Error = LiquidityError;

    fn try_from(radius: u32) -> Result<Self, Self::Error> {
        Radius::new(radius)
    }
}

impl From<Radius> for u32 {
    fn from(radius: Radius) -> Self {
        radius.0
    }
}

/// Cosmetic per-bin jitter for display variety. Carries no economic meaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseConfig {
    /// Noise is drawn from `[0, amplitude)`
    pub amplitude: Decimal,
    pub seed: u64,
}

impl NoiseConfig {
    pub fn new(amplitude: Decimal, seed: u64) -> LiquidityResult<Self> {
        if amplitude.is_sign_negative() {
            return Err(LiquidityError::InvalidAmount(format!(
                "noise amplitude must be non-negative, got {}",
                amplitude
            )));
        }
        Ok(Self { amplitude, seed })
    }

    /// Never negative, even for a hand-built config with a negative amplitude
    fn sample(&self, rng: &mut StdRng) -> Decimal {
        let fraction = Decimal::from_f64(rng.gen::<f64>()).unwrap_or(Decimal::ZERO);
        (fraction * self.amplitude.max(Decimal::ZERO)).round_dp(6)
    }
}

/// Shape parameters for a generated bin window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionConfig {
    pub shape: LiquidityShape,
    pub radius: Radius,
    pub unit: Decimal,
    pub window_width: u32,
    /// `None` keeps generation deterministic
    pub noise: Option<NoiseConfig>,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            shape: LiquidityShape::Spot,
            radius: Radius::default(),
            unit: DEFAULT_UNIT,
            window_width: DEFAULT_WINDOW_WIDTH,
            noise: None,
        }
    }
}

impl DistributionConfig {
    /// Weight assigned to `bin_id` before the X/Y split
    pub fn weight_for_bin(&self, bin_id: i32, active_bin_id: i32) -> Decimal {
        self.shape
            .weight(bin_id.abs_diff(active_bin_id), self.radius, self.unit)
    }

    /// Non-zero weights keyed by bin id
    pub fn weights(&self, active_bin_id: i32) -> BTreeMap<i32, Decimal> {
        let radius = self.radius.get() as i32;
        (active_bin_id.saturating_sub(radius)..=active_bin_id.saturating_add(radius))
            .map(|bin_id| (bin_id, self.weight_for_bin(bin_id, active_bin_id)))
            .filter(|(_, weight)| !weight.is_zero())
            .collect()
    }

    /// First bin id of the materialized window
    pub fn window_start(&self, active_bin_id: i32) -> i64 {
        i64::from(active_bin_id) - i64::from(self.window_width / 2)
    }
}

/// Split a bin's weight into `(liquidity_x, liquidity_y)`
pub fn split_weight(weight: Decimal, side: BinSide) -> (Decimal, Decimal) {
    match side {
        BinSide::AboveActive => (weight, Decimal::ZERO),
        BinSide::BelowActive => (Decimal::ZERO, weight),
        BinSide::Active => {
            let half = weight / Decimal::TWO;
            (half, half)
        }
    }
}

/// Materialize the bin window around the active bin.
///
/// The window is rebuilt from scratch on every call; callers regenerate it
/// whenever the shape, radius, pool or price changes.
pub fn generate_bins(ctx: &PoolContext, config: &DistributionConfig) -> Vec<Bin> {
    let start = config.window_start(ctx.active_bin_id);
    let mut rng = config.noise.map(|noise| StdRng::seed_from_u64(noise.seed));

    let bins: Vec<Bin> = (0..i64::from(config.window_width))
        .filter_map(|offset| i32::try_from(start + offset).ok())
        .map(|id| {
            let side = bin_side(id, ctx.active_bin_id);
            let weight = config.weight_for_bin(id, ctx.active_bin_id);
            let (mut liquidity_x, mut liquidity_y) = split_weight(weight, side);

            if let (Some(noise), Some(rng)) = (config.noise.as_ref(), rng.as_mut()) {
                let jitter = noise.sample(rng);
                if side.accepts_x() {
                    liquidity_x += jitter;
                }
                if side.accepts_y() {
                    liquidity_y += jitter;
                }
            }

            Bin {
                id,
                price: ctx.price_of_bin(id),
                liquidity_x,
                liquidity_y,
                is_active: id == ctx.active_bin_id,
            }
        })
        .collect();

    debug!(
        "Generated {} bins around {} ({} shape, radius {})",
        bins.len(),
        ctx.active_bin_id,
        config.shape,
        config.radius.get()
    );

    bins
}
