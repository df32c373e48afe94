//! Type definitions for pools, bins and user positions

use log::info;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bin_math::validate_bin_step_tier;
use crate::error::LiquidityError;
use crate::reference::CENTER_BIN_ID;
use crate::LiquidityResult;

/// Token reference data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
    /// Canonical address, treated as an opaque id
    pub address: String,
}

/// Pool reference data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pool {
    pub id: String,
    pub token_x: Token,
    pub token_y: Token,
    /// Bin step in basis points
    pub bin_step: u16,
    pub active_bin_id: i32,
    pub tvl: Decimal,
    pub volume_24h: Decimal,
    /// APR in percent
    pub apr: Decimal,
}

impl Pool {
    /// Initialize a new pool for a token pair.
    ///
    /// The bin step must be one of the offered tiers and the start price
    /// (token X in token Y) must be positive. The active bin starts at the
    /// center of the bin axis; the pool starts without liquidity.
    pub fn create(
        token_x: &Token,
        token_y: &Token,
        bin_step: u16,
        start_price: Decimal,
    ) -> LiquidityResult<(Pool, PoolContext)> {
        if token_x.symbol.eq_ignore_ascii_case(&token_y.symbol)
            || token_x.address.eq_ignore_ascii_case(&token_y.address)
        {
            return Err(LiquidityError::IdenticalTokens(token_x.symbol.clone()));
        }
        validate_bin_step_tier(bin_step)?;
        if start_price <= Decimal::ZERO {
            return Err(LiquidityError::InvalidPrice(format!(
                "start price must be positive, got {}",
                start_price
            )));
        }

        let pool = Pool {
            id: format!("{}-{}", token_x.symbol, token_y.symbol),
            token_x: token_x.clone(),
            token_y: token_y.clone(),
            bin_step,
            active_bin_id: CENTER_BIN_ID,
            tvl: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            apr: Decimal::ZERO,
        };
        let ctx = pool.context(start_price);

        info!(
            "Created pool {} (bin step {}, start price {})",
            pool.id, bin_step, start_price
        );
        Ok((pool, ctx))
    }

    /// Pair label such as `ETH/USDC`
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.token_x.symbol, self.token_y.symbol)
    }

    /// Snapshot of the parameters the calculators need
    pub fn context(&self, current_price: Decimal) -> PoolContext {
        PoolContext {
            active_bin_id: self.active_bin_id,
            bin_step: self.bin_step,
            current_price,
        }
    }
}

/// The three numbers every bin calculation depends on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolContext {
    pub active_bin_id: i32,
    /// Bin step in basis points
    pub bin_step: u16,
    /// Spot price of token X in units of token Y
    pub current_price: Decimal,
}

/// Materialized market bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bin {
    pub id: i32,
    pub price: Decimal,
    pub liquidity_x: Decimal,
    pub liquidity_y: Decimal,
    pub is_active: bool,
}

impl Bin {
    pub fn total_liquidity(&self) -> Decimal {
        self.liquidity_x + self.liquidity_y
    }
}

/// A liquidity provider's holdings in one bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBinPosition {
    pub bin_id: i32,
    pub amount_x: Decimal,
    pub amount_y: Decimal,
    /// Inclusive lower bound of the bin's price band
    pub price_min: Decimal,
    /// Exclusive upper bound of the bin's price band
    pub price_max: Decimal,
    pub is_active: bool,
}

impl UserBinPosition {
    pub fn is_empty(&self) -> bool {
        self.amount_x.is_zero() && self.amount_y.is_zero()
    }
}

/// Where a bin sits relative to the active bin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinSide {
    /// Below the active bin: holds only token Y
    BelowActive,
    /// The active bin: may hold both tokens
    Active,
    /// Above the active bin: holds only token X
    AboveActive,
}

impl BinSide {
    pub fn accepts_x(self) -> bool {
        !matches!(self, BinSide::BelowActive)
    }

    pub fn accepts_y(self) -> bool {
        !matches!(self, BinSide::AboveActive)
    }
}

/// Range status of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeStatus {
    /// Position sits in the active bin and earns fees
    Active,
    /// Withdrawable, but not currently earning fees
    OutOfRange,
}

impl std::fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangeStatus::Active => write!(f, "active"),
            RangeStatus::OutOfRange => write!(f, "out of range"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::token_by_symbol;
    use rust_decimal_macros::dec;

    fn token(symbol: &str) -> &'static Token {
        token_by_symbol(symbol).unwrap()
    }

    #[test]
    fn test_create_pool() {
        let (pool, ctx) = Pool::create(token("BRETT"), token("USDC"), 20, dec!(0.085)).unwrap();

        assert_eq!(pool.id, "BRETT-USDC");
        assert_eq!(pool.pair_label(), "BRETT/USDC");
        assert_eq!(pool.active_bin_id, CENTER_BIN_ID);
        assert!(pool.tvl.is_zero());
        assert_eq!(ctx.current_price, dec!(0.085));
        assert_eq!(ctx.price_of_bin(CENTER_BIN_ID), dec!(0.085));
        assert_eq!(ctx.bin_step, 20);
    }

    #[test]
    fn test_create_pool_rejects_bad_input() {
        assert_eq!(
            Pool::create(token("ETH"), token("ETH"), 20, dec!(1)),
            Err(LiquidityError::IdenticalTokens("ETH".to_string()))
        );
        assert_eq!(
            Pool::create(token("ETH"), token("USDC"), 25, dec!(2450)),
            Err(LiquidityError::InvalidBinStep(25))
        );
        assert_eq!(
            Pool::create(token("ETH"), token("USDC"), 2000, dec!(2450)),
            Err(LiquidityError::InvalidBinStep(2000))
        );
        assert!(matches!(
            Pool::create(token("ETH"), token("USDC"), 10, Decimal::ZERO),
            Err(LiquidityError::InvalidPrice(_))
        ));
        assert!(matches!(
            Pool::create(token("ETH"), token("USDC"), 10, dec!(-1)),
            Err(LiquidityError::InvalidPrice(_))
        ));
    }
}
