//! Built-in token and pool catalog
//!
//! Reference data is read-only input to the calculators; nothing here is
//! fetched on-chain.

use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::error::LiquidityError;
use crate::types::{Pool, PoolContext, Token, UserBinPosition};
use crate::LiquidityResult;

/// Center id of the bin axis used by the catalog pools (2^23)
pub const CENTER_BIN_ID: i32 = 8_388_608;

fn token(symbol: &str, name: &str, address: &str, decimals: u8) -> Token {
    Token {
        symbol: symbol.to_string(),
        name: name.to_string(),
        decimals,
        address: address.to_string(),
    }
}

static TOKENS: Lazy<BTreeMap<String, Token>> = Lazy::new(|| {
    [
        token("ETH", "Ethereum", "0x4200000000000000000000000000000000000006", 18),
        token("USDC", "USD Coin", "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913", 6),
        token("BRETT", "Brett", "0x532f27101965dd16442E59d40670FaF5eBB142E4", 18),
        token("DEGEN", "Degen", "0x4ed4E862860bED51a9570b96d89aF5E1B0Efefed", 18),
    ]
    .into_iter()
    .map(|token| (token.symbol.clone(), token))
    .collect()
});

static POOLS: Lazy<Vec<Pool>> = Lazy::new(|| {
    let pool = |id: &str, x: &str, y: &str, bin_step: u16, tvl, volume_24h, apr| Pool {
        id: id.to_string(),
        token_x: TOKENS[x].clone(),
        token_y: TOKENS[y].clone(),
        bin_step,
        active_bin_id: CENTER_BIN_ID,
        tvl,
        volume_24h,
        apr,
    };

    vec![
        pool("ETH-USDC", "ETH", "USDC", 10, dec!(5240000), dec!(1200000), dec!(12.5)),
        pool("BRETT-ETH", "BRETT", "ETH", 20, dec!(890000), dec!(450000), dec!(45.2)),
        pool("DEGEN-ETH", "DEGEN", "ETH", 25, dec!(120000), dec!(80000), dec!(88.9)),
    ]
});

/// Spot prices (USD) used until the price feed delivers
static FALLBACK_PRICES: Lazy<BTreeMap<String, Decimal>> = Lazy::new(|| {
    [
        ("ETH", dec!(2450.50)),
        ("USDC", dec!(1.00)),
        ("BRETT", dec!(0.085)),
        ("DEGEN", dec!(0.012)),
    ]
    .into_iter()
    .map(|(symbol, price)| (symbol.to_string(), price))
    .collect()
});

pub fn tokens() -> &'static BTreeMap<String, Token> {
    &TOKENS
}

pub fn token_by_symbol(symbol: &str) -> Option<&'static Token> {
    TOKENS.get(&symbol.to_uppercase())
}

pub fn pools() -> &'static [Pool] {
    &POOLS
}

pub fn pool_by_id(id: &str) -> LiquidityResult<&'static Pool> {
    POOLS
        .iter()
        .find(|pool| pool.id.eq_ignore_ascii_case(id))
        .ok_or_else(|| LiquidityError::UnknownPool(id.to_string()))
}

pub fn fallback_prices() -> &'static BTreeMap<String, Decimal> {
    &FALLBACK_PRICES
}

/// Price of `token_x` in units of `token_y`, from per-symbol USD quotes.
///
/// Zero when either quote is missing or the quote token is priced at zero.
pub fn pair_price(pool: &Pool, usd_prices: &BTreeMap<String, Decimal>) -> Decimal {
    let price_x = usd_prices
        .get(&pool.token_x.symbol)
        .copied()
        .unwrap_or(Decimal::ZERO);
    let price_y = usd_prices
        .get(&pool.token_y.symbol)
        .copied()
        .unwrap_or(Decimal::ZERO);
    exchange_rate(price_x, price_y)
}

/// `price_in / price_out`, zero when `price_out` is zero
pub fn exchange_rate(price_in: Decimal, price_out: Decimal) -> Decimal {
    if price_out.is_zero() {
        return Decimal::ZERO;
    }
    price_in / price_out
}

/// Display estimate of a swap output at a flat rate. No routing, no slippage.
pub fn quote_amount_out(amount_in: Decimal, rate: Decimal) -> Decimal {
    (amount_in * rate).round_dp(6)
}

/// Sample holdings: one active bin, one bin below price, one above
pub fn demo_positions(ctx: &PoolContext) -> Vec<UserBinPosition> {
    [
        (ctx.active_bin_id, dec!(0.5421), dec!(1240.50)),
        (ctx.active_bin_id - 5, Decimal::ZERO, dec!(2500.00)),
        (ctx.active_bin_id + 8, dec!(1.2500), Decimal::ZERO),
    ]
    .into_iter()
    .map(|(bin_id, amount_x, amount_y)| {
        let (price_min, price_max) = ctx.bin_price_range(bin_id);
        UserBinPosition {
            bin_id,
            amount_x,
            amount_y,
            price_min,
            price_max,
            is_active: bin_id == ctx.active_bin_id,
        }
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog() {
        assert_eq!(tokens().len(), 4);
        assert_eq!(token_by_symbol("usdc").unwrap().decimals, 6);
        assert_eq!(pools().len(), 3);

        let pool = pool_by_id("eth-usdc").unwrap();
        assert_eq!(pool.bin_step, 10);
        assert_eq!(pool.pair_label(), "ETH/USDC");
        assert!(matches!(pool_by_id("SOL-USDC"), Err(LiquidityError::UnknownPool(_))));
    }

    #[test]
    fn test_pair_price() {
        let eth_usdc = pool_by_id("ETH-USDC").unwrap();
        assert_eq!(pair_price(eth_usdc, fallback_prices()), dec!(2450.50));

        let brett_eth = pool_by_id("BRETT-ETH").unwrap();
        let mut prices = fallback_prices().clone();
        prices.insert("ETH".to_string(), Decimal::ZERO);
        assert_eq!(pair_price(brett_eth, &prices), Decimal::ZERO);
    }

    #[test]
    fn test_quote() {
        let rate = exchange_rate(dec!(2450), dec!(1));
        assert_eq!(quote_amount_out(dec!(2), rate), dec!(4900));
        assert_eq!(exchange_rate(dec!(2450), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_demo_positions_bands() {
        let ctx = pool_by_id("ETH-USDC").unwrap().context(dec!(2450));
        let positions = demo_positions(&ctx);

        assert_eq!(positions.len(), 3);
        assert_eq!(positions[0].price_min, dec!(2450));
        assert!(positions[0].is_active);
        assert!(positions[1].amount_x.is_zero());
        assert!(positions[2].amount_y.is_zero());
        assert!(positions.iter().all(|p| p.price_min < p.price_max));
    }
}
