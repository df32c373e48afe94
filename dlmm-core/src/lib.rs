//! DLMM Liquidity Core
//!
//! Calculation engine for bin-based liquidity pools:
//! - price <-> bin id conversion (`bin_math`)
//! - liquidity shapes over a materialized bin window (`distribution`)
//! - position totals and composition (`aggregator`)
//! - add/remove lifecycle of per-bin positions (`position_manager`)
//! - chart series merging market and user liquidity (`chart`)
//!
//! Everything except `price_feed` is synchronous and pure over its inputs.
//! Consumers recompute wholesale whenever a parameter or the price changes.

pub mod aggregator;
pub mod bin_math;
pub mod chart;
pub mod distribution;
pub mod error;
pub mod position_manager;
pub mod price_feed;
pub mod reference;
pub mod types;

pub use aggregator::{BinComposition, PortfolioSummary};
pub use chart::{ChartPoint, ChartSeries};
pub use distribution::{DistributionConfig, LiquidityShape, NoiseConfig, Radius};
pub use error::LiquidityError;
pub use position_manager::{
    ManageMode, ManageOutcome, ManageSession, ManagerState, PositionManager,
};
pub use price_feed::{
    CoinGeckoSource, PriceSnapshot, PriceSource, SpotPriceFeed, StaticPriceSource,
};
pub use types::*;

/// Re-export common result type for convenience
pub type LiquidityResult<T> = std::result::Result<T, LiquidityError>;
