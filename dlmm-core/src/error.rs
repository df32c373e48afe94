//! Error types for the liquidity core

use thiserror::Error;

/// Liquidity core errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LiquidityError {
    #[error("Invalid bin step: {0}")]
    InvalidBinStep(u16),

    #[error("Invalid concentration radius: {0} (expected 1..=30)")]
    InvalidRadius(u32),

    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Pool needs two distinct tokens, got {0} twice")]
    IdenticalTokens(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Bin {bin_id} does not accept token {token} (active bin {active_bin_id})")]
    SideNotAccepted {
        bin_id: i32,
        active_bin_id: i32,
        token: char,
    },

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Position not found in bin {0}")]
    PositionNotFound(i32),

    #[error("Nothing to deposit")]
    NothingToDeposit,

    #[error("Unknown liquidity shape: {0}")]
    UnknownShape(String),

    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    #[error("Price feed error: {0}")]
    PriceFeed(String),
}

/// Convert from reqwest errors
impl From<reqwest::Error> for LiquidityError {
    fn from(err: reqwest::Error) -> Self {
        LiquidityError::PriceFeed(err.to_string())
    }
}
