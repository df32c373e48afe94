//! Add/remove liquidity lifecycle for per-bin positions
//!
//! ```text
//! Viewing --request_exit (>=2 positions)--> Selecting --select_exit_bin--> Managing
//! Viewing --request_exit (1 position)----------------------------------> Managing(Remove)
//! Viewing --open_manage--------------------------------------------------> Managing
//! Managing --confirm / cancel--> Viewing
//! ```
//!
//! The transient inputs of a managing session (percentage, pending deposit)
//! live inside the `Managing` state and are rebuilt every time a bin is
//! opened, so nothing carries over from one bin to the next.

use log::{debug, info};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregator::{self, PortfolioSummary};
use crate::error::LiquidityError;
use crate::types::{PoolContext, UserBinPosition};
use crate::LiquidityResult;

/// Withdrawal percentage preselected when a bin is opened
pub const DEFAULT_REMOVE_PERCENTAGE: Decimal = dec!(50);

/// Amounts below this are treated as empty when closing a position
pub const DUST_AMOUNT: Decimal = dec!(0.000000000001);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManageMode {
    Add,
    Remove,
}

/// Inputs of the bin currently being managed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManageSession {
    bin_id: i32,
    mode: ManageMode,
    percentage: Decimal,
    pending_x: Decimal,
    pending_y: Decimal,
}

impl ManageSession {
    fn open(bin_id: i32, mode: ManageMode) -> Self {
        Self {
            bin_id,
            mode,
            percentage: DEFAULT_REMOVE_PERCENTAGE,
            pending_x: Decimal::ZERO,
            pending_y: Decimal::ZERO,
        }
    }

    pub fn bin_id(&self) -> i32 {
        self.bin_id
    }

    pub fn mode(&self) -> ManageMode {
        self.mode
    }

    pub fn percentage(&self) -> Decimal {
        self.percentage
    }

    pub fn pending_amounts(&self) -> (Decimal, Decimal) {
        (self.pending_x, self.pending_y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManagerState {
    Viewing,
    /// Choosing which of several positions to exit
    Selecting,
    Managing(ManageSession),
}

/// Result of a confirmed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ManageOutcome {
    Withdrawn {
        bin_id: i32,
        amount_x: Decimal,
        amount_y: Decimal,
        /// The position was emptied and deleted
        closed: bool,
    },
    Deposited {
        bin_id: i32,
        amount_x: Decimal,
        amount_y: Decimal,
        /// A new position was opened in a previously empty bin
        created: bool,
    },
}

/// Owns one user's positions in one pool and the managing workflow over them
#[derive(Debug, Clone)]
pub struct PositionManager {
    ctx: PoolContext,
    positions: BTreeMap<i32, UserBinPosition>,
    state: ManagerState,
}

impl PositionManager {
    pub fn new(ctx: PoolContext) -> Self {
        Self {
            ctx,
            positions: BTreeMap::new(),
            state: ManagerState::Viewing,
        }
    }

    /// Start from existing position records. Later records for the same bin
    /// replace earlier ones; empty records are dropped.
    pub fn with_positions<I>(ctx: PoolContext, positions: I) -> Self
    where
        I: IntoIterator<Item = UserBinPosition>,
    {
        let mut manager = Self::new(ctx);
        for mut position in positions {
            if position.is_empty() {
                continue;
            }
            position.is_active = position.bin_id == ctx.active_bin_id;
            manager.positions.insert(position.bin_id, position);
        }
        manager
    }

    pub fn context(&self) -> &PoolContext {
        &self.ctx
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    pub fn session(&self) -> Option<&ManageSession> {
        match &self.state {
            ManagerState::Managing(session) => Some(session),
            _ => None,
        }
    }

    /// Positions ordered by bin id
    pub fn positions(&self) -> impl Iterator<Item = &UserBinPosition> {
        self.positions.values()
    }

    pub fn position(&self, bin_id: i32) -> Option<&UserBinPosition> {
        self.positions.get(&bin_id)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Replace the pool snapshot, e.g. after a price update
    pub fn update_context(&mut self, ctx: PoolContext) {
        self.ctx = ctx;
        for position in self.positions.values_mut() {
            position.is_active = position.bin_id == ctx.active_bin_id;
        }
    }

    pub fn update_price(&mut self, current_price: Decimal) {
        self.ctx.current_price = current_price;
    }

    pub fn summary(&self) -> PortfolioSummary {
        aggregator::summarize(
            self.positions.values(),
            self.ctx.current_price,
            self.ctx.active_bin_id,
        )
    }

    /// Exit liquidity: a single position opens straight into removal, several
    /// positions open the selection step, none does nothing.
    pub fn request_exit(&mut self) -> LiquidityResult<()> {
        self.expect_viewing("request exit")?;

        match self.positions.len() {
            0 => debug!("Exit requested with no open positions"),
            1 => {
                let only = self.positions.keys().next().copied();
                if let Some(bin_id) = only {
                    self.enter_managing(bin_id, ManageMode::Remove);
                }
            }
            count => {
                debug!("Exit requested across {} positions, selecting", count);
                self.state = ManagerState::Selecting;
            }
        }
        Ok(())
    }

    /// Pick the bin to exit from the selection step
    pub fn select_exit_bin(&mut self, bin_id: i32) -> LiquidityResult<()> {
        if self.state != ManagerState::Selecting {
            return Err(self.invalid_transition("select exit bin"));
        }
        if !self.positions.contains_key(&bin_id) {
            return Err(LiquidityError::PositionNotFound(bin_id));
        }
        self.enter_managing(bin_id, ManageMode::Remove);
        Ok(())
    }

    /// Open a bin for management. Removal needs an existing position; a
    /// deposit may target any bin.
    pub fn open_manage(&mut self, bin_id: i32, mode: ManageMode) -> LiquidityResult<()> {
        if self.state == ManagerState::Selecting {
            return Err(self.invalid_transition("open manage"));
        }
        if mode == ManageMode::Remove && !self.positions.contains_key(&bin_id) {
            return Err(LiquidityError::PositionNotFound(bin_id));
        }
        self.enter_managing(bin_id, mode);
        Ok(())
    }

    pub fn set_mode(&mut self, mode: ManageMode) -> LiquidityResult<()> {
        let has_position = self
            .session()
            .map(|session| self.positions.contains_key(&session.bin_id));
        let session = self.session_mut("set mode")?;

        if mode == ManageMode::Remove && has_position == Some(false) {
            return Err(LiquidityError::PositionNotFound(session.bin_id));
        }
        session.mode = mode;
        Ok(())
    }

    /// Set the withdrawal percentage, clamped to `[0, 100]`
    pub fn set_percentage(&mut self, percentage: Decimal) -> LiquidityResult<()> {
        let session = self.session_mut("set percentage")?;
        session.percentage = percentage.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED);
        Ok(())
    }

    /// Set the pending deposit. Bins above the active bin only take token X,
    /// bins below only take token Y.
    pub fn set_add_amounts(&mut self, amount_x: Decimal, amount_y: Decimal) -> LiquidityResult<()> {
        if amount_x.is_sign_negative() || amount_y.is_sign_negative() {
            return Err(LiquidityError::InvalidAmount(format!(
                "deposit amounts must be non-negative (x: {}, y: {})",
                amount_x, amount_y
            )));
        }

        let ctx = self.ctx;
        let session = self.session_mut("set add amounts")?;
        check_side(&ctx, session.bin_id, amount_x, amount_y)?;

        session.pending_x = amount_x;
        session.pending_y = amount_y;
        Ok(())
    }

    /// Apply the session and return to viewing
    pub fn confirm(&mut self) -> LiquidityResult<ManageOutcome> {
        let session = self
            .session()
            .cloned()
            .ok_or_else(|| self.invalid_transition("confirm"))?;

        let outcome = match session.mode {
            ManageMode::Remove => self.apply_withdrawal(&session)?,
            ManageMode::Add => self.apply_deposit(&session)?,
        };

        self.state = ManagerState::Viewing;
        Ok(outcome)
    }

    /// Leave selection or management without changes
    pub fn cancel(&mut self) {
        if self.state != ManagerState::Viewing {
            debug!("Cancelled, back to viewing");
        }
        self.state = ManagerState::Viewing;
    }

    fn apply_withdrawal(&mut self, session: &ManageSession) -> LiquidityResult<ManageOutcome> {
        let position = self
            .positions
            .get_mut(&session.bin_id)
            .ok_or(LiquidityError::PositionNotFound(session.bin_id))?;

        let fraction = session.percentage / Decimal::ONE_HUNDRED;
        let withdrawn_x = position.amount_x * fraction;
        let withdrawn_y = position.amount_y * fraction;
        let remaining_x = (position.amount_x - withdrawn_x).max(Decimal::ZERO);
        let remaining_y = (position.amount_y - withdrawn_y).max(Decimal::ZERO);

        let closed = remaining_x < DUST_AMOUNT && remaining_y < DUST_AMOUNT;
        if closed {
            self.positions.remove(&session.bin_id);
        } else {
            position.amount_x = remaining_x;
            position.amount_y = remaining_y;
        }

        info!(
            "Withdrew {}% from bin {}: {} X, {} Y{}",
            session.percentage,
            session.bin_id,
            withdrawn_x,
            withdrawn_y,
            if closed { " (position closed)" } else { "" }
        );

        Ok(ManageOutcome::Withdrawn {
            bin_id: session.bin_id,
            amount_x: withdrawn_x,
            amount_y: withdrawn_y,
            closed,
        })
    }

    fn apply_deposit(&mut self, session: &ManageSession) -> LiquidityResult<ManageOutcome> {
        let (amount_x, amount_y) = session.pending_amounts();
        if amount_x.is_zero() && amount_y.is_zero() {
            return Err(LiquidityError::NothingToDeposit);
        }
        // The active bin may have moved since the amounts were entered
        check_side(&self.ctx, session.bin_id, amount_x, amount_y)?;

        let created = !self.positions.contains_key(&session.bin_id);
        let ctx = self.ctx;
        let position = self.positions.entry(session.bin_id).or_insert_with(|| {
            let (price_min, price_max) = ctx.bin_price_range(session.bin_id);
            UserBinPosition {
                bin_id: session.bin_id,
                amount_x: Decimal::ZERO,
                amount_y: Decimal::ZERO,
                price_min,
                price_max,
                is_active: session.bin_id == ctx.active_bin_id,
            }
        });
        position.amount_x += amount_x;
        position.amount_y += amount_y;

        info!(
            "Deposited {} X, {} Y into bin {}{}",
            amount_x,
            amount_y,
            session.bin_id,
            if created { " (new position)" } else { "" }
        );

        Ok(ManageOutcome::Deposited {
            bin_id: session.bin_id,
            amount_x,
            amount_y,
            created,
        })
    }

    fn enter_managing(&mut self, bin_id: i32, mode: ManageMode) {
        debug!("Managing bin {} ({:?})", bin_id, mode);
        self.state = ManagerState::Managing(ManageSession::open(bin_id, mode));
    }

    fn expect_viewing(&self, action: &str) -> LiquidityResult<()> {
        if self.state != ManagerState::Viewing {
            return Err(self.invalid_transition(action));
        }
        Ok(())
    }

    fn session_mut(&mut self, action: &str) -> LiquidityResult<&mut ManageSession> {
        match &mut self.state {
            ManagerState::Managing(session) => Ok(session),
            other => Err(LiquidityError::InvalidTransition(format!(
                "cannot {} while {}",
                action,
                state_label(other)
            ))),
        }
    }

    fn invalid_transition(&self, action: &str) -> LiquidityError {
        LiquidityError::InvalidTransition(format!(
            "cannot {} while {}",
            action,
            state_label(&self.state)
        ))
    }
}

/// Bins above the active bin only take token X, bins below only token Y
fn check_side(
    ctx: &PoolContext,
    bin_id: i32,
    amount_x: Decimal,
    amount_y: Decimal,
) -> LiquidityResult<()> {
    let side = ctx.bin_side(bin_id);
    let rejected = if !amount_x.is_zero() && !side.accepts_x() {
        Some('X')
    } else if !amount_y.is_zero() && !side.accepts_y() {
        Some('Y')
    } else {
        None
    };

    match rejected {
        Some(token) => Err(LiquidityError::SideNotAccepted {
            bin_id,
            active_bin_id: ctx.active_bin_id,
            token,
        }),
        None => Ok(()),
    }
}

fn state_label(state: &ManagerState) -> &'static str {
    match state {
        ManagerState::Viewing => "viewing",
        ManagerState::Selecting => "selecting",
        ManagerState::Managing(_) => "managing",
    }
}
