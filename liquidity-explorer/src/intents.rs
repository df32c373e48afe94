//! Scripted presentation intents for the position state machine
//!
//! Each intent is a short token, e.g. `open:+3:add`, `amounts:0.5:0`,
//! `confirm`. Bin references are offsets from the active bin (`+3`, `-5`,
//! `0`) or absolute ids prefixed with `@`.
//!
//! `move:B` and `price:P` simulate the market between steps: the first shifts
//! the active bin (and the current price with it), the second reprices the
//! pool without moving the active bin.

use anyhow::{anyhow, Context, Result};
use dlmm_liquidity_core::{ManageMode, ManageOutcome, PoolContext, PositionManager};
use log::debug;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq)]
pub enum BinRef {
    Offset(i32),
    Absolute(i32),
}

impl BinRef {
    pub fn resolve(&self, active_bin_id: i32) -> i32 {
        match self {
            BinRef::Offset(offset) => active_bin_id.saturating_add(*offset),
            BinRef::Absolute(bin_id) => *bin_id,
        }
    }
}

impl FromStr for BinRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(absolute) = s.strip_prefix('@') {
            return Ok(BinRef::Absolute(absolute.parse()?));
        }
        let offset = s.strip_prefix('+').unwrap_or(s);
        Ok(BinRef::Offset(
            offset.parse().with_context(|| format!("invalid bin reference: {}", s))?,
        ))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    RequestExit,
    SelectExit(BinRef),
    Open(BinRef, ManageMode),
    Mode(ManageMode),
    Percent(Decimal),
    Amounts(Decimal, Decimal),
    Confirm,
    Cancel,
    MoveActive(BinRef),
    Price(Decimal),
}

fn parse_mode(s: &str) -> Result<ManageMode> {
    match s.to_lowercase().as_str() {
        "add" => Ok(ManageMode::Add),
        "remove" => Ok(ManageMode::Remove),
        _ => Err(anyhow!("Invalid mode: {}. Use 'add' or 'remove'", s)),
    }
}

impl FromStr for Intent {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let intent = match parts.as_slice() {
            ["exit"] => Intent::RequestExit,
            ["select", bin] => Intent::SelectExit(bin.parse()?),
            ["open", bin] => Intent::Open(bin.parse()?, ManageMode::Remove),
            ["open", bin, mode] => Intent::Open(bin.parse()?, parse_mode(mode)?),
            ["mode", mode] => Intent::Mode(parse_mode(mode)?),
            ["percent", pct] => Intent::Percent(Decimal::from_str(pct)?),
            ["amounts", x, y] => Intent::Amounts(Decimal::from_str(x)?, Decimal::from_str(y)?),
            ["confirm"] => Intent::Confirm,
            ["cancel"] => Intent::Cancel,
            ["move", bin] => Intent::MoveActive(bin.parse()?),
            ["price", price] => {
                let price = Decimal::from_str(price)?;
                if price.is_sign_negative() {
                    return Err(anyhow!("Price must not be negative: {}", s));
                }
                Intent::Price(price)
            }
            _ => return Err(anyhow!("Unrecognized intent: {}", s)),
        };
        Ok(intent)
    }
}

/// Apply one intent. Confirmations return their outcome.
pub fn apply(manager: &mut PositionManager, intent: &Intent) -> Result<Option<ManageOutcome>> {
    debug!("Applying {:?}", intent);
    let active_bin_id = manager.context().active_bin_id;

    match intent {
        Intent::RequestExit => manager.request_exit()?,
        Intent::SelectExit(bin) => manager.select_exit_bin(bin.resolve(active_bin_id))?,
        Intent::Open(bin, mode) => manager.open_manage(bin.resolve(active_bin_id), *mode)?,
        Intent::Mode(mode) => manager.set_mode(*mode)?,
        Intent::Percent(pct) => manager.set_percentage(*pct)?,
        Intent::Amounts(x, y) => manager.set_add_amounts(*x, *y)?,
        Intent::Confirm => return Ok(Some(manager.confirm()?)),
        Intent::Cancel => manager.cancel(),
        Intent::MoveActive(bin) => {
            let ctx = *manager.context();
            let active_bin_id = bin.resolve(active_bin_id);
            manager.update_context(PoolContext {
                active_bin_id,
                current_price: ctx.price_of_bin(active_bin_id),
                ..ctx
            });
        }
        Intent::Price(price) => manager.update_price(*price),
    }
    Ok(None)
}

/// Apply intents in order, collecting the outcome of every confirmation
pub fn run(manager: &mut PositionManager, intents: &[Intent]) -> Result<Vec<ManageOutcome>> {
    let mut outcomes = Vec::new();
    for (step, intent) in intents.iter().enumerate() {
        if let Some(outcome) = apply(manager, intent)
            .with_context(|| format!("intent {} ({:?}) failed", step + 1, intent))?
        {
            outcomes.push(outcome);
        }
    }
    Ok(outcomes)
}

/// Single JSON document describing a finished script
pub fn report(manager: &PositionManager, outcomes: &[ManageOutcome]) -> Value {
    json!({
        "outcomes": outcomes,
        "state": manager.state(),
        "context": manager.context(),
        "summary": manager.summary(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlmm_liquidity_core::{ManagerState, PoolContext};
    use rust_decimal_macros::dec;

    fn manager() -> PositionManager {
        PositionManager::new(PoolContext {
            active_bin_id: 100,
            bin_step: 10,
            current_price: dec!(2450),
        })
    }

    #[test]
    fn test_parse_intents() {
        assert_eq!("exit".parse::<Intent>().unwrap(), Intent::RequestExit);
        assert_eq!(
            "open:+3:add".parse::<Intent>().unwrap(),
            Intent::Open(BinRef::Offset(3), ManageMode::Add)
        );
        assert_eq!(
            "select:@8388608".parse::<Intent>().unwrap(),
            Intent::SelectExit(BinRef::Absolute(8_388_608))
        );
        assert_eq!(
            "amounts:0.5:0".parse::<Intent>().unwrap(),
            Intent::Amounts(dec!(0.5), Decimal::ZERO)
        );
        assert!("open:x".parse::<Intent>().is_err());
        assert!("withdraw".parse::<Intent>().is_err());
        assert_eq!(
            "move:-4".parse::<Intent>().unwrap(),
            Intent::MoveActive(BinRef::Offset(-4))
        );
        assert_eq!("price:2500".parse::<Intent>().unwrap(), Intent::Price(dec!(2500)));
        assert!("price:-1".parse::<Intent>().is_err());
    }

    #[test]
    fn test_market_move_blocks_stale_deposit() {
        let mut manager = manager();
        let script = ["open:+3:add", "amounts:1:0", "move:+10"];
        for step in script {
            apply(&mut manager, &step.parse().unwrap()).unwrap();
        }

        let ctx = manager.context();
        assert_eq!(ctx.active_bin_id, 110);
        assert!(ctx.current_price > dec!(2450));
        assert!(apply(&mut manager, &Intent::Confirm).is_err());
        assert!(manager.position(103).is_none());

        apply(&mut manager, &"amounts:0:100".parse().unwrap()).unwrap();
        assert!(apply(&mut manager, &Intent::Confirm).unwrap().is_some());
        assert_eq!(manager.position(103).unwrap().amount_y, dec!(100));
    }

    #[test]
    fn test_report_is_one_json_document() {
        let mut manager = manager();
        let script: Vec<Intent> = ["open:-1:add", "amounts:0:500", "confirm", "exit", "confirm"]
            .iter()
            .map(|step| step.parse().unwrap())
            .collect();

        let outcomes = run(&mut manager, &script).unwrap();
        let rendered = serde_json::to_string_pretty(&report(&manager, &outcomes)).unwrap();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(parsed["outcomes"].as_array().unwrap().len(), 2);
        assert!(parsed["outcomes"][0].get("Deposited").is_some());
        assert!(parsed["outcomes"][1].get("Withdrawn").is_some());
        assert_eq!(parsed["state"], "Viewing");
        assert_eq!(parsed["context"]["active_bin_id"], 100);
        assert_eq!(parsed["summary"]["bins"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_run_reports_failing_step() {
        let mut manager = manager();
        let script: Vec<Intent> = ["exit", "confirm"].iter().map(|s| s.parse().unwrap()).collect();

        let err = run(&mut manager, &script).unwrap_err();
        assert!(err.to_string().starts_with("intent 2"));
    }

    #[test]
    fn test_price_intent_revalues() {
        let mut manager = manager();
        for step in ["open:0:add", "amounts:1:0", "confirm", "price:3000"] {
            apply(&mut manager, &step.parse().unwrap()).unwrap();
        }
        assert_eq!(manager.context().active_bin_id, 100);
        assert_eq!(manager.summary().total_value, dec!(3000));
    }

    #[test]
    fn test_script_deposit_then_withdraw() {
        let mut manager = manager();
        let script = ["open:-2:add", "amounts:0:400", "confirm", "exit", "percent:25", "confirm"];

        let outcomes: Vec<ManageOutcome> = script
            .iter()
            .filter_map(|step| apply(&mut manager, &step.parse().unwrap()).unwrap())
            .collect();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(manager.position(98).unwrap().amount_y, dec!(300));
        assert_eq!(manager.state(), &ManagerState::Viewing);
    }
}
