//! Percent-based take-profit / stop-loss exit.

use super::{Rule, RuleContext, RuleError};
use crate::domain::{Position, PositionId};

#[derive(Debug, Clone)]
pub struct TakeProfitStopLossRule {
    name: String,
    take_profit: f64,
    stop_loss: f64,
}

impl TakeProfitStopLossRule {
    /// `take_profit` and `stop_loss` are positive percentages of entry value.
    pub fn new(take_profit: f64, stop_loss: f64) -> Self {
        assert!(take_profit > 0.0, "take_profit must be positive");
        assert!(stop_loss > 0.0, "stop_loss must be positive");
        Self {
            name: format!("Take Profit {take_profit}% / Stop Loss {stop_loss}%"),
            take_profit,
            stop_loss,
        }
    }

    fn exit_reason(&self, position: &Position) -> Option<String> {
        let pct = position.pnl_percent();
        if pct >= self.take_profit {
            Some(format!("Take Profit ({}%)", self.take_profit))
        } else if pct <= -self.stop_loss {
            Some(format!("Stop Loss ({}%)", self.stop_loss))
        } else {
            None
        }
    }
}

impl Rule for TakeProfitStopLossRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn condition(&self, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        Ok(ctx
            .account
            .positions()
            .iter()
            .any(|p| self.exit_reason(p).is_some()))
    }

    fn action(&mut self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let exits: Vec<(PositionId, String)> = ctx
            .account
            .positions()
            .iter()
            .filter_map(|p| self.exit_reason(p).map(|reason| (p.id, reason)))
            .collect();

        let (ts, price) = (ctx.timestamp(), ctx.price());
        for (id, reason) in exits {
            ctx.account.close_position(id, ts, price, &reason);
        }
        Ok(())
    }
}
