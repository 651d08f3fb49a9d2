//! Trendline-break exit.
//!
//! Each open position gets a support (buy) or resistance (sell) line anchored
//! at its entry candle's extreme and walked forward at a fixed slope. When a
//! close falls through the line by more than the threshold band, every open
//! position is closed.

use super::{Rule, RuleContext, RuleError};
use crate::domain::{index_of_timestamp, Position, Side};

/// Fractional move of the trendline per bar.
pub const TRENDLINE_SLOPE_PER_BAR: f64 = 0.001;

pub const TRENDLINE_BREAK_REASON: &str = "Trendline Break";

#[derive(Debug, Clone)]
pub struct TrendlineBreakRule {
    threshold_pct: f64,
}

impl TrendlineBreakRule {
    pub fn new(threshold_pct: f64) -> Self {
        assert!(threshold_pct >= 0.0, "threshold_pct must be >= 0");
        Self { threshold_pct }
    }

    /// Trendline level for `position` at step `index`, if its entry candle is in the series.
    fn line_level(ctx: &RuleContext<'_>, position: &Position) -> Option<f64> {
        let entry_index = index_of_timestamp(ctx.data, position.entry_timestamp)?;
        if entry_index > ctx.index {
            return None;
        }
        let bars = (ctx.index - entry_index) as f64;
        let entry = &ctx.data[entry_index];
        Some(match position.side {
            Side::Buy => entry.low * (1.0 + TRENDLINE_SLOPE_PER_BAR * bars),
            Side::Sell => entry.high * (1.0 - TRENDLINE_SLOPE_PER_BAR * bars),
        })
    }

    fn breached(&self, ctx: &RuleContext<'_>, position: &Position) -> bool {
        let Some(line) = Self::line_level(ctx, position) else {
            return false;
        };
        let band = self.threshold_pct / 100.0;
        let close = ctx.price();
        match position.side {
            Side::Buy => close < line * (1.0 - band),
            Side::Sell => close > line * (1.0 + band),
        }
    }
}

impl Rule for TrendlineBreakRule {
    fn name(&self) -> &str {
        "Trendline Break"
    }

    fn condition(&self, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        Ok(ctx
            .account
            .positions()
            .iter()
            .any(|p| self.breached(ctx, p)))
    }

    fn action(&mut self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let (ts, price) = (ctx.timestamp(), ctx.price());
        ctx.account.close_all(ts, price, TRENDLINE_BREAK_REASON);
        Ok(())
    }
}
