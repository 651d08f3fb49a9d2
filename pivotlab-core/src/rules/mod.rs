//! Trading rules: observe each step, open and close positions through the account.
//!
//! A rule is evaluated in three calls per step:
//! 1. `prepare` refreshes any state the rule caches about the market (pivots, setups)
//! 2. `condition` decides whether to act; it sees the account read-only
//! 3. `action` runs only when the condition holds and may mutate the account
//!
//! The [`RuleEngine`] is the single dispatch point. It evaluates every rule
//! every step in insertion order and contains failures per rule.

pub mod angle_intersection;
pub mod config;
pub mod engine;
pub mod pivot_angle;
pub mod take_profit_stop_loss;
pub mod trendline_break;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::account::Account;
use crate::domain::{Candle, Side};
use crate::geometry::PivotKind;

pub use angle_intersection::{AngleIntersectionRule, Touch};
pub use config::{build_rules, RuleConfig, RuleConfigError};
pub use engine::{EvaluationSummary, RuleEngine, RuleStats, RuleStatus};
pub use pivot_angle::PivotAngleRule;
pub use take_profit_stop_loss::TakeProfitStopLossRule;
pub use trendline_break::TrendlineBreakRule;

/// Failure raised from inside a rule's condition or action.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("candle index {index} outside series of {len} candles")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("rule panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

/// Everything a rule may look at during one step.
///
/// Rebuilt by the engine every step. `data` is the full series; rules that
/// must not look ahead use [`RuleContext::history`].
pub struct RuleContext<'a> {
    pub index: usize,
    pub candle: Candle,
    pub data: &'a [Candle],
    pub account: &'a mut Account,
}

impl<'a> RuleContext<'a> {
    /// Build a context for step `index`. Fails if `index` is outside `data`.
    pub fn new(index: usize, data: &'a [Candle], account: &'a mut Account) -> Result<Self, RuleError> {
        let candle = *data.get(index).ok_or(RuleError::IndexOutOfRange {
            index,
            len: data.len(),
        })?;
        Ok(Self {
            index,
            candle,
            data,
            account,
        })
    }

    /// Candles up to and including the current one.
    pub fn history(&self) -> &[Candle] {
        &self.data[..=self.index]
    }

    pub fn timestamp(&self) -> i64 {
        self.candle.timestamp
    }

    pub fn price(&self) -> f64 {
        self.candle.close
    }
}

/// Trait for trading rules.
pub trait Rule: Send {
    /// Human-readable name, used in logs and status reports.
    fn name(&self) -> &str;

    /// Fewest candles a series must have for this rule to ever fire.
    fn min_candles(&self) -> usize {
        1
    }

    /// Refresh cached market state. Called every step before `condition`.
    fn prepare(&mut self, _ctx: &RuleContext<'_>) -> Result<(), RuleError> {
        Ok(())
    }

    /// Pure predicate over the step context.
    fn condition(&self, ctx: &RuleContext<'_>) -> Result<bool, RuleError>;

    /// Side effects, through the account API only.
    fn action(&mut self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError>;

    /// Forget cached state before a fresh run.
    fn reset(&mut self) {}
}

/// Trade direction an entry rule looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    pub fn side(&self) -> Side {
        match self {
            Direction::Up => Side::Buy,
            Direction::Down => Side::Sell,
        }
    }

    /// Pivot kind that completes a leg in this direction.
    pub fn pivot_kind(&self) -> PivotKind {
        match self {
            Direction::Up => PivotKind::High,
            Direction::Down => PivotKind::Low,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
        }
    }
}

/// Position size spending `allocation_pct` percent of the current balance at `price`.
pub(crate) fn allocation_size(account: &Account, price: f64, allocation_pct: f64) -> f64 {
    if price <= 0.0 {
        return 0.0;
    }
    account.balance() * allocation_pct / 100.0 / price
}
