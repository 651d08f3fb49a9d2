//! Aggregate performance statistics for an account.

use serde::{Deserialize, Serialize};

use super::Account;
use crate::domain::EquityPoint;

/// Snapshot of account performance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountStats {
    pub initial_balance: f64,
    pub balance: f64,
    pub equity: f64,
    /// `(equity - initial) / initial · 100`.
    pub percent_return: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub open_positions: usize,
    /// Winners as a percentage of all trades (0 with no trades).
    pub win_rate: f64,
    /// Mean PnL of winning trades (0 with none).
    pub avg_win: f64,
    /// Mean PnL of losing trades, a negative number (0 with none).
    pub avg_loss: f64,
    /// `|avg_win / avg_loss|`, 0 when `avg_loss` is 0.
    pub profit_factor: f64,
    /// Largest peak-to-trough drop of the equity curve, in currency.
    pub max_drawdown: f64,
    /// That drop as a percentage of its peak.
    pub max_drawdown_percent: f64,
}

impl AccountStats {
    pub fn compute(account: &Account) -> Self {
        let trades = account.trades();
        let initial = account.initial_balance();
        let equity = account.equity();

        let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();

        let win_rate = if trades.is_empty() {
            0.0
        } else {
            wins.len() as f64 / trades.len() as f64 * 100.0
        };
        let avg_win = mean(&wins);
        let avg_loss = mean(&losses);
        let profit_factor = if avg_loss == 0.0 {
            0.0
        } else {
            (avg_win / avg_loss).abs()
        };
        let percent_return = if initial == 0.0 {
            0.0
        } else {
            (equity - initial) / initial * 100.0
        };

        let dd = max_drawdown(initial, account.equity_curve());

        Self {
            initial_balance: initial,
            balance: account.balance(),
            equity,
            percent_return,
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            open_positions: account.positions().len(),
            win_rate,
            avg_win,
            avg_loss,
            profit_factor,
            max_drawdown: dd.amount,
            max_drawdown_percent: dd.percent,
        }
    }
}

/// Largest peak-to-trough decline.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Drawdown {
    pub amount: f64,
    pub percent: f64,
}

/// Maximum drawdown over the whole curve, with the running peak seeded at `initial`.
///
/// Walks the entire history on every call.
pub fn max_drawdown(initial: f64, curve: &[EquityPoint]) -> Drawdown {
    let mut peak = initial;
    let mut worst = Drawdown::default();

    for point in curve {
        if point.value > peak {
            peak = point.value;
        }
        let drop = peak - point.value;
        if drop > worst.amount {
            worst.amount = drop;
            worst.percent = if peak > 0.0 { drop / peak * 100.0 } else { 0.0 };
        }
    }
    worst
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
