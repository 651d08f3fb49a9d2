//! Simulated account: cash balance, open positions, closed trades, equity curve.
//!
//! Full-collateral model: a buy's cost leaves the balance when it opens and its
//! exit value returns when it closes. Sells are opened at zero upfront cost and
//! only their realized PnL is credited on close. The recorded equity is always
//! `balance + Σ unrealized pnl` of the positions open at that moment.

pub mod stats;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{EquityPoint, IdGen, Position, PositionId, Side, Trade};

pub use stats::{max_drawdown, AccountStats, Drawdown};

/// Ledger of one simulated trading account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "AccountRecord")]
pub struct Account {
    initial_balance: f64,
    balance: f64,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    #[serde(skip)]
    id_gen: IdGen,
}

/// Serialized form of [`Account`]; the id generator is rebuilt on load.
#[derive(Deserialize)]
struct AccountRecord {
    initial_balance: f64,
    balance: f64,
    positions: Vec<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl From<AccountRecord> for Account {
    fn from(record: AccountRecord) -> Self {
        let last_id = record
            .positions
            .iter()
            .map(|p| p.id)
            .chain(record.trades.iter().map(|t| t.id))
            .max()
            .unwrap_or(PositionId(0));
        Self {
            initial_balance: record.initial_balance,
            balance: record.balance,
            positions: record.positions,
            trades: record.trades,
            equity_curve: record.equity_curve,
            id_gen: IdGen::after(last_id),
        }
    }
}

impl Account {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            balance: initial_balance,
            positions: Vec::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            id_gen: IdGen::default(),
        }
    }

    /// Back to the initial balance with no positions, trades or history.
    pub fn reset(&mut self) {
        *self = Self::new(self.initial_balance);
    }

    /// Open a position. Returns `None`, leaving the account untouched, when the
    /// inputs are invalid or a buy costs more than the current balance.
    pub fn open_position(
        &mut self,
        timestamp: i64,
        price: f64,
        side: Side,
        size: f64,
        reason: &str,
    ) -> Option<PositionId> {
        if !(price.is_finite() && price > 0.0 && size.is_finite() && size > 0.0) {
            warn!(price, size, reason, "rejected position with invalid price or size");
            return None;
        }

        if side == Side::Buy {
            let cost = price * size;
            if cost > self.balance {
                warn!(
                    cost,
                    balance = self.balance,
                    reason,
                    "insufficient funds to open position"
                );
                return None;
            }
            self.balance -= cost;
        }

        let id = self.id_gen.next_position_id();
        self.positions
            .push(Position::open(id, timestamp, price, side, size, reason));
        debug!(%id, ?side, price, size, reason, "opened position");
        Some(id)
    }

    /// Close the open position `id` at `price`. Returns false if no such open position exists.
    pub fn close_position(&mut self, id: PositionId, timestamp: i64, price: f64, reason: &str) -> bool {
        let Some(slot) = self.positions.iter().position(|p| p.id == id) else {
            return false;
        };
        let mut position = self.positions.remove(slot);
        position.close(price);

        let trade = Trade::from_close(&position, timestamp, price, reason);
        match position.side {
            Side::Buy => self.balance += price * position.size,
            Side::Sell => self.balance += trade.pnl,
        }

        debug!(%id, price, pnl = trade.pnl, reason, "closed position");
        self.trades.push(trade);
        self.record_equity(timestamp);
        true
    }

    /// Close every open position at `price`. Returns how many were closed.
    pub fn close_all(&mut self, timestamp: i64, price: f64, reason: &str) -> usize {
        let ids: Vec<PositionId> = self.positions.iter().map(|p| p.id).collect();
        ids.into_iter()
            .filter(|&id| self.close_position(id, timestamp, price, reason))
            .count()
    }

    /// Mark every open position to `price` and record an equity point.
    pub fn update_positions(&mut self, timestamp: i64, price: f64) {
        self.mark_positions(price);
        self.record_equity(timestamp);
    }

    /// Mark every open position to `price` without touching the equity curve.
    pub fn mark_positions(&mut self, price: f64) {
        for position in &mut self.positions {
            position.mark(price);
        }
    }

    fn record_equity(&mut self, timestamp: i64) {
        let value = self.equity();
        self.equity_curve.push(EquityPoint { timestamp, value });
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.positions.iter().map(|p| p.pnl).sum()
    }

    /// Current balance plus unrealized PnL of open positions.
    pub fn equity(&self) -> f64 {
        self.balance + self.unrealized_pnl()
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.iter().find(|p| p.id == id)
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Aggregate statistics, recomputed from the full history on every call.
    pub fn stats(&self) -> AccountStats {
        AccountStats::compute(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_deducts_cost_and_close_credits_exit_value() {
        let mut account = Account::new(10_000.0);
        let id = account.open_position(0, 100.0, Side::Buy, 10.0, "entry").unwrap();
        assert_eq!(account.balance(), 9_000.0);
        assert_eq!(account.positions().len(), 1);

        assert!(account.close_position(id, 1, 110.0, "exit"));
        assert_eq!(account.balance(), 10_100.0);
        assert_eq!(account.trades().len(), 1);
        assert_eq!(account.trades()[0].pnl, 100.0);
        assert!(account.positions().is_empty());
    }

    #[test]
    fn insufficient_funds_leaves_state_unchanged() {
        let mut account = Account::new(500.0);
        assert!(account.open_position(0, 100.0, Side::Buy, 10.0, "too big").is_none());
        assert_eq!(account.balance(), 500.0);
        assert!(account.positions().is_empty());
        assert!(account.equity_curve().is_empty());
    }

    #[test]
    fn sell_has_no_upfront_cost() {
        let mut account = Account::new(1_000.0);
        let id = account.open_position(0, 100.0, Side::Sell, 50.0, "short").unwrap();
        assert_eq!(account.balance(), 1_000.0);
        assert!(account.close_position(id, 1, 90.0, "cover"));
        assert_eq!(account.balance(), 1_500.0);
        assert_eq!(account.trades()[0].pnl, 500.0);
    }

    #[test]
    fn invalid_inputs_rejected() {
        let mut account = Account::new(1_000.0);
        assert!(account.open_position(0, 0.0, Side::Buy, 1.0, "zero price").is_none());
        assert!(account.open_position(0, 10.0, Side::Sell, -1.0, "neg size").is_none());
        assert!(account.open_position(0, f64::NAN, Side::Buy, 1.0, "nan").is_none());
        assert!(account.positions().is_empty());
    }

    #[test]
    fn closing_twice_fails() {
        let mut account = Account::new(1_000.0);
        let id = account.open_position(0, 10.0, Side::Buy, 1.0, "entry").unwrap();
        assert!(account.position(id).is_some());
        assert!(account.close_position(id, 1, 11.0, "exit"));
        assert!(account.position(id).is_none());
        assert!(!account.close_position(id, 2, 12.0, "again"));
        assert!(!account.close_position(PositionId(99), 2, 12.0, "unknown"));
        assert_eq!(account.trades().len(), 1);
    }

    #[test]
    fn held_positions_are_always_open() {
        let mut account = Account::new(1_000.0);
        let a = account.open_position(0, 10.0, Side::Buy, 1.0, "a").unwrap();
        account.open_position(0, 10.0, Side::Sell, 1.0, "b");
        account.close_position(a, 1, 12.0, "exit");
        assert_eq!(account.positions().len(), 1);
        assert!(account.positions().iter().all(Position::is_open));
    }

    #[test]
    fn deserialized_account_keeps_issuing_fresh_ids() {
        let mut account = Account::new(10_000.0);
        let first = account.open_position(0, 10.0, Side::Buy, 1.0, "a").unwrap();
        let second = account.open_position(0, 10.0, Side::Buy, 1.0, "b").unwrap();
        account.close_position(second, 1, 11.0, "exit");

        let json = serde_json::to_string(&account).unwrap();
        let mut restored: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.positions(), account.positions());
        assert_eq!(restored.trades(), account.trades());

        let next = restored.open_position(2, 10.0, Side::Buy, 1.0, "c").unwrap();
        assert!(next > first && next > second);
        assert_eq!(restored.positions().len(), 2);
    }

    #[test]
    fn update_positions_records_equity_identity() {
        let mut account = Account::new(10_000.0);
        account.open_position(0, 100.0, Side::Buy, 10.0, "long");
        account.open_position(0, 100.0, Side::Sell, 5.0, "short");
        account.update_positions(1, 104.0);

        let point = *account.equity_curve().last().unwrap();
        let expected = account.balance() + 10.0 * 4.0 - 5.0 * 4.0;
        assert_eq!(point.timestamp, 1);
        assert!((point.value - expected).abs() < 1e-10);
    }

    #[test]
    fn mark_positions_does_not_record() {
        let mut account = Account::new(10_000.0);
        account.open_position(0, 100.0, Side::Buy, 1.0, "long");
        account.mark_positions(120.0);
        assert!(account.equity_curve().is_empty());
        assert_eq!(account.unrealized_pnl(), 20.0);
    }

    #[test]
    fn close_all_closes_everything() {
        let mut account = Account::new(10_000.0);
        account.open_position(0, 100.0, Side::Buy, 1.0, "a");
        account.open_position(0, 100.0, Side::Buy, 2.0, "b");
        assert_eq!(account.close_all(5, 101.0, "flat"), 2);
        assert!(account.positions().is_empty());
        assert_eq!(account.trades().len(), 2);
        assert_eq!(account.equity_curve().len(), 2);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut account = Account::new(2_000.0);
        let id = account.open_position(0, 100.0, Side::Buy, 5.0, "a").unwrap();
        account.close_position(id, 1, 90.0, "b");
        account.reset();
        assert_eq!(account.balance(), 2_000.0);
        assert!(account.trades().is_empty());
        assert!(account.equity_curve().is_empty());
        // ids restart too
        let id = account.open_position(2, 10.0, Side::Buy, 1.0, "c").unwrap();
        assert_eq!(id, PositionId(1));
    }
}
