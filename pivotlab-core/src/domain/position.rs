use serde::{Deserialize, Serialize};

use super::ids::PositionId;

/// Direction of a simulated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Simulated position owned by the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: PositionId,
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub side: Side,
    pub size: f64,
    /// Last mark-to-market price.
    pub current_price: f64,
    /// Unrealized PnL at `current_price`.
    pub pnl: f64,
    pub status: PositionStatus,
    /// Why the position was opened.
    pub reason: String,
}

impl Position {
    pub fn open(
        id: PositionId,
        entry_timestamp: i64,
        entry_price: f64,
        side: Side,
        size: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            id,
            entry_timestamp,
            entry_price,
            side,
            size,
            current_price: entry_price,
            pnl: 0.0,
            status: PositionStatus::Open,
            reason: reason.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    pub fn entry_value(&self) -> f64 {
        self.entry_price * self.size
    }

    /// Signed PnL if the position were valued at `price`.
    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.sign()
    }

    /// Re-mark the position at `price`.
    pub fn mark(&mut self, price: f64) {
        self.current_price = price;
        self.pnl = self.pnl_at(price);
    }

    /// Final mark at the exit price. The position no longer counts as open.
    pub fn close(&mut self, price: f64) {
        self.mark(price);
        self.status = PositionStatus::Closed;
    }

    /// Unrealized PnL as a percentage of entry value.
    pub fn pnl_percent(&self) -> f64 {
        let entry_value = self.entry_value();
        if entry_value == 0.0 {
            return 0.0;
        }
        self.pnl / entry_value * 100.0
    }
}
