//! Trade: a closed position with its realized outcome.

use super::ids::PositionId;
use super::position::{Position, Side};
use serde::{Deserialize, Serialize};

/// A completed round trip: entry → exit. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    // ── Identification ──
    pub id: PositionId,
    pub side: Side,
    pub size: f64,

    // ── Entry ──
    pub entry_timestamp: i64,
    pub entry_price: f64,
    pub entry_reason: String,

    // ── Exit ──
    pub exit_timestamp: i64,
    pub exit_price: f64,
    pub exit_reason: String,

    // ── PnL ──
    pub pnl: f64,
    pub pnl_percent: f64,
}

impl Trade {
    /// Snapshot `position` as closed at `exit_price`.
    pub fn from_close(
        position: &Position,
        exit_timestamp: i64,
        exit_price: f64,
        exit_reason: impl Into<String>,
    ) -> Self {
        let pnl = position.pnl_at(exit_price);
        let entry_value = position.entry_value();
        let pnl_percent = if entry_value == 0.0 {
            0.0
        } else {
            pnl / entry_value * 100.0
        };
        Self {
            id: position.id,
            side: position.side,
            size: position.size,
            entry_timestamp: position.entry_timestamp,
            entry_price: position.entry_price,
            entry_reason: position.reason.clone(),
            exit_timestamp,
            exit_price,
            exit_reason: exit_reason.into(),
            pnl,
            pnl_percent,
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }
}
