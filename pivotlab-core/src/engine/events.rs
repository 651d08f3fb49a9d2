//! Simulation events and the observers that receive them.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::debug;

use crate::account::{Account, AccountStats};
use crate::domain::{Candle, Position, Trade};

/// Light view of the account attached to every candle event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub equity: f64,
    pub unrealized_pnl: f64,
    pub open_positions: Vec<Position>,
    pub trade_count: usize,
}

impl AccountSnapshot {
    pub fn of(account: &Account) -> Self {
        Self {
            balance: account.balance(),
            equity: account.equity(),
            unrealized_pnl: account.unrealized_pnl(),
            open_positions: account.positions().to_vec(),
            trade_count: account.trades().len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SimulationEvent {
    /// A candle was processed (or revisited by a backward step).
    Candle {
        index: usize,
        candle: Candle,
        account: AccountSnapshot,
    },
    /// Reserved. The engine does not emit it; trades are read from the account.
    Trade { trade: Trade },
    /// The run ended, by exhausting the data or by `stop()`.
    Complete {
        stats: AccountStats,
        account: Box<Account>,
    },
}

/// Receiver of simulation events. Called synchronously on the engine's thread.
pub trait SimulationObserver: Send {
    fn on_event(&mut self, event: &SimulationEvent);
}

impl SimulationObserver for Sender<SimulationEvent> {
    fn on_event(&mut self, event: &SimulationEvent) {
        if self.send(event.clone()).is_err() {
            debug!("event receiver dropped");
        }
    }
}

/// In-memory event recorder; clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of all candle events, in emission order.
    pub fn candle_indices(&self) -> Vec<usize> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                SimulationEvent::Candle { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, SimulationEvent::Complete { .. }))
            .count()
    }
}

impl SimulationObserver for EventLog {
    fn on_event(&mut self, event: &SimulationEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
