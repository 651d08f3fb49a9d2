//! Engine configuration, playback state, run tokens and status reports.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::EngineError;
use crate::account::AccountStats;
use crate::rules::RuleStatus;

/// Configuration for one simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_balance: f64,
    /// Price units per bar (compass angles) / bars per price unit (slope angles).
    pub price_to_bar_ratio: f64,
    /// Base delay between automatic steps, before the speed multiplier.
    pub interval: Duration,
    pub speed: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            price_to_bar_ratio: 1.0,
            interval: Duration::from_millis(1_000),
            speed: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            initial_balance,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.initial_balance.is_finite() && self.initial_balance > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "initial_balance must be finite and > 0, got {}",
                self.initial_balance
            )));
        }
        if !(self.price_to_bar_ratio.is_finite() && self.price_to_bar_ratio > 0.0) {
            return Err(EngineError::InvalidConfig(format!(
                "price_to_bar_ratio must be finite and > 0, got {}",
                self.price_to_bar_ratio
            )));
        }
        validate_speed(self.speed)
    }
}

pub(crate) fn validate_speed(speed: f64) -> Result<(), EngineError> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(EngineError::InvalidSpeed(speed))
    }
}

/// Where the simulation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Running,
    Paused,
    Completed,
}

/// How a run advances after `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Only `next()` / `previous()` move the cursor.
    Manual,
    /// Steps are scheduled every `interval / speed`.
    Auto { interval: Duration },
}

/// Identifies the run a scheduled step belongs to.
///
/// Every start, pause and stop moves the engine to a new epoch; a token from
/// an older epoch is stale and its step is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunToken {
    pub(crate) epoch: u64,
}

/// A step the caller should deliver back through `tick` after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledStep {
    pub token: RunToken,
    pub delay: Duration,
}

/// Polled snapshot of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub is_running: bool,
    pub is_paused: bool,
    pub state: PlaybackState,
    pub current_index: usize,
    /// Processed candles over total, in `[0, 1]`.
    pub progress: f64,
    pub playback_speed: f64,
    pub rules: Vec<RuleStatus>,
    pub account_stats: AccountStats,
}
