//! PivotLab Core — candle replay engine with pivot/angle rules.
//!
//! This crate contains the whole simulation:
//! - Domain types (candles, positions, trades, equity points)
//! - Geometry: pivot detection and price-to-bar angles
//! - Simulated account with full-collateral accounting and statistics
//! - Rule trait, rule engine and the stock rule library
//! - Simulation engine with play/pause/step control and a worker-thread player

pub mod account;
pub mod domain;
pub mod engine;
pub mod geometry;
pub mod rules;

pub use account::{Account, AccountStats};
pub use domain::{Candle, EquityPoint, Position, PositionId, Side, Trade};
pub use engine::{EngineConfig, EngineError, RunMode, SimulationEngine};
pub use rules::{Rule, RuleConfig, RuleContext, RuleError};
