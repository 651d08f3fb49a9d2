//! Simulation engine: steps rules over a candle series and owns playback.
//!
//! [`SimulationEngine`] is single-threaded and timer-free: it tells the
//! caller when the next automatic step is due. [`Player`] is the stock
//! caller, a worker thread that owns one engine and keeps its clock.

pub mod error;
pub mod events;
pub mod player;
pub mod simulation;
pub mod state;

pub use error::EngineError;
pub use events::{AccountSnapshot, EventLog, SimulationEvent, SimulationObserver};
pub use player::{Player, PlayerCommand};
pub use simulation::SimulationEngine;
pub use state::{EngineConfig, EngineStatus, PlaybackState, RunMode, RunToken, ScheduledStep};
