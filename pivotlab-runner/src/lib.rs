//! PivotLab Runner — backtest orchestration on top of `pivotlab-core`.
//!
//! This crate provides:
//! - TOML backtest configuration with content-addressed run ids
//! - Candle loading from CSV/JSON files or a seeded synthetic walk
//! - Single-backtest runner producing a serializable result
//! - JSON/CSV artifact export
//! - Parallel parameter sweeps over the pivot-angle rule

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, BacktestSection, ConfigError, RunId};
pub use data_loader::{load_candles, CandleSource, LoadError, LoadedCandles};
pub use export::{
    export_equity_csv, export_json, export_trades_csv, import_json, load_artifacts,
    save_artifacts,
};
pub use runner::{
    run_backtest_from_data, run_single_backtest, BacktestResult, RunError, SCHEMA_VERSION,
};
pub use sweep::{run_sweep, ParamGrid, SweepEntry};
