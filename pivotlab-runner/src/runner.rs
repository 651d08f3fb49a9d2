//! Backtest runner: wires together config, candles, engine, and results.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads candles from a source, then runs. Used by the CLI.
//! - `run_backtest_from_data()`: takes pre-loaded candles. Used by sweeps.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use pivotlab_core::account::AccountStats;
use pivotlab_core::domain::{EquityPoint, Position, Trade};
use pivotlab_core::engine::{EngineError, SimulationEngine};
use pivotlab_core::rules::RuleStatus;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{load_candles, CandleSource, LoadError, LoadedCandles};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub dataset_hash: String,
    pub candle_count: usize,
    pub is_synthetic: bool,
    pub config: BacktestConfig,
    pub stats: AccountStats,
    pub trades: Vec<Trade>,
    /// Positions still open after the last candle, marked to its close.
    pub open_positions: Vec<Position>,
    pub equity_curve: Vec<EquityPoint>,
    pub rules: Vec<RuleStatus>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load candles from `source` and run `config` over them.
pub fn run_single_backtest(
    config: &BacktestConfig,
    source: &CandleSource,
) -> Result<BacktestResult, RunError> {
    let loaded = load_candles(source)?;
    run_backtest_from_data(config, &loaded)
}

/// Run a backtest with pre-loaded candles, no I/O.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    loaded: &LoadedCandles,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let run_id = config.run_id(&loaded.dataset_hash)?;

    let mut engine = SimulationEngine::from_configs(
        loaded.candles.clone(),
        config.engine_config(),
        &config.rules,
    )?;
    let stats = engine.run_to_completion();
    let rules = engine.status().rules;
    let account = engine.account();

    info!(
        run_id = %short_id(&run_id),
        trades = stats.total_trades,
        percent_return = stats.percent_return,
        "backtest finished"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        dataset_hash: loaded.dataset_hash.clone(),
        candle_count: loaded.candles.len(),
        is_synthetic: loaded.is_synthetic,
        config: config.clone(),
        stats,
        trades: account.trades().to_vec(),
        open_positions: account.positions().to_vec(),
        equity_curve: account.equity_curve().to_vec(),
        rules,
    })
}

/// First 12 hex chars of a run id, for logs and directory names.
pub fn short_id(run_id: &str) -> &str {
    run_id.get(..12).unwrap_or(run_id)
}
