//! Integration tests for the runner: config file + candle file → result → artifacts.

use std::path::{Path, PathBuf};

use pivotlab_core::domain::Side;
use pivotlab_runner::config::BacktestConfig;
use pivotlab_runner::data_loader::{load_candles, CandleSource};
use pivotlab_runner::export::{load_artifacts, save_artifacts};
use pivotlab_runner::runner::{run_backtest_from_data, run_single_backtest, RunError};
use pivotlab_runner::sweep::{run_sweep, ParamGrid};

// trough at 1 (low 4), peak at 4 (high 11), entry on the close of 5 at 7.0,
// dip to 6 and exit at 8.0 once the gain crosses 10%
const MIDS: [f64; 8] = [8.0, 5.0, 6.0, 8.0, 10.0, 7.0, 6.0, 8.0];

const CONFIG: &str = r#"
[backtest]
initial_balance = 10000.0
price_to_bar_ratio = 1.0

[[rules]]
type = "pivot_angle"
min_angle = 60.0
max_angle = 70.0
direction = "up"
pivot_lookback = 1
allocation_pct = 10.0

[[rules]]
type = "take_profit_stop_loss"
take_profit = 10.0
stop_loss = 20.0
"#;

fn write_fixture(dir: &Path) -> (PathBuf, PathBuf) {
    let config_path = dir.join("pivotlab.toml");
    std::fs::write(&config_path, CONFIG).unwrap();

    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    for (i, m) in MIDS.iter().enumerate() {
        let ts = 1_704_067_200_000i64 + i as i64 * 60_000;
        csv.push_str(&format!("{ts},{m},{},{},{m},100\n", m + 1.0, m - 1.0));
    }
    let candles_path = dir.join("candles.csv");
    std::fs::write(&candles_path, csv).unwrap();

    (config_path, candles_path)
}

#[test]
fn end_to_end_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, candles_path) = write_fixture(dir.path());

    let config = BacktestConfig::from_file(&config_path).unwrap();
    let result = run_single_backtest(&config, &CandleSource::File(candles_path)).unwrap();

    assert!(!result.is_synthetic);
    assert_eq!(result.candle_count, MIDS.len());
    assert_eq!(result.trades.len(), 1);

    let trade = &result.trades[0];
    assert_eq!(trade.side, Side::Buy);
    assert_eq!(trade.entry_price, 7.0);
    assert_eq!(trade.exit_price, 8.0);
    assert_eq!(trade.exit_reason, "Take Profit (10%)");
    assert!(trade.entry_reason.starts_with("Pivot Angle 66.8°"));

    // 10% of 10_000 at 7.0, sold at 8.0
    let expected_pnl = 1_000.0 / 7.0;
    assert!((trade.pnl - expected_pnl).abs() < 1e-9);
    assert!((result.stats.balance - (10_000.0 + expected_pnl)).abs() < 1e-9);
    assert_eq!(result.stats.winning_trades, 1);
    assert!(result.open_positions.is_empty());
    assert_eq!(result.equity_curve.len(), MIDS.len());

    let fired: Vec<u64> = result.rules.iter().map(|r| r.triggered).collect();
    assert_eq!(fired, vec![1, 1]);
}

#[test]
fn artifacts_roundtrip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, candles_path) = write_fixture(dir.path());
    let config = BacktestConfig::from_file(&config_path).unwrap();
    let result = run_single_backtest(&config, &CandleSource::File(candles_path)).unwrap();

    let out = dir.path().join("runs");
    let run_dir = save_artifacts(&result, &out).unwrap();
    let trades_csv = std::fs::read_to_string(run_dir.join("trades.csv")).unwrap();
    assert_eq!(trades_csv.lines().count(), 2);
    let equity_csv = std::fs::read_to_string(run_dir.join("equity.csv")).unwrap();
    assert_eq!(equity_csv.lines().count(), MIDS.len() + 1);

    assert_eq!(load_artifacts(&run_dir).unwrap(), result);
}

#[test]
fn same_inputs_share_run_id() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, candles_path) = write_fixture(dir.path());
    let config = BacktestConfig::from_file(&config_path).unwrap();
    let loaded = load_candles(&CandleSource::File(candles_path)).unwrap();

    let a = run_backtest_from_data(&config, &loaded).unwrap();
    let b = run_backtest_from_data(&config, &loaded).unwrap();
    assert_eq!(a.run_id, b.run_id);

    let mut other = config.clone();
    other.backtest.initial_balance = 20_000.0;
    let c = run_backtest_from_data(&other, &loaded).unwrap();
    assert_ne!(a.run_id, c.run_id);
}

#[test]
fn unordered_file_is_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    std::fs::write(
        &path,
        "timestamp,open,high,low,close\n2,1,1,1,1\n1,1,1,1,1\n",
    )
    .unwrap();
    let err = run_single_backtest(&BacktestConfig::default(), &CandleSource::File(path))
        .unwrap_err();
    assert!(matches!(err, RunError::Data(_)));
}

#[test]
fn missing_file_is_data_error() {
    let err = run_single_backtest(
        &BacktestConfig::default(),
        &CandleSource::File(PathBuf::from("/nonexistent/candles.csv")),
    )
    .unwrap_err();
    assert!(matches!(err, RunError::Data(_)));
}

#[test]
fn synthetic_sweep_ranks_all_valid_configs() {
    let loaded = load_candles(&CandleSource::Synthetic {
        label: "integration".into(),
        count: 500,
    })
    .unwrap();
    let grid = ParamGrid {
        min_angles: vec![0.0, 30.0],
        max_angles: vec![45.0, 90.0],
        pivot_lookbacks: vec![3],
    };
    let entries = run_sweep(&grid, &BacktestConfig::default(), &loaded);
    assert_eq!(entries.len(), 4);
    assert!(entries.iter().all(|e| e.result.is_synthetic));
    let ranks: Vec<usize> = entries.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
}
