//! Reporting and export: JSON and CSV artifact generation.
//!
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: trade tape and equity curve for external analysis tools
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::DateTime;

use pivotlab_core::domain::{EquityPoint, Trade};

use crate::runner::{short_id, BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// RFC 3339 rendering of a millisecond timestamp (empty if out of range).
fn iso(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

/// Export a trade list as CSV.
///
/// Columns: id, side, size, entry_time, entry_price, entry_reason, exit_time,
/// exit_price, exit_reason, pnl, pnl_percent
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "id",
        "side",
        "size",
        "entry_time",
        "entry_price",
        "entry_reason",
        "exit_time",
        "exit_price",
        "exit_reason",
        "pnl",
        "pnl_percent",
    ])?;

    for t in trades {
        wtr.write_record([
            &t.id.to_string(),
            &format!("{:?}", t.side).to_lowercase(),
            &format!("{:.6}", t.size),
            &iso(t.entry_timestamp),
            &format!("{:.6}", t.entry_price),
            &t.entry_reason,
            &iso(t.exit_timestamp),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason,
            &format!("{:.2}", t.pnl),
            &format!("{:.4}", t.pnl_percent),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with timestamp and equity columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "time", "equity"])?;
    for p in equity_curve {
        wtr.write_record([&p.timestamp.to_string(), &iso(p.timestamp), &format!("{:.2}", p.value)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates a directory named `{run_id prefix}_{timestamp}/` under `output_dir`
/// containing:
/// - `result.json`: the full `BacktestResult`
/// - `trades.csv`: closed trades
/// - `equity.csv`: the equity curve
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let dirname = format!(
        "{}_{}",
        short_id(&result.run_id),
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let run_dir = output_dir.join(dirname);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(
        run_dir.join("equity.csv"),
        export_equity_csv(&result.equity_curve)?,
    )?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's result.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}
