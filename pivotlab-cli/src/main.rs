//! PivotLab CLI — run, replay, sweep and inspect candle data.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config and save artifacts
//! - `play`: replay a backtest candle by candle on a timer
//! - `sweep`: grid search over the pivot-angle rule
//! - `pivots`: list detected pivots and the angles between them

use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pivotlab_core::engine::{Player, RunMode, SimulationEngine, SimulationEvent};
use pivotlab_core::geometry::{calculate_angle, detect_candle_pivots, AngleConvention, ChartPoint};
use pivotlab_core::rules::RuleConfig;
use pivotlab_runner::runner::{run_backtest_from_data, short_id};
use pivotlab_runner::{
    load_candles, run_sweep, save_artifacts, BacktestConfig, BacktestResult, CandleSource,
    ParamGrid,
};

#[derive(Parser)]
#[command(
    name = "pivotlab",
    about = "PivotLab CLI — candle-by-candle pivot and angle backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where candles come from. Exactly one of `--candles` or `--synthetic`.
#[derive(Args)]
struct DataArgs {
    /// CSV or JSON candle file.
    #[arg(long)]
    candles: Option<PathBuf>,

    /// Generate this many synthetic hourly candles instead of reading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Seed label for synthetic candles.
    #[arg(long, default_value = "pivotlab")]
    label: String,
}

impl DataArgs {
    fn source(&self) -> Result<CandleSource> {
        match (&self.candles, self.synthetic) {
            (Some(_), Some(_)) => bail!("--candles and --synthetic are mutually exclusive"),
            (Some(path), None) => Ok(CandleSource::File(path.clone())),
            (None, Some(count)) => Ok(CandleSource::Synthetic {
                label: self.label.clone(),
                count,
            }),
            (None, None) => bail!("one of --candles or --synthetic is required"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Output directory for result artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Replay a backtest on a timer, printing one line per candle.
    Play {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        data: DataArgs,

        /// Base step interval in milliseconds. Overrides the config.
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Playback speed multiplier. Overrides the config.
        #[arg(long)]
        speed: Option<f64>,
    },
    /// Grid search over pivot-angle bands and lookbacks.
    Sweep {
        /// Base TOML config; its first pivot_angle rule is replaced per combination.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        data: DataArgs,

        /// How many of the best runs to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// List detected pivots and the angle of each leg between them.
    Pivots {
        #[command(flatten)]
        data: DataArgs,

        /// Candles on each side a pivot must beat.
        #[arg(long, default_value_t = 3)]
        lookback: usize,

        /// Price units per bar used for angles.
        #[arg(long, default_value_t = 1.0)]
        ratio: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data,
            output_dir,
        } => run_backtest_cmd(config, data, output_dir),
        Commands::Play {
            config,
            data,
            interval_ms,
            speed,
        } => run_play(config, data, interval_ms, speed),
        Commands::Sweep { config, data, top } => run_sweep_cmd(config, data, top),
        Commands::Pivots {
            data,
            lookback,
            ratio,
        } => run_pivots(data, lookback, ratio),
    }
}

fn run_backtest_cmd(config_path: PathBuf, data: DataArgs, output_dir: PathBuf) -> Result<()> {
    let config = BacktestConfig::from_file(&config_path)?;
    let loaded = load_candles(&data.source()?)?;
    let result = run_backtest_from_data(&config, &loaded)?;

    print_summary(&result);

    let run_dir = save_artifacts(&result, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_play(
    config_path: PathBuf,
    data: DataArgs,
    interval_ms: Option<u64>,
    speed: Option<f64>,
) -> Result<()> {
    let mut config = BacktestConfig::from_file(&config_path)?;
    if let Some(ms) = interval_ms {
        config.backtest.interval_ms = ms;
    }
    if let Some(s) = speed {
        config.backtest.speed = s;
    }
    config.validate()?;

    let loaded = load_candles(&data.source()?)?;
    let engine_config = config.engine_config();
    let interval = engine_config.interval;
    let mut engine =
        SimulationEngine::from_configs(loaded.candles, engine_config, &config.rules)?;

    let (tx, rx) = mpsc::channel();
    engine.subscribe(Box::new(tx));

    let player = Player::spawn(engine).context("failed to spawn player thread")?;
    if !player.start(RunMode::Auto { interval }) {
        bail!("player thread exited before starting");
    }
    info!(interval_ms = interval.as_millis() as u64, "playback started");

    for event in rx.iter() {
        match event {
            SimulationEvent::Candle {
                index,
                candle,
                account,
            } => println!(
                "{:>6}  {}  close {:>12.4}  equity {:>12.2}  open {:>3}  trades {:>4}",
                index,
                format_ts(candle.timestamp),
                candle.close,
                account.equity,
                account.open_positions.len(),
                account.trade_count,
            ),
            SimulationEvent::Trade { trade } => println!(
                "        trade {} closed: {} ({:+.2})",
                trade.id, trade.exit_reason, trade.pnl
            ),
            SimulationEvent::Complete { stats, .. } => {
                println!();
                println!("=== Playback Complete ===");
                println!("Return:         {:.2}%", stats.percent_return);
                println!("Trades:         {}", stats.total_trades);
                println!("Win Rate:       {:.1}%", stats.win_rate);
                println!("Max Drawdown:   {:.2}%", stats.max_drawdown_percent);
                break;
            }
        }
    }

    player.shutdown();
    Ok(())
}

fn run_sweep_cmd(config_path: Option<PathBuf>, data: DataArgs, top: usize) -> Result<()> {
    let base = match config_path {
        Some(path) => BacktestConfig::from_file(&path)?,
        None => BacktestConfig::default(),
    };
    let loaded = load_candles(&data.source()?)?;
    let grid = ParamGrid::default();

    let entries = run_sweep(&grid, &base, &loaded);
    if entries.is_empty() {
        bail!("no sweep configuration produced a result");
    }

    println!(
        "{:>4}  {:>8} {:>8} {:>4}  {:>9} {:>7} {:>8} {:>8}",
        "Rank", "Min°", "Max°", "LB", "Return%", "Trades", "Win%", "MaxDD%"
    );
    println!("{}", "-".repeat(66));
    for entry in entries.iter().take(top) {
        let stats = &entry.result.stats;
        let (min, max, lb) = entry
            .result
            .config
            .rules
            .iter()
            .find_map(|r| match r {
                RuleConfig::PivotAngle {
                    min_angle,
                    max_angle,
                    pivot_lookback,
                    ..
                } => Some((*min_angle, *max_angle, *pivot_lookback)),
                _ => None,
            })
            .unwrap_or((0.0, 0.0, 0));
        println!(
            "{:>4}  {:>8.1} {:>8.1} {:>4}  {:>9.2} {:>7} {:>8.1} {:>8.2}",
            entry.rank,
            min,
            max,
            lb,
            stats.percent_return,
            stats.total_trades,
            stats.win_rate,
            stats.max_drawdown_percent,
        );
    }
    if loaded.is_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    Ok(())
}

fn run_pivots(data: DataArgs, lookback: usize, ratio: f64) -> Result<()> {
    if lookback == 0 {
        bail!("--lookback must be at least 1");
    }
    if !(ratio.is_finite() && ratio > 0.0) {
        bail!("--ratio must be > 0, got {ratio}");
    }
    let loaded = load_candles(&data.source()?)?;
    let pivots = detect_candle_pivots(&loaded.candles, lookback).merged();

    println!(
        "{} pivots ({} candles, lookback {lookback})",
        pivots.len(),
        loaded.candles.len()
    );
    let mut previous: Option<ChartPoint> = None;
    for p in &pivots {
        let point = ChartPoint::from(p);
        let leg = previous
            .map(|prev| {
                let angle = calculate_angle(prev, point, ratio, AngleConvention::Slope);
                format!("{angle:>7.2}°")
            })
            .unwrap_or_default();
        println!(
            "{:>6}  {}  {:<4}  {:>12.4}  {leg}",
            p.index,
            format_ts(p.x),
            format!("{:?}", p.kind).to_lowercase(),
            p.y,
        );
        previous = Some(point);
    }
    Ok(())
}

fn format_ts(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

fn print_summary(result: &BacktestResult) {
    let s = &result.stats;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", short_id(&result.run_id));
    println!("Candles:        {}", result.candle_count);
    println!("Rules:          {}", result.rules.len());
    for rule in &result.rules {
        println!("  {:<40} fired {}", rule.name, rule.triggered);
    }
    println!();
    println!("--- Performance ---");
    println!("Initial:        {:.2}", s.initial_balance);
    println!("Equity:         {:.2}", s.equity);
    println!("Return:         {:.2}%", s.percent_return);
    println!("Trades:         {} ({} open)", s.total_trades, s.open_positions);
    println!("Win Rate:       {:.1}%", s.win_rate);
    println!("Avg Win:        {:.2}", s.avg_win);
    println!("Avg Loss:       {:.2}", s.avg_loss);
    println!("Profit Factor:  {:.2}", s.profit_factor);
    println!("Max Drawdown:   {:.2} ({:.2}%)", s.max_drawdown, s.max_drawdown_percent);
    if result.is_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
