//! Parameter sweep over the pivot-angle entry rule.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use pivotlab_core::rules::{Direction, RuleConfig};

use crate::config::BacktestConfig;
use crate::data_loader::LoadedCandles;
use crate::runner::{run_backtest_from_data, BacktestResult};

/// Parameter grid specification.
///
/// Every combination replaces the first `pivot_angle` rule of the base
/// config (or is prepended when the base has none).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub min_angles: Vec<f64>,
    pub max_angles: Vec<f64>,
    pub pivot_lookbacks: Vec<usize>,
}

impl Default for ParamGrid {
    /// 15° bands from 0° to 90° with lookbacks 2, 3 and 5.
    fn default() -> Self {
        Self {
            min_angles: vec![0.0, 15.0, 30.0, 45.0, 60.0, 75.0],
            max_angles: vec![15.0, 30.0, 45.0, 60.0, 75.0, 90.0],
            pivot_lookbacks: vec![2, 3, 5],
        }
    }
}

impl ParamGrid {
    /// Upper bound on the number of configurations (inverted bands are skipped).
    pub fn size(&self) -> usize {
        self.min_angles.len() * self.max_angles.len() * self.pivot_lookbacks.len()
    }

    /// Generates all valid configurations in the grid.
    pub fn generate_configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let (direction, allocation_pct) = base
            .rules
            .iter()
            .find_map(|r| match r {
                RuleConfig::PivotAngle {
                    direction,
                    allocation_pct,
                    ..
                } => Some((*direction, *allocation_pct)),
                _ => None,
            })
            .unwrap_or((Direction::default(), 10.0));

        let mut configs = Vec::new();
        for &min_angle in &self.min_angles {
            for &max_angle in &self.max_angles {
                // Skip inverted bands
                if min_angle > max_angle {
                    continue;
                }
                for &pivot_lookback in &self.pivot_lookbacks {
                    let rule = RuleConfig::PivotAngle {
                        min_angle,
                        max_angle,
                        direction,
                        pivot_lookback,
                        allocation_pct,
                    };
                    let mut config = base.clone();
                    match config
                        .rules
                        .iter()
                        .position(|r| matches!(r, RuleConfig::PivotAngle { .. }))
                    {
                        Some(i) => config.rules[i] = rule,
                        None => config.rules.insert(0, rule),
                    }
                    configs.push(config);
                }
            }
        }
        configs
    }
}

/// One successful sweep run, ranked.
#[derive(Debug, Clone)]
pub struct SweepEntry {
    pub rank: usize,
    pub result: BacktestResult,
}

/// Runs every grid configuration over the same candles in parallel.
///
/// Failed runs are logged and skipped. The rest are ranked by percent
/// return, best first; ties keep grid order.
pub fn run_sweep(
    grid: &ParamGrid,
    base: &BacktestConfig,
    loaded: &LoadedCandles,
) -> Vec<SweepEntry> {
    let configs = grid.generate_configs(base);
    info!(configs = configs.len(), "starting sweep");

    let mut results: Vec<BacktestResult> = configs
        .par_iter()
        .filter_map(|config| match run_backtest_from_data(config, loaded) {
            Ok(result) => Some(result),
            Err(e) => {
                warn!(error = %e, "sweep run failed; skipping");
                None
            }
        })
        .collect();

    results.sort_by(|a, b| b.stats.percent_return.total_cmp(&a.stats.percent_return));

    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| SweepEntry { rank: i + 1, result })
        .collect()
}
