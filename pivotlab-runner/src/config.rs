//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! initial_balance = 10000.0
//! price_to_bar_ratio = 1.0
//! interval_ms = 250
//! speed = 1.0
//!
//! [[rules]]
//! type = "pivot_angle"
//! min_angle = 30.0
//! max_angle = 60.0
//! direction = "up"
//! pivot_lookback = 3
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pivotlab_core::engine::EngineConfig;
use pivotlab_core::rules::{RuleConfig, RuleConfigError};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("invalid rule #{index}: {source}")]
    Rule {
        index: usize,
        source: RuleConfigError,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Engine-level settings, the `[backtest]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    #[serde(default = "default_initial_balance")]
    pub initial_balance: f64,
    #[serde(default = "default_ratio")]
    pub price_to_bar_ratio: f64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_initial_balance() -> f64 {
    10_000.0
}

fn default_ratio() -> f64 {
    1.0
}

fn default_interval_ms() -> u64 {
    1_000
}

fn default_speed() -> f64 {
    1.0
}

impl Default for BacktestSection {
    fn default() -> Self {
        Self {
            initial_balance: default_initial_balance(),
            price_to_bar_ratio: default_ratio(),
            interval_ms: default_interval_ms(),
            speed: default_speed(),
        }
    }
}

/// A complete, reproducible backtest definition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BacktestConfig {
    #[serde(default)]
    pub backtest: BacktestSection,
    /// Evaluated in this order every step.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl BacktestConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let b = &self.backtest;
        if !(b.initial_balance.is_finite() && b.initial_balance > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "initial_balance must be > 0, got {}",
                b.initial_balance
            )));
        }
        if !(b.price_to_bar_ratio.is_finite() && b.price_to_bar_ratio > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "price_to_bar_ratio must be > 0, got {}",
                b.price_to_bar_ratio
            )));
        }
        if !(b.speed.is_finite() && b.speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "speed must be > 0, got {}",
                b.speed
            )));
        }
        for (index, rule) in self.rules.iter().enumerate() {
            rule.validate()
                .map_err(|source| ConfigError::Rule { index, source })?;
        }
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_balance: self.backtest.initial_balance,
            price_to_bar_ratio: self.backtest.price_to_bar_ratio,
            interval: Duration::from_millis(self.backtest.interval_ms),
            speed: self.backtest.speed,
        }
    }

    /// Deterministic hash of this config together with the dataset it runs on.
    ///
    /// Two runs with identical configs on identical data share a RunId.
    pub fn run_id(&self, dataset_hash: &str) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(self)?;
        let mut hasher = blake3::Hasher::new();
        hasher.update(json.as_bytes());
        hasher.update(dataset_hash.as_bytes());
        Ok(hasher.finalize().to_hex().to_string())
    }
}
