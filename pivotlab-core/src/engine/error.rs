use thiserror::Error;

use crate::rules::RuleConfigError;

/// Errors raised while setting up or reconfiguring a simulation.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("candle series is empty")]
    EmptyData,

    #[error("candle timestamps must be strictly ascending (violated at index {index})")]
    UnorderedData { index: usize },

    #[error("rule '{rule}' needs at least {required} candles, series has {available}")]
    InsufficientData {
        rule: String,
        required: usize,
        available: usize,
    },

    #[error("invalid engine config: {0}")]
    InvalidConfig(String),

    #[error("playback speed must be finite and > 0, got {0}")]
    InvalidSpeed(f64),

    #[error(transparent)]
    Rule(#[from] RuleConfigError),
}
