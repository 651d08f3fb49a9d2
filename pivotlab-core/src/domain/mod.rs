//! Domain types for PivotLab

pub mod candle;
pub mod ids;
pub mod position;
pub mod trade;

pub use candle::{index_of_timestamp, Candle};
pub use ids::{IdGen, PositionId};
pub use position::{Position, PositionStatus, Side};
pub use trade::Trade;

use serde::{Deserialize, Serialize};

/// One sample of the equity curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: i64,
    pub value: f64,
}
