//! Candle: the fundamental market data unit.

use serde::{Deserialize, Serialize};

/// OHLCV candle for one time bucket.
///
/// `timestamp` is the bucket open time in milliseconds since the Unix epoch.
/// A series handed to the engine must be ascending with unique timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume >= 0.0
    }

    /// Upper edge of the candle body.
    pub fn body_high(&self) -> f64 {
        self.open.max(self.close)
    }

    /// Lower edge of the candle body.
    pub fn body_low(&self) -> f64 {
        self.open.min(self.close)
    }
}

/// Wire format used by market-data providers: `[timestamp_ms, open, high, low, close, volume]`.
impl From<(i64, f64, f64, f64, f64, f64)> for Candle {
    fn from((timestamp, open, high, low, close, volume): (i64, f64, f64, f64, f64, f64)) -> Self {
        Self::new(timestamp, open, high, low, close, volume)
    }
}

/// Index of the candle with exactly `timestamp`, if present.
///
/// The series is ascending, so this is a binary search.
pub fn index_of_timestamp(candles: &[Candle], timestamp: i64) -> Option<usize> {
    candles
        .binary_search_by_key(&timestamp, |c| c.timestamp)
        .ok()
}
