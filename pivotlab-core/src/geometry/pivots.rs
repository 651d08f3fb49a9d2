//! Pivot detection over high/low series.
//!
//! A pivot high at `i` is a high strictly greater than every other high in the
//! symmetric window `[i - lookback, i + lookback]`; a pivot low is the mirror
//! image on lows. Ties disqualify. A pivot at `i` is therefore only known once
//! candle `i + lookback` exists.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PivotKind {
    High,
    Low,
}

impl PivotKind {
    pub fn opposite(&self) -> Self {
        match self {
            PivotKind::High => PivotKind::Low,
            PivotKind::Low => PivotKind::High,
        }
    }
}

/// A confirmed local extremum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PivotPoint {
    /// Timestamp of the pivot candle (ms).
    pub x: i64,
    /// Pivot price (the high for highs, the low for lows).
    pub y: f64,
    pub index: usize,
    pub kind: PivotKind,
}

/// Pivot highs and lows, each in ascending index order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pivots {
    pub highs: Vec<PivotPoint>,
    pub lows: Vec<PivotPoint>,
}

impl Pivots {
    pub fn is_empty(&self) -> bool {
        self.highs.is_empty() && self.lows.is_empty()
    }

    /// Highs and lows merged in index order.
    pub fn merged(&self) -> Vec<PivotPoint> {
        let mut all: Vec<PivotPoint> = self.highs.iter().chain(self.lows.iter()).copied().collect();
        all.sort_by_key(|p| p.index);
        all
    }
}

/// Number of candles a full pivot window spans.
pub fn window_len(lookback: usize) -> usize {
    2 * lookback + 1
}

/// Whether `value(i)` is strictly more extreme than all neighbours within `lookback`.
///
/// `better(a, b)` must return true when `a` beats `b`. Returns false when the
/// window does not fit inside `len` values.
fn is_extremum(
    len: usize,
    i: usize,
    lookback: usize,
    value: impl Fn(usize) -> f64,
    better: impl Fn(f64, f64) -> bool,
) -> bool {
    if lookback == 0 || i < lookback || i + lookback >= len {
        return false;
    }
    let v = value(i);
    if v.is_nan() {
        return false;
    }
    ((i - lookback)..=(i + lookback))
        .filter(|&j| j != i)
        .all(|j| better(v, value(j)))
}

pub fn is_pivot_high(highs: &[f64], i: usize, lookback: usize) -> bool {
    is_extremum(highs.len(), i, lookback, |j| highs[j], |a, b| a > b)
}

pub fn is_pivot_low(lows: &[f64], i: usize, lookback: usize) -> bool {
    is_extremum(lows.len(), i, lookback, |j| lows[j], |a, b| a < b)
}

/// Detect all pivots in parallel `x`/`high`/`low` series.
///
/// Returns empty lists (with a warning) when the series is shorter than one
/// full window. Runs in `O(n · lookback)`.
pub fn detect_pivots(x: &[i64], high: &[f64], low: &[f64], lookback: usize) -> Pivots {
    let n = x.len().min(high.len()).min(low.len());
    if lookback == 0 || n < window_len(lookback) {
        warn!(
            candles = n,
            lookback,
            required = window_len(lookback),
            "not enough candles for pivot detection"
        );
        return Pivots::default();
    }

    let mut pivots = Pivots::default();
    for i in lookback..(n - lookback) {
        if is_pivot_high(&high[..n], i, lookback) {
            pivots.highs.push(PivotPoint {
                x: x[i],
                y: high[i],
                index: i,
                kind: PivotKind::High,
            });
        }
        if is_pivot_low(&low[..n], i, lookback) {
            pivots.lows.push(PivotPoint {
                x: x[i],
                y: low[i],
                index: i,
                kind: PivotKind::Low,
            });
        }
    }
    pivots
}

/// Column views over a candle slice, in the shape `detect_pivots` takes.
pub struct CandleColumns {
    pub x: Vec<i64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
}

impl CandleColumns {
    pub fn from_candles(candles: &[Candle]) -> Self {
        Self {
            x: candles.iter().map(|c| c.timestamp).collect(),
            high: candles.iter().map(|c| c.high).collect(),
            low: candles.iter().map(|c| c.low).collect(),
        }
    }
}

/// Convenience wrapper: detect pivots directly over candles.
pub fn detect_candle_pivots(candles: &[Candle], lookback: usize) -> Pivots {
    let cols = CandleColumns::from_candles(candles);
    detect_pivots(&cols.x, &cols.high, &cols.low, lookback)
}

/// The pivot of `kind` at index `i` of `candles`, if it is one.
pub fn pivot_at(candles: &[Candle], i: usize, lookback: usize, kind: PivotKind) -> Option<PivotPoint> {
    let confirmed = match kind {
        PivotKind::High => is_extremum(candles.len(), i, lookback, |j| candles[j].high, |a, b| a > b),
        PivotKind::Low => is_extremum(candles.len(), i, lookback, |j| candles[j].low, |a, b| a < b),
    };
    confirmed.then(|| PivotPoint {
        x: candles[i].timestamp,
        y: match kind {
            PivotKind::High => candles[i].high,
            PivotKind::Low => candles[i].low,
        },
        index: i,
        kind,
    })
}

/// Most recent pivot of `kind` strictly before `before`, searching backwards.
///
/// Only windows lying entirely inside `candles` are considered, so callers
/// passing `&data[..=index]` never see a pivot confirmed by future candles.
pub fn latest_pivot_before(
    candles: &[Candle],
    before: usize,
    lookback: usize,
    kind: PivotKind,
) -> Option<PivotPoint> {
    (0..before.min(candles.len()))
        .rev()
        .find_map(|i| pivot_at(candles, i, lookback, kind))
}

/// The last `count` pivots of either kind inside `candles`, oldest first.
pub fn recent_pivots(candles: &[Candle], lookback: usize, count: usize) -> Vec<PivotPoint> {
    if lookback == 0 || candles.len() < window_len(lookback) {
        return Vec::new();
    }
    let mut found = Vec::with_capacity(count);
    let last_centre = candles.len() - 1 - lookback;
    for i in (lookback..=last_centre).rev() {
        if found.len() == count {
            break;
        }
        // An outside candle can be both; the high is taken first.
        if let Some(p) = pivot_at(candles, i, lookback, PivotKind::High) {
            found.push(p);
        }
        if found.len() < count {
            if let Some(p) = pivot_at(candles, i, lookback, PivotKind::Low) {
                found.push(p);
            }
        }
    }
    found.reverse();
    found
}
