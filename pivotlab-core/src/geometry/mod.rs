//! Geometric primitives used by angle-aware rules: pivot detection and
//! price-to-bar angle calculation.

pub mod angle;
pub mod pivots;

pub use angle::{angular_distance, calculate_angle, project_price, AngleConvention, ChartPoint};
pub use pivots::{
    detect_candle_pivots, detect_pivots, is_pivot_high, is_pivot_low, latest_pivot_before,
    pivot_at, recent_pivots, window_len, CandleColumns, PivotKind, PivotPoint, Pivots,
};
