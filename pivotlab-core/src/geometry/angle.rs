//! Price-to-bar angle calculation.
//!
//! Angles are measured between two `(bar, price)` points after converting the
//! price delta into bar units with a price-to-bar ratio, so a trendline keeps
//! the same angle whatever the chart's aspect ratio.
//!
//! Two conventions are in use and neither is a drop-in for the other:
//!
//! | convention | scaling              | range          |
//! |------------|----------------------|----------------|
//! | `Compass`  | `dy / ratio`         | `[0, 360)`     |
//! | `Slope`    | `dy * ratio`         | `[-90, +90]`   |
//!
//! `Compass` reads the ratio as price units per bar; `Slope` reads it as bars
//! per price unit and reflects left-pointing vectors so only steepness and
//! up/down sense remain. Each call site picks one explicitly.

use serde::{Deserialize, Serialize};

use super::pivots::PivotPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleConvention {
    Compass,
    Slope,
}

/// A point on the chart: x in bars (candle index), y in price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartPoint {
    pub bar: f64,
    pub price: f64,
}

impl ChartPoint {
    pub fn new(bar: f64, price: f64) -> Self {
        Self { bar, price }
    }
}

impl From<&PivotPoint> for ChartPoint {
    fn from(p: &PivotPoint) -> Self {
        Self::new(p.index as f64, p.y)
    }
}

/// Angle in degrees of the segment `p1 → p2`.
///
/// Equal prices give `0.0` for any rightward segment (and for any segment
/// under `Slope`). Coincident points give `0.0`.
pub fn calculate_angle(
    p1: ChartPoint,
    p2: ChartPoint,
    price_to_bar_ratio: f64,
    convention: AngleConvention,
) -> f64 {
    let dx = p2.bar - p1.bar;
    let dy = p2.price - p1.price;

    let scaled_dy = match convention {
        AngleConvention::Compass => dy / price_to_bar_ratio,
        AngleConvention::Slope => dy * price_to_bar_ratio,
    };
    if scaled_dy == 0.0 && dx == 0.0 {
        return 0.0;
    }

    // +0.0 so a negative-zero dy never lands on -0° / 360°.
    let raw = scaled_dy.atan2(dx).to_degrees() + 0.0;

    match convention {
        AngleConvention::Compass => {
            let normalized = raw.rem_euclid(360.0);
            if normalized >= 360.0 {
                0.0
            } else {
                normalized
            }
        }
        AngleConvention::Slope => {
            if raw > 90.0 {
                180.0 - raw
            } else if raw < -90.0 {
                -180.0 - raw
            } else {
                raw
            }
        }
    }
}

/// Price reached after `bars_ahead` bars by a line leaving `origin` at `angle_deg`.
///
/// Inverse of [`calculate_angle`] under the same convention. Vertical angles
/// (±90°, 90°/270° compass) have no finite projection and return NaN.
pub fn project_price(
    origin: ChartPoint,
    bars_ahead: f64,
    angle_deg: f64,
    price_to_bar_ratio: f64,
    convention: AngleConvention,
) -> f64 {
    let cos = angle_deg.to_radians().cos();
    if cos.abs() < 1e-12 {
        return f64::NAN;
    }
    let scaled_dy = angle_deg.to_radians().tan() * bars_ahead;
    let dy = match convention {
        AngleConvention::Compass => scaled_dy * price_to_bar_ratio,
        AngleConvention::Slope => scaled_dy / price_to_bar_ratio,
    };
    origin.price + dy
}

/// Smallest absolute difference between two compass angles, in `[0, 180]`.
pub fn angular_distance(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(bar: f64, price: f64) -> ChartPoint {
        ChartPoint::new(bar, price)
    }

    #[test]
    fn flat_segment_is_zero_compass() {
        for dx in [1.0, 5.0, 250.0] {
            let a = calculate_angle(pt(0.0, 100.0), pt(dx, 100.0), 1.0, AngleConvention::Compass);
            assert_eq!(a, 0.0);
        }
    }

    #[test]
    fn flat_segment_is_zero_slope_either_direction() {
        for dx in [-10.0, -1.0, 1.0, 10.0] {
            let a = calculate_angle(pt(0.0, 100.0), pt(dx, 100.0), 2.5, AngleConvention::Slope);
            assert_eq!(a, 0.0);
        }
    }

    #[test]
    fn coincident_points_are_zero() {
        let a = calculate_angle(pt(3.0, 50.0), pt(3.0, 50.0), 1.0, AngleConvention::Compass);
        assert_eq!(a, 0.0);
    }

    #[test]
    fn unit_ratio_diagonal_is_45() {
        let a = calculate_angle(pt(0.0, 100.0), pt(10.0, 110.0), 1.0, AngleConvention::Compass);
        assert!((a - 45.0).abs() < 1e-9);
        let s = calculate_angle(pt(0.0, 100.0), pt(10.0, 110.0), 1.0, AngleConvention::Slope);
        assert!((s - 45.0).abs() < 1e-9);
    }

    #[test]
    fn compass_falling_segment_wraps() {
        let a = calculate_angle(pt(0.0, 110.0), pt(10.0, 100.0), 1.0, AngleConvention::Compass);
        assert!((a - 315.0).abs() < 1e-9);
    }

    #[test]
    fn slope_falling_segment_is_negative() {
        let a = calculate_angle(pt(0.0, 110.0), pt(10.0, 100.0), 1.0, AngleConvention::Slope);
        assert!((a + 45.0).abs() < 1e-9);
    }

    #[test]
    fn slope_reflects_leftward_segments() {
        let right = calculate_angle(pt(0.0, 100.0), pt(10.0, 120.0), 0.5, AngleConvention::Slope);
        let left = calculate_angle(pt(0.0, 100.0), pt(-10.0, 120.0), 0.5, AngleConvention::Slope);
        assert!((right - left).abs() < 1e-9);
    }

    #[test]
    fn ratio_scales_in_opposite_directions() {
        // 10 price over 10 bars with ratio 2: compass sees 5/10, slope sees 20/10.
        let c = calculate_angle(pt(0.0, 0.0), pt(10.0, 10.0), 2.0, AngleConvention::Compass);
        let s = calculate_angle(pt(0.0, 0.0), pt(10.0, 10.0), 2.0, AngleConvention::Slope);
        assert!((c - 0.5_f64.atan().to_degrees()).abs() < 1e-9);
        assert!((s - 2.0_f64.atan().to_degrees()).abs() < 1e-9);
    }

    #[test]
    fn projection_inverts_angle() {
        let origin = pt(4.0, 100.0);
        for convention in [AngleConvention::Compass, AngleConvention::Slope] {
            let angle = 30.0;
            let price = project_price(origin, 6.0, angle, 1.7, convention);
            let back = calculate_angle(origin, pt(10.0, price), 1.7, convention);
            assert!((back - angle).abs() < 1e-9, "{convention:?}");
        }
    }

    #[test]
    fn vertical_projection_is_nan() {
        assert!(project_price(pt(0.0, 1.0), 1.0, 90.0, 1.0, AngleConvention::Compass).is_nan());
    }

    #[test]
    fn angular_distance_wraps() {
        assert!((angular_distance(355.0, 5.0) - 10.0).abs() < 1e-9);
        assert!((angular_distance(45.0, 40.0) - 5.0).abs() < 1e-9);
        assert!((angular_distance(0.0, 180.0) - 180.0).abs() < 1e-9);
    }
}
