//! Candle/angle-intersection entry.
//!
//! Every [`RECOMPUTE_EVERY`] steps the two most recent pivots are refreshed.
//! If the line through them runs within [`ANGLE_TOLERANCE_DEG`] of the target
//! angle, a line at exactly the target angle is projected from the earlier
//! pivot, and the rule enters when a later candle touches it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{allocation_size, Direction, Rule, RuleContext, RuleError};
use crate::geometry::{
    angular_distance, calculate_angle, project_price, recent_pivots, window_len, AngleConvention,
    PivotPoint,
};

pub const RECOMPUTE_EVERY: usize = 5;
pub const ANGLE_TOLERANCE_DEG: f64 = 5.0;

/// Which part of the candle must straddle the projected price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Touch {
    #[default]
    Body,
    Wick,
}

#[derive(Debug, Clone)]
pub struct AngleIntersectionRule {
    name: String,
    target_angle: f64,
    direction: Direction,
    lookback: usize,
    touch: Touch,
    allocation_pct: f64,
    price_to_bar_ratio: f64,
    pair: Option<(PivotPoint, PivotPoint)>,
    last_entry_anchor: Option<usize>,
}

impl AngleIntersectionRule {
    pub fn new(
        target_angle: f64,
        direction: Direction,
        lookback: usize,
        touch: Touch,
        allocation_pct: f64,
        price_to_bar_ratio: f64,
    ) -> Self {
        assert!(lookback >= 1, "pivot lookback must be >= 1");
        assert!(price_to_bar_ratio > 0.0, "price_to_bar_ratio must be positive");
        let target_angle = target_angle.rem_euclid(360.0);
        Self {
            name: format!("Angle Intersection {target_angle}° ({direction})"),
            target_angle,
            direction,
            lookback,
            touch,
            allocation_pct,
            price_to_bar_ratio,
            pair: None,
            last_entry_anchor: None,
        }
    }

    /// Price of the target-angle line at the current step, if a live setup exists.
    fn projected_price(&self, ctx: &RuleContext<'_>) -> Option<f64> {
        let (first, second) = self.pair?;
        if self.last_entry_anchor == Some(first.index) || ctx.index <= second.index {
            return None;
        }

        let pair_angle = calculate_angle(
            (&first).into(),
            (&second).into(),
            self.price_to_bar_ratio,
            AngleConvention::Compass,
        );
        if angular_distance(pair_angle, self.target_angle) > ANGLE_TOLERANCE_DEG {
            return None;
        }

        let projected = project_price(
            (&first).into(),
            (ctx.index - first.index) as f64,
            self.target_angle,
            self.price_to_bar_ratio,
            AngleConvention::Compass,
        );
        projected.is_finite().then_some(projected)
    }

    fn touches(&self, ctx: &RuleContext<'_>, price: f64) -> bool {
        let c = &ctx.candle;
        let (lo, hi) = match self.touch {
            Touch::Body => (c.body_low(), c.body_high()),
            Touch::Wick => (c.low, c.high),
        };
        lo <= price && price <= hi
    }
}

impl Rule for AngleIntersectionRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_candles(&self) -> usize {
        window_len(self.lookback) + 1
    }

    fn prepare(&mut self, ctx: &RuleContext<'_>) -> Result<(), RuleError> {
        if ctx.index % RECOMPUTE_EVERY == 0 {
            let recent = recent_pivots(ctx.history(), self.lookback, 2);
            self.pair = match recent.as_slice() {
                [first, second] => Some((*first, *second)),
                _ => None,
            };
        }
        Ok(())
    }

    fn condition(&self, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        Ok(self
            .projected_price(ctx)
            .is_some_and(|p| self.touches(ctx, p)))
    }

    fn action(&mut self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let Some(projected) = self.projected_price(ctx) else {
            return Ok(());
        };

        let price = ctx.price();
        let size = allocation_size(ctx.account, price, self.allocation_pct);
        let reason = format!("Angle Intersection {:.1}° @ {projected:.2}", self.target_angle);
        let opened = ctx
            .account
            .open_position(ctx.timestamp(), price, self.direction.side(), size, &reason);
        if opened.is_none() {
            debug!(rule = %self.name, projected, "entry not opened");
        } else if let Some((first, _)) = self.pair {
            self.last_entry_anchor = Some(first.index);
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.pair = None;
        self.last_entry_anchor = None;
    }
}
