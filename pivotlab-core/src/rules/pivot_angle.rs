//! Pivot-angle entry: enter when a freshly confirmed pivot completes a leg
//! whose angle lies inside a configured band.
//!
//! At step `index` only the candidate `index - lookback` can newly confirm,
//! since its window just became complete. For `up` the candidate must be a
//! pivot high and the leg is drawn from the latest pivot low before it; `down`
//! mirrors this with a pivot low and the preceding pivot high.

use tracing::debug;

use super::{allocation_size, Direction, Rule, RuleContext, RuleError};
use crate::geometry::{calculate_angle, latest_pivot_before, pivot_at, window_len, AngleConvention, PivotPoint};

/// A leg that qualifies for entry.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Setup {
    pivot: PivotPoint,
    anchor: PivotPoint,
    angle: f64,
}

#[derive(Debug, Clone)]
pub struct PivotAngleRule {
    name: String,
    min_angle: f64,
    max_angle: f64,
    direction: Direction,
    lookback: usize,
    allocation_pct: f64,
    price_to_bar_ratio: f64,
    last_fired_pivot: Option<usize>,
}

impl PivotAngleRule {
    pub fn new(
        min_angle: f64,
        max_angle: f64,
        direction: Direction,
        lookback: usize,
        allocation_pct: f64,
        price_to_bar_ratio: f64,
    ) -> Self {
        assert!(lookback >= 1, "pivot lookback must be >= 1");
        assert!(min_angle <= max_angle, "min_angle must not exceed max_angle");
        assert!(price_to_bar_ratio > 0.0, "price_to_bar_ratio must be positive");
        Self {
            name: format!("Pivot Angle {direction} [{min_angle}°, {max_angle}°]"),
            min_angle,
            max_angle,
            direction,
            lookback,
            allocation_pct,
            price_to_bar_ratio,
            last_fired_pivot: None,
        }
    }

    /// Leg angle with the expected direction positive.
    fn oriented_angle(&self, anchor: &PivotPoint, pivot: &PivotPoint) -> f64 {
        let raw = calculate_angle(
            anchor.into(),
            pivot.into(),
            self.price_to_bar_ratio,
            AngleConvention::Slope,
        );
        match self.direction {
            Direction::Up => raw,
            Direction::Down => -raw,
        }
    }

    fn setup(&self, ctx: &RuleContext<'_>) -> Option<Setup> {
        let candidate = ctx.index.checked_sub(self.lookback)?;
        if self.last_fired_pivot == Some(candidate) {
            return None;
        }

        let history = ctx.history();
        let kind = self.direction.pivot_kind();
        let pivot = pivot_at(history, candidate, self.lookback, kind)?;
        let anchor = latest_pivot_before(history, candidate, self.lookback, kind.opposite())?;

        let angle = self.oriented_angle(&anchor, &pivot);
        (self.min_angle..=self.max_angle)
            .contains(&angle)
            .then_some(Setup { pivot, anchor, angle })
    }
}

impl Rule for PivotAngleRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_candles(&self) -> usize {
        window_len(self.lookback)
    }

    fn condition(&self, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        Ok(self.setup(ctx).is_some())
    }

    fn action(&mut self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        let Some(setup) = self.setup(ctx) else {
            return Ok(());
        };

        let price = ctx.price();
        let size = allocation_size(ctx.account, price, self.allocation_pct);
        let reason = format!(
            "Pivot Angle {:.1}° ({} from {})",
            setup.angle, self.direction, setup.anchor.index
        );
        match ctx
            .account
            .open_position(ctx.timestamp(), price, self.direction.side(), size, &reason)
        {
            Some(_) => self.last_fired_pivot = Some(setup.pivot.index),
            None => debug!(rule = %self.name, pivot = setup.pivot.index, "entry not opened"),
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.last_fired_pivot = None;
    }
}
