//! Rule factory: converts `RuleConfig` variants into runtime `Box<dyn Rule>`.
//!
//! Configs are plain serde data (tagged by `type`), so rule lists can be read
//! from TOML/JSON, hashed, and swept over. Validation happens here, before any
//! rule constructor runs.

use serde::{Deserialize, Serialize};

use super::{
    AngleIntersectionRule, Direction, PivotAngleRule, Rule, TakeProfitStopLossRule, Touch,
    TrendlineBreakRule,
};

// ─── Error type ──────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RuleConfigError {
    #[error("{rule}: {param} must be {expected}, got {value}")]
    InvalidParam {
        rule: &'static str,
        param: &'static str,
        expected: &'static str,
        value: f64,
    },
    #[error("{rule}: min_angle {min} exceeds max_angle {max}")]
    InvertedAngleBand {
        rule: &'static str,
        min: f64,
        max: f64,
    },
    #[error("price_to_bar_ratio must be finite and > 0, got {0}")]
    InvalidRatio(f64),
}

// ─── Defaults ────────────────────────────────────────────────────────

fn default_lookback() -> usize {
    3
}

fn default_allocation_pct() -> f64 {
    10.0
}

fn default_threshold_pct() -> f64 {
    1.0
}

// ─── Config enum ─────────────────────────────────────────────────────

/// One configured rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfig {
    /// Enter on a freshly confirmed pivot whose leg angle lies in `[min_angle, max_angle]`.
    PivotAngle {
        min_angle: f64,
        max_angle: f64,
        #[serde(default)]
        direction: Direction,
        #[serde(default = "default_lookback")]
        pivot_lookback: usize,
        #[serde(default = "default_allocation_pct")]
        allocation_pct: f64,
    },

    /// Close everything when price breaks a position's entry trendline.
    TrendlineBreak {
        #[serde(default = "default_threshold_pct")]
        threshold_pct: f64,
    },

    /// Enter when a candle touches a target-angle line projected from recent pivots.
    AngleIntersection {
        target_angle: f64,
        #[serde(default)]
        direction: Direction,
        #[serde(default = "default_lookback")]
        pivot_lookback: usize,
        #[serde(default)]
        touch: Touch,
        #[serde(default = "default_allocation_pct")]
        allocation_pct: f64,
    },

    /// Exit positions at a percent gain or loss.
    TakeProfitStopLoss { take_profit: f64, stop_loss: f64 },
}

impl RuleConfig {
    /// The serde tag for this variant.
    pub fn rule_type(&self) -> &'static str {
        match self {
            RuleConfig::PivotAngle { .. } => "pivot_angle",
            RuleConfig::TrendlineBreak { .. } => "trendline_break",
            RuleConfig::AngleIntersection { .. } => "angle_intersection",
            RuleConfig::TakeProfitStopLoss { .. } => "take_profit_stop_loss",
        }
    }

    pub fn validate(&self) -> Result<(), RuleConfigError> {
        let rule = self.rule_type();
        match *self {
            RuleConfig::PivotAngle {
                min_angle,
                max_angle,
                pivot_lookback,
                allocation_pct,
                ..
            } => {
                finite(rule, "min_angle", min_angle)?;
                finite(rule, "max_angle", max_angle)?;
                if min_angle > max_angle {
                    return Err(RuleConfigError::InvertedAngleBand {
                        rule,
                        min: min_angle,
                        max: max_angle,
                    });
                }
                lookback(rule, pivot_lookback)?;
                allocation(rule, allocation_pct)
            }
            RuleConfig::TrendlineBreak { threshold_pct } => {
                if !(threshold_pct.is_finite() && threshold_pct >= 0.0) {
                    return Err(invalid(rule, "threshold_pct", ">= 0", threshold_pct));
                }
                Ok(())
            }
            RuleConfig::AngleIntersection {
                target_angle,
                pivot_lookback,
                allocation_pct,
                ..
            } => {
                finite(rule, "target_angle", target_angle)?;
                lookback(rule, pivot_lookback)?;
                allocation(rule, allocation_pct)
            }
            RuleConfig::TakeProfitStopLoss {
                take_profit,
                stop_loss,
            } => {
                positive(rule, "take_profit", take_profit)?;
                positive(rule, "stop_loss", stop_loss)
            }
        }
    }

    /// Validate and construct the runtime rule.
    pub fn build(&self, price_to_bar_ratio: f64) -> Result<Box<dyn Rule>, RuleConfigError> {
        if !(price_to_bar_ratio.is_finite() && price_to_bar_ratio > 0.0) {
            return Err(RuleConfigError::InvalidRatio(price_to_bar_ratio));
        }
        self.validate()?;

        Ok(match *self {
            RuleConfig::PivotAngle {
                min_angle,
                max_angle,
                direction,
                pivot_lookback,
                allocation_pct,
            } => Box::new(PivotAngleRule::new(
                min_angle,
                max_angle,
                direction,
                pivot_lookback,
                allocation_pct,
                price_to_bar_ratio,
            )),
            RuleConfig::TrendlineBreak { threshold_pct } => {
                Box::new(TrendlineBreakRule::new(threshold_pct))
            }
            RuleConfig::AngleIntersection {
                target_angle,
                direction,
                pivot_lookback,
                touch,
                allocation_pct,
            } => Box::new(AngleIntersectionRule::new(
                target_angle,
                direction,
                pivot_lookback,
                touch,
                allocation_pct,
                price_to_bar_ratio,
            )),
            RuleConfig::TakeProfitStopLoss {
                take_profit,
                stop_loss,
            } => Box::new(TakeProfitStopLossRule::new(take_profit, stop_loss)),
        })
    }
}

/// Build a whole rule list, in order. Fails on the first invalid config.
pub fn build_rules(
    configs: &[RuleConfig],
    price_to_bar_ratio: f64,
) -> Result<Vec<Box<dyn Rule>>, RuleConfigError> {
    configs.iter().map(|c| c.build(price_to_bar_ratio)).collect()
}

// ─── Helpers ─────────────────────────────────────────────────────────

fn invalid(rule: &'static str, param: &'static str, expected: &'static str, value: f64) -> RuleConfigError {
    RuleConfigError::InvalidParam {
        rule,
        param,
        expected,
        value,
    }
}

fn finite(rule: &'static str, param: &'static str, value: f64) -> Result<(), RuleConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(rule, param, "finite", value))
    }
}

fn positive(rule: &'static str, param: &'static str, value: f64) -> Result<(), RuleConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(rule, param, "> 0", value))
    }
}

fn lookback(rule: &'static str, value: usize) -> Result<(), RuleConfigError> {
    if value >= 1 {
        Ok(())
    } else {
        Err(invalid(rule, "pivot_lookback", ">= 1", value as f64))
    }
}

fn allocation(rule: &'static str, value: f64) -> Result<(), RuleConfigError> {
    if value.is_finite() && value > 0.0 && value <= 100.0 {
        Ok(())
    } else {
        Err(invalid(rule, "allocation_pct", "in (0, 100]", value))
    }
}
