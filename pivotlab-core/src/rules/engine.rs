//! Rule engine: ordered rule list, evaluated in full every step.
//!
//! No short-circuiting: if one rule closes a position and a later rule opens
//! a new one, both happen on the same candle. A rule that errors or panics is
//! logged under its name and skipped for this step only.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::{Rule, RuleContext, RuleError};

/// Per-rule trigger counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStats {
    pub triggered: u64,
    pub last_triggered: Option<i64>,
}

impl RuleStats {
    fn record(&mut self, timestamp: i64) {
        self.triggered += 1;
        self.last_triggered = Some(timestamp);
    }
}

/// Status row for one rule, as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStatus {
    pub name: String,
    pub triggered: u64,
    pub last_triggered: Option<i64>,
}

/// Outcome counts for one evaluation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub fired: usize,
    pub failed: usize,
}

struct RuleSlot {
    rule: Box<dyn Rule>,
    stats: RuleStats,
}

#[derive(Default)]
pub struct RuleEngine {
    slots: Vec<RuleSlot>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        let mut engine = Self::new();
        for rule in rules {
            engine.add_rule(rule);
        }
        engine
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.slots.push(RuleSlot {
            rule,
            stats: RuleStats::default(),
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Zero all counters and drop every rule's cached state.
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.stats = RuleStats::default();
            slot.rule.reset();
        }
    }

    /// The rule demanding the longest series, with its requirement.
    pub fn max_min_candles(&self) -> Option<(&str, usize)> {
        self.slots
            .iter()
            .map(|s| (s.rule.name(), s.rule.min_candles()))
            .max_by_key(|&(_, n)| n)
    }

    pub fn statuses(&self) -> Vec<RuleStatus> {
        self.slots
            .iter()
            .map(|s| RuleStatus {
                name: s.rule.name().to_string(),
                triggered: s.stats.triggered,
                last_triggered: s.stats.last_triggered,
            })
            .collect()
    }

    /// Evaluate every rule, in insertion order, against `ctx`.
    pub fn evaluate(&mut self, ctx: &mut RuleContext<'_>) -> EvaluationSummary {
        let mut summary = EvaluationSummary::default();

        for slot in &mut self.slots {
            let rule = &mut slot.rule;

            let prepared = guarded(|| rule.prepare(&*ctx));
            let fired = prepared.and_then(|()| guarded(|| rule.condition(&*ctx)));
            let fired = match fired {
                Ok(fired) => fired,
                Err(e) => {
                    error!(rule = rule.name(), index = ctx.index, error = %e, "rule condition failed");
                    summary.failed += 1;
                    continue;
                }
            };
            if !fired {
                continue;
            }

            slot.stats.record(ctx.timestamp());
            summary.fired += 1;
            debug!(rule = rule.name(), index = ctx.index, "rule fired");

            if let Err(e) = guarded(|| rule.action(ctx)) {
                error!(rule = rule.name(), index = ctx.index, error = %e, "rule action failed");
                summary.failed += 1;
            }
        }

        summary
    }
}

/// Run `f`, turning a panic into `RuleError::Panicked`.
fn guarded<T>(f: impl FnOnce() -> Result<T, RuleError>) -> Result<T, RuleError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(RuleError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
