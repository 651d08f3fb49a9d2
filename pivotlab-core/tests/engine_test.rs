//! Integration tests: engine lifecycle, rule dispatch through the engine, and
//! the reference scenarios.

use std::sync::mpsc;
use std::time::Duration;

use pivotlab_core::account::Account;
use pivotlab_core::domain::{Candle, Side};
use pivotlab_core::engine::{
    EngineConfig, EngineError, EventLog, PlaybackState, RunMode, SimulationEngine, SimulationEvent,
};
use pivotlab_core::geometry::{calculate_angle, detect_candle_pivots, AngleConvention, ChartPoint};
use pivotlab_core::rules::{Direction, Rule, RuleConfig, RuleContext, RuleError};

// ── Helpers ──────────────────────────────────────────────────────────

fn rising(n: usize, start: f64, step_pct: f64) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let close = start * (1.0 + step_pct / 100.0 * i as f64);
            Candle::new(i as i64 * 60_000, close, close + 0.1, close - 0.1, close, 100.0)
        })
        .collect()
}

fn tp_sl() -> RuleConfig {
    RuleConfig::TakeProfitStopLoss {
        take_profit: 5.0,
        stop_loss: 2.0,
    }
}

/// Condition always errors.
struct Broken;

impl Rule for Broken {
    fn name(&self) -> &str {
        "broken"
    }
    fn condition(&self, _ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        Err(RuleError::Other("broken on purpose".into()))
    }
    fn action(&mut self, _ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        Ok(())
    }
}

/// Buys one unit on the first step only.
struct BuyOnce {
    done: bool,
}

impl Rule for BuyOnce {
    fn name(&self) -> &str {
        "buy_once"
    }
    fn condition(&self, _ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
        Ok(!self.done)
    }
    fn action(&mut self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        self.done = true;
        let (ts, price) = (ctx.timestamp(), ctx.price());
        ctx.account.open_position(ts, price, Side::Buy, 1.0, "once");
        Ok(())
    }
    fn reset(&mut self) {
        self.done = false;
    }
}

// ── Scenarios ────────────────────────────────────────────────────────

#[test]
fn scenario_a_flat_candles_have_no_pivots() {
    let candles: Vec<Candle> = (0..10)
        .map(|i| Candle::new(i * 1_000, 100.0, 100.0, 100.0, 100.0, 0.0))
        .collect();
    let pivots = detect_candle_pivots(&candles, 2);
    assert!(pivots.highs.is_empty());
    assert!(pivots.lows.is_empty());
}

#[test]
fn scenario_b_buy_then_close_in_profit() {
    let mut account = Account::new(10_000.0);
    let id = account.open_position(0, 100.0, Side::Buy, 10.0, "entry").unwrap();
    assert_eq!(account.balance(), 9_000.0);
    assert!(account.close_position(id, 1, 110.0, "exit"));
    assert_eq!(account.trades()[0].pnl, 100.0);
    assert_eq!(account.balance(), 10_100.0);
}

#[test]
fn scenario_c_take_profit_through_engine() {
    // +1.5% per candle: 100, 101.5, 103, 104.5, 106
    let candles = rising(6, 100.0, 1.5);
    let mut engine =
        SimulationEngine::from_configs(candles, EngineConfig::new(10_000.0), &[tp_sl()]).unwrap();

    engine.start(RunMode::Manual);
    engine
        .account_mut()
        .open_position(0, 100.0, Side::Buy, 10.0, "manual")
        .unwrap();
    while engine.next().is_some() {}

    let trades = engine.account().trades();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].exit_reason, "Take Profit (5%)");
    assert!((trades[0].exit_price - 106.0).abs() < 1e-9);
    assert_eq!(engine.status().rules[0].triggered, 1);
}

#[test]
fn scenario_d_equal_prices_zero_angle() {
    let a = ChartPoint::new(0.0, 42.0);
    let b = ChartPoint::new(7.0, 42.0);
    assert_eq!(calculate_angle(a, b, 1.0, AngleConvention::Compass), 0.0);
    assert_eq!(calculate_angle(a, b, 1.0, AngleConvention::Slope), 0.0);
}

// ── Setup validation ─────────────────────────────────────────────────

#[test]
fn short_series_rejected_for_pivot_rule() {
    let cfg = RuleConfig::PivotAngle {
        min_angle: 10.0,
        max_angle: 80.0,
        direction: Direction::Up,
        pivot_lookback: 5,
        allocation_pct: 10.0,
    };
    let err = SimulationEngine::from_configs(rising(10, 100.0, 1.0), EngineConfig::default(), &[cfg])
        .err()
        .unwrap();
    match err {
        EngineError::InsufficientData {
            required, available, ..
        } => {
            assert_eq!(required, 11);
            assert_eq!(available, 10);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn invalid_rule_config_surfaces_as_engine_error() {
    let cfg = RuleConfig::TakeProfitStopLoss {
        take_profit: -1.0,
        stop_loss: 2.0,
    };
    let err = SimulationEngine::from_configs(rising(5, 100.0, 1.0), EngineConfig::default(), &[cfg]).err();
    assert!(matches!(err, Some(EngineError::Rule(_))));
}

#[test]
fn set_rules_validates_against_data() {
    let mut engine = SimulationEngine::new(rising(4, 100.0, 1.0), EngineConfig::default(), Vec::new()).unwrap();
    let too_long = RuleConfig::AngleIntersection {
        target_angle: 45.0,
        direction: Direction::Up,
        pivot_lookback: 3,
        touch: Default::default(),
        allocation_pct: 10.0,
    }
    .build(1.0)
    .unwrap();
    assert!(engine.set_rules(vec![too_long]).is_err());
    assert!(engine.set_rules(vec![Box::new(BuyOnce { done: false })]).is_ok());
    assert_eq!(engine.rules().len(), 1);
}

// ── Rule isolation ───────────────────────────────────────────────────

#[test]
fn failing_rule_does_not_block_others() {
    let rules: Vec<Box<dyn Rule>> = vec![Box::new(Broken), Box::new(BuyOnce { done: false })];
    let mut engine = SimulationEngine::new(rising(5, 100.0, 1.0), EngineConfig::default(), rules).unwrap();
    engine.run_to_completion();

    assert_eq!(engine.account().positions().len(), 1);
    let status = engine.status();
    assert_eq!(status.rules[0].triggered, 0);
    assert_eq!(status.rules[1].triggered, 1);
    assert_eq!(status.rules[1].last_triggered, Some(0));
}

#[test]
fn restart_resets_account_and_rule_state() {
    let rules: Vec<Box<dyn Rule>> = vec![Box::new(BuyOnce { done: false })];
    let mut engine = SimulationEngine::new(rising(5, 100.0, 1.0), EngineConfig::default(), rules).unwrap();
    engine.run_to_completion();
    engine.run_to_completion();

    assert_eq!(engine.account().positions().len(), 1);
    assert_eq!(engine.account().equity_curve().len(), 5);
    assert_eq!(engine.status().rules[0].triggered, 1);
}

// ── Backward stepping ────────────────────────────────────────────────

#[test]
fn previous_re_marks_without_undoing_trades() {
    let rules: Vec<Box<dyn Rule>> = vec![Box::new(BuyOnce { done: false })];
    let mut engine = SimulationEngine::new(rising(5, 100.0, 10.0), EngineConfig::default(), rules).unwrap();
    engine.next();
    engine.next();
    engine.next();
    let curve_len = engine.account().equity_curve().len();

    assert_eq!(engine.previous(), Some(1));
    let account = engine.account();
    assert_eq!(account.positions().len(), 1);
    // marked back to candle 1's close of 110
    assert!((account.unrealized_pnl() - 10.0).abs() < 1e-9);
    assert_eq!(account.equity_curve().len(), curve_len);
    assert_eq!(engine.current_index(), 1);
}

// ── Events ───────────────────────────────────────────────────────────

#[test]
fn candle_events_carry_account_snapshot() {
    let rules: Vec<Box<dyn Rule>> = vec![Box::new(BuyOnce { done: false })];
    let mut engine = SimulationEngine::new(rising(3, 100.0, 1.0), EngineConfig::default(), rules).unwrap();
    let (tx, rx) = mpsc::channel();
    engine.subscribe(Box::new(tx));
    let log = EventLog::new();
    engine.subscribe(Box::new(log.clone()));

    engine.run_to_completion();
    drop(engine);

    let events: Vec<SimulationEvent> = rx.iter().collect();
    assert_eq!(events.len(), 4);
    match &events[0] {
        SimulationEvent::Candle { index, account, .. } => {
            assert_eq!(*index, 0);
            assert_eq!(account.open_positions.len(), 1);
        }
        other => panic!("expected candle event, got {other:?}"),
    }
    match &events[3] {
        SimulationEvent::Complete { stats, account } => {
            assert_eq!(stats.open_positions, 1);
            assert_eq!(account.positions().len(), 1);
        }
        other => panic!("expected complete event, got {other:?}"),
    }
    assert_eq!(log.candle_indices(), vec![0, 1, 2]);
    assert!(!events.iter().any(|e| matches!(e, SimulationEvent::Trade { .. })));
}

#[test]
fn stale_tokens_after_stop_are_ignored() {
    let mut engine = SimulationEngine::new(rising(10, 100.0, 1.0), EngineConfig::default(), Vec::new()).unwrap();
    let step = engine
        .start(RunMode::Auto {
            interval: Duration::from_millis(10),
        })
        .unwrap();
    engine.stop();
    assert!(engine.tick(step.token).is_none());
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.current_index(), 0);
}
