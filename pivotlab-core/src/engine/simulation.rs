//! Candle-by-candle simulation with play / pause / step control.
//!
//! The engine itself never sleeps or spawns. Automatic playback hands the
//! caller a [`ScheduledStep`]; the caller waits `delay` and passes the token
//! back to [`SimulationEngine::tick`]. Start, pause and stop move to a new
//! epoch, so a step scheduled under an earlier epoch is ignored.
//!
//! Each step:
//! 1. mark open positions to the candle close and record equity
//! 2. build the rule context and evaluate every rule
//! 3. emit a `candle` event
//! 4. on the last candle, emit `complete` and move to `Completed`

use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::events::{AccountSnapshot, SimulationEvent, SimulationObserver};
use super::state::{
    validate_speed, EngineConfig, EngineStatus, PlaybackState, RunMode, RunToken, ScheduledStep,
};
use super::EngineError;
use crate::account::{Account, AccountStats};
use crate::domain::Candle;
use crate::rules::{build_rules, Rule, RuleConfig, RuleContext, RuleEngine};

pub struct SimulationEngine {
    candles: Vec<Candle>,
    config: EngineConfig,
    rules: RuleEngine,
    account: Account,
    state: PlaybackState,
    mode: RunMode,
    /// Index of the candle on display; `None` before the first step of a run.
    cursor: Option<usize>,
    /// Furthest candle the rules have seen this run. Only moves forward.
    processed: Option<usize>,
    epoch: u64,
    speed: f64,
    observers: Vec<Box<dyn SimulationObserver>>,
}

impl SimulationEngine {
    /// Validate inputs and build an idle engine.
    pub fn new(
        candles: Vec<Candle>,
        config: EngineConfig,
        rules: Vec<Box<dyn Rule>>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        validate_candles(&candles)?;
        let rules = RuleEngine::from_rules(rules);
        check_rule_requirements(&rules, candles.len())?;

        Ok(Self {
            account: Account::new(config.initial_balance),
            speed: config.speed,
            mode: RunMode::Auto {
                interval: config.interval,
            },
            candles,
            config,
            rules,
            state: PlaybackState::Idle,
            cursor: None,
            processed: None,
            epoch: 0,
            observers: Vec::new(),
        })
    }

    /// Build the rules from configs first, then the engine.
    pub fn from_configs(
        candles: Vec<Candle>,
        config: EngineConfig,
        rules: &[RuleConfig],
    ) -> Result<Self, EngineError> {
        let rules = build_rules(rules, config.price_to_bar_ratio)?;
        Self::new(candles, config, rules)
    }

    /// Replace the whole rule list. Takes effect from the next step.
    pub fn set_rules(&mut self, rules: Vec<Box<dyn Rule>>) -> Result<(), EngineError> {
        let rules = RuleEngine::from_rules(rules);
        check_rule_requirements(&rules, self.candles.len())?;
        self.rules = rules;
        Ok(())
    }

    pub fn subscribe(&mut self, observer: Box<dyn SimulationObserver>) {
        self.observers.push(observer);
    }

    // ── Lifecycle ──

    /// Reset account, rule stats and cursor, then process candle 0.
    ///
    /// Returns the first scheduled step in `Auto` mode while more candles remain.
    pub fn start(&mut self, mode: RunMode) -> Option<ScheduledStep> {
        self.account.reset();
        self.rules.reset();
        self.cursor = None;
        self.processed = None;
        self.epoch += 1;
        self.mode = mode;
        self.state = match mode {
            RunMode::Manual => PlaybackState::Paused,
            RunMode::Auto { .. } => PlaybackState::Running,
        };
        info!(
            candles = self.candles.len(),
            rules = self.rules.len(),
            ?mode,
            "simulation started"
        );

        self.process(0);
        self.next_schedule()
    }

    /// Deliver a scheduled step. Stale tokens and non-running states are no-ops.
    pub fn tick(&mut self, token: RunToken) -> Option<ScheduledStep> {
        if token.epoch != self.epoch || self.state != PlaybackState::Running {
            debug!(token = token.epoch, epoch = self.epoch, "dropping stale step");
            return None;
        }
        let next = self.cursor.map_or(0, |i| i + 1);
        self.advance(next);
        self.next_schedule()
    }

    /// Halt automatic playback. Returns false if the engine was not running.
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Running {
            return false;
        }
        self.state = PlaybackState::Paused;
        self.epoch += 1;
        info!(index = self.current_index(), "simulation paused");
        true
    }

    /// Continue automatic playback from the cursor.
    ///
    /// From `Idle` or `Completed` this starts a fresh automatic run. While
    /// already running it does nothing.
    pub fn resume(&mut self) -> Option<ScheduledStep> {
        let interval = self.auto_interval();
        match self.state {
            PlaybackState::Idle | PlaybackState::Completed => {
                self.start(RunMode::Auto { interval })
            }
            PlaybackState::Paused => {
                self.mode = RunMode::Auto { interval };
                self.state = PlaybackState::Running;
                self.epoch += 1;
                info!(index = self.current_index(), "simulation resumed");
                self.next_schedule()
            }
            PlaybackState::Running => None,
        }
    }

    /// End the run. Emits `complete` if a run was in progress.
    pub fn stop(&mut self) -> Option<AccountStats> {
        let in_progress = matches!(self.state, PlaybackState::Running | PlaybackState::Paused)
            && !self.reached_end();
        self.state = PlaybackState::Idle;
        self.epoch += 1;
        if in_progress {
            info!(index = self.current_index(), "simulation stopped");
            Some(self.finish())
        } else {
            None
        }
    }

    // ── Manual stepping ──

    /// Step to the candle after the cursor. Returns its index.
    ///
    /// On `Idle` this starts a manual run at candle 0. Automatic playback is
    /// paused first. Does nothing once the run is complete. Candles already
    /// seen after a `previous()` are revisited, not processed again.
    pub fn next(&mut self) -> Option<usize> {
        match self.state {
            PlaybackState::Idle => {
                self.start(RunMode::Manual);
                return self.cursor;
            }
            PlaybackState::Completed => return None,
            PlaybackState::Running => {
                self.pause();
            }
            PlaybackState::Paused => {}
        }

        let next = self.cursor.map_or(0, |i| i + 1);
        if next >= self.candles.len() {
            return None;
        }
        self.advance(next);
        Some(next)
    }

    /// Move the cursor back one candle.
    ///
    /// Re-marks open positions to that candle's close and emits its candle
    /// event. Trades and position changes made since are not undone, and no
    /// equity point is recorded.
    pub fn previous(&mut self) -> Option<usize> {
        if self.state == PlaybackState::Idle {
            return None;
        }
        if self.state == PlaybackState::Running {
            self.pause();
        }
        let target = self.cursor?.checked_sub(1)?;
        if self.state == PlaybackState::Completed {
            self.state = PlaybackState::Paused;
        }

        self.revisit(target);
        debug!(index = target, "stepped back");
        Some(target)
    }

    /// Change the playback multiplier. Only the cadence of later steps changes.
    pub fn set_speed(&mut self, multiplier: f64) -> Result<(), EngineError> {
        validate_speed(multiplier)?;
        self.speed = multiplier;
        debug!(speed = multiplier, "playback speed changed");
        Ok(())
    }

    /// Replay every candle synchronously and return the final statistics.
    pub fn run_to_completion(&mut self) -> AccountStats {
        self.start(RunMode::Manual);
        while self.state == PlaybackState::Paused {
            if self.next().is_none() {
                break;
            }
        }
        self.account.stats()
    }

    // ── Queries ──

    pub fn status(&self) -> EngineStatus {
        let progress = match self.cursor {
            Some(i) => (i + 1) as f64 / self.candles.len() as f64,
            None => 0.0,
        };
        EngineStatus {
            is_running: self.state == PlaybackState::Running,
            is_paused: self.state == PlaybackState::Paused,
            state: self.state,
            current_index: self.current_index(),
            progress,
            playback_speed: self.speed,
            rules: self.rules.statuses(),
            account_stats: self.account.stats(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.cursor.unwrap_or(0)
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Direct account access, for manual trading between steps.
    pub fn account_mut(&mut self) -> &mut Account {
        &mut self.account
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    // ── Internals ──

    fn auto_interval(&self) -> Duration {
        match self.mode {
            RunMode::Auto { interval } => interval,
            RunMode::Manual => self.config.interval,
        }
    }

    fn next_schedule(&self) -> Option<ScheduledStep> {
        if self.state != PlaybackState::Running {
            return None;
        }
        Some(ScheduledStep {
            token: RunToken { epoch: self.epoch },
            delay: scaled_delay(self.auto_interval(), self.speed),
        })
    }

    /// Move the cursor to `index`: a fresh candle is processed, a revisited
    /// one is only re-marked.
    fn advance(&mut self, index: usize) {
        if self.processed.is_some_and(|p| index <= p) {
            self.revisit(index);
            if index + 1 == self.candles.len() && self.reached_end() {
                // back at the end of a finished run; `complete` was already sent
                self.state = PlaybackState::Completed;
                self.epoch += 1;
            }
        } else {
            self.process(index);
        }
    }

    /// The last candle has been processed, so `complete` has been sent.
    fn reached_end(&self) -> bool {
        self.processed.is_some_and(|p| p + 1 == self.candles.len())
    }

    /// Show an already processed candle. Rules do not run, nothing is
    /// undone, and no equity point is recorded.
    fn revisit(&mut self, index: usize) {
        let Some(&candle) = self.candles.get(index) else {
            return;
        };
        self.account.mark_positions(candle.close);
        self.cursor = Some(index);
        self.emit(&SimulationEvent::Candle {
            index,
            candle,
            account: AccountSnapshot::of(&self.account),
        });
    }

    fn process(&mut self, index: usize) {
        let Some(&candle) = self.candles.get(index) else {
            warn!(index, len = self.candles.len(), "step past end of data");
            return;
        };

        self.account.update_positions(candle.timestamp, candle.close);

        match RuleContext::new(index, &self.candles, &mut self.account) {
            Ok(mut ctx) => {
                let summary = self.rules.evaluate(&mut ctx);
                debug!(index, fired = summary.fired, failed = summary.failed, "rules evaluated");
            }
            Err(e) => error!(index, error = %e, "could not build rule context"),
        }

        self.cursor = Some(index);
        self.processed = Some(index);
        self.emit(&SimulationEvent::Candle {
            index,
            candle,
            account: AccountSnapshot::of(&self.account),
        });

        if index + 1 == self.candles.len() {
            self.state = PlaybackState::Completed;
            self.epoch += 1;
            self.finish();
        }
    }

    fn finish(&mut self) -> AccountStats {
        let stats = self.account.stats();
        info!(
            trades = stats.total_trades,
            percent_return = stats.percent_return,
            max_drawdown_percent = stats.max_drawdown_percent,
            "simulation complete"
        );
        self.emit(&SimulationEvent::Complete {
            stats,
            account: Box::new(self.account.clone()),
        });
        stats
    }

    fn emit(&mut self, event: &SimulationEvent) {
        for observer in &mut self.observers {
            observer.on_event(event);
        }
    }
}

/// `interval / speed`, saturating at `Duration::MAX` for very slow speeds.
fn scaled_delay(interval: Duration, speed: f64) -> Duration {
    Duration::try_from_secs_f64(interval.as_secs_f64() / speed).unwrap_or(Duration::MAX)
}

fn validate_candles(candles: &[Candle]) -> Result<(), EngineError> {
    if candles.is_empty() {
        return Err(EngineError::EmptyData);
    }
    if let Some(i) = candles
        .windows(2)
        .position(|w| w[1].timestamp <= w[0].timestamp)
    {
        return Err(EngineError::UnorderedData { index: i + 1 });
    }
    Ok(())
}

fn check_rule_requirements(rules: &RuleEngine, available: usize) -> Result<(), EngineError> {
    match rules.max_min_candles() {
        Some((rule, required)) if required > available => Err(EngineError::InsufficientData {
            rule: rule.to_string(),
            required,
            available,
        }),
        _ => Ok(()),
    }
}
