//! Player: runs a `SimulationEngine` on its own thread and drives its timer.
//!
//! The worker thread owns the engine outright. Commands arrive over an `mpsc`
//! channel; scheduled steps are waited out with `recv_timeout`, so a command
//! and a step can never interleave and the engine needs no locking.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, warn};

use super::simulation::SimulationEngine;
use super::state::{EngineStatus, PlaybackState, RunMode, RunToken, ScheduledStep};

/// Commands accepted by the player thread.
#[derive(Debug)]
pub enum PlayerCommand {
    Start(RunMode),
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    SetSpeed(f64),
    Status(Sender<EngineStatus>),
    Shutdown,
}

/// Handle to a running player thread.
pub struct Player {
    tx: Sender<PlayerCommand>,
    handle: Option<JoinHandle<SimulationEngine>>,
}

impl Player {
    /// Move `engine` onto a new worker thread.
    pub fn spawn(engine: SimulationEngine) -> io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("pivotlab-player".into())
            .spawn(move || player_loop(engine, rx))?;
        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Queue a command. Returns false if the worker has exited.
    pub fn send(&self, cmd: PlayerCommand) -> bool {
        self.tx.send(cmd).is_ok()
    }

    pub fn start(&self, mode: RunMode) -> bool {
        self.send(PlayerCommand::Start(mode))
    }

    pub fn pause(&self) -> bool {
        self.send(PlayerCommand::Pause)
    }

    pub fn resume(&self) -> bool {
        self.send(PlayerCommand::Resume)
    }

    pub fn stop(&self) -> bool {
        self.send(PlayerCommand::Stop)
    }

    pub fn next(&self) -> bool {
        self.send(PlayerCommand::Next)
    }

    pub fn previous(&self) -> bool {
        self.send(PlayerCommand::Previous)
    }

    pub fn set_speed(&self, multiplier: f64) -> bool {
        self.send(PlayerCommand::SetSpeed(multiplier))
    }

    /// Ask the worker for a status snapshot and wait for it.
    pub fn status(&self) -> Option<EngineStatus> {
        let (reply_tx, reply_rx) = mpsc::channel();
        if !self.send(PlayerCommand::Status(reply_tx)) {
            return None;
        }
        reply_rx.recv().ok()
    }

    /// Stop the worker and take the engine back.
    pub fn shutdown(mut self) -> Option<SimulationEngine> {
        self.join()
    }

    fn join(&mut self) -> Option<SimulationEngine> {
        let handle = self.handle.take()?;
        let _ = self.tx.send(PlayerCommand::Shutdown);
        match handle.join() {
            Ok(engine) => Some(engine),
            Err(_) => {
                warn!("player thread panicked");
                None
            }
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.join();
    }
}

fn player_loop(mut engine: SimulationEngine, rx: Receiver<PlayerCommand>) -> SimulationEngine {
    let mut pending: Option<(RunToken, Option<Instant>)> = None;

    loop {
        let cmd = match pending {
            Some((_, Some(deadline))) => {
                let wait = deadline.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(cmd) => Some(cmd),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            // idle, or a delay too long to represent: wait for a command
            Some((_, None)) | None => match rx.recv() {
                Ok(cmd) => Some(cmd),
                Err(_) => break,
            },
        };

        match cmd {
            None => {
                if let Some((token, _)) = pending.take() {
                    pending = deadline_for(engine.tick(token));
                }
            }
            Some(PlayerCommand::Shutdown) => break,
            Some(cmd) => {
                if let Some(step) = handle_command(&mut engine, cmd) {
                    pending = deadline_for(step);
                }
                if engine.state() != PlaybackState::Running {
                    pending = None;
                }
            }
        }
    }

    debug!("player loop exited");
    engine
}

/// Apply one command. `Some(step)` replaces the pending schedule.
fn handle_command(
    engine: &mut SimulationEngine,
    cmd: PlayerCommand,
) -> Option<Option<ScheduledStep>> {
    match cmd {
        PlayerCommand::Start(mode) => Some(engine.start(mode)),
        PlayerCommand::Resume => Some(engine.resume()),
        PlayerCommand::Pause => {
            engine.pause();
            None
        }
        PlayerCommand::Stop => {
            engine.stop();
            None
        }
        PlayerCommand::Next => {
            engine.next();
            None
        }
        PlayerCommand::Previous => {
            engine.previous();
            None
        }
        PlayerCommand::SetSpeed(multiplier) => {
            if let Err(e) = engine.set_speed(multiplier) {
                warn!(error = %e, "ignored speed change");
            }
            None
        }
        PlayerCommand::Status(reply) => {
            let _ = reply.send(engine.status());
            None
        }
        PlayerCommand::Shutdown => None,
    }
}

fn deadline_for(step: Option<ScheduledStep>) -> Option<(RunToken, Option<Instant>)> {
    step.map(|s| (s.token, Instant::now().checked_add(s.delay)))
}
