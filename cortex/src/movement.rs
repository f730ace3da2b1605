//! Keyboard-held locomotion state and the safety watchdog.
//!
//! The keyboard listener writes presses and releases; the watchdog loop is
//! the only other writer and only ever clears. Key-release events can be
//! lost on a dropped connection, so the watchdog is the independent backstop
//! bounding unattended movement to its halt timeout.

use crate::types::Event;
use robot::{MoveDirection, Robot};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

/// Directions currently held by the operator plus the time of the last key
/// event.
#[derive(Debug, Default)]
pub struct MovementState {
    active: HashSet<MoveDirection>,
    last_input: Option<Instant>,
}

impl MovementState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a directional key press (keyboard listener only).
    pub fn press(&mut self, direction: MoveDirection) {
        self.active.insert(direction);
        self.last_input = Some(Instant::now());
    }

    /// Record a directional key release (keyboard listener only).
    pub fn release(&mut self, direction: MoveDirection) {
        self.active.remove(&direction);
        self.last_input = Some(Instant::now());
    }

    /// Force-clear every held direction (watchdog only). Returns whether any
    /// direction was active.
    pub fn clear(&mut self) -> bool {
        let was_active = !self.active.is_empty();
        self.active.clear();
        was_active
    }

    /// Highest-priority held direction, if any.
    pub fn current(&self) -> Option<MoveDirection> {
        MoveDirection::PRIORITY
            .iter()
            .copied()
            .find(|d| self.active.contains(d))
    }

    pub fn is_active(&self) -> bool {
        !self.active.is_empty()
    }

    /// Time since the last key event, or `None` before the first one.
    pub fn idle_for(&self) -> Option<Duration> {
        self.last_input.map(|t| t.elapsed())
    }
}

/// Shared handle: listener and watchdog each hold a clone.
pub type SharedMovement = Arc<Mutex<MovementState>>;

pub fn shared_movement() -> SharedMovement {
    Arc::new(Mutex::new(MovementState::new()))
}

/// Watchdog timing. Both default to the values the hardware was tuned with.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    /// Fixed loop period, independent of keyboard events.
    pub tick: Duration,
    /// Halt after this long without a key event while directions are held.
    pub halt_timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            halt_timeout: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovementPhase {
    Idle,
    Active,
    Halted,
}

/// Periodic loop that dispatches held directions to the robot base and
/// force-stops it when key events stop arriving.
pub struct MovementWatchdog {
    state: SharedMovement,
    robot: Arc<dyn Robot>,
    config: WatchdogConfig,
    status: Option<mpsc::UnboundedSender<Event>>,
    phase: MovementPhase,
}

impl MovementWatchdog {
    pub fn new(state: SharedMovement, robot: Arc<dyn Robot>, config: WatchdogConfig) -> Self {
        Self {
            state,
            robot,
            config,
            status: None,
            phase: MovementPhase::Idle,
        }
    }

    /// Emit a status entry on each watchdog halt.
    pub fn with_status(mut self, status: mpsc::UnboundedSender<Event>) -> Self {
        self.status = Some(status);
        self
    }

    pub fn phase(&self) -> MovementPhase {
        self.phase
    }

    /// One watchdog period. Exposed so tests can drive the loop
    /// deterministically.
    pub async fn tick(&mut self) {
        let (current, stale) = {
            let mut state = self.state.lock().unwrap();
            let stale = state.is_active()
                && state
                    .idle_for()
                    .is_some_and(|idle| idle >= self.config.halt_timeout);
            if stale {
                state.clear();
            }
            (state.current(), stale)
        };

        if stale {
            // One stop command per halt transition; later ticks see an empty
            // direction set and stay quiet.
            warn!(timeout_ms = self.config.halt_timeout.as_millis() as u64, "watchdog halt");
            self.robot.halt().await;
            self.phase = MovementPhase::Halted;
            if let Some(status) = &self.status {
                let _ = status.send(Event::Status {
                    origin: None,
                    text: format!(
                        "movement halted: no key input for {} ms",
                        self.config.halt_timeout.as_millis()
                    ),
                });
            }
            return;
        }

        match current {
            Some(direction) => {
                self.robot.drive(direction).await;
                self.phase = MovementPhase::Active;
            }
            None => {
                if self.phase == MovementPhase::Active {
                    self.robot.halt().await;
                }
                self.phase = MovementPhase::Idle;
            }
        }
    }

    /// Run until `shutdown` fires, then force a final hardware stop.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            tick_ms = self.config.tick.as_millis() as u64,
            timeout_ms = self.config.halt_timeout.as_millis() as u64,
            "movement watchdog started"
        );
        let mut ticker = tokio::time::interval(self.config.tick);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick().await,
                _ = shutdown.changed() => break,
            }
        }
        self.state.lock().unwrap().clear();
        self.robot.halt().await;
        info!("movement watchdog stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_outranks_strafe() {
        let mut state = MovementState::new();
        state.press(MoveDirection::StrafeLeft);
        state.press(MoveDirection::Forward);
        assert_eq!(state.current(), Some(MoveDirection::Forward));
        state.release(MoveDirection::Forward);
        assert_eq!(state.current(), Some(MoveDirection::StrafeLeft));
    }

    #[test]
    fn clear_reports_whether_anything_was_held() {
        let mut state = MovementState::new();
        assert!(!state.clear());
        state.press(MoveDirection::Back);
        assert!(state.clear());
        assert!(!state.is_active());
    }
}
