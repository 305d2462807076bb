//! Fixed-rate control loop driving the commander from a state source.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::adapters::{Clock, StateSource};
use crate::commander::{Commander, CommanderState};
use crate::common::VelocityCommand;

#[derive(Debug, Clone, PartialEq)]
pub struct ControlLoopConfig {
    pub rate_hz: f64,
    /// States older than this are stale and the robot is held
    pub max_state_age: Duration,
    /// Upper bound on one run; `None` runs until the task is terminal
    pub max_duration: Option<Duration>,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            rate_hz: 10.0,
            max_state_age: Duration::from_millis(500),
            max_duration: None,
        }
    }
}

impl ControlLoopConfig {
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.rate_hz)
    }
}

pub struct ControlLoop {
    config: ControlLoopConfig,
}

impl ControlLoop {
    pub fn new(config: ControlLoopConfig) -> Self {
        Self { config }
    }

    /// One iteration: tick with a fresh state, hold otherwise.
    pub fn step(&self, commander: &mut Commander, source: &dyn StateSource, clock: &dyn Clock) -> VelocityCommand {
        let now = clock.now();
        match source.latest() {
            Some((state, stamp)) if now.saturating_duration_since(stamp) <= self.config.max_state_age => {
                commander.tick(&state)
            }
            Some((_, stamp)) => {
                tracing::warn!(
                    age_ms = now.saturating_duration_since(stamp).as_millis() as u64,
                    "robot state is stale"
                );
                commander.hold()
            }
            None => commander.hold(),
        }
    }

    /// Run until the commander reaches a terminal state, `running` is cleared
    /// or the configured duration elapses. Returns the final state.
    pub fn run(
        &self,
        commander: &mut Commander,
        source: &dyn StateSource,
        clock: &dyn Clock,
        running: &AtomicBool,
    ) -> CommanderState {
        let period = self.config.period();
        let started = Instant::now();
        tracing::info!(
            "control loop running at {}Hz ({}ms period)",
            self.config.rate_hz,
            period.as_millis()
        );

        while running.load(Ordering::Relaxed) {
            let loop_start = Instant::now();
            self.step(commander, source, clock);

            let state = commander.state();
            if state.is_terminal() {
                return state;
            }
            if self.config.max_duration.map_or(false, |max| started.elapsed() >= max) {
                tracing::warn!("control loop reached its time limit");
                return state;
            }

            // sleep for the remainder of the period
            let elapsed = loop_start.elapsed();
            if elapsed < period {
                thread::sleep(period - elapsed);
            }
        }
        commander.state()
    }
}
