//! Common traits defining the pluggable navigation strategies

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::common::error::{ControllerFault, ObservationError, PlanningFailure};
use crate::common::observation::Observation;
use crate::common::types::*;

/// Strategy producing candidate points for sampling-based planners.
///
/// Implementations hold no state that changes between calls, so a planner may
/// call [`Sampler::sample`] as often as it likes.
pub trait Sampler: Send + Sync {
    fn name(&self) -> &'static str;

    /// Draw one candidate point.
    fn sample(&self) -> Point;
}

/// Mutable obstacle representation queried for occupancy.
///
/// Updates are split into [`Environment::validate`] and [`Environment::apply`]
/// so that a malformed observation can be rejected before any state is touched.
pub trait Environment: Send + Sync {
    fn name(&self) -> &'static str;

    /// [`Observation::kind`] this environment accepts.
    fn observation_kind(&self) -> &'static str;

    /// Check an observation without mutating anything.
    fn validate(&self, observation: &Observation) -> Result<(), ObservationError>;

    /// Apply an observation that passed [`Environment::validate`].
    fn apply(&mut self, observation: &Observation);

    /// Occupancy of the robot footprint centred on `point`.
    fn point_status(&self, point: &Point) -> OccupancyStatus;

    /// Distance from `point` to the nearest known obstacle, if any is known.
    fn clearance(&self, point: &Point) -> Option<f64>;

    /// Spacing used when checking segments.
    fn check_resolution(&self) -> f64;

    /// True once at least one observation has been applied.
    fn is_initialized(&self) -> bool;

    fn clone_box(&self) -> Box<dyn Environment>;

    /// Validate-then-apply. Malformed observations are dropped and logged, never returned.
    fn update(&mut self, observation: &Observation) -> bool {
        match self.validate(observation) {
            Ok(()) => {
                self.apply(observation);
                true
            }
            Err(e) => {
                tracing::warn!(environment = self.name(), "dropping observation: {}", e);
                false
            }
        }
    }

    fn get_status(&self, state: &RobotState) -> OccupancyStatus {
        self.point_status(&state.position)
    }

    fn segment_status(&self, a: &Point, b: &Point) -> OccupancyStatus {
        let step = self.check_resolution().max(1e-3);
        let n = (a.distance(b) / step).ceil().max(1.0) as usize;
        let mut status = OccupancyStatus::Free;
        for i in 0..=n {
            status = status.combine(self.point_status(&a.lerp(b, i as f64 / n as f64)));
            if status.is_blocked() {
                break;
            }
        }
        status
    }

    /// Status of a whole path: waypoints and the segments between them.
    fn get_path_status(&self, path: &Path) -> OccupancyStatus {
        if path.len() == 1 {
            return self.get_status(&path.waypoints[0]);
        }
        let mut status = OccupancyStatus::Free;
        for (a, b) in path.segments() {
            status = status.combine(self.segment_status(a, b));
            if status.is_blocked() {
                break;
            }
        }
        status
    }
}

impl Clone for Box<dyn Environment> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Shared cancellation flag, checked cooperatively.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Deadline and cancellation for one plan() call.
#[derive(Debug, Clone)]
pub struct PlanContext {
    pub deadline: Instant,
    pub cancel: CancelToken,
}

impl PlanContext {
    pub fn new(deadline: Instant, cancel: CancelToken) -> Self {
        Self { deadline, cancel }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Instant::now() + timeout, CancelToken::new())
    }

    /// Call at iteration boundaries.
    pub fn checkpoint(&self) -> Result<(), PlanningFailure> {
        if self.cancel.is_cancelled() {
            return Err(PlanningFailure::Cancelled);
        }
        if Instant::now() >= self.deadline {
            return Err(PlanningFailure::Timeout);
        }
        Ok(())
    }
}

/// Strategy computing a path from start to goal against an environment snapshot.
///
/// On success every waypoint must be non-blocked in `env`, the first waypoint
/// must be `start` and the last `goal`.
pub trait Planner: Send + Sync {
    fn name(&self) -> &'static str;

    fn plan(
        &self,
        start: &RobotState,
        goal: &RobotState,
        env: &dyn Environment,
        ctx: &PlanContext,
    ) -> Result<Path, PlanningFailure>;
}

/// Reject requests whose endpoints are already known to be blocked.
pub fn check_endpoints(
    start: &RobotState,
    goal: &RobotState,
    env: &dyn Environment,
) -> Result<(), PlanningFailure> {
    if env.get_status(start).is_blocked() {
        return Err(PlanningFailure::StartBlocked);
    }
    if env.get_status(goal).is_blocked() {
        return Err(PlanningFailure::GoalBlocked);
    }
    Ok(())
}

/// Strategy converting the active path and current state into one velocity command.
pub trait Controller: Send {
    fn name(&self) -> &'static str;

    /// Must return a stop command for an empty path.
    fn compute(&mut self, current: &RobotState, path: &Path) -> Result<VelocityCommand, ControllerFault>;

    /// Forget progress along the previous path.
    fn reset(&mut self);
}
