//! PID path follower for a holonomic (omni-wheel) base.
//!
//! Independent x/y PIDs on the position error to the current waypoint, rotated
//! into the body frame when the heading is known. Orientation is only
//! controlled on the final waypoint, and only if it carries a yaw.

use nalgebra::{Rotation2, Vector2};

use crate::common::*;
use crate::path_tracking::{check_deviation, Pid, WaypointCursor};
use crate::registry::Options;

#[derive(Debug, Clone)]
pub struct OmniWheelPIDConfig {
    pub gains: [f64; 3],
    pub angular_gains: [f64; 3],
    pub max_linear: f64,
    pub max_angular: f64,
    pub waypoint_tolerance: f64,
    pub dt: f64,
    pub max_deviation: Option<f64>,
}

impl Default for OmniWheelPIDConfig {
    fn default() -> Self {
        Self {
            gains: [1.0, 0.0, 0.05],
            angular_gains: [1.5, 0.0, 0.0],
            max_linear: 1.0,
            max_angular: 1.0,
            waypoint_tolerance: 0.3,
            dt: 0.1,
            max_deviation: None,
        }
    }
}

pub struct OmniWheelPID {
    config: OmniWheelPIDConfig,
    x: Pid,
    y: Pid,
    angular: Pid,
    cursor: WaypointCursor,
}

impl OmniWheelPID {
    pub fn new(config: OmniWheelPIDConfig) -> Self {
        let [p, i, d] = config.gains;
        let [ap, ai, ad] = config.angular_gains;
        OmniWheelPID {
            x: Pid::new(p, i, d),
            y: Pid::new(p, i, d),
            angular: Pid::new(ap, ai, ad).with_limit(config.max_angular),
            cursor: WaypointCursor::new(),
            config,
        }
    }

    /// Options: `kp`, `ki`, `kd`, `kp_angular`, `ki_angular`, `kd_angular`,
    /// `max_linear`, `max_angular`, `waypoint_tolerance`, `dt`, `max_deviation`.
    pub fn from_options(options: Options) -> Result<Self, ConfigError> {
        let d = OmniWheelPIDConfig::default();
        let config = OmniWheelPIDConfig {
            gains: [
                options.f64("kp", d.gains[0])?,
                options.f64("ki", d.gains[1])?,
                options.f64("kd", d.gains[2])?,
            ],
            angular_gains: [
                options.f64("kp_angular", d.angular_gains[0])?,
                options.f64("ki_angular", d.angular_gains[1])?,
                options.f64("kd_angular", d.angular_gains[2])?,
            ],
            max_linear: options.positive_f64("max_linear", d.max_linear)?,
            max_angular: options.positive_f64("max_angular", d.max_angular)?,
            waypoint_tolerance: options.positive_f64("waypoint_tolerance", d.waypoint_tolerance)?,
            dt: options.positive_f64("dt", d.dt)?,
            max_deviation: options.opt_f64("max_deviation")?,
        };
        options.finish()?;
        Ok(Self::new(config))
    }
}

impl Controller for OmniWheelPID {
    fn name(&self) -> &'static str {
        "OmniWheelPID"
    }

    fn compute(&mut self, current: &RobotState, path: &Path) -> Result<VelocityCommand, ControllerFault> {
        if !current.is_finite() {
            return Err(ControllerFault::NonFiniteState);
        }
        let is_last = |cursor: &WaypointCursor| cursor.index() + 1 == path.len();
        let Some(target) = self.cursor.target(current, path, self.config.waypoint_tolerance) else {
            return Ok(Twist::stop());
        };
        let target = *target;
        check_deviation(current, path, self.config.max_deviation)?;

        let error = target.position.to_vector() - current.position.to_vector();
        let mut v = Vector2::new(self.x.step(error.x, self.config.dt), self.y.step(error.y, self.config.dt));
        if v.norm() > self.config.max_linear {
            v *= self.config.max_linear / v.norm();
        }

        let mut angular_z = 0.0;
        if let Some(yaw) = current.yaw {
            v = Rotation2::new(-yaw) * v;
            if let (true, Some(goal_yaw)) = (is_last(&self.cursor), target.yaw) {
                angular_z = self.angular.step(normalize_angle(goal_yaw - yaw), self.config.dt);
            }
        }

        Ok(Twist::new(v.x, v.y, angular_z))
    }

    fn reset(&mut self) {
        self.cursor.reset();
        self.x.reset();
        self.y.reset();
        self.angular.reset();
    }
}
