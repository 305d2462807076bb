//! PID path follower for a differential-drive base.
//!
//! Angular velocity comes from a PID on the heading error to the current
//! waypoint, linear velocity from a PID on the distance still to travel. When
//! the heading error exceeds `rotate_threshold` the base turns in place.

use crate::common::*;
use crate::path_tracking::{check_deviation, Pid, WaypointCursor};
use crate::registry::Options;

#[derive(Debug, Clone)]
pub struct DiffPIDConfig {
    pub linear_gains: [f64; 3],
    pub angular_gains: [f64; 3],
    /// [m/s]
    pub max_linear: f64,
    /// [rad/s]
    pub max_angular: f64,
    pub waypoint_tolerance: f64,
    /// control period [s]
    pub dt: f64,
    /// [rad]
    pub rotate_threshold: f64,
    /// fault when further than this from the path [m]
    pub max_deviation: Option<f64>,
}

impl Default for DiffPIDConfig {
    fn default() -> Self {
        Self {
            linear_gains: [1.0, 0.0, 0.1],
            angular_gains: [2.0, 0.0, 0.1],
            max_linear: 1.0,
            max_angular: 1.5,
            waypoint_tolerance: 0.3,
            dt: 0.1,
            rotate_threshold: 0.8,
            max_deviation: None,
        }
    }
}

pub struct DiffPID {
    config: DiffPIDConfig,
    linear: Pid,
    angular: Pid,
    cursor: WaypointCursor,
}

impl DiffPID {
    pub fn new(config: DiffPIDConfig) -> Self {
        let [lp, li, ld] = config.linear_gains;
        let [ap, ai, ad] = config.angular_gains;
        DiffPID {
            linear: Pid::new(lp, li, ld).with_limit(config.max_linear),
            angular: Pid::new(ap, ai, ad).with_limit(config.max_angular),
            cursor: WaypointCursor::new(),
            config,
        }
    }

    /// Options: `kp_linear`, `ki_linear`, `kd_linear`, `kp_angular`, `ki_angular`,
    /// `kd_angular`, `max_linear`, `max_angular`, `waypoint_tolerance`, `dt`,
    /// `rotate_threshold`, `max_deviation`.
    pub fn from_options(options: Options) -> Result<Self, ConfigError> {
        let d = DiffPIDConfig::default();
        let config = DiffPIDConfig {
            linear_gains: [
                options.f64("kp_linear", d.linear_gains[0])?,
                options.f64("ki_linear", d.linear_gains[1])?,
                options.f64("kd_linear", d.linear_gains[2])?,
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
            rotate_threshold: options.positive_f64("rotate_threshold", d.rotate_threshold)?,
            max_deviation: options.opt_f64("max_deviation")?,
        };
        options.finish()?;
        Ok(Self::new(config))
    }
}

impl Controller for DiffPID {
    fn name(&self) -> &'static str {
        "DiffPID"
    }

    fn compute(&mut self, current: &RobotState, path: &Path) -> Result<VelocityCommand, ControllerFault> {
        if !current.is_finite() {
            return Err(ControllerFault::NonFiniteState);
        }
        let Some(target) = self.cursor.target(current, path, self.config.waypoint_tolerance) else {
            return Ok(Twist::stop());
        };
        let target_yaw = target.yaw;
        let target = target.position;
        let yaw = current.yaw.ok_or(ControllerFault::MissingOrientation)?;
        check_deviation(current, path, self.config.max_deviation)?;

        // on the final waypoint: turn in place to the requested heading
        let arrived = self.cursor.index() + 1 == path.len()
            && current.position.distance(&target) <= self.config.waypoint_tolerance;
        if let (true, Some(goal_yaw)) = (arrived, target_yaw) {
            self.linear.reset();
            let angular_z = self.angular.step(normalize_angle(goal_yaw - yaw), self.config.dt);
            return Ok(Twist::new(0.0, 0.0, angular_z));
        }

        let heading_error = normalize_angle(current.position.angle_to(&target) - yaw);
        let angular_z = self.angular.step(heading_error, self.config.dt);

        let linear_x = if heading_error.abs() > self.config.rotate_threshold {
            self.linear.reset();
            0.0
        } else {
            let remaining = self.cursor.remaining(current, path);
            self.linear.step(remaining, self.config.dt).max(0.0) * heading_error.cos()
        };

        Ok(Twist::new(linear_x, 0.0, angular_z))
    }

    fn reset(&mut self) {
        self.cursor.reset();
        self.linear.reset();
        self.angular.reset();
    }
}
