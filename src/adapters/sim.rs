//! Kinematic robot simulator used by the node binary and the scenario tests.
//!
//! Commands are body-frame twists integrated with the same constant-velocity
//! motion model the localization filters use: world velocity is the body
//! velocity rotated by the current yaw.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::{Rotation2, Vector2};
use parking_lot::RwLock;

use crate::adapters::{Clock, CommandSink, StateSource};
use crate::common::{normalize_angle, LaserScan, Point, Polygon, RobotState, VelocityCommand};

#[derive(Debug, Clone)]
struct SimState {
    state: RobotState,
    stamp: Instant,
}

/// Shared simulator. One clone is used as the command sink, another as the
/// state source.
#[derive(Clone)]
pub struct KinematicSim {
    inner: Arc<RwLock<SimState>>,
    clock: Arc<dyn Clock>,
    dt: Duration,
}

impl KinematicSim {
    /// `dt` is how long each published command is applied for.
    pub fn new(initial: RobotState, clock: Arc<dyn Clock>, dt: Duration) -> Self {
        let stamp = clock.now();
        let state = RobotState {
            yaw: Some(initial.yaw.unwrap_or(0.0)),
            ..initial
        };
        Self {
            inner: Arc::new(RwLock::new(SimState { state, stamp })),
            clock,
            dt,
        }
    }

    pub fn state(&self) -> RobotState {
        self.inner.read().state
    }

    /// Integrate one command over `dt`.
    pub fn step(&self, command: &VelocityCommand) {
        let dt = self.dt.as_secs_f64();
        let mut guard = self.inner.write();
        let yaw = guard.state.yaw.unwrap_or(0.0);
        let world = Rotation2::new(yaw) * Vector2::new(command.linear_x, command.linear_y);
        let p = guard.state.position;
        guard.state = RobotState::with_yaw(
            Point::new(p.x + world.x * dt, p.y + world.y * dt),
            normalize_angle(yaw + command.angular_z * dt),
        )
        .with_velocity(*command);
        guard.stamp = self.clock.now();
    }
}

impl CommandSink for KinematicSim {
    fn publish(&mut self, command: &VelocityCommand) {
        self.step(command);
    }
}

impl StateSource for KinematicSim {
    fn latest(&self) -> Option<(RobotState, Instant)> {
        let guard = self.inner.read();
        Some((guard.state, guard.stamp))
    }
}

/// Distance along the ray from `origin` with heading `angle` to segment `a`-`b`.
fn ray_hit(origin: &Point, angle: f64, a: &Point, b: &Point) -> Option<f64> {
    let d = Vector2::new(angle.cos(), angle.sin());
    let e = b.to_vector() - a.to_vector();
    let w = a.to_vector() - origin.to_vector();
    let denom = d.perp(&e);
    if denom.abs() < 1e-12 {
        return None;
    }
    let t = w.perp(&e) / denom;
    let u = w.perp(&d) / denom;
    (t >= 0.0 && (0.0..=1.0).contains(&u)).then_some(t)
}

/// Full-circle range scan of polygon obstacles, as a 2D lidar at `origin`
/// would report it. Rays without a return within `range_max` are infinite.
pub fn simulate_scan(origin: &RobotState, obstacles: &[Polygon], beams: usize, range_max: f64) -> LaserScan {
    let beams = beams.max(1);
    let angle_increment = std::f64::consts::TAU / beams as f64;
    let mut scan = LaserScan {
        origin: RobotState::with_yaw(origin.position, origin.yaw.unwrap_or(0.0)),
        angle_min: -std::f64::consts::PI,
        angle_increment,
        range_min: 0.05,
        range_max,
        ranges: Vec::with_capacity(beams),
    };
    for i in 0..beams {
        let bearing = scan.bearing(i);
        let nearest = obstacles
            .iter()
            .flat_map(|poly| poly.edges())
            .filter_map(|(a, b)| ray_hit(&origin.position, bearing, a, b))
            .fold(f64::INFINITY, f64::min);
        scan.ranges.push(if nearest <= range_max { nearest } else { f64::INFINITY });
    }
    scan
}
