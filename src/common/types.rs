//! Common types used throughout rust_navigation

use itertools::Itertools;
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Point in the navigation frame. Planar algorithms ignore `z`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn new_3d(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0 }
    }

    /// Planar (x, y) distance.
    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn distance_3d(&self, other: &Point) -> f64 {
        (self.to_vector_3d() - other.to_vector_3d()).norm()
    }

    /// Heading from `self` towards `other`.
    pub fn angle_to(&self, other: &Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Linear interpolation, `t` in [0, 1].
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new_3d(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
            self.z + (other.z - self.z) * t,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn to_vector_3d(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Distance from this point to the segment `a`-`b` in the plane.
    pub fn distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        let ab = b.to_vector() - a.to_vector();
        let len_sq = ab.norm_squared();
        if len_sq == 0.0 {
            return self.distance(a);
        }
        let t = ((self.to_vector() - a.to_vector()).dot(&ab) / len_sq).clamp(0.0, 1.0);
        self.distance(&a.lerp(b, t))
    }
}

impl From<(f64, f64)> for Point {
    fn from(tuple: (f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<(f64, f64, f64)> for Point {
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::new_3d(tuple.0, tuple.1, tuple.2)
    }
}

impl From<Vector2<f64>> for Point {
    fn from(v: Vector2<f64>) -> Self {
        Self::new(v[0], v[1])
    }
}

/// Body-frame velocity. `linear_y` is zero for non-holonomic bases.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub linear_x: f64,
    pub linear_y: f64,
    pub angular_z: f64,
}

/// Command handed to the boundary adapter once per control tick.
pub type VelocityCommand = Twist;

impl Twist {
    pub fn new(linear_x: f64, linear_y: f64, angular_z: f64) -> Self {
        Self { linear_x, linear_y, angular_z }
    }

    /// Hold / stop command.
    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_stop(&self) -> bool {
        self.linear_x == 0.0 && self.linear_y == 0.0 && self.angular_z == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.linear_x.is_finite() && self.linear_y.is_finite() && self.angular_z.is_finite()
    }

    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.linear_x, self.linear_y, self.angular_z)
    }
}

/// Robot pose and optional velocity at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RobotState {
    pub position: Point,
    #[serde(default)]
    pub yaw: Option<f64>,
    #[serde(default)]
    pub velocity: Option<Twist>,
}

impl RobotState {
    pub fn new(position: Point) -> Self {
        Self { position, yaw: None, velocity: None }
    }

    pub fn with_yaw(position: Point, yaw: f64) -> Self {
        Self { position, yaw: Some(yaw), velocity: None }
    }

    pub fn from_xy(x: f64, y: f64) -> Self {
        Self::new(Point::new(x, y))
    }

    pub fn with_velocity(mut self, velocity: Twist) -> Self {
        self.velocity = Some(velocity);
        self
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.yaw.map_or(true, f64::is_finite)
    }
}

impl From<Point> for RobotState {
    fn from(position: Point) -> Self {
        Self::new(position)
    }
}

/// Normalize an angle to [-pi, pi].
pub fn normalize_angle(angle: f64) -> f64 {
    (angle + std::f64::consts::PI).rem_euclid(std::f64::consts::TAU) - std::f64::consts::PI
}

/// Ordered waypoints, first to last. Empty means "no path".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub waypoints: Vec<RobotState>,
}

impl Path {
    pub fn new() -> Self {
        Self { waypoints: Vec::new() }
    }

    pub fn from_states(waypoints: Vec<RobotState>) -> Self {
        Self { waypoints }
    }

    pub fn from_points(points: Vec<Point>) -> Self {
        Self {
            waypoints: points.into_iter().map(RobotState::new).collect(),
        }
    }

    pub fn from_xy(coords: &[(f64, f64)]) -> Self {
        Self::from_points(coords.iter().map(|&c| Point::from(c)).collect())
    }

    pub fn push(&mut self, state: RobotState) {
        self.waypoints.push(state);
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn first(&self) -> Option<&RobotState> {
        self.waypoints.first()
    }

    pub fn last(&self) -> Option<&RobotState> {
        self.waypoints.last()
    }

    pub fn points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.waypoints.iter().map(|w| &w.position)
    }

    pub fn segments(&self) -> impl Iterator<Item = (&Point, &Point)> + '_ {
        self.points().tuple_windows()
    }

    pub fn total_length(&self) -> f64 {
        self.segments().map(|(a, b)| a.distance(b)).sum()
    }

    /// Planar distance from `point` to the closest segment (or lone waypoint).
    pub fn distance_to(&self, point: &Point) -> Option<f64> {
        match self.waypoints.len() {
            0 => None,
            1 => Some(point.distance(&self.waypoints[0].position)),
            _ => self
                .segments()
                .map(|(a, b)| point.distance_to_segment(a, b))
                .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d)))),
        }
    }
}

/// Target state plus the tolerance that defines "reached".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub state: RobotState,
    pub position_tolerance: f64,
    #[serde(default)]
    pub yaw_tolerance: Option<f64>,
}

impl Goal {
    pub fn new(state: RobotState, position_tolerance: f64) -> Self {
        Self { state, position_tolerance, yaw_tolerance: None }
    }

    pub fn with_yaw_tolerance(mut self, yaw_tolerance: f64) -> Self {
        self.yaw_tolerance = Some(yaw_tolerance);
        self
    }

    pub fn position(&self) -> &Point {
        &self.state.position
    }

    /// Orientation is only compared when both the goal and the tolerance carry one.
    /// A state without yaw cannot satisfy an orientation constraint.
    pub fn is_reached(&self, current: &RobotState) -> bool {
        if current.position.distance(&self.state.position) > self.position_tolerance {
            return false;
        }
        match (self.state.yaw, self.yaw_tolerance) {
            (Some(goal_yaw), Some(tol)) => current
                .yaw
                .map_or(false, |yaw| normalize_angle(yaw - goal_yaw).abs() <= tol),
            _ => true,
        }
    }
}

/// Axis-aligned rectangular area
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaBounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl AreaBounds {
    pub fn new(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        AreaBounds { xmin, xmax, ymin, ymax }
    }

    pub fn from_array(area: [f64; 4]) -> Self {
        AreaBounds {
            xmin: area[0],
            xmax: area[1],
            ymin: area[2],
            ymax: area[3],
        }
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.xmin && p.x <= self.xmax && p.y >= self.ymin && p.y <= self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn is_valid(&self) -> bool {
        [self.xmin, self.xmax, self.ymin, self.ymax].iter().all(|v| v.is_finite())
            && self.xmax > self.xmin
            && self.ymax > self.ymin
    }

    /// Smallest area containing both points, grown by `margin` on every side.
    pub fn around(a: &Point, b: &Point, margin: f64) -> Self {
        AreaBounds {
            xmin: a.x.min(b.x) - margin,
            xmax: a.x.max(b.x) + margin,
            ymin: a.y.min(b.y) - margin,
            ymax: a.y.max(b.y) + margin,
        }
    }
}

/// Result of an occupancy query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyStatus {
    Free,
    Blocked,
    Unknown,
}

impl OccupancyStatus {
    /// Aggregate over a region: any blocked part blocks the whole, then unknown wins over free.
    pub fn combine(self, other: OccupancyStatus) -> OccupancyStatus {
        use OccupancyStatus::*;
        match (self, other) {
            (Blocked, _) | (_, Blocked) => Blocked,
            (Unknown, _) | (_, Unknown) => Unknown,
            _ => Free,
        }
    }

    pub fn is_blocked(self) -> bool {
        self == OccupancyStatus::Blocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let p1 = Point::new(0.0, 0.0);
        let p2 = Point::new(3.0, 4.0);
        assert!((p1.distance(&p2) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_point_equality_by_coordinate() {
        assert_eq!(Point::new(1.0, 2.0), Point::new_3d(1.0, 2.0, 0.0));
        assert_ne!(Point::new(1.0, 2.0), Point::new_3d(1.0, 2.0, 0.5));
    }

    #[test]
    fn test_distance_to_segment() {
        let p = Point::new(5.0, 2.0);
        let d = p.distance_to_segment(&Point::new(0.0, 0.0), &Point::new(10.0, 0.0));
        assert!((d - 2.0).abs() < 1e-10);
        let beyond = Point::new(13.0, 4.0);
        let d = beyond.distance_to_segment(&Point::new(0.0, 0.0), &Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_normalize_angle() {
        let a = normalize_angle(4.0);
        assert!((-std::f64::consts::PI..=std::f64::consts::PI).contains(&a));
        assert!((normalize_angle(-3.0 * std::f64::consts::PI).abs() - std::f64::consts::PI).abs() < 1e-10);
        assert!((normalize_angle(2.0 * std::f64::consts::PI + 0.5) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn test_normalize_huge_angle_terminates() {
        for angle in [1e17, -1e17, f64::MAX] {
            let a = normalize_angle(angle);
            assert!((-std::f64::consts::PI..=std::f64::consts::PI).contains(&a), "{} -> {}", angle, a);
        }
    }

    #[test]
    fn test_path_total_length() {
        let path = Path::from_xy(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]);
        assert!((path.total_length() - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_empty_path_differs_from_single_waypoint() {
        let empty = Path::new();
        let single = Path::from_xy(&[(1.0, 1.0)]);
        assert!(empty.is_empty());
        assert!(!single.is_empty());
        assert_eq!(empty.distance_to(&Point::origin()), None);
        assert!(single.distance_to(&Point::new(1.0, 1.0)).is_some());
    }

    #[test]
    fn test_goal_reached_with_yaw() {
        let goal = Goal::new(RobotState::with_yaw(Point::new(10.0, 0.0), 0.0), 0.5)
            .with_yaw_tolerance(0.1);
        assert!(goal.is_reached(&RobotState::with_yaw(Point::new(9.8, 0.0), 0.05)));
        assert!(!goal.is_reached(&RobotState::with_yaw(Point::new(9.8, 0.0), 0.5)));
        assert!(!goal.is_reached(&RobotState::from_xy(9.8, 0.0)));
        assert!(!goal.is_reached(&RobotState::with_yaw(Point::new(9.0, 0.0), 0.0)));
    }

    #[test]
    fn test_status_combine() {
        use OccupancyStatus::*;
        assert_eq!(Free.combine(Unknown), Unknown);
        assert_eq!(Unknown.combine(Blocked), Blocked);
        assert_eq!(Free.combine(Free), Free);
    }
}
