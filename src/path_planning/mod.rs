// Path planning algorithms module

pub mod graph;
pub mod informed_rrt_star;
pub mod potential_field;
pub mod prm;
pub mod rrg;
pub mod rrt;
pub mod tree;

pub use informed_rrt_star::*;
pub use potential_field::*;
pub use prm::*;
pub use rrg::*;
pub use rrt::*;

use crate::common::{Environment, Path, Point, RobotState};

/// True unless some part of the straight motion `a`-`b` is known to be blocked.
/// Unobserved space counts as traversable.
pub fn motion_free(env: &dyn Environment, a: &Point, b: &Point) -> bool {
    !env.segment_status(a, b).is_blocked()
}

/// Build a path that starts exactly at `start` and ends exactly at `goal`,
/// with `interior` points in between. Interior points coinciding with either
/// endpoint are dropped.
pub fn assemble_path(start: &RobotState, goal: &RobotState, interior: Vec<Point>) -> Path {
    let mut path = Path::new();
    path.push(*start);
    for p in interior {
        if p != start.position && p != goal.position {
            path.push(RobotState::new(p));
        }
    }
    path.push(*goal);
    path
}

/// Shrinking neighbourhood radius used by the asymptotically optimal planners.
pub(crate) fn connection_radius(gamma: f64, n: usize, cap: f64) -> f64 {
    let n = n.max(2) as f64;
    (gamma * (n.ln() / n).sqrt()).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_path_keeps_endpoints() {
        let start = RobotState::with_yaw(Point::new(0.0, 0.0), 0.3);
        let goal = RobotState::from_xy(10.0, 0.0);
        let path = assemble_path(&start, &goal, vec![Point::new(0.0, 0.0), Point::new(5.0, 1.0), Point::new(10.0, 0.0)]);
        assert_eq!(path.len(), 3);
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
    }

    #[test]
    fn test_connection_radius_shrinks() {
        assert!(connection_radius(50.0, 1000, 100.0) < connection_radius(50.0, 10, 100.0));
        assert_eq!(connection_radius(50.0, 10, 3.0), 3.0);
    }
}
