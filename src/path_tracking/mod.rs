// Path Tracking algorithms module

pub mod diff_pid;
pub mod omni_pid;
pub mod pid;

pub use diff_pid::*;
pub use omni_pid::*;
pub use pid::*;

use crate::common::{ControllerFault, Path, RobotState};

/// Private progress marker along the path a controller is following.
///
/// The cursor remembers which path it belongs to and restarts at the first
/// waypoint when handed a different one.
#[derive(Debug, Clone, Default)]
pub struct WaypointCursor {
    index: usize,
    signature: Option<(usize, [u64; 2], [u64; 2])>,
}

impl WaypointCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.signature = None;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn signature(path: &Path) -> Option<(usize, [u64; 2], [u64; 2])> {
        let key = |s: &RobotState| [s.position.x.to_bits(), s.position.y.to_bits()];
        Some((path.len(), key(path.first()?), key(path.last()?)))
    }

    /// Current target: the first waypoint not yet within `tolerance`. Never moves
    /// past the last waypoint. `None` for an empty path.
    pub fn target<'a>(&mut self, current: &RobotState, path: &'a Path, tolerance: f64) -> Option<&'a RobotState> {
        let signature = Self::signature(path);
        if signature != self.signature {
            self.index = 0;
            self.signature = signature;
        }
        let last = path.len().checked_sub(1)?;
        while self.index < last && current.position.distance(&path.waypoints[self.index].position) <= tolerance {
            self.index += 1;
        }
        path.waypoints.get(self.index)
    }

    /// Length still to travel: to the target, then along the remaining waypoints.
    pub fn remaining(&self, current: &RobotState, path: &Path) -> f64 {
        let Some(target) = path.waypoints.get(self.index) else {
            return 0.0;
        };
        let tail: f64 = path.waypoints[self.index..]
            .windows(2)
            .map(|w| w[0].position.distance(&w[1].position))
            .sum();
        current.position.distance(&target.position) + tail
    }
}

/// Fault when the robot has drifted further than `limit` from the path.
pub(crate) fn check_deviation(current: &RobotState, path: &Path, limit: Option<f64>) -> Result<(), ControllerFault> {
    if let (Some(limit), Some(deviation)) = (limit, path.distance_to(&current.position)) {
        if deviation > limit {
            return Err(ControllerFault::OffPath { deviation, limit });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_advances_and_restarts_on_new_path() {
        let path = Path::from_xy(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)]);
        let mut cursor = WaypointCursor::new();
        let at = RobotState::from_xy(0.1, 0.0);
        assert_eq!(cursor.target(&at, &path, 0.3).map(|s| s.position.x), Some(5.0));
        let near_mid = RobotState::from_xy(4.9, 0.0);
        assert_eq!(cursor.target(&near_mid, &path, 0.3).map(|s| s.position.x), Some(10.0));
        assert!((cursor.remaining(&near_mid, &path) - 5.1).abs() < 1e-9);

        let replanned = Path::from_xy(&[(4.9, 0.0), (10.0, 3.0)]);
        assert_eq!(cursor.target(&near_mid, &replanned, 0.3).map(|s| s.position.y), Some(3.0));
        assert_eq!(cursor.index(), 1);
    }

    #[test]
    fn test_cursor_empty_path() {
        let mut cursor = WaypointCursor::new();
        assert!(cursor.target(&RobotState::from_xy(0.0, 0.0), &Path::new(), 0.3).is_none());
    }

    #[test]
    fn test_deviation_limit() {
        let path = Path::from_xy(&[(0.0, 0.0), (10.0, 0.0)]);
        assert!(check_deviation(&RobotState::from_xy(5.0, 0.5), &path, Some(1.0)).is_ok());
        assert!(matches!(
            check_deviation(&RobotState::from_xy(5.0, 3.0), &path, Some(1.0)),
            Err(ControllerFault::OffPath { .. })
        ));
        assert!(check_deviation(&RobotState::from_xy(5.0, 30.0), &path, None).is_ok());
    }
}
