use std::time::Instant;

use crate::common::RobotState;

/// Latest robot state and the time it was measured.
pub trait StateSource: Send {
    fn latest(&self) -> Option<(RobotState, Instant)>;
}
