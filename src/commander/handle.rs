use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use parking_lot::RwLock;

use crate::commander::state::{CommanderStatus, TaskId};
use crate::common::*;

/// Requests applied by the control task at the start of its next tick.
#[derive(Debug, Clone)]
pub(crate) enum Request {
    Goto { id: TaskId, goal: Goal, start: RobotState },
    Cancel,
}

/// Reject goals and starts the state machine could never settle.
pub(crate) fn check_task(goal: &Goal, start: &RobotState) -> NavResult<()> {
    if !goal.state.is_finite() || !start.is_finite() {
        return Err(NavError::NavigationFailed("goal and start must be finite".to_string()));
    }
    if !(goal.position_tolerance.is_finite() && goal.position_tolerance >= 0.0) {
        return Err(NavError::NavigationFailed(format!(
            "invalid goal tolerance {}",
            goal.position_tolerance
        )));
    }
    Ok(())
}

/// Cloneable handle for other threads: submit tasks, cancel, read status.
///
/// Nothing here changes commander state directly; requests are queued and
/// applied by the control task.
#[derive(Clone)]
pub struct CommanderHandle {
    pub(crate) requests: Sender<Request>,
    pub(crate) status: Arc<RwLock<CommanderStatus>>,
    pub(crate) path: Arc<RwLock<Arc<Path>>>,
    pub(crate) next_task: Arc<AtomicU64>,
}

impl CommanderHandle {
    pub fn goto(&self, goal: Goal, start: RobotState) -> NavResult<TaskId> {
        check_task(&goal, &start)?;
        let id = self.next_task.fetch_add(1, Ordering::Relaxed);
        self.requests
            .send(Request::Goto { id, goal, start })
            .map_err(|_| NavError::NavigationFailed("commander has shut down".to_string()))?;
        Ok(id)
    }

    /// Cancel the active task. Takes effect on the next control tick.
    pub fn cancel(&self) {
        if self.requests.send(Request::Cancel).is_err() {
            tracing::debug!("cancel ignored, commander has shut down");
        }
    }

    /// Status as of the last control tick.
    pub fn status(&self) -> CommanderStatus {
        self.status.read().clone()
    }

    pub fn active_path(&self) -> Arc<Path> {
        Arc::clone(&self.path.read())
    }
}
