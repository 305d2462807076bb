//! Commander state machine vocabulary and diagnostics.

use serde::{Deserialize, Serialize};

use crate::common::PlanningFailure;

pub type TaskId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommanderState {
    Idle,
    Planning,
    Executing,
    Replanning,
    Succeeded,
    Failed,
    Cancelled,
}

impl CommanderState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CommanderState::Succeeded | CommanderState::Failed | CommanderState::Cancelled)
    }

    /// States in which the controller is driven along a path.
    pub fn is_moving(self) -> bool {
        matches!(self, CommanderState::Executing | CommanderState::Replanning)
    }
}

/// Why a task ended in `FAILED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureReason {
    /// Consecutive planning failures reached the retry budget; carries the last one.
    RetryBudgetExhausted(PlanningFailure),
    /// The controller faulted on as many consecutive ticks as the retry budget.
    ControllerFault,
    /// No observation arrived before the environment timeout.
    EnvironmentNotInitialized,
    /// The commander shut down with the task still active.
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskOutcome {
    Succeeded,
    Failed(FailureReason),
    Cancelled,
}

impl TaskOutcome {
    pub fn state(self) -> CommanderState {
        match self {
            TaskOutcome::Succeeded => CommanderState::Succeeded,
            TaskOutcome::Failed(_) => CommanderState::Failed,
            TaskOutcome::Cancelled => CommanderState::Cancelled,
        }
    }
}

/// What happens to a `goto` that arrives while another task is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPolicy {
    /// The running task ends `CANCELLED` and the new one starts
    #[default]
    Preempt,
    /// FIFO; the new task starts once the running one is terminal
    Queue,
}

/// Snapshot of commander state and counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommanderStatus {
    pub task: Option<TaskId>,
    pub state: CommanderState,
    pub outcome: Option<TaskOutcome>,
    pub queued_tasks: usize,
    pub planning_attempts: u64,
    pub consecutive_failures: u32,
    pub last_failure: Option<PlanningFailure>,
    pub controller_faults: u64,
    /// Faults since the last tick the controller handled cleanly
    pub consecutive_faults: u32,
    pub stale_ticks: u64,
    pub abandoned_requests: u64,
    pub dropped_observations: u64,
    pub path_len: usize,
}

impl Default for CommanderStatus {
    fn default() -> Self {
        Self {
            task: None,
            state: CommanderState::Idle,
            outcome: None,
            queued_tasks: 0,
            planning_attempts: 0,
            consecutive_failures: 0,
            last_failure: None,
            controller_faults: 0,
            consecutive_faults: 0,
            stale_ticks: 0,
            abandoned_requests: 0,
            dropped_observations: 0,
            path_len: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(CommanderState::Failed.is_terminal());
        assert!(!CommanderState::Replanning.is_terminal());
        assert!(CommanderState::Replanning.is_moving());
        assert_eq!(TaskOutcome::Cancelled.state(), CommanderState::Cancelled);
    }

    #[test]
    fn test_policy_from_toml() {
        #[derive(Deserialize)]
        struct P {
            task_policy: TaskPolicy,
        }
        let p: P = toml::from_str("task_policy = \"queue\"").unwrap();
        assert_eq!(p.task_policy, TaskPolicy::Queue);
        assert_eq!(TaskPolicy::default(), TaskPolicy::Preempt);
    }
}
