//! Error types for rust_navigation

use serde::Serialize;
use thiserror::Error;

/// Construction-time configuration problems. Always fatal before a task starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown {kind} '{name}' (available: {available})")]
    UnknownStrategy {
        kind: &'static str,
        name: String,
        available: String,
    },
    #[error("{strategy}: missing required option '{key}'")]
    MissingOption { strategy: String, key: String },
    #[error("{strategy}: invalid option '{key}': {reason}")]
    InvalidOption {
        strategy: String,
        key: String,
        reason: String,
    },
    #[error("{strategy}: unknown option(s) {keys:?}")]
    UnknownOptions { strategy: String, keys: Vec<String> },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to parse parameters: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read parameters: {0}")]
    Io(#[from] std::io::Error),
}

/// Recoverable outcome of a single plan() call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanningFailure {
    #[error("no path found")]
    NoPathFound,
    #[error("start is blocked")]
    StartBlocked,
    #[error("goal is blocked")]
    GoalBlocked,
    #[error("planning timed out")]
    Timeout,
    /// The task was cancelled while the call was in flight.
    #[error("planning cancelled")]
    Cancelled,
}

/// Reason an observation was dropped at the environment boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ObservationError {
    #[error("malformed observation: {0}")]
    Malformed(String),
    #[error("observation out of range: {0}")]
    OutOfRange(String),
    #[error("{environment} does not accept {observation} observations")]
    Unsupported {
        environment: &'static str,
        observation: &'static str,
    },
    #[error("no decoder for message type '{0}'")]
    UnknownMessageType(String),
    #[error("failed to decode message: {0}")]
    Decode(String),
}

/// Controller could not produce a meaningful command for the given state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ControllerFault {
    #[error("robot state is not finite")]
    NonFiniteState,
    #[error("robot is {deviation:.2} m off the path (limit {limit:.2} m)")]
    OffPath { deviation: f64, limit: f64 },
    #[error("controller requires orientation but the state has none")]
    MissingOrientation,
}

/// Main error type for the navigation stack
#[derive(Debug, Error)]
pub enum NavError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("navigation failed: {0}")]
    NavigationFailed(String),
    #[error("navigation cancelled")]
    Cancelled,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for navigation operations
pub type NavResult<T> = Result<T, NavError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::UnknownStrategy {
            kind: "planner",
            name: "AStar".to_string(),
            available: "PRM, RRT".to_string(),
        };
        assert_eq!(format!("{}", err), "unknown planner 'AStar' (available: PRM, RRT)");
        assert_eq!(PlanningFailure::Timeout.to_string(), "planning timed out");
    }

    #[test]
    fn test_error_from_config() {
        let err: NavError = ConfigError::Invalid("retry_budget must be > 0".to_string()).into();
        assert!(matches!(err, NavError::Config(_)));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ConfigError = io_err.into();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
