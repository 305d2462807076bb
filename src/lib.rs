//! rust_navigation - closed-loop navigation for mobile robots
//!
//! A commander repeatedly (re)plans a path through a changing obstacle
//! environment and drives a motion controller along it until the goal is
//! reached or planning fails. Planners, samplers, environments and
//! controllers are pluggable and selected by name from static registries.

// Core modules
pub mod common;
pub mod registry;

// Strategy modules
pub mod environment;
pub mod sampling;
pub mod path_planning;
pub mod path_tracking;

// Coordination
pub mod adapters;
pub mod commander;
pub mod control_loop;
pub mod config;
pub mod app;

// Re-export common types for convenience
pub use common::{Goal, Path, Point, RobotState, VelocityCommand};
pub use common::{Controller, Environment, Planner, Sampler};
pub use common::{NavError, NavResult};
pub use app::NavigationApp;
pub use commander::{Commander, CommanderHandle, CommanderState};
