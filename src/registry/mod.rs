//! Static name → factory tables for every pluggable strategy.
//!
//! Names match the ones used in parameter files. Lookups and option
//! validation happen while the application is built, so an unknown name or a
//! bad option is reported before any task starts.

pub mod options;

pub use options::Options;

use std::sync::Arc;

use itertools::Itertools;

use crate::adapters::ingest::{decode_laser_scan, decode_polygon_array, MessageType};
use crate::common::*;
use crate::environment::{PolygonEnv, ScanEnv};
use crate::path_planning::{InformedRRTStar, PRMPlanner, PotentialFieldPlanner, RRGPlanner, RRTPlanner};
use crate::path_tracking::{DiffPID, OmniWheelPID};
use crate::sampling::{UniformCircularSampler, UniformRectSampler};

pub type SamplerFactory = fn(Options, &Point) -> Result<Arc<dyn Sampler>, ConfigError>;
pub type PlannerFactory = fn(Options, Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError>;
pub type EnvironmentFactory = fn(Options) -> Result<Box<dyn Environment>, ConfigError>;
pub type ControllerFactory = fn(Options) -> Result<Box<dyn Controller>, ConfigError>;

pub const SAMPLERS: &[(&str, SamplerFactory)] = &[
    ("UniformRectSampler", uniform_rect),
    ("UniformCircularSampler", uniform_circular),
];

pub const PLANNERS: &[(&str, PlannerFactory)] = &[
    ("RRT", rrt),
    ("RRG", rrg),
    ("PRM", prm),
    ("PRMStar", prm_star),
    ("PotentialField", potential_field),
    ("InformedRRTstar", informed_rrt_star),
];

pub const ENVIRONMENTS: &[(&str, EnvironmentFactory)] = &[("PolygonEnv", polygon_env), ("ScanEnv", scan_env)];

pub const CONTROLLERS: &[(&str, ControllerFactory)] = &[("DiffPID", diff_pid), ("OmniWheelPID", omni_wheel_pid)];

pub const MESSAGE_TYPES: &[MessageType] = &[
    MessageType {
        name: "sensor_msgs/LaserScan",
        observation_kind: "scan",
        decode: decode_laser_scan,
    },
    MessageType {
        name: "geometry_msgs/PolygonArray",
        observation_kind: "polygons",
        decode: decode_polygon_array,
    },
];

fn lookup<T: Copy>(kind: &'static str, table: &[(&'static str, T)], name: &str) -> Result<T, ConfigError> {
    table
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
        .ok_or_else(|| ConfigError::UnknownStrategy {
            kind,
            name: name.to_string(),
            available: table.iter().map(|(n, _)| n).join(", "),
        })
}

pub fn build_sampler(name: &str, options: Options, goal: &Point) -> Result<Arc<dyn Sampler>, ConfigError> {
    lookup("sampler", SAMPLERS, name)?(options, goal)
}

pub fn build_planner(name: &str, options: Options, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    lookup("planner", PLANNERS, name)?(options, sampler)
}

pub fn build_environment(name: &str, options: Options) -> Result<Box<dyn Environment>, ConfigError> {
    lookup("environment", ENVIRONMENTS, name)?(options)
}

pub fn build_controller(name: &str, options: Options) -> Result<Box<dyn Controller>, ConfigError> {
    lookup("controller", CONTROLLERS, name)?(options)
}

pub fn message_type(name: &str) -> Result<MessageType, ConfigError> {
    MESSAGE_TYPES
        .iter()
        .find(|m| m.name == name)
        .copied()
        .ok_or_else(|| ConfigError::UnknownStrategy {
            kind: "message type",
            name: name.to_string(),
            available: MESSAGE_TYPES.iter().map(|m| m.name).join(", "),
        })
}

fn require_sampler(planner: &str, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Sampler>, ConfigError> {
    sampler.ok_or_else(|| ConfigError::Invalid(format!("planner {} needs a sampler (set sampler_name)", planner)))
}

fn uniform_rect(options: Options, goal: &Point) -> Result<Arc<dyn Sampler>, ConfigError> {
    Ok(Arc::new(UniformRectSampler::from_options(options, goal)?))
}

fn uniform_circular(options: Options, goal: &Point) -> Result<Arc<dyn Sampler>, ConfigError> {
    Ok(Arc::new(UniformCircularSampler::from_options(options, goal)?))
}

fn rrt(options: Options, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    Ok(Arc::new(RRTPlanner::from_options(options, require_sampler("RRT", sampler)?)?))
}

fn rrg(options: Options, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    Ok(Arc::new(RRGPlanner::from_options(options, require_sampler("RRG", sampler)?)?))
}

fn prm(options: Options, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    Ok(Arc::new(PRMPlanner::from_options(options, require_sampler("PRM", sampler)?)?))
}

fn prm_star(options: Options, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    Ok(Arc::new(PRMPlanner::star_from_options(options, require_sampler("PRMStar", sampler)?)?))
}

fn potential_field(options: Options, _sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    Ok(Arc::new(PotentialFieldPlanner::from_options(options)?))
}

fn informed_rrt_star(options: Options, sampler: Option<Arc<dyn Sampler>>) -> Result<Arc<dyn Planner>, ConfigError> {
    Ok(Arc::new(InformedRRTStar::from_options(options, require_sampler("InformedRRTstar", sampler)?)?))
}

fn polygon_env(options: Options) -> Result<Box<dyn Environment>, ConfigError> {
    Ok(Box::new(PolygonEnv::from_options(options)?))
}

fn scan_env(options: Options) -> Result<Box<dyn Environment>, ConfigError> {
    Ok(Box::new(ScanEnv::from_options(options)?))
}

fn diff_pid(options: Options) -> Result<Box<dyn Controller>, ConfigError> {
    Ok(Box::new(DiffPID::from_options(options)?))
}

fn omni_wheel_pid(options: Options) -> Result<Box<dyn Controller>, ConfigError> {
    Ok(Box::new(OmniWheelPID::from_options(options)?))
}
