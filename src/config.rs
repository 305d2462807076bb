//! Parameter file for the navigation node.
//!
//! ```toml
//! goal = [10.0, 0.0]
//! start = [0.0, 0.0]
//! replan_interval = 2.0
//! sampler_name = "UniformRectSampler"
//! planner_name = "RRT"
//! env_name = "PolygonEnv"
//! controller_name = "DiffPID"
//! msg_dtype_name = "geometry_msgs/PolygonArray"
//!
//! [RRT]
//! expand_dis = 1.0
//! ```
//!
//! Every table other than `[simulation]` is the option table of the strategy
//! with that name and must belong to one of the selected strategies.

use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::time::Duration;

use serde::Deserialize;
use toml::{Table, Value};

use crate::commander::{CommanderConfig, TaskPolicy};
use crate::common::*;
use crate::control_loop::ControlLoopConfig;
use crate::registry::Options;

fn default_control_rate_hz() -> f64 {
    10.0
}

fn default_retry_budget() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    2000
}

fn default_plan_timeout_secs() -> f64 {
    5.0
}

fn default_timeout_grace_ms() -> u64 {
    500
}

fn default_goal_tolerance() -> f64 {
    0.5
}

fn default_max_state_age_ms() -> u64 {
    500
}

fn default_environment_timeout_secs() -> f64 {
    10.0
}

fn default_publish_rate_hz() -> f64 {
    5.0
}

fn default_max_duration_secs() -> f64 {
    120.0
}

fn default_scan_beams() -> usize {
    180
}

fn default_scan_range() -> f64 {
    8.0
}

/// Simulated world used by the node binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Obstacle polygons as lists of `[x, y]` vertices
    #[serde(default)]
    pub obstacles: Vec<Vec<[f64; 2]>>,
    /// Rate at which the sensor thread publishes observations
    #[serde(default = "default_publish_rate_hz")]
    pub publish_rate_hz: f64,
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: f64,
    #[serde(default = "default_scan_beams")]
    pub scan_beams: usize,
    #[serde(default = "default_scan_range")]
    pub scan_range: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            obstacles: Vec::new(),
            publish_rate_hz: default_publish_rate_hz(),
            max_duration_secs: default_max_duration_secs(),
            scan_beams: default_scan_beams(),
            scan_range: default_scan_range(),
        }
    }
}

impl SimulationConfig {
    pub fn polygons(&self) -> Vec<Polygon> {
        self.obstacles
            .iter()
            .map(|vertices| Polygon::new(vertices.iter().map(|&[x, y]| Point::new(x, y)).collect()))
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NavigationConfig {
    /// `[x, y]` or `[x, y, yaw]`
    pub goal: Vec<f64>,
    pub start: Vec<f64>,
    /// Seconds between periodic replans
    pub replan_interval: f64,
    /// Only sampling planners need one
    #[serde(default)]
    pub sampler_name: Option<String>,
    pub planner_name: String,
    pub env_name: String,
    pub controller_name: String,
    pub msg_dtype_name: String,

    #[serde(default = "default_control_rate_hz")]
    pub control_rate_hz: f64,
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_plan_timeout_secs")]
    pub plan_timeout_secs: f64,
    #[serde(default = "default_timeout_grace_ms")]
    pub timeout_grace_ms: u64,
    #[serde(default = "default_goal_tolerance")]
    pub goal_tolerance: f64,
    #[serde(default)]
    pub goal_yaw_tolerance: Option<f64>,
    #[serde(default)]
    pub task_policy: TaskPolicy,
    #[serde(default = "default_max_state_age_ms")]
    pub max_state_age_ms: u64,
    #[serde(default = "default_environment_timeout_secs")]
    pub environment_timeout_secs: f64,

    #[serde(default)]
    pub simulation: Option<SimulationConfig>,

    /// Per-strategy option tables keyed by strategy name
    #[serde(skip)]
    pub strategies: BTreeMap<String, Table>,
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!("{} must be > 0, got {}", name, value)))
    }
}

fn state_from(name: &str, values: &[f64]) -> Result<RobotState, ConfigError> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(ConfigError::Invalid(format!("{} must be finite", name)));
    }
    match *values {
        [x, y] => Ok(RobotState::from_xy(x, y)),
        [x, y, yaw] => Ok(RobotState::with_yaw(Point::new(x, y), yaw)),
        _ => Err(ConfigError::Invalid(format!(
            "{} must be [x, y] or [x, y, yaw], got {} values",
            name,
            values.len()
        ))),
    }
}

impl NavigationConfig {
    pub fn load(path: &FsPath) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        let mut table: Table = toml::from_str(source)?;

        let section_names: Vec<String> = table
            .iter()
            .filter(|(k, v)| v.is_table() && k.as_str() != "simulation")
            .map(|(k, _)| k.clone())
            .collect();
        let mut strategies = BTreeMap::new();
        for name in section_names {
            if let Some(Value::Table(options)) = table.remove(&name) {
                strategies.insert(name, options);
            }
        }

        let mut config: NavigationConfig = Value::Table(table).try_into()?;
        config.strategies = strategies;
        config.validate()?;
        Ok(config)
    }

    fn selected(&self) -> impl Iterator<Item = &str> + '_ {
        self.sampler_name
            .as_deref()
            .into_iter()
            .chain([self.planner_name.as_str(), self.env_name.as_str(), self.controller_name.as_str()])
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        state_from("goal", &self.goal)?;
        state_from("start", &self.start)?;
        positive("replan_interval", self.replan_interval)?;
        positive("control_rate_hz", self.control_rate_hz)?;
        positive("plan_timeout_secs", self.plan_timeout_secs)?;
        positive("environment_timeout_secs", self.environment_timeout_secs)?;
        if !(self.goal_tolerance.is_finite() && self.goal_tolerance >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "goal_tolerance must be >= 0, got {}",
                self.goal_tolerance
            )));
        }
        if let Some(tol) = self.goal_yaw_tolerance {
            positive("goal_yaw_tolerance", tol)?;
        }
        if let Some(sim) = &self.simulation {
            positive("simulation.publish_rate_hz", sim.publish_rate_hz)?;
            positive("simulation.max_duration_secs", sim.max_duration_secs)?;
            positive("simulation.scan_range", sim.scan_range)?;
        }
        for section in self.strategies.keys() {
            if !self.selected().any(|name| name == section) {
                return Err(ConfigError::Invalid(format!(
                    "[{}] does not match any selected strategy",
                    section
                )));
            }
        }
        self.commander_config().validate()
    }

    pub fn goal(&self) -> Result<Goal, ConfigError> {
        let goal = Goal::new(state_from("goal", &self.goal)?, self.goal_tolerance);
        Ok(match self.goal_yaw_tolerance {
            Some(tol) => goal.with_yaw_tolerance(tol),
            None => goal,
        })
    }

    pub fn start(&self) -> Result<RobotState, ConfigError> {
        state_from("start", &self.start)
    }

    /// Option table for `strategy`, empty when the file has none.
    pub fn options(&self, strategy: &str) -> Options {
        match self.strategies.get(strategy) {
            Some(table) => Options::new(strategy, table.clone()),
            None => Options::empty(strategy),
        }
    }

    pub fn commander_config(&self) -> CommanderConfig {
        CommanderConfig {
            replan_interval: Duration::from_secs_f64(self.replan_interval.max(0.0)),
            retry_budget: self.retry_budget,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            plan_timeout: Duration::from_secs_f64(self.plan_timeout_secs.max(0.0)),
            timeout_grace: Duration::from_millis(self.timeout_grace_ms),
            task_policy: self.task_policy,
            environment_timeout: Duration::from_secs_f64(self.environment_timeout_secs.max(0.0)),
        }
    }

    /// `[simulation]` settings, defaults when the table is absent.
    pub fn simulation(&self) -> SimulationConfig {
        self.simulation.clone().unwrap_or_default()
    }

    pub fn control_loop_config(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            rate_hz: self.control_rate_hz,
            max_state_age: Duration::from_millis(self.max_state_age_ms),
            max_duration: Some(Duration::from_secs_f64(self.simulation().max_duration_secs.max(0.0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PARAMS: &str = r#"
goal = [10.0, 0.0]
start = [0, 0]
replan_interval = 2
sampler_name = "UniformRectSampler"
planner_name = "RRT"
env_name = "PolygonEnv"
controller_name = "DiffPID"
msg_dtype_name = "geometry_msgs/PolygonArray"
retry_budget = 5

[UniformRectSampler]
min_x = -2.0
max_x = 12.0
min_y = -5.0
max_y = 5.0

[RRT]
expand_dis = 1.5

[simulation]
obstacles = [[[4.0, -1.0], [5.0, -1.0], [5.0, 1.0], [4.0, 1.0]]]
"#;

    #[test]
    fn test_parse_params() {
        let config = NavigationConfig::from_toml(PARAMS).unwrap();
        assert_eq!(config.planner_name, "RRT");
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.control_rate_hz, 10.0);
        assert_eq!(config.task_policy, TaskPolicy::Preempt);
        assert_eq!(config.goal().unwrap().state.position, Point::new(10.0, 0.0));
        assert_eq!(config.commander_config().replan_interval, Duration::from_secs(2));

        let rrt = config.options("RRT");
        assert_eq!(rrt.f64("expand_dis", 3.0).unwrap(), 1.5);
        assert!(rrt.finish().is_ok());
        assert!(config.options("DiffPID").finish().is_ok());

        let sim = config.simulation.unwrap();
        assert_eq!(sim.polygons().len(), 1);
        assert_eq!(sim.publish_rate_hz, 5.0);
    }

    #[test]
    fn test_stray_section_rejected() {
        let source = format!("{}\n[PRM]\nn_sample = 10\n", PARAMS);
        assert!(matches!(NavigationConfig::from_toml(&source), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let source = PARAMS.replace("retry_budget = 5", "retry_budgte = 5");
        assert!(matches!(NavigationConfig::from_toml(&source), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_values() {
        let zero_budget = PARAMS.replace("retry_budget = 5", "retry_budget = 0");
        assert!(matches!(NavigationConfig::from_toml(&zero_budget), Err(ConfigError::Invalid(_))));
        let bad_goal = PARAMS.replace("goal = [10.0, 0.0]", "goal = [10.0]");
        assert!(matches!(NavigationConfig::from_toml(&bad_goal), Err(ConfigError::Invalid(_))));
        let bad_interval = PARAMS.replace("replan_interval = 2", "replan_interval = 0");
        assert!(matches!(NavigationConfig::from_toml(&bad_interval), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PARAMS.as_bytes()).unwrap();
        let config = NavigationConfig::load(file.path()).unwrap();
        assert_eq!(config.env_name, "PolygonEnv");

        let missing = NavigationConfig::load(FsPath::new("/nonexistent/params.toml"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_shipped_params_parse() {
        let config = NavigationConfig::from_toml(include_str!("../params/navigate.toml")).unwrap();
        assert_eq!(config.simulation().polygons().len(), 2);
        assert_eq!(config.retry_budget, 5);
        assert_eq!(config.control_loop_config().max_duration, Some(Duration::from_secs(120)));
    }
}
