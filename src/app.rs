//! Application context for one navigation node.
//!
//! Resolves every strategy from the registries, wires the shared environment,
//! sensor ingestion and the commander together, and owns them until
//! [`NavigationApp::shutdown`].

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::adapters::{Clock, CommandSink, SensorIngest, StateSource};
use crate::commander::{Commander, CommanderHandle, CommanderState, TaskId};
use crate::common::*;
use crate::config::NavigationConfig;
use crate::control_loop::ControlLoop;
use crate::environment::SharedEnvironment;
use crate::registry;

pub struct NavigationApp {
    commander: Commander,
    env: SharedEnvironment,
    ingest: SensorIngest,
    control: ControlLoop,
    clock: Arc<dyn Clock>,
    goal: Goal,
    start: RobotState,
    shut_down: bool,
}

impl NavigationApp {
    /// Build everything named in `config`. Any unknown name, bad option or
    /// incompatible combination fails here, before a task exists.
    pub fn build(config: &NavigationConfig, sink: Box<dyn CommandSink>, clock: Arc<dyn Clock>) -> NavResult<Self> {
        let goal = config.goal()?;
        let start = config.start()?;

        let env = registry::build_environment(&config.env_name, config.options(&config.env_name))?;
        let message_type = registry::message_type(&config.msg_dtype_name)?;
        if message_type.observation_kind != env.observation_kind() {
            return Err(ConfigError::Invalid(format!(
                "message type {} produces {} observations but {} expects {}",
                message_type.name,
                message_type.observation_kind,
                env.name(),
                env.observation_kind()
            ))
            .into());
        }
        let env = SharedEnvironment::new(env, "map");

        let sampler = config
            .sampler_name
            .as_deref()
            .map(|name| registry::build_sampler(name, config.options(name), goal.position()))
            .transpose()?;
        let planner = registry::build_planner(&config.planner_name, config.options(&config.planner_name), sampler)?;
        let controller =
            registry::build_controller(&config.controller_name, config.options(&config.controller_name))?;

        tracing::info!(
            sampler = config.sampler_name.as_deref().unwrap_or("-"),
            planner = %config.planner_name,
            environment = %config.env_name,
            controller = %config.controller_name,
            message_type = message_type.name,
            "navigation stack built"
        );

        let commander = Commander::new(
            config.commander_config(),
            env.clone(),
            planner,
            controller,
            sink,
            Arc::clone(&clock),
        )?;

        Ok(Self {
            commander,
            ingest: SensorIngest::new(env.clone(), message_type),
            env,
            control: ControlLoop::new(config.control_loop_config()),
            clock,
            goal,
            start,
            shut_down: false,
        })
    }

    /// Navigate to the configured goal from the configured start.
    pub fn start_task(&mut self) -> NavResult<TaskId> {
        self.commander.goto(self.goal, self.start)
    }

    /// Drive the control loop until the task ends or `running` is cleared.
    pub fn run(&mut self, source: &dyn StateSource, running: &AtomicBool) -> CommanderState {
        self.control.run(&mut self.commander, source, self.clock.as_ref(), running)
    }

    pub fn commander(&mut self) -> &mut Commander {
        &mut self.commander
    }

    pub fn handle(&self) -> CommanderHandle {
        self.commander.handle()
    }

    pub fn environment(&self) -> &SharedEnvironment {
        &self.env
    }

    /// Ingestion endpoint; clone it into the sensor thread.
    pub fn ingest(&self) -> SensorIngest {
        self.ingest.clone()
    }

    pub fn goal(&self) -> &Goal {
        &self.goal
    }

    pub fn shutdown(&mut self) {
        if !self.shut_down {
            self.shut_down = true;
            self.commander.shutdown();
        }
    }
}

impl Drop for NavigationApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ManualClock, RawMessage, RecordingSink};
    use serde_json::json;

    const BASE: &str = r#"
goal = [6.0, 0.0]
start = [0.0, 0.0, 0.0]
replan_interval = 1.0
planner_name = "PotentialField"
env_name = "PolygonEnv"
controller_name = "DiffPID"
msg_dtype_name = "geometry_msgs/PolygonArray"
"#;

    fn build(source: &str) -> NavResult<NavigationApp> {
        let config = NavigationConfig::from_toml(source)?;
        NavigationApp::build(&config, Box::new(RecordingSink::new()), Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_build_and_plan() {
        let mut app = build(BASE).unwrap();
        app.ingest()
            .ingest(&RawMessage::new("geometry_msgs/PolygonArray", json!({"polygons": []})));
        assert!(app.environment().snapshot().is_initialized());

        app.start_task().unwrap();
        assert!(app.commander().settle(std::time::Duration::from_secs(5)));
        assert_eq!(app.commander().state(), CommanderState::Executing);
        let path = app.handle().active_path();
        assert_eq!(path.last().map(|s| s.position), Some(Point::new(6.0, 0.0)));
        app.shutdown();
        assert_eq!(app.handle().status().state, CommanderState::Failed);
    }

    #[test]
    fn test_message_kind_mismatch() {
        let source = BASE.replace("geometry_msgs/PolygonArray", "sensor_msgs/LaserScan");
        assert!(matches!(build(&source), Err(NavError::Config(ConfigError::Invalid(_)))));
    }

    #[test]
    fn test_unknown_planner() {
        let source = BASE.replace("\"PotentialField\"", "\"AStar\"");
        match build(&source) {
            Err(NavError::Config(ConfigError::UnknownStrategy { kind, available, .. })) => {
                assert_eq!(kind, "planner");
                assert!(available.contains("InformedRRTstar"));
            }
            _ => panic!("expected an unknown planner error"),
        }
    }

    #[test]
    fn test_sampling_planner_needs_sampler() {
        let source = BASE.replace("\"PotentialField\"", "\"RRT\"");
        assert!(matches!(build(&source), Err(NavError::Config(ConfigError::Invalid(_)))));
    }
}
