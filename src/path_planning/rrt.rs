//! RRT (Rapidly-exploring Random Tree) path planning algorithm
//!
//! Sampling-based path planning algorithm that builds a tree by
//! randomly sampling the configuration space.

use std::sync::Arc;

use crate::common::*;
use crate::path_planning::tree::{steer, Tree};
use crate::path_planning::{assemble_path, motion_free};
use crate::registry::Options;

/// Configuration for RRT planner
#[derive(Debug, Clone)]
pub struct RRTConfig {
    /// Expansion distance per step
    pub expand_dis: f64,
    /// Step used when steering towards a sample
    pub path_resolution: f64,
    /// Maximum iterations
    pub max_iter: usize,
}

impl Default for RRTConfig {
    fn default() -> Self {
        Self {
            expand_dis: 3.0,
            path_resolution: 0.5,
            max_iter: 500,
        }
    }
}

impl RRTConfig {
    pub fn from_options(options: &Options) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            expand_dis: options.positive_f64("expand_dis", d.expand_dis)?,
            path_resolution: options.positive_f64("path_resolution", d.path_resolution)?,
            max_iter: options.usize("max_iter", d.max_iter)?,
        })
    }
}

/// RRT path planner
pub struct RRTPlanner {
    config: RRTConfig,
    sampler: Arc<dyn Sampler>,
}

impl RRTPlanner {
    pub fn new(config: RRTConfig, sampler: Arc<dyn Sampler>) -> Self {
        RRTPlanner { config, sampler }
    }

    pub fn from_options(options: Options, sampler: Arc<dyn Sampler>) -> Result<Self, ConfigError> {
        let config = RRTConfig::from_options(&options)?;
        options.finish()?;
        Ok(Self::new(config, sampler))
    }
}

impl Planner for RRTPlanner {
    fn name(&self) -> &'static str {
        "RRT"
    }

    fn plan(
        &self,
        start: &RobotState,
        goal: &RobotState,
        env: &dyn Environment,
        ctx: &PlanContext,
    ) -> Result<Path, PlanningFailure> {
        check_endpoints(start, goal, env)?;
        let goal_pt = goal.position;

        if start.position.distance(&goal_pt) <= self.config.expand_dis && motion_free(env, &start.position, &goal_pt) {
            return Ok(assemble_path(start, goal, Vec::new()));
        }

        let mut tree = Tree::new(start.position);
        for _ in 0..self.config.max_iter {
            ctx.checkpoint()?;

            let rnd = self.sampler.sample();
            let nearest_ind = tree.nearest(&rnd);
            let nearest = *tree.point(nearest_ind);
            let new_point = steer(&nearest, &rnd, self.config.expand_dis, self.config.path_resolution);

            if new_point == nearest || !motion_free(env, &nearest, &new_point) {
                continue;
            }
            let new_ind = tree.push(new_point, nearest_ind);

            if new_point.distance(&goal_pt) <= self.config.expand_dis && motion_free(env, &new_point, &goal_pt) {
                tracing::debug!(nodes = tree.len(), "RRT reached the goal");
                return Ok(assemble_path(start, goal, tree.branch(new_ind)));
            }
        }

        Err(PlanningFailure::NoPathFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::PolygonEnv;
    use crate::sampling::UniformRectSampler;
    use std::time::Duration;

    fn create_test_planner(max_iter: usize) -> RRTPlanner {
        let sampler = UniformRectSampler::new(AreaBounds::new(-2.0, 15.0, -6.0, 6.0)).with_goal(Point::new(10.0, 0.0), 10.0);
        let config = RRTConfig {
            max_iter,
            ..Default::default()
        };
        RRTPlanner::new(config, Arc::new(sampler))
    }

    fn wall_env() -> PolygonEnv {
        PolygonEnv::new(0.3).with_obstacles(vec![Polygon::rectangle(4.0, -3.0, 5.0, 3.0)])
    }

    #[test]
    fn test_rrt_finds_path_around_wall() {
        let planner = create_test_planner(5000);
        let env = wall_env();
        let start = RobotState::from_xy(0.0, 0.0);
        let goal = RobotState::from_xy(10.0, 0.0);
        let path = planner
            .plan(&start, &goal, &env, &PlanContext::with_timeout(Duration::from_secs(10)))
            .unwrap();

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert!(path.waypoints.iter().all(|w| !env.get_status(w).is_blocked()));
        assert!(!env.get_path_status(&path).is_blocked());
    }

    #[test]
    fn test_rrt_blocked_endpoints() {
        let planner = create_test_planner(10);
        let env = wall_env();
        let ctx = PlanContext::with_timeout(Duration::from_secs(1));
        let inside = RobotState::from_xy(4.5, 0.0);
        let free = RobotState::from_xy(0.0, 0.0);
        assert_eq!(planner.plan(&inside, &free, &env, &ctx), Err(PlanningFailure::StartBlocked));
        assert_eq!(planner.plan(&free, &inside, &env, &ctx), Err(PlanningFailure::GoalBlocked));
    }

    #[test]
    fn test_rrt_cancelled() {
        let planner = create_test_planner(100_000);
        let env = wall_env();
        let ctx = PlanContext::with_timeout(Duration::from_secs(10));
        ctx.cancel.cancel();
        let result = planner.plan(&RobotState::from_xy(0.0, 0.0), &RobotState::from_xy(10.0, 0.0), &env, &ctx);
        assert_eq!(result, Err(PlanningFailure::Cancelled));
    }

    #[test]
    fn test_rrt_config_default() {
        let config = RRTConfig::default();
        assert_eq!(config.expand_dis, 3.0);
        assert_eq!(config.max_iter, 500);
    }
}
