//! Potential field planner
//!
//! Greedy descent over the sum of an attractive potential towards the goal and
//! a repulsive potential around known obstacles, in fixed steps on an
//! 8-connected lattice anchored at the start.

use std::collections::{HashSet, VecDeque};

use crate::common::*;
use crate::path_planning::{assemble_path, motion_free};
use crate::registry::Options;

/// number of previous positions used to check oscillations
const OSCILLATIONS_DETECTION_LENGTH: usize = 3;

const MOTION: [[i64; 2]; 8] = [[1, 0], [0, 1], [-1, 0], [0, -1], [-1, -1], [-1, 1], [1, -1], [1, 1]];

#[derive(Debug, Clone)]
pub struct PotentialFieldConfig {
    /// lattice step [m]
    pub resolution: f64,
    /// attractive potential gain
    pub kp: f64,
    /// repulsive potential gain
    pub eta: f64,
    /// obstacles further than this exert no force [m]
    pub influence_dist: f64,
    pub max_iter: usize,
}

impl Default for PotentialFieldConfig {
    fn default() -> Self {
        Self {
            resolution: 0.5,
            kp: 5.0,
            eta: 100.0,
            influence_dist: 2.0,
            max_iter: 2000,
        }
    }
}

pub struct PotentialFieldPlanner {
    config: PotentialFieldConfig,
}

impl PotentialFieldPlanner {
    pub fn new(config: PotentialFieldConfig) -> Self {
        PotentialFieldPlanner { config }
    }

    /// Options: `resolution`, `kp`, `eta`, `influence_dist`, `max_iter`.
    pub fn from_options(options: Options) -> Result<Self, ConfigError> {
        let d = PotentialFieldConfig::default();
        let config = PotentialFieldConfig {
            resolution: options.positive_f64("resolution", d.resolution)?,
            kp: options.positive_f64("kp", d.kp)?,
            eta: options.f64("eta", d.eta)?,
            influence_dist: options.positive_f64("influence_dist", d.influence_dist)?,
            max_iter: options.usize("max_iter", d.max_iter)?,
        };
        options.finish()?;
        Ok(Self::new(config))
    }

    fn calc_attractive_potential(&self, p: &Point, goal: &Point) -> f64 {
        0.5 * self.config.kp * p.distance(goal)
    }

    fn calc_repulsive_potential(&self, p: &Point, env: &dyn Environment) -> f64 {
        match env.clearance(p) {
            Some(dq) if dq <= self.config.influence_dist => {
                let dq = dq.max(0.1);
                0.5 * self.config.eta * (1.0 / dq - 1.0 / self.config.influence_dist).powi(2)
            }
            _ => 0.0,
        }
    }

    fn potential(&self, p: &Point, goal: &Point, env: &dyn Environment) -> f64 {
        if env.point_status(p).is_blocked() {
            return f64::INFINITY;
        }
        self.calc_attractive_potential(p, goal) + self.calc_repulsive_potential(p, env)
    }

    fn oscillations_detection(previous_ids: &mut VecDeque<(i64, i64)>, id: (i64, i64)) -> bool {
        previous_ids.push_back(id);
        if previous_ids.len() > OSCILLATIONS_DETECTION_LENGTH {
            previous_ids.pop_front();
        }
        let mut seen = HashSet::new();
        previous_ids.iter().any(|index| !seen.insert(*index))
    }
}

impl Planner for PotentialFieldPlanner {
    fn name(&self) -> &'static str {
        "PotentialField"
    }

    fn plan(
        &self,
        start: &RobotState,
        goal: &RobotState,
        env: &dyn Environment,
        ctx: &PlanContext,
    ) -> Result<Path, PlanningFailure> {
        check_endpoints(start, goal, env)?;
        let res = self.config.resolution;
        let origin = start.position;
        let goal_pt = goal.position;

        let (mut ix, mut iy) = (0_i64, 0_i64);
        let mut current = origin;
        let mut route = Vec::new();
        let mut previous_ids = VecDeque::new();

        for _ in 0..self.config.max_iter {
            if current.distance(&goal_pt) < res {
                if !motion_free(env, &current, &goal_pt) {
                    return Err(PlanningFailure::NoPathFound);
                }
                return Ok(assemble_path(start, goal, route));
            }
            ctx.checkpoint()?;

            let mut best: Option<(f64, i64, i64, Point)> = None;
            for [dx, dy] in MOTION {
                let (nx, ny) = (ix + dx, iy + dy);
                let p = Point::new(origin.x + nx as f64 * res, origin.y + ny as f64 * res);
                let u = self.potential(&p, &goal_pt, env);
                if u.is_finite() && best.map_or(true, |(b, ..)| u < b) && motion_free(env, &current, &p) {
                    best = Some((u, nx, ny, p));
                }
            }
            let Some((_, nx, ny, p)) = best else {
                return Err(PlanningFailure::NoPathFound);
            };

            ix = nx;
            iy = ny;
            current = p;
            route.push(p);

            if Self::oscillations_detection(&mut previous_ids, (ix, iy)) {
                tracing::debug!(x = current.x, y = current.y, "potential field oscillation");
                return Err(PlanningFailure::NoPathFound);
            }
        }

        Err(PlanningFailure::NoPathFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::PolygonEnv;
    use std::time::Duration;

    fn ctx() -> PlanContext {
        PlanContext::with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn test_straight_descent_in_free_space() {
        let planner = PotentialFieldPlanner::new(PotentialFieldConfig::default());
        let mut env = PolygonEnv::new(0.2);
        env.update(&Observation::Polygons(vec![]));
        let start = RobotState::from_xy(0.0, 0.0);
        let goal = RobotState::from_xy(10.0, 0.0);
        let path = planner.plan(&start, &goal, &env, &ctx()).unwrap();
        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert!((path.total_length() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_descent_avoids_side_obstacle() {
        let planner = PotentialFieldPlanner::new(PotentialFieldConfig::default());
        let env = PolygonEnv::new(0.2).with_obstacles(vec![Polygon::rectangle(4.0, 0.6, 6.0, 2.0)]);
        let path = planner
            .plan(&RobotState::from_xy(0.0, 0.0), &RobotState::from_xy(10.0, 0.0), &env, &ctx())
            .unwrap();
        assert!(!env.get_path_status(&path).is_blocked());
    }

    #[test]
    fn test_local_minimum_reports_no_path() {
        // cup facing the start traps the descent
        let cup = vec![
            Polygon::rectangle(5.0, -3.0, 5.5, 3.0),
            Polygon::rectangle(2.0, 2.5, 5.5, 3.0),
            Polygon::rectangle(2.0, -3.0, 5.5, -2.5),
        ];
        let env = PolygonEnv::new(0.2).with_obstacles(cup);
        let planner = PotentialFieldPlanner::new(PotentialFieldConfig::default());
        let result = planner.plan(&RobotState::from_xy(0.0, 0.0), &RobotState::from_xy(10.0, 0.0), &env, &ctx());
        assert_eq!(result, Err(PlanningFailure::NoPathFound));
    }

    #[test]
    fn test_oscillation_detection() {
        let mut ids = VecDeque::new();
        assert!(!PotentialFieldPlanner::oscillations_detection(&mut ids, (0, 0)));
        assert!(!PotentialFieldPlanner::oscillations_detection(&mut ids, (1, 0)));
        assert!(PotentialFieldPlanner::oscillations_detection(&mut ids, (0, 0)));
    }
}
