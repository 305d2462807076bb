//! RRG (Rapidly-exploring Random Graph)
//!
//! Grows like RRT but links every new vertex to all vertices within a
//! shrinking radius, so the result is a graph instead of a tree. The path is
//! the shortest route through that graph once the iteration budget is spent.

use std::sync::Arc;

use crate::common::*;
use crate::path_planning::graph::Roadmap;
use crate::path_planning::tree::steer;
use crate::path_planning::{assemble_path, connection_radius, motion_free};
use crate::registry::Options;

#[derive(Debug, Clone)]
pub struct RRGConfig {
    pub expand_dis: f64,
    pub path_resolution: f64,
    pub max_iter: usize,
    /// Scale of the neighbourhood radius
    pub connect_gamma: f64,
}

impl Default for RRGConfig {
    fn default() -> Self {
        Self {
            expand_dis: 3.0,
            path_resolution: 0.5,
            max_iter: 300,
            connect_gamma: 50.0,
        }
    }
}

pub struct RRGPlanner {
    config: RRGConfig,
    sampler: Arc<dyn Sampler>,
}

impl RRGPlanner {
    pub fn new(config: RRGConfig, sampler: Arc<dyn Sampler>) -> Self {
        RRGPlanner { config, sampler }
    }

    /// Options: `expand_dis`, `path_resolution`, `max_iter`, `connect_gamma`.
    pub fn from_options(options: Options, sampler: Arc<dyn Sampler>) -> Result<Self, ConfigError> {
        let d = RRGConfig::default();
        let config = RRGConfig {
            expand_dis: options.positive_f64("expand_dis", d.expand_dis)?,
            path_resolution: options.positive_f64("path_resolution", d.path_resolution)?,
            max_iter: options.usize("max_iter", d.max_iter)?,
            connect_gamma: options.positive_f64("connect_gamma", d.connect_gamma)?,
        };
        options.finish()?;
        Ok(Self::new(config, sampler))
    }

    fn extract(graph: &Roadmap, goal_ind: Option<usize>, start: &RobotState, goal: &RobotState) -> Option<Path> {
        let route = graph.shortest_path(0, goal_ind?)?;
        let interior = route.iter().map(|&i| graph.nodes[i]).collect();
        Some(assemble_path(start, goal, interior))
    }
}

impl Planner for RRGPlanner {
    fn name(&self) -> &'static str {
        "RRG"
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

        let mut graph = Roadmap::new();
        graph.add_node(start.position);
        let mut goal_ind = None;

        for _ in 0..self.config.max_iter {
            if let Err(failure) = ctx.checkpoint() {
                // out of time with a connected goal still yields a path
                return match (failure, Self::extract(&graph, goal_ind, start, goal)) {
                    (PlanningFailure::Timeout, Some(path)) => Ok(path),
                    _ => Err(failure),
                };
            }

            let rnd = self.sampler.sample();
            let nearest_ind = graph.k_nearest(&rnd, 1, usize::MAX).first().map(|(i, _)| *i).unwrap_or(0);
            let nearest = graph.nodes[nearest_ind];
            let new_point = steer(&nearest, &rnd, self.config.expand_dis, self.config.path_resolution);
            if new_point == nearest || !motion_free(env, &nearest, &new_point) {
                continue;
            }

            let radius = connection_radius(self.config.connect_gamma, graph.len() + 1, self.config.expand_dis);
            let near = graph.within(&new_point, radius, usize::MAX);
            let new_ind = graph.add_node(new_point);
            graph.connect(nearest_ind, new_ind);
            for (i, _) in near {
                if i != nearest_ind && motion_free(env, &graph.nodes[i], &new_point) {
                    graph.connect(i, new_ind);
                }
            }

            if new_point.distance(&goal_pt) <= self.config.expand_dis && motion_free(env, &new_point, &goal_pt) {
                let g = *goal_ind.get_or_insert_with(|| graph.add_node(goal_pt));
                graph.connect(new_ind, g);
            }
        }

        Self::extract(&graph, goal_ind, start, goal).ok_or(PlanningFailure::NoPathFound)
    }
}
