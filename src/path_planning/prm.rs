// Probabilistic Road-Map (PRM) path planning
// after PythonRobotics (Atsushi Sakai)
//
// PRMStar is the same roadmap with a shrinking connection radius instead of a
// fixed number of neighbours.

use std::sync::Arc;

use crate::common::*;
use crate::path_planning::graph::Roadmap;
use crate::path_planning::{assemble_path, connection_radius, motion_free};
use crate::registry::Options;

/// How roadmap vertices are linked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Connection {
    /// Up to `k` nearest neighbours
    Nearest(usize),
    /// All neighbours within `gamma * sqrt(ln n / n)`
    Radius(f64),
}

#[derive(Debug, Clone)]
pub struct PRMConfig {
    /// number of sample points
    pub n_sample: usize,
    /// maximum edge length [m]
    pub max_edge_len: f64,
    pub connection: Connection,
}

impl Default for PRMConfig {
    fn default() -> Self {
        Self {
            n_sample: 500,
            max_edge_len: 30.0,
            connection: Connection::Nearest(10),
        }
    }
}

pub struct PRMPlanner {
    config: PRMConfig,
    sampler: Arc<dyn Sampler>,
}

impl PRMPlanner {
    pub fn new(config: PRMConfig, sampler: Arc<dyn Sampler>) -> Self {
        PRMPlanner { config, sampler }
    }

    /// Options: `n_sample`, `max_edge_len`, `n_knn`.
    pub fn from_options(options: Options, sampler: Arc<dyn Sampler>) -> Result<Self, ConfigError> {
        let d = PRMConfig::default();
        let config = PRMConfig {
            n_sample: options.usize("n_sample", d.n_sample)?,
            max_edge_len: options.positive_f64("max_edge_len", d.max_edge_len)?,
            connection: Connection::Nearest(options.usize("n_knn", 10)?),
        };
        options.finish()?;
        Ok(Self::new(config, sampler))
    }

    /// Options: `n_sample`, `max_edge_len`, `connect_gamma`.
    pub fn star_from_options(options: Options, sampler: Arc<dyn Sampler>) -> Result<Self, ConfigError> {
        let d = PRMConfig::default();
        let config = PRMConfig {
            n_sample: options.usize("n_sample", d.n_sample)?,
            max_edge_len: options.positive_f64("max_edge_len", d.max_edge_len)?,
            connection: Connection::Radius(options.positive_f64("connect_gamma", 30.0)?),
        };
        options.finish()?;
        Ok(Self::new(config, sampler))
    }

    /// Collect non-blocked samples. Gives up after ten draws per wanted sample.
    fn sample_points(&self, env: &dyn Environment, ctx: &PlanContext) -> Result<Vec<Point>, PlanningFailure> {
        let mut samples = Vec::with_capacity(self.config.n_sample);
        let mut draws = 0;
        while samples.len() < self.config.n_sample && draws < self.config.n_sample * 10 {
            if draws % 50 == 0 {
                ctx.checkpoint()?;
            }
            draws += 1;
            let p = self.sampler.sample();
            if !env.point_status(&p).is_blocked() {
                samples.push(p);
            }
        }
        Ok(samples)
    }

    fn generate_road_map(&self, graph: &mut Roadmap, env: &dyn Environment, ctx: &PlanContext) -> Result<(), PlanningFailure> {
        let n = graph.len();
        for i in 0..n {
            ctx.checkpoint()?;
            let p = graph.nodes[i];
            let neighbours = match self.config.connection {
                Connection::Nearest(k) => graph.k_nearest(&p, k, i),
                Connection::Radius(gamma) => graph.within(&p, connection_radius(gamma, n, self.config.max_edge_len), i),
            };
            for (j, dist) in neighbours {
                if dist > self.config.max_edge_len || graph.edges[i].contains(&j) {
                    continue;
                }
                if motion_free(env, &p, &graph.nodes[j]) {
                    graph.connect(i, j);
                }
            }
        }
        Ok(())
    }
}

impl Planner for PRMPlanner {
    fn name(&self) -> &'static str {
        match self.config.connection {
            Connection::Nearest(_) => "PRM",
            Connection::Radius(_) => "PRMStar",
        }
    }

    fn plan(
        &self,
        start: &RobotState,
        goal: &RobotState,
        env: &dyn Environment,
        ctx: &PlanContext,
    ) -> Result<Path, PlanningFailure> {
        check_endpoints(start, goal, env)?;

        let mut graph = Roadmap::new();
        let start_ind = graph.add_node(start.position);
        let goal_ind = graph.add_node(goal.position);
        for p in self.sample_points(env, ctx)? {
            graph.add_node(p);
        }
        self.generate_road_map(&mut graph, env, ctx)?;

        let route = graph.shortest_path(start_ind, goal_ind).ok_or(PlanningFailure::NoPathFound)?;
        tracing::debug!(planner = self.name(), nodes = graph.len(), hops = route.len(), "roadmap route found");
        Ok(assemble_path(start, goal, route.into_iter().map(|i| graph.nodes[i]).collect()))
    }
}
