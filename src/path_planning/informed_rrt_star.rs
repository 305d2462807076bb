//! Informed RRT*
//!
//! RRT* with rewiring. Once a first solution of length `c_best` exists,
//! samples are drawn from the ellipse with foci at start and goal whose
//! points could still shorten it. Anytime: on deadline the best path so far
//! is returned.

use std::sync::Arc;

use nalgebra::{Rotation2, Vector2};
use rand_distr::{Distribution, UnitDisc};

use crate::common::*;
use crate::path_planning::tree::{steer, Tree};
use crate::path_planning::{assemble_path, connection_radius, motion_free};
use crate::registry::Options;

#[derive(Debug, Clone)]
pub struct InformedRRTStarConfig {
    pub expand_dis: f64,
    pub path_resolution: f64,
    pub max_iter: usize,
    pub connect_gamma: f64,
}

impl Default for InformedRRTStarConfig {
    fn default() -> Self {
        Self {
            expand_dis: 3.0,
            path_resolution: 0.5,
            max_iter: 300,
            connect_gamma: 50.0,
        }
    }
}

pub struct InformedRRTStar {
    config: InformedRRTStarConfig,
    sampler: Arc<dyn Sampler>,
}

struct Ellipse {
    c_min: f64,
    center: Vector2<f64>,
    rotation: Rotation2<f64>,
}

impl Ellipse {
    fn new(start: &Point, goal: &Point) -> Self {
        Ellipse {
            c_min: start.distance(goal),
            center: (start.to_vector() + goal.to_vector()) / 2.0,
            rotation: Rotation2::new(start.angle_to(goal)),
        }
    }

    fn sample(&self, c_max: f64) -> Point {
        let r = Vector2::new(c_max / 2.0, (c_max * c_max - self.c_min * self.c_min).max(0.0).sqrt() / 2.0);
        let [bx, by]: [f64; 2] = UnitDisc.sample(&mut rand::thread_rng());
        let p = self.rotation * Vector2::new(r.x * bx, r.y * by) + self.center;
        Point::from(p)
    }
}

impl InformedRRTStar {
    pub fn new(config: InformedRRTStarConfig, sampler: Arc<dyn Sampler>) -> Self {
        InformedRRTStar { config, sampler }
    }

    /// Options: `expand_dis`, `path_resolution`, `max_iter`, `connect_gamma`.
    pub fn from_options(options: Options, sampler: Arc<dyn Sampler>) -> Result<Self, ConfigError> {
        let d = InformedRRTStarConfig::default();
        let config = InformedRRTStarConfig {
            expand_dis: options.positive_f64("expand_dis", d.expand_dis)?,
            path_resolution: options.positive_f64("path_resolution", d.path_resolution)?,
            max_iter: options.usize("max_iter", d.max_iter)?,
            connect_gamma: options.positive_f64("connect_gamma", d.connect_gamma)?,
        };
        options.finish()?;
        Ok(Self::new(config, sampler))
    }

    fn choose_parent(&self, tree: &Tree, new_point: &Point, near_inds: &[usize], env: &dyn Environment) -> Option<usize> {
        near_inds
            .iter()
            .map(|&i| (i, tree.nodes[i].cost + tree.point(i).distance(new_point)))
            .filter(|&(i, _)| motion_free(env, tree.point(i), new_point))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn rewire(&self, tree: &mut Tree, new_ind: usize, near_inds: &[usize], env: &dyn Environment) {
        for &i in near_inds {
            let d = tree.point(i).distance(tree.point(new_ind));
            let s_cost = tree.nodes[new_ind].cost + d;
            if tree.nodes[i].cost > s_cost && tree.nodes[i].parent.is_some() {
                let (a, b) = (*tree.point(i), *tree.point(new_ind));
                if motion_free(env, &a, &b) {
                    tree.reparent(i, new_ind);
                }
            }
        }
    }
}

impl Planner for InformedRRTStar {
    fn name(&self) -> &'static str {
        "InformedRRTstar"
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
        let ellipse = Ellipse::new(&start.position, &goal_pt);

        let mut tree = Tree::new(start.position);
        let mut c_best = f64::INFINITY;
        let mut best: Option<Vec<Point>> = None;

        for _ in 0..self.config.max_iter {
            if let Err(failure) = ctx.checkpoint() {
                return match (failure, best) {
                    (PlanningFailure::Timeout, Some(route)) => Ok(assemble_path(start, goal, route)),
                    _ => Err(failure),
                };
            }

            let rnd = if c_best.is_finite() {
                ellipse.sample(c_best)
            } else {
                self.sampler.sample()
            };
            let nearest_ind = tree.nearest(&rnd);
            let nearest = *tree.point(nearest_ind);
            let new_point = steer(&nearest, &rnd, self.config.expand_dis, self.config.path_resolution);
            if new_point == nearest || !motion_free(env, &nearest, &new_point) {
                continue;
            }

            let radius = connection_radius(self.config.connect_gamma, tree.len() + 1, self.config.expand_dis * 2.0);
            let near_inds = tree.near(&new_point, radius);
            let parent = self.choose_parent(&tree, &new_point, &near_inds, env).unwrap_or(nearest_ind);
            let new_ind = tree.push(new_point, parent);
            self.rewire(&mut tree, new_ind, &near_inds, env);

            if new_point.distance(&goal_pt) <= self.config.expand_dis && motion_free(env, &new_point, &goal_pt) {
                let cost = tree.nodes[new_ind].cost + new_point.distance(&goal_pt);
                if cost < c_best {
                    c_best = cost;
                    best = Some(tree.branch(new_ind));
                    tracing::trace!(cost = c_best, "found better path");
                }
            }
        }

        best.map(|route| assemble_path(start, goal, route))
            .ok_or(PlanningFailure::NoPathFound)
    }
}
