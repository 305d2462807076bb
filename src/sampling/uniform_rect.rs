//! Uniform sampling over an axis-aligned rectangle

use rand::Rng;

use crate::common::*;
use crate::registry::Options;
use crate::sampling::pick_goal;

#[derive(Debug, Clone)]
pub struct UniformRectSampler {
    rand_area: AreaBounds,
    goal: Option<Point>,
    /// Goal sampling rate (0-100)
    goal_sample_rate: f64,
}

impl UniformRectSampler {
    pub fn new(rand_area: AreaBounds) -> Self {
        UniformRectSampler {
            rand_area,
            goal: None,
            goal_sample_rate: 0.0,
        }
    }

    pub fn with_goal(mut self, goal: Point, goal_sample_rate: f64) -> Self {
        self.goal = Some(goal);
        self.goal_sample_rate = goal_sample_rate;
        self
    }

    /// Options: `min_x`, `max_x`, `min_y`, `max_y`, `goal_sample_rate` (percent, default 5).
    pub fn from_options(options: Options, goal: &Point) -> Result<Self, ConfigError> {
        let bounds = options.require_bounds()?;
        let rate = options.percent("goal_sample_rate", 5.0)?;
        options.finish()?;
        Ok(UniformRectSampler::new(bounds).with_goal(*goal, rate))
    }

    pub fn area(&self) -> &AreaBounds {
        &self.rand_area
    }
}

impl Sampler for UniformRectSampler {
    fn name(&self) -> &'static str {
        "UniformRectSampler"
    }

    fn sample(&self) -> Point {
        let mut rng = rand::thread_rng();
        if let Some(goal) = pick_goal(&mut rng, &self.goal, self.goal_sample_rate) {
            return goal;
        }
        Point::new(
            rng.gen_range(self.rand_area.xmin..=self.rand_area.xmax),
            rng.gen_range(self.rand_area.ymin..=self.rand_area.ymax),
        )
    }
}
