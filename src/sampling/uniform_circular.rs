//! Uniform sampling over a disc

use rand_distr::{Distribution, UnitDisc};

use crate::common::*;
use crate::registry::Options;
use crate::sampling::pick_goal;

#[derive(Debug, Clone)]
pub struct UniformCircularSampler {
    center: Point,
    radius: f64,
    goal: Option<Point>,
    goal_sample_rate: f64,
}

impl UniformCircularSampler {
    pub fn new(center: Point, radius: f64) -> Self {
        UniformCircularSampler {
            center,
            radius,
            goal: None,
            goal_sample_rate: 0.0,
        }
    }

    pub fn with_goal(mut self, goal: Point, goal_sample_rate: f64) -> Self {
        self.goal = Some(goal);
        self.goal_sample_rate = goal_sample_rate;
        self
    }

    /// Options: `center_x`, `center_y`, `radius` (all required), `goal_sample_rate`.
    pub fn from_options(options: Options, goal: &Point) -> Result<Self, ConfigError> {
        let center = Point::new(options.require_f64("center_x")?, options.require_f64("center_y")?);
        let radius = options.require_f64("radius")?;
        if radius <= 0.0 {
            return Err(ConfigError::InvalidOption {
                strategy: options.strategy().to_string(),
                key: "radius".to_string(),
                reason: format!("must be > 0, got {}", radius),
            });
        }
        let rate = options.percent("goal_sample_rate", 5.0)?;
        options.finish()?;
        Ok(UniformCircularSampler::new(center, radius).with_goal(*goal, rate))
    }
}

impl Sampler for UniformCircularSampler {
    fn name(&self) -> &'static str {
        "UniformCircularSampler"
    }

    fn sample(&self) -> Point {
        let mut rng = rand::thread_rng();
        if let Some(goal) = pick_goal(&mut rng, &self.goal, self.goal_sample_rate) {
            return goal;
        }
        let [dx, dy]: [f64; 2] = UnitDisc.sample(&mut rng);
        Point::new(self.center.x + self.radius * dx, self.center.y + self.radius * dy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_inside_disc() {
        let center = Point::new(5.0, -1.0);
        let sampler = UniformCircularSampler::new(center, 2.0);
        for _ in 0..1000 {
            assert!(sampler.sample().distance(&center) <= 2.0 + 1e-9);
        }
    }

    #[test]
    fn test_radius_validated() {
        let opts = Options::parse("UniformCircularSampler", "center_x = 0\ncenter_y = 0\nradius = 0").unwrap();
        assert!(matches!(
            UniformCircularSampler::from_options(opts, &Point::origin()),
            Err(ConfigError::InvalidOption { .. })
        ));
        let missing = Options::parse("UniformCircularSampler", "center_x = 0").unwrap();
        assert!(matches!(
            UniformCircularSampler::from_options(missing, &Point::origin()),
            Err(ConfigError::MissingOption { .. })
        ));
    }
}
