//! Polygon obstacle environment
//!
//! Obstacles are a set of closed polygons. Every polygon observation replaces
//! the whole set, so applying the same observation twice is the same as once.

use crate::common::*;
use crate::registry::Options;

#[derive(Debug, Clone)]
pub struct PolygonEnv {
    obstacles: Vec<Polygon>,
    /// Clearance kept around every obstacle [m]
    buffer_dist: f64,
    /// Workspace; queries outside it are unknown
    bounds: Option<AreaBounds>,
    resolution: f64,
    initialized: bool,
}

impl PolygonEnv {
    pub fn new(buffer_dist: f64) -> Self {
        PolygonEnv {
            obstacles: Vec::new(),
            buffer_dist,
            bounds: None,
            resolution: 0.1,
            initialized: false,
        }
    }

    pub fn with_bounds(mut self, bounds: AreaBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        self.resolution = resolution;
        self
    }

    /// Start from a known obstacle set.
    pub fn with_obstacles(mut self, obstacles: Vec<Polygon>) -> Self {
        self.obstacles = obstacles;
        self.initialized = true;
        self
    }

    /// Options: `buffer_dist`, `resolution`, optional `min_x/max_x/min_y/max_y`,
    /// optional initial `obstacles`.
    pub fn from_options(options: Options) -> Result<Self, ConfigError> {
        let buffer_dist = options.f64("buffer_dist", 0.0)?;
        if buffer_dist < 0.0 {
            return Err(ConfigError::InvalidOption {
                strategy: options.strategy().to_string(),
                key: "buffer_dist".to_string(),
                reason: "must be >= 0".to_string(),
            });
        }
        let mut env = PolygonEnv::new(buffer_dist).with_resolution(options.positive_f64("resolution", 0.1)?);
        if let Some(bounds) = options.opt_bounds()? {
            env = env.with_bounds(bounds);
        }
        if let Some(obstacles) = options.polygons("obstacles")? {
            env = env.with_obstacles(obstacles);
        }
        options.finish()?;
        Ok(env)
    }

    pub fn obstacles(&self) -> &[Polygon] {
        &self.obstacles
    }
}

impl Environment for PolygonEnv {
    fn name(&self) -> &'static str {
        "PolygonEnv"
    }

    fn observation_kind(&self) -> &'static str {
        "polygons"
    }

    fn validate(&self, observation: &Observation) -> Result<(), ObservationError> {
        match observation {
            Observation::Polygons(polygons) => polygons.iter().try_for_each(Polygon::validate),
            other => Err(ObservationError::Unsupported {
                environment: "PolygonEnv",
                observation: other.kind(),
            }),
        }
    }

    fn apply(&mut self, observation: &Observation) {
        if let Observation::Polygons(polygons) = observation {
            self.obstacles = polygons.clone();
            self.initialized = true;
        }
    }

    fn point_status(&self, point: &Point) -> OccupancyStatus {
        if !self.initialized {
            return OccupancyStatus::Unknown;
        }
        if let Some(bounds) = &self.bounds {
            if !bounds.contains(point) {
                return OccupancyStatus::Unknown;
            }
        }
        if self.obstacles.iter().any(|poly| poly.distance(point) <= self.buffer_dist) {
            OccupancyStatus::Blocked
        } else {
            OccupancyStatus::Free
        }
    }

    fn clearance(&self, point: &Point) -> Option<f64> {
        self.obstacles
            .iter()
            .map(|poly| poly.distance(point))
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))))
    }

    fn check_resolution(&self) -> f64 {
        self.resolution
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn clone_box(&self) -> Box<dyn Environment> {
        Box::new(self.clone())
    }
}
