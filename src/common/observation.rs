//! Native observation types accepted by environments

use serde::{Deserialize, Serialize};

use crate::common::error::ObservationError;
use crate::common::types::{Point, RobotState};

/// Closed polygon obstacle; the last vertex connects back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    pub fn from_xy(coords: &[(f64, f64)]) -> Self {
        Self::new(coords.iter().map(|&c| Point::from(c)).collect())
    }

    /// Axis-aligned rectangle.
    pub fn rectangle(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::from_xy(&[(min_x, min_y), (max_x, min_y), (max_x, max_y), (min_x, max_y)])
    }

    pub fn validate(&self) -> Result<(), ObservationError> {
        if self.vertices.len() < 3 {
            return Err(ObservationError::Malformed(format!(
                "polygon needs at least 3 vertices, got {}",
                self.vertices.len()
            )));
        }
        if !self.vertices.iter().all(Point::is_finite) {
            return Err(ObservationError::Malformed("polygon has non-finite vertex".to_string()));
        }
        Ok(())
    }

    pub fn edges(&self) -> impl Iterator<Item = (&Point, &Point)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (&self.vertices[i], &self.vertices[(i + 1) % n]))
    }

    /// Even-odd rule point containment.
    pub fn contains(&self, p: &Point) -> bool {
        let mut inside = false;
        for (a, b) in self.edges() {
            if (a.y > p.y) != (b.y > p.y) {
                let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
                if p.x < x_cross {
                    inside = !inside;
                }
            }
        }
        inside
    }

    /// Zero inside, otherwise distance to the nearest edge.
    pub fn distance(&self, p: &Point) -> f64 {
        if self.contains(p) {
            return 0.0;
        }
        self.edges()
            .map(|(a, b)| p.distance_to_segment(a, b))
            .fold(f64::INFINITY, f64::min)
    }
}

/// Planar laser scan taken from `origin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaserScan {
    pub origin: RobotState,
    pub angle_min: f64,
    pub angle_increment: f64,
    pub range_min: f64,
    pub range_max: f64,
    pub ranges: Vec<f64>,
}

impl LaserScan {
    pub fn validate(&self) -> Result<(), ObservationError> {
        if !self.origin.is_finite() {
            return Err(ObservationError::Malformed("scan origin is not finite".to_string()));
        }
        if self.ranges.is_empty() {
            return Err(ObservationError::Malformed("scan has no ranges".to_string()));
        }
        if !self.angle_min.is_finite() || !self.angle_increment.is_finite() || self.angle_increment == 0.0 {
            return Err(ObservationError::Malformed(format!(
                "bad scan angles (min {}, increment {})",
                self.angle_min, self.angle_increment
            )));
        }
        if !(self.range_min >= 0.0 && self.range_max > self.range_min && self.range_max.is_finite()) {
            return Err(ObservationError::OutOfRange(format!(
                "range limits [{}, {}]",
                self.range_min, self.range_max
            )));
        }
        Ok(())
    }

    /// World-frame bearing of ray `i`; a missing origin yaw is taken as zero.
    pub fn bearing(&self, i: usize) -> f64 {
        self.origin.yaw.unwrap_or(0.0) + self.angle_min + self.angle_increment * i as f64
    }
}

/// Observation handed to [`crate::common::Environment::update`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Observation {
    /// Complete obstacle set; replaces whatever was known before.
    Polygons(Vec<Polygon>),
    Scan(LaserScan),
}

impl Observation {
    pub fn kind(&self) -> &'static str {
        match self {
            Observation::Polygons(_) => "polygons",
            Observation::Scan(_) => "scan",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_contains_and_distance() {
        let square = Polygon::rectangle(0.0, 0.0, 2.0, 2.0);
        assert!(square.contains(&Point::new(1.0, 1.0)));
        assert!(!square.contains(&Point::new(3.0, 1.0)));
        assert_eq!(square.distance(&Point::new(1.0, 1.0)), 0.0);
        assert!((square.distance(&Point::new(3.0, 1.0)) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_polygon_validation() {
        assert!(Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0)]).validate().is_err());
        assert!(Polygon::from_xy(&[(0.0, 0.0), (1.0, 0.0), (f64::NAN, 1.0)]).validate().is_err());
        assert!(Polygon::rectangle(0.0, 0.0, 1.0, 1.0).validate().is_ok());
    }

    #[test]
    fn test_scan_validation() {
        let mut scan = LaserScan {
            origin: RobotState::from_xy(0.0, 0.0),
            angle_min: 0.0,
            angle_increment: 0.1,
            range_min: 0.1,
            range_max: 10.0,
            ranges: vec![1.0; 4],
        };
        assert!(scan.validate().is_ok());
        scan.angle_increment = f64::NAN;
        assert!(scan.validate().is_err());
        scan.angle_increment = 0.1;
        scan.range_max = 0.0;
        assert!(matches!(scan.validate(), Err(ObservationError::OutOfRange(_))));
    }

    #[test]
    fn test_observation_serializes_with_kind_tag() {
        let obs = Observation::Polygons(vec![Polygon::rectangle(0.0, 0.0, 1.0, 1.0)]);
        let value = serde_json::to_value(&obs).unwrap();
        assert_eq!(value["kind"], "polygons");
        assert_eq!(value["data"].as_array().map(Vec::len), Some(1));
        let back: Observation = serde_json::from_value(value).unwrap();
        assert_eq!(back, obs);
    }
}
