// Occupancy grid environment built from laser scans
// Ray casting after the grid map in PythonRobotics (Atsushi Sakai)

use nalgebra::DMatrix;

use crate::common::*;
use crate::registry::Options;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Unknown,
    Free,
    Occupied,
}

/// Fixed-size occupancy grid updated by ray casting.
///
/// Each scan overwrites the cells it touches: cells along a ray become free,
/// the cell at the return becomes occupied. Returns are written after all free
/// space of the same scan, so a hit is never cleared by a neighbouring ray.
/// Because every write is an overwrite, the same scan applied twice leaves the
/// grid as it was after the first application.
#[derive(Debug, Clone)]
pub struct ScanEnv {
    data: DMatrix<Cell>,
    bounds: AreaBounds,
    resolution: f64,
    buffer_dist: f64,
    x_width: usize,
    y_width: usize,
    occupied: Vec<Point>,
    scans_applied: usize,
}

impl ScanEnv {
    pub fn new(bounds: AreaBounds, resolution: f64, buffer_dist: f64) -> Self {
        let x_width = (bounds.width() / resolution).ceil().max(1.0) as usize;
        let y_width = (bounds.height() / resolution).ceil().max(1.0) as usize;

        ScanEnv {
            data: DMatrix::from_element(x_width, y_width, Cell::Unknown),
            bounds,
            resolution,
            buffer_dist,
            x_width,
            y_width,
            occupied: Vec::new(),
            scans_applied: 0,
        }
    }

    /// Options: `min_x`, `max_x`, `min_y`, `max_y` (required), `resolution`, `buffer_dist`.
    pub fn from_options(options: Options) -> Result<Self, ConfigError> {
        let bounds = options.require_bounds()?;
        let resolution = options.positive_f64("resolution", 0.1)?;
        let buffer_dist = options.f64("buffer_dist", 0.2)?;
        options.finish()?;
        Ok(ScanEnv::new(bounds, resolution, buffer_dist))
    }

    /// Get grid index from world coordinates
    pub fn get_index(&self, p: &Point) -> Option<(usize, usize)> {
        let ix = ((p.x - self.bounds.xmin) / self.resolution).floor();
        let iy = ((p.y - self.bounds.ymin) / self.resolution).floor();

        if ix >= 0.0 && (ix as usize) < self.x_width && iy >= 0.0 && (iy as usize) < self.y_width {
            Some((ix as usize, iy as usize))
        } else {
            None
        }
    }

    fn cell_center(&self, ix: usize, iy: usize) -> Point {
        Point::new(
            self.bounds.xmin + (ix as f64 + 0.5) * self.resolution,
            self.bounds.ymin + (iy as f64 + 0.5) * self.resolution,
        )
    }

    pub fn cell(&self, p: &Point) -> Option<Cell> {
        self.get_index(p).map(|idx| self.data[idx])
    }

    pub fn scans_applied(&self) -> usize {
        self.scans_applied
    }

    fn ray_end(&self, scan: &LaserScan, i: usize, length: f64) -> Point {
        let bearing = scan.bearing(i);
        let o = &scan.origin.position;
        Point::new(o.x + length * bearing.cos(), o.y + length * bearing.sin())
    }

    /// Distance from `origin` to the farthest grid corner; no ray needs to go further.
    fn max_ray_length(&self, origin: &Point) -> f64 {
        let b = &self.bounds;
        [(b.xmin, b.ymin), (b.xmin, b.ymax), (b.xmax, b.ymin), (b.xmax, b.ymax)]
            .iter()
            .map(|&c| origin.distance(&Point::from(c)))
            .fold(0.0, f64::max)
    }

    fn mark_free(&mut self, from: &Point, to: &Point) {
        let step = self.resolution * 0.5;
        let n = (from.distance(to) / step).floor() as usize;
        for k in 0..n {
            if let Some(idx) = self.get_index(&from.lerp(to, k as f64 / n as f64)) {
                self.data[idx] = Cell::Free;
            }
        }
    }

    fn ray_casting(&mut self, scan: &LaserScan) {
        let origin = scan.origin.position;
        let reach = self.max_ray_length(&origin);
        let mut hits = Vec::new();

        for (i, &range) in scan.ranges.iter().enumerate() {
            if range.is_nan() || range < scan.range_min {
                continue;
            }
            if !range.is_finite() || range > scan.range_max {
                // no return: free up to the sensor limit
                let end = self.ray_end(scan, i, scan.range_max.min(reach));
                self.mark_free(&origin, &end);
            } else if range > reach {
                // returns beyond the grid only clear the cells on the way
                let end = self.ray_end(scan, i, reach);
                self.mark_free(&origin, &end);
            } else {
                let hit = self.ray_end(scan, i, range);
                self.mark_free(&origin, &hit);
                hits.push(hit);
            }
        }

        for hit in hits {
            if let Some(idx) = self.get_index(&hit) {
                self.data[idx] = Cell::Occupied;
            }
        }

        self.occupied = (0..self.x_width)
            .flat_map(|ix| (0..self.y_width).map(move |iy| (ix, iy)))
            .filter(|&idx| self.data[idx] == Cell::Occupied)
            .map(|(ix, iy)| self.cell_center(ix, iy))
            .collect();
    }
}

impl Environment for ScanEnv {
    fn name(&self) -> &'static str {
        "ScanEnv"
    }

    fn observation_kind(&self) -> &'static str {
        "scan"
    }

    fn validate(&self, observation: &Observation) -> Result<(), ObservationError> {
        match observation {
            Observation::Scan(scan) => scan.validate(),
            other => Err(ObservationError::Unsupported {
                environment: "ScanEnv",
                observation: other.kind(),
            }),
        }
    }

    fn apply(&mut self, observation: &Observation) {
        if let Observation::Scan(scan) = observation {
            self.ray_casting(scan);
            self.scans_applied += 1;
        }
    }

    fn point_status(&self, point: &Point) -> OccupancyStatus {
        let Some(center) = self.get_index(point) else {
            return OccupancyStatus::Unknown;
        };
        // half a cell of slack so a hit counts once its cell overlaps the footprint
        let reach = self.buffer_dist + self.resolution * 0.5;
        if self.occupied.iter().any(|c| c.distance(point) <= reach) {
            return OccupancyStatus::Blocked;
        }
        match self.data[center] {
            Cell::Unknown => OccupancyStatus::Unknown,
            _ => OccupancyStatus::Free,
        }
    }

    fn clearance(&self, point: &Point) -> Option<f64> {
        self.occupied
            .iter()
            .map(|c| c.distance(point))
            .fold(None, |acc: Option<f64>, d| Some(acc.map_or(d, |m| m.min(d))))
    }

    fn check_resolution(&self) -> f64 {
        self.resolution
    }

    fn is_initialized(&self) -> bool {
        self.scans_applied > 0
    }

    fn clone_box(&self) -> Box<dyn Environment> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Five rays fanned around +x, all returning at `range`.
    fn forward_scan(range: f64) -> LaserScan {
        LaserScan {
            origin: RobotState::with_yaw(Point::new(0.0, 0.0), 0.0),
            angle_min: -0.1,
            angle_increment: 0.05,
            range_min: 0.05,
            range_max: 8.0,
            ranges: vec![range; 5],
        }
    }

    fn env() -> ScanEnv {
        ScanEnv::new(AreaBounds::new(-10.0, 10.0, -10.0, 10.0), 0.1, 0.2)
    }

    #[test]
    fn test_unknown_before_scan() {
        let env = env();
        assert!(!env.is_initialized());
        assert_eq!(env.point_status(&Point::new(1.0, 0.0)), OccupancyStatus::Unknown);
    }

    #[test]
    fn test_ray_casting_marks_free_and_blocked() {
        let mut env = env();
        assert!(env.update(&Observation::Scan(forward_scan(5.0))));
        assert_eq!(env.point_status(&Point::new(2.0, 0.0)), OccupancyStatus::Free);
        assert_eq!(env.point_status(&Point::new(5.0, 0.0)), OccupancyStatus::Blocked);
        assert_eq!(env.point_status(&Point::new(0.0, 5.0)), OccupancyStatus::Unknown);
        assert_eq!(env.point_status(&Point::new(50.0, 0.0)), OccupancyStatus::Unknown);
    }

    #[test]
    fn test_infinite_range_is_free_space() {
        let mut env = env();
        env.update(&Observation::Scan(forward_scan(f64::INFINITY)));
        assert_eq!(env.point_status(&Point::new(6.0, 0.0)), OccupancyStatus::Free);
        assert_eq!(env.clearance(&Point::new(6.0, 0.0)), None);
    }

    #[test]
    fn test_long_range_scan_clipped_to_grid() {
        let mut env = ScanEnv::new(AreaBounds::new(0.0, 20.0, 0.0, 20.0), 0.1, 0.2);
        let scan = LaserScan {
            origin: RobotState::with_yaw(Point::new(10.05, 10.05), 0.0),
            angle_min: -std::f64::consts::PI,
            angle_increment: std::f64::consts::TAU / 360.0,
            range_min: 0.05,
            range_max: 2e5,
            ranges: vec![f64::INFINITY; 360],
        };
        assert!(env.update(&Observation::Scan(scan.clone())));
        assert_eq!(env.point_status(&Point::new(19.85, 10.05)), OccupancyStatus::Free);
        assert_eq!(env.point_status(&Point::new(10.05, 0.15)), OccupancyStatus::Free);

        // a return far outside the grid blocks nothing inside it
        let mut far = scan;
        far.ranges = vec![1e5; 360];
        assert!(env.update(&Observation::Scan(far)));
        assert_eq!(env.clearance(&Point::new(10.05, 10.05)), None);
        assert_eq!(env.point_status(&Point::new(0.55, 10.05)), OccupancyStatus::Free);
    }

    #[test]
    fn test_update_idempotent() {
        let obs = Observation::Scan(forward_scan(3.0));
        let mut once = env();
        once.update(&obs);
        let mut twice = env();
        twice.update(&obs);
        twice.update(&obs);
        for x in [0.5, 1.5, 2.8, 3.0, 3.3, 6.0] {
            let p = Point::new(x, 0.0);
            assert_eq!(once.point_status(&p), twice.point_status(&p));
        }
    }

    #[test]
    fn test_rejects_polygons_and_bad_scans() {
        let mut env = env();
        assert!(!env.update(&Observation::Polygons(vec![])));
        let mut bad = forward_scan(1.0);
        bad.ranges.clear();
        assert!(!env.update(&Observation::Scan(bad)));
        assert!(!env.is_initialized());
    }

    #[test]
    fn test_from_options_requires_bounds() {
        let opts = Options::parse("ScanEnv", "resolution = 0.1").unwrap();
        assert!(matches!(ScanEnv::from_options(opts), Err(ConfigError::MissingOption { .. })));
    }
}
