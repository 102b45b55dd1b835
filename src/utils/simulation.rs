//! Laser scan simulation inside a polygonal room
//!
//! Used by the demo binary and the end-to-end tests to produce scans with a
//! known ground-truth trajectory.

use itertools::Itertools;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::common::{Point2D, Pose2D, SlamError, SlamResult};
use crate::sensor::LaserScan;

/// Wall segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub start: Point2D,
    pub end: Point2D,
}

impl Wall {
    pub fn new(start: Point2D, end: Point2D) -> Self {
        Self { start, end }
    }

    /// Distance along a ray to this wall, if the ray hits it
    fn intersect(&self, origin: &Point2D, dir: (f64, f64)) -> Option<f64> {
        let (ex, ey) = (self.end.x - self.start.x, self.end.y - self.start.y);
        let denom = dir.0 * ey - dir.1 * ex;
        if denom.abs() < 1e-12 {
            return None;
        }
        let (wx, wy) = (self.start.x - origin.x, self.start.y - origin.y);
        let t = (wx * ey - wy * ex) / denom;
        let u = (wx * dir.1 - wy * dir.0) / denom;
        if t > 0.0 && (0.0..=1.0).contains(&u) {
            Some(t)
        } else {
            None
        }
    }
}

/// Closed room made of wall segments
#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub walls: Vec<Wall>,
}

impl Room {
    /// Closed polygon through `corners`, last corner joined back to the first
    pub fn from_polygon(corners: &[Point2D]) -> Self {
        let walls = corners
            .iter()
            .circular_tuple_windows()
            .map(|(a, b)| Wall::new(*a, *b))
            .collect();
        Self { walls }
    }

    /// Axis-aligned rectangle centred on the origin
    pub fn rectangle(width: f64, height: f64) -> Self {
        let (hw, hh) = (0.5 * width, 0.5 * height);
        Self::from_polygon(&[
            Point2D::new(-hw, -hh),
            Point2D::new(hw, -hh),
            Point2D::new(hw, hh),
            Point2D::new(-hw, hh),
        ])
    }

    /// Add a free-standing wall, e.g. a pillar face
    pub fn with_wall(mut self, wall: Wall) -> Self {
        self.walls.push(wall);
        self
    }

    /// Distance to the nearest wall along bearing `angle` from `origin`
    pub fn cast(&self, origin: &Point2D, angle: f64) -> Option<f64> {
        let dir = (angle.cos(), angle.sin());
        self.walls
            .iter()
            .filter_map(|w| w.intersect(origin, dir))
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// Configuration for the scan simulator
#[derive(Debug, Clone)]
pub struct ScanSimulatorConfig {
    pub beams: usize,
    pub angle_min: f64,
    pub angle_increment: f64,
    pub max_range: f64,
    /// Standard deviation of additive range noise
    pub range_noise: f64,
    pub seed: u64,
}

impl Default for ScanSimulatorConfig {
    fn default() -> Self {
        let beams = 360;
        Self {
            beams,
            angle_min: -std::f64::consts::PI,
            angle_increment: 2.0 * std::f64::consts::PI / beams as f64,
            max_range: 30.0,
            range_noise: 0.0,
            seed: 0,
        }
    }
}

/// Ray-casting laser simulator
pub struct ScanSimulator {
    room: Room,
    config: ScanSimulatorConfig,
    normal: Normal<f64>,
    rng: StdRng,
}

impl ScanSimulator {
    /// Create a new simulator
    pub fn new(room: Room, config: ScanSimulatorConfig) -> SlamResult<Self> {
        let normal = Normal::new(0.0, 1.0).map_err(|e| SlamError::InvalidParameter(e.to_string()))?;
        if !(config.range_noise >= 0.0) {
            return Err(SlamError::InvalidParameter(format!(
                "range_noise must be non-negative, got {}",
                config.range_noise
            )));
        }
        let rng = StdRng::seed_from_u64(config.seed);
        Ok(Self {
            room,
            config,
            normal,
            rng,
        })
    }

    /// Scan seen from `pose`. Beams without a wall within `max_range` report
    /// infinity.
    pub fn scan(&mut self, pose: &Pose2D, stamp: f64) -> LaserScan {
        let origin = pose.position();
        let ranges = (0..self.config.beams)
            .map(|i| {
                let bearing = self.config.angle_min + i as f64 * self.config.angle_increment;
                match self.room.cast(&origin, pose.theta + bearing) {
                    Some(d) if d <= self.config.max_range => {
                        let noise = self.normal.sample(&mut self.rng) * self.config.range_noise;
                        (d + noise) as f32
                    }
                    _ => f32::INFINITY,
                }
            })
            .collect();
        LaserScan::single_echo(stamp, self.config.angle_min, self.config.angle_increment, ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::EchoSelection;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_polygon_is_closed() {
        let room = Room::rectangle(4.0, 2.0);
        assert_eq!(room.walls.len(), 4);
        assert_eq!(room.walls[3].end, room.walls[0].start);
    }

    #[test]
    fn test_cast_hits_nearest_wall() {
        let room = Room::rectangle(4.0, 2.0);
        let origin = Point2D::origin();
        assert_abs_diff_eq!(room.cast(&origin, 0.0).unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(room.cast(&origin, FRAC_PI_2).unwrap(), 1.0, epsilon = 1e-12);

        let room = room.with_wall(Wall::new(Point2D::new(1.0, -0.5), Point2D::new(1.0, 0.5)));
        assert_abs_diff_eq!(room.cast(&origin, 0.0).unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_scan_points_lie_on_walls() {
        let mut sim = ScanSimulator::new(Room::rectangle(6.0, 4.0), ScanSimulatorConfig::default()).unwrap();
        let pose = Pose2D::new(0.3, 0.5, -0.2);
        let scan = sim.scan(&pose, 0.0);
        assert_eq!(scan.ranges.len(), 360);

        let cloud = scan.to_point_cloud(EchoSelection::First);
        for p in &cloud {
            let w = pose.transform_point(p);
            let on_wall = (w.x.abs() - 3.0).abs() < 1e-6 || (w.y.abs() - 2.0).abs() < 1e-6;
            assert!(on_wall, "{:?} is not on a wall", w);
        }
    }

    #[test]
    fn test_out_of_range_beams_are_infinite() {
        let config = ScanSimulatorConfig {
            max_range: 1.5,
            ..Default::default()
        };
        let mut sim = ScanSimulator::new(Room::rectangle(6.0, 2.0), config).unwrap();
        let scan = sim.scan(&Pose2D::identity(), 0.0);
        let cloud = scan.to_point_cloud(EchoSelection::First);
        assert!(cloud.iter().any(|p| !p.x.is_finite()));
        assert!(cloud.iter().any(|p| p.x.is_finite()));
    }

    #[test]
    fn test_noise_is_seeded() {
        let config = ScanSimulatorConfig {
            range_noise: 0.01,
            seed: 7,
            ..Default::default()
        };
        let room = Room::rectangle(6.0, 4.0);
        let a = ScanSimulator::new(room.clone(), config.clone()).unwrap().scan(&Pose2D::identity(), 0.0);
        let b = ScanSimulator::new(room.clone(), config).unwrap().scan(&Pose2D::identity(), 0.0);
        let clean = ScanSimulator::new(room, ScanSimulatorConfig::default())
            .unwrap()
            .scan(&Pose2D::identity(), 0.0);
        assert_eq!(a, b);
        assert_ne!(a, clean);
    }
}
