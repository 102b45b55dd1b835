//! Fixed-size occupancy grid built from registered laser scans
//!
//! The grid is a single dense row-major buffer of `i8` cells (row = grid y,
//! column = grid x). Every cell starts unknown (-1); map updates trace a ray
//! from the robot to each scan point and stamp a small disk at the hit cell.
//!
//! Cells crossed by a ray get `ray_value` (100) and the hit disk gets
//! `hit_value` (0). This is the reverse of the usual occupied-high /
//! free-low convention; both values are configurable.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use super::raster::{disk, GridLine};
use crate::common::{GridIndex, Point2D, PointCloud, Pose2D, SlamError, SlamResult};

/// Value of a cell that has never been written
pub const UNKNOWN_CELL: i8 = -1;
/// Largest value a cell may hold
pub const MAX_CELL_VALUE: i8 = 100;

/// Configuration for the occupancy grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Number of cells along x
    pub width: usize,
    /// Number of cells along y
    pub height: usize,
    /// World units per cell
    pub resolution: f64,
    /// Scan points farther than this from the sensor are not inserted
    pub max_range: f64,
    /// Value written along each ray
    pub ray_value: i8,
    /// Value written in the disk around each hit
    pub hit_value: i8,
    /// Radius of the hit disk [cells]
    pub hit_radius: i32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 2000,
            height: 2000,
            resolution: 0.1,
            max_range: 30.0,
            ray_value: MAX_CELL_VALUE,
            hit_value: 0,
            hit_radius: 1,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> SlamResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(SlamError::InvalidParameter(format!(
                "grid dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.width.checked_mul(self.height).is_none() {
            return Err(SlamError::InvalidParameter(format!(
                "grid of {}x{} cells does not fit in memory",
                self.width, self.height
            )));
        }
        if !(self.resolution > 0.0) || !self.resolution.is_finite() {
            return Err(SlamError::InvalidParameter(format!(
                "grid resolution must be positive, got {}",
                self.resolution
            )));
        }
        if !(self.max_range > 0.0) {
            return Err(SlamError::InvalidParameter(format!(
                "max_range must be positive, got {}",
                self.max_range
            )));
        }
        for (name, v) in [("ray_value", self.ray_value), ("hit_value", self.hit_value)] {
            if !(UNKNOWN_CELL..=MAX_CELL_VALUE).contains(&v) {
                return Err(SlamError::InvalidParameter(format!(
                    "{} must lie in [{}, {}], got {}",
                    name, UNKNOWN_CELL, MAX_CELL_VALUE, v
                )));
            }
        }
        if self.hit_radius < 0 {
            return Err(SlamError::InvalidParameter(format!(
                "hit_radius must not be negative, got {}",
                self.hit_radius
            )));
        }
        Ok(())
    }
}

/// Grid metadata published alongside the cell data
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapInfo {
    pub width: usize,
    pub height: usize,
    pub resolution: f64,
    /// World coordinate of grid index (0, 0)
    pub origin: Point2D,
}

/// Borrowed flat view of the grid for external consumers
#[derive(Debug, Clone, Copy)]
pub struct GridView<'a> {
    pub info: MapInfo,
    /// Row-major cells, `data[iy * width + ix]`
    pub data: &'a [i8],
}

/// Bookkeeping from one [`OccupancyGrid::update`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapUpdateStats {
    /// Points traced into the grid
    pub rays: usize,
    /// Points dropped for being beyond `max_range` or non-finite
    pub rejected: usize,
    /// Individual in-bounds cell writes
    pub cells_written: usize,
}

/// Occupancy grid map
#[derive(Debug, Clone)]
pub struct OccupancyGrid {
    config: GridConfig,
    data: Vec<i8>,
    update_count: usize,
}

impl OccupancyGrid {
    /// Create a grid with every cell unknown
    pub fn new(config: GridConfig) -> SlamResult<Self> {
        config.validate()?;
        let data = vec![UNKNOWN_CELL; config.width * config.height];
        Ok(Self {
            config,
            data,
            update_count: 0,
        })
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn width(&self) -> usize {
        self.config.width
    }

    pub fn height(&self) -> usize {
        self.config.height
    }

    pub fn resolution(&self) -> f64 {
        self.config.resolution
    }

    /// World coordinate of grid index (0, 0)
    pub fn origin(&self) -> Point2D {
        Point2D::new(
            -0.5 * self.config.width as f64 * self.config.resolution,
            -0.5 * self.config.height as f64 * self.config.resolution,
        )
    }

    pub fn info(&self) -> MapInfo {
        MapInfo {
            width: self.config.width,
            height: self.config.height,
            resolution: self.config.resolution,
            origin: self.origin(),
        }
    }

    /// Number of `update` calls applied so far
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    /// Continuous grid coordinate of a world point.
    ///
    /// Points outside the map yield coordinates outside
    /// `[0, width) × [0, height)`; they are not clamped.
    pub fn world_to_grid(&self, p: &Point2D) -> Vector2<f64> {
        let mut m = p.to_vector() / self.config.resolution;
        m[0] += self.config.width as f64 * 0.5;
        m[1] += self.config.height as f64 * 0.5;
        m
    }

    /// Inverse of [`world_to_grid`](Self::world_to_grid)
    pub fn grid_to_world(&self, m: &Vector2<f64>) -> Point2D {
        Point2D::new(
            (m[0] - self.config.width as f64 * 0.5) * self.config.resolution,
            (m[1] - self.config.height as f64 * 0.5) * self.config.resolution,
        )
    }

    /// Cell nearest to a world point (may be out of bounds)
    pub fn cell_of(&self, p: &Point2D) -> GridIndex {
        let m = self.world_to_grid(p);
        GridIndex::new(m[0].round() as i32, m[1].round() as i32)
    }

    pub fn contains(&self, cell: GridIndex) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && (cell.x as usize) < self.config.width
            && (cell.y as usize) < self.config.height
    }

    fn offset(&self, cell: GridIndex) -> Option<usize> {
        if self.contains(cell) {
            Some(cell.y as usize * self.config.width + cell.x as usize)
        } else {
            None
        }
    }

    /// Cell value, `None` when out of bounds
    pub fn get(&self, cell: GridIndex) -> Option<i8> {
        self.offset(cell).map(|i| self.data[i])
    }

    /// Cell value for an index already known to be in bounds
    pub(crate) fn value(&self, ix: usize, iy: usize) -> i8 {
        self.data[iy * self.config.width + ix]
    }

    /// Write a cell; out-of-bounds writes are dropped. Returns whether the
    /// write landed.
    pub(crate) fn set(&mut self, cell: GridIndex, value: i8) -> bool {
        debug_assert!((UNKNOWN_CELL..=MAX_CELL_VALUE).contains(&value));
        match self.offset(cell) {
            Some(i) => {
                self.data[i] = value;
                true
            }
            None => false,
        }
    }

    /// Insert a scan observed from `pose`.
    ///
    /// For each point within `max_range`, the cells from the robot to the
    /// point are set to `ray_value`, then the disk around the point is set to
    /// `hit_value`. Points are processed in scan order and later writes win.
    pub fn update(&mut self, scan: &PointCloud, pose: &Pose2D) -> MapUpdateStats {
        let mut stats = MapUpdateStats::default();
        let origin = self.cell_of(&pose.position());
        let (ray_value, hit_value, radius) = (
            self.config.ray_value,
            self.config.hit_value,
            self.config.hit_radius,
        );

        for p in scan {
            let dist = p.norm();
            if !(dist <= self.config.max_range) {
                stats.rejected += 1;
                continue;
            }
            let hit = self.cell_of(&pose.transform_point(p));
            for cell in GridLine::new(origin, hit) {
                stats.cells_written += self.set(cell, ray_value) as usize;
            }
            for cell in disk(hit, radius) {
                stats.cells_written += self.set(cell, hit_value) as usize;
            }
            stats.rays += 1;
        }

        self.update_count += 1;
        stats
    }

    /// Row-major cells (`data[iy * width + ix]`)
    pub fn data(&self) -> &[i8] {
        &self.data
    }

    /// Flat view of the grid plus its metadata
    pub fn view(&self) -> GridView<'_> {
        GridView {
            info: self.info(),
            data: &self.data,
        }
    }

    /// Smallest cell rectangle containing every known cell, inclusive
    pub fn known_bounds(&self) -> Option<(GridIndex, GridIndex)> {
        let width = self.config.width;
        let mut bounds: Option<(GridIndex, GridIndex)> = None;
        for (i, _) in self.data.iter().enumerate().filter(|&(_, &v)| v != UNKNOWN_CELL) {
            let c = GridIndex::new((i % width) as i32, (i / width) as i32);
            bounds = Some(match bounds {
                None => (c, c),
                Some((lo, hi)) => (
                    GridIndex::new(lo.x.min(c.x), lo.y.min(c.y)),
                    GridIndex::new(hi.x.max(c.x), hi.y.max(c.y)),
                ),
            });
        }
        bounds
    }
}
