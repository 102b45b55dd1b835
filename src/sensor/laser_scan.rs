//! Range-bearing laser scan messages and their Cartesian conversion
//!
//! Single-echo and multi-echo scans share one conversion routine; the only
//! difference is how a range is picked for each bearing, which is decided by
//! an [`EchoSelection`] strategy.

use serde::{Deserialize, Serialize};

use crate::common::{Point2D, PointCloud};

/// Per-bearing range readings of one scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanRanges {
    /// One range per bearing
    Single(Vec<f32>),
    /// Several echoes per bearing, in the order reported by the sensor
    MultiEcho(Vec<Vec<f32>>),
}

impl ScanRanges {
    pub fn len(&self) -> usize {
        match self {
            ScanRanges::Single(r) => r.len(),
            ScanRanges::MultiEcho(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// How a multi-echo bearing is reduced to a single range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EchoSelection {
    /// First reported echo
    #[default]
    First,
    /// Last reported echo
    Last,
    /// Shortest finite echo
    Nearest,
}

impl EchoSelection {
    /// Pick a range from the echoes of one bearing.
    ///
    /// A bearing without echoes yields NaN so the point count still matches
    /// the bearing count.
    pub fn select(&self, echoes: &[f32]) -> f32 {
        let picked = match self {
            EchoSelection::First => echoes.first().copied(),
            EchoSelection::Last => echoes.last().copied(),
            EchoSelection::Nearest => echoes
                .iter()
                .copied()
                .filter(|r| r.is_finite())
                .fold(None, |best: Option<f32>, r| Some(best.map_or(r, |b| b.min(r)))),
        };
        picked.unwrap_or(f32::NAN)
    }
}

/// One laser scan as delivered by the ingestion side
#[derive(Debug, Clone, PartialEq)]
pub struct LaserScan {
    /// Acquisition time [s]
    pub stamp: f64,
    /// Bearing of the first range [rad]
    pub angle_min: f64,
    /// Bearing step between consecutive ranges [rad]
    pub angle_increment: f64,
    pub ranges: ScanRanges,
}

impl LaserScan {
    pub fn single_echo(stamp: f64, angle_min: f64, angle_increment: f64, ranges: Vec<f32>) -> Self {
        Self {
            stamp,
            angle_min,
            angle_increment,
            ranges: ScanRanges::Single(ranges),
        }
    }

    pub fn multi_echo(
        stamp: f64,
        angle_min: f64,
        angle_increment: f64,
        ranges: Vec<Vec<f32>>,
    ) -> Self {
        Self {
            stamp,
            angle_min,
            angle_increment,
            ranges: ScanRanges::MultiEcho(ranges),
        }
    }

    /// Bearing of the `i`-th range
    pub fn bearing(&self, i: usize) -> f64 {
        self.angle_min + i as f64 * self.angle_increment
    }

    /// Range used for bearing `i` under the given echo strategy
    fn range_at(&self, i: usize, selection: EchoSelection) -> f32 {
        match &self.ranges {
            ScanRanges::Single(r) => r[i],
            ScanRanges::MultiEcho(r) => selection.select(&r[i]),
        }
    }

    /// Convert to a Cartesian cloud in the sensor frame.
    ///
    /// Produces exactly one point per bearing, in acquisition order. Invalid
    /// ranges are passed through untouched; the engine guards against
    /// non-finite points where they would matter.
    pub fn to_point_cloud(&self, selection: EchoSelection) -> PointCloud {
        let points = (0..self.ranges.len())
            .map(|i| {
                let dist = self.range_at(i, selection) as f64;
                let theta = self.bearing(i);
                Point2D::new(dist * theta.cos(), dist * theta.sin())
            })
            .collect();
        PointCloud::from_points(points)
    }
}
