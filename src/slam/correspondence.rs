//! Nearest-neighbour correspondences between consecutive scans.
//!
//! Every point of the previous scan is projected into the current frame with
//! the last motion estimate and paired with its two nearest neighbours in the
//! current scan. The two neighbours define the local edge the point should
//! land on after registration.

use nalgebra::Vector2;
use rstar::primitives::GeomWithData;
use rstar::RTree;

use crate::common::{DeltaPose2D, Point2D, PointCloud};

/// Neighbours requested per projected point
pub const NEIGHBOURS: usize = 2;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Spatial index over one scan, rebuilt every cycle
pub struct ScanIndex {
    tree: RTree<IndexedPoint>,
}

impl ScanIndex {
    /// Bulk-load an index from a scan. Non-finite points are left out.
    pub fn build(scan: &PointCloud) -> Self {
        let items = scan
            .iter()
            .enumerate()
            .filter(|(_, p)| p.x.is_finite() && p.y.is_finite())
            .map(|(i, p)| GeomWithData::new(p.to_array(), i))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indices of up to `k` nearest points, closest first
    pub fn nearest(&self, query: &Point2D, k: usize) -> Vec<usize> {
        self.tree
            .nearest_neighbor_iter(&query.to_array())
            .take(k)
            .map(|item| item.data)
            .collect()
    }
}

/// A previous-scan point and the two current-scan points nearest to its
/// projection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Point in the previous scan frame, as measured
    pub source: Point2D,
    /// Nearest current-scan point
    pub first: Point2D,
    /// Second nearest current-scan point
    pub second: Point2D,
}

impl Correspondence {
    /// Line through the two neighbours, or `None` when they are closer than
    /// `min_separation` and no direction exists.
    pub fn edge_line(&self, min_separation: f64) -> Option<EdgeLine> {
        EdgeLine::through(&self.first, &self.second, min_separation)
    }
}

/// Infinite line in Hessian form: `normal · q - normal · anchor = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeLine {
    /// Unit normal
    pub normal: Vector2<f64>,
    /// Any point on the line
    pub anchor: Vector2<f64>,
}

impl EdgeLine {
    pub fn through(a: &Point2D, b: &Point2D, min_separation: f64) -> Option<Self> {
        let d = b.to_vector() - a.to_vector();
        let len = d.norm();
        if !(len > min_separation) {
            return None;
        }
        Some(Self {
            normal: Vector2::new(-d[1], d[0]) / len,
            anchor: a.to_vector(),
        })
    }

    /// Signed perpendicular distance of `q` from the line
    pub fn signed_distance(&self, q: &Vector2<f64>) -> f64 {
        self.normal.dot(&(q - self.anchor))
    }
}

/// Pair each point of `scan_prev`, projected by `prior`, with its two nearest
/// neighbours in `scan`.
///
/// Points that cannot get two neighbours (tiny scans, non-finite points) are
/// skipped. Correspondences keep the unprojected source point; the solver
/// estimates the full motion from scratch.
pub fn find_correspondences(
    scan: &PointCloud,
    scan_prev: &PointCloud,
    prior: &DeltaPose2D,
) -> Vec<Correspondence> {
    let index = ScanIndex::build(scan);
    if index.len() < NEIGHBOURS {
        return Vec::new();
    }

    let r = prior.rotation();
    scan_prev
        .iter()
        .filter(|p| p.x.is_finite() && p.y.is_finite())
        .filter_map(|p| {
            let predicted = Point2D::from(r * p.to_vector() + prior.t);
            match index.nearest(&predicted, NEIGHBOURS).as_slice() {
                &[i, j] => Some(Correspondence {
                    source: *p,
                    first: scan.points[i],
                    second: scan.points[j],
                }),
                _ => None,
            }
        })
        .collect()
}
