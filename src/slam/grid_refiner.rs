//! Scan-to-map pose refinement on the occupancy grid
//!
//! Each scan point is transformed by a candidate pose, bilinearly sampled
//! from the grid and compared against a target cell value. One Gauss-Newton
//! step on those residuals gives a pose correction:
//!
//! ```text
//! r_i(x) = target - bilinear(grid, world_to_grid(R(θ)·p_i + t))
//! (JᵀJ)·Δx = Jᵀr,   x ← x - Δx
//! ```
//!
//! Points whose grid coordinate leaves `(0, width-1] × (0, height-1]`
//! contribute a zero residual. The Jacobian comes from a
//! [`JacobianProvider`]; central differences by default.

use nalgebra::{DMatrix, DVector, Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::common::{
    rotation, CentralDifference, JacobianProvider, PointCloud, Pose2D, ResidualModel, SlamError,
    SlamResult,
};
use crate::mapping::{OccupancyGrid, MAX_CELL_VALUE};
use crate::slam::pose_integrator::apply_correction;

/// How the refiner differentiates its residuals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JacobianKind {
    CentralDifference,
    BilinearGradient,
}

/// Configuration for the grid refiner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefinerConfig {
    /// Central difference step for every pose parameter
    pub jacobian_step: f64,
    /// Cell value the scan points are pulled towards
    pub target_value: f64,
    /// Smallest accepted ratio of Cholesky pivots
    pub singular_threshold: f64,
    pub jacobian: JacobianKind,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            jacobian_step: 1e-2,
            target_value: MAX_CELL_VALUE as f64,
            singular_threshold: 1e-12,
            jacobian: JacobianKind::CentralDifference,
        }
    }
}

impl RefinerConfig {
    pub fn validate(&self) -> SlamResult<()> {
        if !(self.jacobian_step > 0.0) {
            return Err(SlamError::InvalidParameter(format!(
                "jacobian_step must be positive, got {}",
                self.jacobian_step
            )));
        }
        if !(self.singular_threshold >= 0.0) {
            return Err(SlamError::InvalidParameter(format!(
                "singular_threshold must be non-negative, got {}",
                self.singular_threshold
            )));
        }
        Ok(())
    }
}

/// Bilinear sample location: lower cell and fractional offsets
struct Sample {
    x1: usize,
    y1: usize,
    fx: f64,
    fy: f64,
}

/// Residuals of a scan against the grid, parameterised by `(theta, x, y)`
pub struct ScanMapResidual<'a> {
    grid: &'a OccupancyGrid,
    scan: &'a PointCloud,
    target: f64,
}

impl<'a> ScanMapResidual<'a> {
    pub fn new(grid: &'a OccupancyGrid, scan: &'a PointCloud, target: f64) -> Self {
        Self { grid, scan, target }
    }

    fn grid_coordinates(&self, pose: &Vector3<f64>) -> impl Iterator<Item = Vector2<f64>> + '_ {
        let r = rotation(pose[0]);
        let t = Vector2::new(pose[1], pose[2]);
        let grid = self.grid;
        self.scan.iter().map(move |p| {
            let mut g = (r * p.to_vector() + t) / grid.resolution();
            g[0] += grid.width() as f64 * 0.5;
            g[1] += grid.height() as f64 * 0.5;
            g
        })
    }

    /// Enclosing cells of `g`, or `None` if any of the four would be off-grid
    fn sample(&self, g: &Vector2<f64>) -> Option<Sample> {
        let max_x = (self.grid.width() - 1) as f64;
        let max_y = (self.grid.height() - 1) as f64;
        if !(g[0] > 0.0 && g[0] <= max_x && g[1] > 0.0 && g[1] <= max_y) {
            return None;
        }
        let x2 = g[0].ceil();
        let y2 = g[1].ceil();
        Some(Sample {
            x1: x2 as usize - 1,
            y1: y2 as usize - 1,
            fx: g[0] - (x2 - 1.0),
            fy: g[1] - (y2 - 1.0),
        })
    }

    /// The four corner values `(p11, p12, p21, p22)`; first index is y
    fn corners(&self, s: &Sample) -> (f64, f64, f64, f64) {
        (
            self.grid.value(s.x1, s.y1) as f64,
            self.grid.value(s.x1 + 1, s.y1) as f64,
            self.grid.value(s.x1, s.y1 + 1) as f64,
            self.grid.value(s.x1 + 1, s.y1 + 1) as f64,
        )
    }

    fn interpolate(&self, s: &Sample) -> f64 {
        let (p11, p12, p21, p22) = self.corners(s);
        let lower = (1.0 - s.fx) * p11 + s.fx * p12;
        let upper = (1.0 - s.fx) * p21 + s.fx * p22;
        (1.0 - s.fy) * lower + s.fy * upper
    }

    /// Gradient of the interpolated value with respect to grid coordinates
    fn interpolation_gradient(&self, s: &Sample) -> Vector2<f64> {
        let (p11, p12, p21, p22) = self.corners(s);
        Vector2::new(
            (1.0 - s.fy) * (p12 - p11) + s.fy * (p22 - p21),
            (1.0 - s.fx) * (p21 - p11) + s.fx * (p22 - p12),
        )
    }
}

impl ResidualModel for ScanMapResidual<'_> {
    fn residual_count(&self) -> usize {
        self.scan.len()
    }

    fn residuals(&self, pose: &Vector3<f64>) -> DVector<f64> {
        DVector::from_iterator(
            self.scan.len(),
            self.grid_coordinates(pose).map(|g| match self.sample(&g) {
                Some(s) => self.target - self.interpolate(&s),
                None => 0.0,
            }),
        )
    }
}

/// Analytic Jacobian: bilinear grid gradient chained through the transform
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BilinearGradient;

impl<'a> JacobianProvider<ScanMapResidual<'a>> for BilinearGradient {
    fn jacobian(&self, model: &ScanMapResidual<'a>, pose: &Vector3<f64>) -> DMatrix<f64> {
        let (s, c) = pose[0].sin_cos();
        let inv_res = 1.0 / model.grid.resolution();
        let mut j = DMatrix::zeros(model.residual_count(), 3);
        for (i, (p, g)) in model.scan.iter().zip(model.grid_coordinates(pose)).enumerate() {
            let Some(sample) = model.sample(&g) else {
                continue;
            };
            // dr/dg = -dv/dg
            let dg = -model.interpolation_gradient(&sample) * inv_res;
            let dtheta = Vector2::new(-s * p.x - c * p.y, c * p.x - s * p.y);
            j[(i, 0)] = dg.dot(&dtheta);
            j[(i, 1)] = dg[0];
            j[(i, 2)] = dg[1];
        }
        j
    }
}

/// Result of one refinement step
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementOutcome {
    Step {
        /// Solved `Δx` in `(theta, x, y)` order
        delta: Vector3<f64>,
        /// `pose - Δx`
        corrected: Pose2D,
        /// Residual norm at the input pose
        residual_norm: f64,
    },
    /// The normal equations were singular; the pose stays as is
    NoUpdate,
}

/// Gauss-Newton pose refinement against an occupancy grid
#[derive(Debug, Clone, Default)]
pub struct GridRefiner {
    config: RefinerConfig,
}

impl GridRefiner {
    /// Create a new refiner
    pub fn new(config: RefinerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RefinerConfig {
        &self.config
    }

    /// One Gauss-Newton step using the configured Jacobian
    pub fn solve(&self, grid: &OccupancyGrid, scan: &PointCloud, pose: &Pose2D) -> RefinementOutcome {
        match self.config.jacobian {
            JacobianKind::CentralDifference => {
                self.solve_with(grid, scan, pose, &CentralDifference::new(self.config.jacobian_step))
            }
            JacobianKind::BilinearGradient => self.solve_with(grid, scan, pose, &BilinearGradient),
        }
    }

    /// One Gauss-Newton step with an explicit Jacobian provider
    pub fn solve_with<'a, J>(
        &self,
        grid: &'a OccupancyGrid,
        scan: &'a PointCloud,
        pose: &Pose2D,
        provider: &J,
    ) -> RefinementOutcome
    where
        J: JacobianProvider<ScanMapResidual<'a>>,
    {
        let model = ScanMapResidual::new(grid, scan, self.config.target_value);
        let x = pose.to_vector();
        let r = model.residuals(&x);
        let j = provider.jacobian(&model, &x);

        let jtj: Matrix3<f64> = (j.transpose() * &j).fixed_view::<3, 3>(0, 0).into_owned();
        let jtr: Vector3<f64> = (j.transpose() * &r).fixed_rows::<3>(0).into_owned();

        let Some(chol) = jtj.cholesky() else {
            log::debug!("grid refiner: normal equations not positive definite");
            return RefinementOutcome::NoUpdate;
        };
        let pivots = chol.l_dirty().diagonal().map(|d| d * d);
        let ratio = pivots.min() / pivots.max();
        if !(ratio >= self.config.singular_threshold) {
            log::debug!("grid refiner: near-singular system, pivot ratio {:e}", ratio);
            return RefinementOutcome::NoUpdate;
        }
        let delta = chol.solve(&jtr);
        if !delta.iter().all(|v| v.is_finite()) {
            return RefinementOutcome::NoUpdate;
        }

        RefinementOutcome::Step {
            delta,
            corrected: apply_correction(pose, &delta),
            residual_norm: r.norm(),
        }
    }

    /// Iterate [`solve`](Self::solve) up to `max_iterations` times, stopping at
    /// the first step without an update. Returns the final pose and the
    /// number of steps applied.
    pub fn refine(
        &self,
        grid: &OccupancyGrid,
        scan: &PointCloud,
        pose: &Pose2D,
        max_iterations: usize,
    ) -> (Pose2D, usize) {
        let mut current = *pose;
        for step in 0..max_iterations {
            match self.solve(grid, scan, &current) {
                RefinementOutcome::Step { corrected, .. } => current = corrected,
                RefinementOutcome::NoUpdate => return (current, step),
            }
        }
        (current, max_iterations)
    }
}
