//! Point-to-line scan registration
//!
//! Finds the incremental motion `(theta, tx, ty)` that maps the previous scan
//! onto the current one by minimizing robustified point-to-line distances:
//!
//! ```text
//! min  1/2 Σ ρ(r_i²),   r_i = n_i · (R(θ)·p_i + t - a_i)
//! ```
//!
//! where `n_i` is the unit normal of the line through the two nearest
//! neighbours of `p_i`, `a_i` is a point on that line and `ρ` is the Cauchy
//! loss. The problem is solved with Levenberg-Marquardt on the dense 3×3
//! normal equations, seeded at zero every call.

use std::fmt;
use std::time::Instant;

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::common::{rotation, DeltaPose2D, SlamError, SlamResult};
use crate::slam::correspondence::{Correspondence, EdgeLine};

/// Bounds applied to the diagonal of `JᵀWJ` before it scales the damping
const MIN_DIAGONAL: f64 = 1e-6;
const MAX_DIAGONAL: f64 = 1e32;

/// Configuration for the registration solver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    /// Iteration cap
    pub max_iterations: usize,
    /// Wall-clock cap in seconds, 0 disables it
    pub max_solver_time_s: f64,
    /// Cauchy loss scale
    pub cauchy_scale: f64,
    /// Stop when the relative cost decrease falls below this
    pub function_tolerance: f64,
    /// Stop when the step is this small relative to the parameters
    pub parameter_tolerance: f64,
    /// Stop when the largest gradient entry falls below this
    pub gradient_tolerance: f64,
    /// Initial Levenberg-Marquardt damping
    pub initial_damping: f64,
    /// Neighbour pairs closer than this define no line
    pub min_neighbour_separation: f64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_solver_time_s: 0.0,
            cauchy_scale: 0.5,
            function_tolerance: 1e-6,
            parameter_tolerance: 1e-8,
            gradient_tolerance: 1e-10,
            initial_damping: 1e-4,
            min_neighbour_separation: 1e-9,
        }
    }
}

impl RegistrationConfig {
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_time_limit(mut self, seconds: f64) -> Self {
        self.max_solver_time_s = seconds;
        self
    }

    pub fn validate(&self) -> SlamResult<()> {
        if !(self.cauchy_scale > 0.0) {
            return Err(SlamError::InvalidParameter(format!(
                "cauchy_scale must be positive, got {}",
                self.cauchy_scale
            )));
        }
        if !(self.initial_damping > 0.0) {
            return Err(SlamError::InvalidParameter(format!(
                "initial_damping must be positive, got {}",
                self.initial_damping
            )));
        }
        if self.max_solver_time_s < 0.0 {
            return Err(SlamError::InvalidParameter(
                "max_solver_time_s must not be negative".to_string(),
            ));
        }
        let tolerances = [
            self.function_tolerance,
            self.parameter_tolerance,
            self.gradient_tolerance,
            self.min_neighbour_separation,
        ];
        if tolerances.iter().any(|t| !(*t >= 0.0)) {
            return Err(SlamError::InvalidParameter(
                "solver tolerances must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cauchy robust loss on squared residuals `s = r²`.
///
/// `ρ(s) = c²·ln(1 + s/c²)`, weight `ρ'(s) = 1 / (1 + s/c²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CauchyLoss {
    c2: f64,
}

impl CauchyLoss {
    pub fn new(scale: f64) -> Self {
        Self { c2: scale * scale }
    }

    pub fn rho(&self, s: f64) -> f64 {
        self.c2 * (s / self.c2).ln_1p()
    }

    pub fn weight(&self, s: f64) -> f64 {
        1.0 / (1.0 + s / self.c2)
    }
}

/// Why the solver stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Converged,
    MaxIterations,
    TimeLimit,
    /// Nothing usable to fit; the delta is identity
    NoCorrespondences,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Termination::Converged => "converged",
            Termination::MaxIterations => "max iterations",
            Termination::TimeLimit => "time limit",
            Termination::NoCorrespondences => "no correspondences",
        };
        f.write_str(s)
    }
}

/// Outcome of one registration
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationSummary {
    pub delta: DeltaPose2D,
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Residuals that entered the problem
    pub residuals: usize,
    /// Correspondences dropped for coincident neighbours
    pub excluded: usize,
    pub termination: Termination,
}

impl RegistrationSummary {
    fn identity(excluded: usize) -> Self {
        Self {
            delta: DeltaPose2D::identity(),
            iterations: 0,
            initial_cost: 0.0,
            final_cost: 0.0,
            residuals: 0,
            excluded,
            termination: Termination::NoCorrespondences,
        }
    }

    pub fn has_motion_estimate(&self) -> bool {
        self.termination != Termination::NoCorrespondences
    }
}

/// One residual: a source point and the line it should land on
struct PointToLine {
    source: Vector2<f64>,
    line: EdgeLine,
}

/// Robust least-squares problem at a given parameter vector
struct Linearization {
    cost: f64,
    hessian: Matrix3<f64>,
    gradient: Vector3<f64>,
}

/// Levenberg-Marquardt solver for point-to-line registration
#[derive(Debug, Clone)]
pub struct ScanRegistration {
    config: RegistrationConfig,
    loss: CauchyLoss,
}

impl ScanRegistration {
    /// Create a new solver
    pub fn new(config: RegistrationConfig) -> Self {
        let loss = CauchyLoss::new(config.cauchy_scale);
        Self { config, loss }
    }

    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Solve for the delta that maps each correspondence's source point onto
    /// its neighbour line. Starts from zero; never fails.
    pub fn solve(&self, correspondences: &[Correspondence]) -> RegistrationSummary {
        let terms = self.build_terms(correspondences);
        let excluded = correspondences.len() - terms.len();
        if terms.is_empty() {
            return RegistrationSummary::identity(excluded);
        }

        let started = Instant::now();
        let mut x = Vector3::zeros();
        let mut current = self.linearize(&terms, &x);
        let initial_cost = current.cost;
        let mut damping = self.config.initial_damping;
        let mut iterations = 0;
        let mut termination = Termination::MaxIterations;

        while iterations < self.config.max_iterations {
            if self.config.max_solver_time_s > 0.0
                && started.elapsed().as_secs_f64() >= self.config.max_solver_time_s
            {
                termination = Termination::TimeLimit;
                break;
            }
            if current.gradient.amax() <= self.config.gradient_tolerance {
                termination = Termination::Converged;
                break;
            }
            iterations += 1;

            let mut system = current.hessian;
            for i in 0..3 {
                let d = current.hessian[(i, i)].clamp(MIN_DIAGONAL, MAX_DIAGONAL);
                system[(i, i)] += damping * d;
            }
            let step = match system.cholesky() {
                Some(chol) => chol.solve(&(-current.gradient)),
                None => {
                    damping *= 10.0;
                    continue;
                }
            };

            let tol = self.config.parameter_tolerance;
            if step.norm() <= tol * (x.norm() + tol) {
                termination = Termination::Converged;
                break;
            }

            let candidate = x + step;
            let cost = self.cost(&terms, &candidate);
            if cost.is_finite() && cost < current.cost {
                let decrease = (current.cost - cost) / current.cost;
                x = candidate;
                current = self.linearize(&terms, &x);
                damping /= 3.0;
                if decrease <= self.config.function_tolerance {
                    termination = Termination::Converged;
                    break;
                }
            } else {
                damping *= 10.0;
            }
        }

        let summary = RegistrationSummary {
            delta: DeltaPose2D::from(x),
            iterations,
            initial_cost,
            final_cost: current.cost,
            residuals: terms.len(),
            excluded,
            termination,
        };
        log::debug!(
            "registration: {} after {} iterations, cost {:.6} -> {:.6}, {} residuals ({} excluded)",
            summary.termination,
            summary.iterations,
            summary.initial_cost,
            summary.final_cost,
            summary.residuals,
            summary.excluded
        );
        summary
    }

    fn build_terms(&self, correspondences: &[Correspondence]) -> Vec<PointToLine> {
        correspondences
            .iter()
            .filter_map(|c| match c.edge_line(self.config.min_neighbour_separation) {
                Some(line) => Some(PointToLine {
                    source: c.source.to_vector(),
                    line,
                }),
                None => {
                    log::trace!("excluding correspondence with coincident neighbours at {:?}", c.first);
                    None
                }
            })
            .collect()
    }

    fn cost(&self, terms: &[PointToLine], x: &Vector3<f64>) -> f64 {
        let r = rotation(x[0]);
        let t = Vector2::new(x[1], x[2]);
        terms
            .iter()
            .map(|term| {
                let residual = term.line.signed_distance(&(r * term.source + t));
                0.5 * self.loss.rho(residual * residual)
            })
            .sum()
    }

    fn linearize(&self, terms: &[PointToLine], x: &Vector3<f64>) -> Linearization {
        let (s, c) = x[0].sin_cos();
        let r = rotation(x[0]);
        let t = Vector2::new(x[1], x[2]);

        let mut cost = 0.0;
        let mut hessian = Matrix3::zeros();
        let mut gradient = Vector3::zeros();
        for term in terms {
            let p = term.source;
            let n = term.line.normal;
            let residual = term.line.signed_distance(&(r * p + t));
            let sq = residual * residual;
            let w = self.loss.weight(sq);
            cost += 0.5 * self.loss.rho(sq);

            // d(R p)/dθ
            let dp = Vector2::new(-s * p[0] - c * p[1], c * p[0] - s * p[1]);
            let j = Vector3::new(n.dot(&dp), n[0], n[1]);
            hessian += w * j * j.transpose();
            gradient += w * residual * j;
        }
        Linearization {
            cost,
            hessian,
            gradient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Point2D, PointCloud, Pose2D};
    use crate::slam::correspondence::find_correspondences;
    use approx::assert_abs_diff_eq;

    fn column(x: f64) -> PointCloud {
        PointCloud::from_xy(&[x, x, x], &[-1.0, 0.0, 1.0])
    }

    /// Corner of two walls, dense enough to constrain all three parameters
    fn corner() -> PointCloud {
        let mut cloud = PointCloud::new();
        for i in 0..20 {
            let s = -1.0 + 0.1 * i as f64;
            cloud.push(Point2D::new(2.0, s));
            cloud.push(Point2D::new(s, 2.0));
        }
        cloud
    }

    fn solve(scan: &PointCloud, prev: &PointCloud) -> RegistrationSummary {
        let corrs = find_correspondences(scan, prev, &Pose2D::identity());
        ScanRegistration::new(RegistrationConfig::default()).solve(&corrs)
    }

    #[test]
    fn test_cauchy_loss() {
        let loss = CauchyLoss::new(0.5);
        assert_abs_diff_eq!(loss.rho(0.0), 0.0);
        assert_abs_diff_eq!(loss.weight(0.0), 1.0);
        assert_abs_diff_eq!(loss.weight(0.25), 0.5);
        assert_abs_diff_eq!(loss.rho(0.25), 0.25 * 2f64.ln(), epsilon = 1e-12);
        // Small residuals behave like plain least squares.
        assert_abs_diff_eq!(loss.rho(1e-8), 1e-8, epsilon = 1e-14);
    }

    #[test]
    fn test_static_scan_gives_identity() {
        let summary = solve(&corner(), &corner());
        assert_eq!(summary.termination, Termination::Converged);
        assert_abs_diff_eq!(summary.delta.theta, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.delta.t, Vector2::zeros(), epsilon = 1e-9);
        assert_abs_diff_eq!(summary.final_cost, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_translation_recovery() {
        let summary = solve(&column(1.1), &column(1.0));
        assert!(summary.has_motion_estimate());
        assert_eq!(summary.residuals, 3);
        assert_abs_diff_eq!(summary.delta.t[0], 0.1, epsilon = 1e-3);
        assert_abs_diff_eq!(summary.delta.t[1], 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(summary.delta.theta, 0.0, epsilon = 1e-3);
        assert!(summary.final_cost < summary.initial_cost);
    }

    #[test]
    fn test_small_rigid_motion_on_corner() {
        let truth = Pose2D::new(0.01, 0.03, -0.02);
        let prev = corner();
        let scan = prev.transformed(&truth);
        let summary = solve(&scan, &prev);
        assert_abs_diff_eq!(summary.delta.theta, truth.theta, epsilon = 2e-3);
        assert_abs_diff_eq!(summary.delta.t, truth.t, epsilon = 5e-3);
    }

    #[test]
    fn test_empty_set_is_identity() {
        let summary = ScanRegistration::new(RegistrationConfig::default()).solve(&[]);
        assert_eq!(summary.termination, Termination::NoCorrespondences);
        assert!(summary.delta.is_identity());
        assert!(!summary.has_motion_estimate());
    }

    #[test]
    fn test_coincident_neighbours_are_excluded() {
        let p = Point2D::new(1.0, 0.0);
        let degenerate = Correspondence {
            source: p,
            first: p,
            second: p,
        };
        let solver = ScanRegistration::new(RegistrationConfig::default());

        let summary = solver.solve(&[degenerate]);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.termination, Termination::NoCorrespondences);

        let mut corrs = find_correspondences(&column(1.1), &column(1.0), &Pose2D::identity());
        corrs.push(degenerate);
        let summary = solver.solve(&corrs);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.residuals, 3);
        assert_abs_diff_eq!(summary.delta.t[0], 0.1, epsilon = 1e-3);
    }

    #[test]
    fn test_outlier_is_down_weighted() {
        let mut corrs: Vec<_> = (0..20)
            .map(|i| {
                let y = -1.0 + 0.1 * i as f64;
                Correspondence {
                    source: Point2D::new(1.0, y),
                    first: Point2D::new(1.1, y),
                    second: Point2D::new(1.1, y + 0.1),
                }
            })
            .collect();
        corrs.push(Correspondence {
            source: Point2D::new(1.0, 0.0),
            first: Point2D::new(3.0, 0.0),
            second: Point2D::new(3.0, 0.1),
        });

        let summary = ScanRegistration::new(RegistrationConfig::default()).solve(&corrs);
        // Plain least squares would land near 0.19.
        assert_abs_diff_eq!(summary.delta.t[0], 0.1, epsilon = 0.02);
    }

    #[test]
    fn test_iteration_cap() {
        let solver = ScanRegistration::new(RegistrationConfig::default().with_max_iterations(0));
        let corrs = find_correspondences(&column(1.1), &column(1.0), &Pose2D::identity());
        let summary = solver.solve(&corrs);
        assert_eq!(summary.iterations, 0);
        assert_eq!(summary.termination, Termination::MaxIterations);
        assert!(summary.delta.is_identity());
    }

    #[test]
    fn test_time_limit_stops_before_first_step() {
        let solver = ScanRegistration::new(RegistrationConfig::default().with_time_limit(1e-12));
        let corrs = find_correspondences(&column(1.1), &column(1.0), &Pose2D::identity());
        let summary = solver.solve(&corrs);
        assert_eq!(summary.termination, Termination::TimeLimit);
        assert_eq!(summary.iterations, 0);
        assert!(summary.delta.is_identity());
    }

    #[test]
    fn test_invalid_config() {
        let config = RegistrationConfig {
            cauchy_scale: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(RegistrationConfig::default().validate().is_ok());
    }
}
