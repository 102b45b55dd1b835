//! Common traits defining seams between estimators

use nalgebra::{DMatrix, DVector, Vector3};

/// A residual vector parameterised by a planar pose `(theta, x, y)`
pub trait ResidualModel {
    /// Number of residual rows, independent of the pose
    fn residual_count(&self) -> usize;

    /// Evaluate all residuals at `pose`
    fn residuals(&self, pose: &Vector3<f64>) -> DVector<f64>;
}

/// Supplies the Jacobian of a [`ResidualModel`] for a Gauss-Newton step.
///
/// The solver only sees the `n × 3` matrix, so a numerical and an analytic
/// implementation are interchangeable.
pub trait JacobianProvider<M: ResidualModel + ?Sized> {
    fn jacobian(&self, model: &M, pose: &Vector3<f64>) -> DMatrix<f64>;
}

/// Jacobian by central differences with a fixed step per parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralDifference {
    pub step: f64,
}

impl CentralDifference {
    pub fn new(step: f64) -> Self {
        Self { step }
    }
}

impl Default for CentralDifference {
    fn default() -> Self {
        Self { step: 1e-2 }
    }
}

impl<M: ResidualModel + ?Sized> JacobianProvider<M> for CentralDifference {
    fn jacobian(&self, model: &M, pose: &Vector3<f64>) -> DMatrix<f64> {
        let mut j = DMatrix::zeros(model.residual_count(), 3);
        for i in 0..3 {
            let mut forward = *pose;
            forward[i] += self.step;
            let mut backward = *pose;
            backward[i] -= self.step;
            let column = (model.residuals(&forward) - model.residuals(&backward)) / (2.0 * self.step);
            j.set_column(i, &column);
        }
        j
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    /// r = [theta^2, 2x - y]
    struct Quadratic;

    impl ResidualModel for Quadratic {
        fn residual_count(&self) -> usize {
            2
        }

        fn residuals(&self, pose: &Vector3<f64>) -> DVector<f64> {
            DVector::from_vec(vec![pose[0] * pose[0], 2.0 * pose[1] - pose[2]])
        }
    }

    #[test]
    fn test_central_difference_matches_derivative() {
        let j = CentralDifference::default().jacobian(&Quadratic, &Vector3::new(0.5, 1.0, 1.0));
        assert_eq!(j.shape(), (2, 3));
        assert_abs_diff_eq!(j[(0, 0)], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(j[(1, 1)], 2.0, epsilon = 1e-9);
        assert_abs_diff_eq!(j[(1, 2)], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(j[(0, 1)], 0.0, epsilon = 1e-12);
    }
}
