//! Accumulates incremental motions into the absolute robot pose
//!
//! A delta maps the previous scan frame into the current one, so the robot
//! moved by its inverse:
//!
//! ```text
//! dt_inv = -R(delta.theta)^T * delta.t
//! t      = t + R(theta) * dt_inv        (heading before the update)
//! theta  = theta - delta.theta
//! ```
//!
//! which is `pose ∘ delta⁻¹`. The heading is never wrapped.

use nalgebra::Vector3;

use crate::common::{DeltaPose2D, Pose2D};

/// Advance `pose` by the inverse of a scan-to-scan delta
pub fn integrate(pose: &Pose2D, delta: &DeltaPose2D) -> Pose2D {
    let dt_inv = -(delta.rotation().transpose() * delta.t);
    Pose2D {
        theta: pose.theta - delta.theta,
        t: pose.t + pose.rotation() * dt_inv,
    }
}

/// Apply a Gauss-Newton correction `dx = (theta, x, y)` as `pose - dx`
pub fn apply_correction(pose: &Pose2D, dx: &Vector3<f64>) -> Pose2D {
    Pose2D::from(pose.to_vector() - dx)
}
