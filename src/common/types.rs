//! Common types used throughout slam2d

use nalgebra::{Matrix2, Vector2, Vector3};
use std::f64::consts::PI;

/// 2D point representation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn distance(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Distance from the sensor origin (the measured range)
    pub fn norm(&self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn to_vector(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }

    pub fn to_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<(f64, f64)> for Point2D {
    fn from(tuple: (f64, f64)) -> Self {
        Self { x: tuple.0, y: tuple.1 }
    }
}

impl From<Vector2<f64>> for Point2D {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

impl From<[f64; 2]> for Point2D {
    fn from(a: [f64; 2]) -> Self {
        Self { x: a[0], y: a[1] }
    }
}

/// Counter-clockwise rotation matrix for `theta`
pub fn rotation(theta: f64) -> Matrix2<f64> {
    let (s, c) = theta.sin_cos();
    Matrix2::new(c, -s, s, c)
}

/// Rigid transform in the plane (SE(2)).
///
/// Applying the pose to a point rotates it by `theta` and then translates it
/// by `t`. `theta` is never wrapped; use [`Pose2D::normalized`] when a
/// canonical heading is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose2D {
    pub theta: f64,
    pub t: Vector2<f64>,
}

/// Incremental motion between two consecutive scan frames.
pub type DeltaPose2D = Pose2D;

impl Pose2D {
    pub fn new(theta: f64, x: f64, y: f64) -> Self {
        Self {
            theta,
            t: Vector2::new(x, y),
        }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn x(&self) -> f64 {
        self.t[0]
    }

    pub fn y(&self) -> f64 {
        self.t[1]
    }

    pub fn rotation(&self) -> Matrix2<f64> {
        rotation(self.theta)
    }

    pub fn position(&self) -> Point2D {
        Point2D::from(self.t)
    }

    /// Map a point from this pose's local frame into the parent frame
    pub fn transform_point(&self, p: &Point2D) -> Point2D {
        Point2D::from(self.rotation() * p.to_vector() + self.t)
    }

    /// `self ∘ other`: apply `other` first, then `self`
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        Pose2D {
            theta: self.theta + other.theta,
            t: self.rotation() * other.t + self.t,
        }
    }

    pub fn inverse(&self) -> Pose2D {
        Pose2D {
            theta: -self.theta,
            t: -(self.rotation().transpose() * self.t),
        }
    }

    /// Parameter vector in solver order `(theta, x, y)`
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.theta, self.t[0], self.t[1])
    }

    /// Copy of this pose with heading wrapped to [-pi, pi]
    pub fn normalized(&self) -> Pose2D {
        let theta = (self.theta + PI).rem_euclid(2.0 * PI) - PI;
        Pose2D { theta, t: self.t }
    }

    pub fn is_identity(&self) -> bool {
        self.theta == 0.0 && self.t == Vector2::zeros()
    }
}

impl Default for Pose2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<Vector3<f64>> for Pose2D {
    fn from(v: Vector3<f64>) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Ordered sequence of points in scan acquisition order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    pub points: Vec<Point2D>,
}

impl PointCloud {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    pub fn from_points(points: Vec<Point2D>) -> Self {
        Self { points }
    }

    pub fn from_xy(x: &[f64], y: &[f64]) -> Self {
        assert_eq!(x.len(), y.len());
        let points = x
            .iter()
            .zip(y.iter())
            .map(|(&x, &y)| Point2D::new(x, y))
            .collect();
        Self { points }
    }

    pub fn push(&mut self, point: Point2D) {
        self.points.push(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point2D> {
        self.points.iter()
    }

    /// Copy of the cloud mapped through `pose`
    pub fn transformed(&self, pose: &Pose2D) -> PointCloud {
        let r = pose.rotation();
        let points = self
            .points
            .iter()
            .map(|p| Point2D::from(r * p.to_vector() + pose.t))
            .collect();
        PointCloud { points }
    }
}

impl<'a> IntoIterator for &'a PointCloud {
    type Item = &'a Point2D;
    type IntoIter = std::slice::Iter<'a, Point2D>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

/// Grid cell index; may lie outside the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridIndex {
    pub x: i32,
    pub y: i32,
}

impl GridIndex {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_point2d_distance() {
        let p1 = Point2D::new(0.0, 0.0);
        let p2 = Point2D::new(3.0, 4.0);
        assert!((p1.distance(&p2) - 5.0).abs() < 1e-10);
        assert!((p2.norm() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_pose2d_transform_point() {
        let pose = Pose2D::new(std::f64::consts::FRAC_PI_2, 1.0, 0.0);
        let p = pose.transform_point(&Point2D::new(1.0, 0.0));
        assert_abs_diff_eq!(p.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pose2d_inverse_composes_to_identity() {
        let pose = Pose2D::new(0.7, -2.0, 3.5);
        let id = pose.compose(&pose.inverse());
        assert_abs_diff_eq!(id.theta, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(id.t[0], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(id.t[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_pose2d_compose_is_associative() {
        let a = Pose2D::new(0.3, 1.0, 2.0);
        let b = Pose2D::new(-1.1, 0.5, -0.25);
        let c = Pose2D::new(2.0, -3.0, 0.1);
        let left = a.compose(&b).compose(&c);
        let right = a.compose(&b.compose(&c));
        assert_abs_diff_eq!(left.theta, right.theta, epsilon = 1e-12);
        assert_abs_diff_eq!(left.t, right.t, epsilon = 1e-12);
    }

    #[test]
    fn test_pose2d_normalized() {
        let pose = Pose2D::new(4.0, 0.0, 0.0).normalized();
        assert!(pose.theta >= -PI && pose.theta <= PI);
        assert_abs_diff_eq!(pose.theta, 4.0 - 2.0 * PI, epsilon = 1e-12);
        assert_abs_diff_eq!(Pose2D::new(-4.0, 0.0, 0.0).normalized().theta, 2.0 * PI - 4.0, epsilon = 1e-12);

        // Headings far beyond one turn still wrap in a single step.
        let far = Pose2D::new(1e17, 1.0, 2.0).normalized();
        assert!(far.theta >= -PI && far.theta <= PI);
        assert_eq!(far.t, Vector2::new(1.0, 2.0));
    }

    #[test]
    fn test_point_cloud_transformed_keeps_order() {
        let cloud = PointCloud::from_xy(&[1.0, 2.0], &[0.0, 0.0]);
        let moved = cloud.transformed(&Pose2D::new(0.0, 0.5, -1.0));
        assert_eq!(moved.len(), 2);
        assert_eq!(moved.points[0], Point2D::new(1.5, -1.0));
        assert_eq!(moved.points[1], Point2D::new(2.5, -1.0));
    }
}
