//! Current / previous scan pair with a one-step lag

use crate::common::PointCloud;

#[derive(Debug, Clone, Default)]
pub struct ScanBuffer {
    current: PointCloud,
    previous: PointCloud,
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current scan wholesale
    pub fn set_current(&mut self, scan: PointCloud) {
        self.current = scan;
    }

    pub fn current(&self) -> &PointCloud {
        &self.current
    }

    pub fn previous(&self) -> &PointCloud {
        &self.previous
    }

    /// Both scans are non-empty, so a registration can run
    pub fn has_pair(&self) -> bool {
        !self.current.is_empty() && !self.previous.is_empty()
    }

    /// End of cycle: the current scan becomes the previous one.
    ///
    /// An empty current scan leaves the previous scan in place.
    pub fn rotate(&mut self) {
        if !self.current.is_empty() {
            self.previous = self.current.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Point2D;

    fn cloud(x: f64) -> PointCloud {
        PointCloud::from_points(vec![Point2D::new(x, 0.0)])
    }

    #[test]
    fn test_rotate_lags_by_one() {
        let mut buffer = ScanBuffer::new();
        assert!(!buffer.has_pair());

        buffer.set_current(cloud(1.0));
        assert!(!buffer.has_pair());
        buffer.rotate();

        buffer.set_current(cloud(2.0));
        assert!(buffer.has_pair());
        assert_eq!(buffer.previous(), &cloud(1.0));
        buffer.rotate();
        assert_eq!(buffer.previous(), &cloud(2.0));
    }

    #[test]
    fn test_empty_scan_does_not_replace_previous() {
        let mut buffer = ScanBuffer::new();
        buffer.set_current(cloud(1.0));
        buffer.rotate();
        buffer.set_current(PointCloud::new());
        assert!(!buffer.has_pair());
        buffer.rotate();
        assert_eq!(buffer.previous(), &cloud(1.0));
    }
}
