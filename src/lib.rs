//! slam2d - 2D laser SLAM in Rust
//!
//! Estimates a planar pose trajectory and builds an occupancy grid from a
//! stream of range-bearing laser scans. Consecutive scans are aligned by
//! point-to-line registration; the grid can also be used to refine a pose
//! directly.

// Core modules
pub mod common;
pub mod config;
pub mod utils;

// Algorithm modules
pub mod mapping;
pub mod sensor;
pub mod slam;

// Re-export common types for convenience
pub use common::{DeltaPose2D, Point2D, PointCloud, Pose2D};
pub use common::{SlamError, SlamResult};
pub use config::Slam2DConfig;
pub use mapping::{GridView, MapInfo, OccupancyGrid};
pub use sensor::{EchoSelection, LaserScan, ScanRanges};
pub use slam::{CycleOutcome, Keyframe, RefinementOutcome, SkipReason, Slam2D};
