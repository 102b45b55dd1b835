//! Utility modules for slam2d

pub mod simulation;
pub mod visualization;

pub use simulation::{Room, ScanSimulator, ScanSimulatorConfig, Wall};
pub use visualization::{colors, MapImage, MapVisualizer};
