// Sensor message module

pub mod laser_scan;

pub use laser_scan::{EchoSelection, LaserScan, ScanRanges};
