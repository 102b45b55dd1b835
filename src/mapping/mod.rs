// Mapping module

pub mod occupancy_grid;
pub mod raster;

pub use occupancy_grid::*;
pub use raster::{disk, GridLine};
