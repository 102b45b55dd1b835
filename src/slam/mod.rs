// SLAM front end: scan registration, pose integration and map refinement

pub mod correspondence;
pub mod engine;
pub mod grid_refiner;
pub mod pose_integrator;
pub mod registration;
pub mod scan_buffer;

pub use correspondence::{find_correspondences, Correspondence, EdgeLine, ScanIndex};
pub use engine::{CycleOutcome, Keyframe, SkipReason, Slam2D};
pub use grid_refiner::{
    BilinearGradient, GridRefiner, JacobianKind, RefinementOutcome, RefinerConfig, ScanMapResidual,
};
pub use registration::{
    CauchyLoss, RegistrationConfig, RegistrationSummary, ScanRegistration, Termination,
};
pub use scan_buffer::ScanBuffer;
