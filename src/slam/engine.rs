//! Scan-to-scan SLAM engine
//!
//! Each cycle takes the latest scan through correspondence search,
//! registration, pose integration and map insertion, in that order:
//!
//! ```text
//! LaserScan ─► ScanBuffer ─► correspondences ─► LM solve ─► integrate ─► map
//!                 ▲                                                     │
//!                 └──────────────── rotate (current → previous) ◄───────┘
//! ```
//!
//! Cycles that cannot produce a motion estimate are skipped and leave the
//! pose and the map untouched.

use crate::common::{DeltaPose2D, PointCloud, Pose2D, SlamResult};
use crate::config::Slam2DConfig;
use crate::mapping::{GridView, MapUpdateStats, OccupancyGrid};
use crate::sensor::LaserScan;
use crate::slam::correspondence::find_correspondences;
use crate::slam::grid_refiner::{GridRefiner, RefinementOutcome};
use crate::slam::pose_integrator::{apply_correction, integrate};
use crate::slam::registration::{RegistrationSummary, ScanRegistration};
use crate::slam::scan_buffer::ScanBuffer;
use crate::utils::visualization::MapVisualizer;

/// Why a cycle did not update the pose
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The current scan has no points
    EmptyScan,
    /// First scan, nothing to register against yet
    NoPreviousScan,
    /// No usable correspondence; the delta was reset to identity
    NoCorrespondences,
}

/// Result of one [`Slam2D::update`] cycle
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Registered {
        delta: DeltaPose2D,
        pose: Pose2D,
        summary: RegistrationSummary,
        map: MapUpdateStats,
    },
}

impl CycleOutcome {
    pub fn is_registered(&self) -> bool {
        matches!(self, CycleOutcome::Registered { .. })
    }
}

/// Scan with the pose it was taken from, for a pose-graph back end
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub stamp: f64,
    pub pose: Pose2D,
    /// Points in the sensor frame
    pub scan: PointCloud,
}

/// 2D laser SLAM engine
pub struct Slam2D {
    config: Slam2DConfig,
    registration: ScanRegistration,
    refiner: GridRefiner,
    timestamp: f64,
    cycle_count: u64,
    pose: Pose2D,
    delta: DeltaPose2D,
    scans: ScanBuffer,
    grid: OccupancyGrid,
    visualizer: Option<MapVisualizer>,
}

impl Slam2D {
    /// Create a new engine at the identity pose with an unknown map
    pub fn new(config: Slam2DConfig) -> SlamResult<Self> {
        config.validate()?;
        let grid = OccupancyGrid::new(config.grid.clone())?;
        let visualizer = if config.visualize {
            Some(MapVisualizer::new(config.display_pause_ms))
        } else {
            None
        };
        Ok(Self {
            registration: ScanRegistration::new(config.registration.clone()),
            refiner: GridRefiner::new(config.refiner.clone()),
            config,
            timestamp: 0.0,
            cycle_count: 0,
            pose: Pose2D::identity(),
            delta: DeltaPose2D::identity(),
            scans: ScanBuffer::new(),
            grid,
            visualizer,
        })
    }

    /// Convert a scan and make it the current one. Does not run a cycle.
    pub fn ingest_scan(&mut self, scan: &LaserScan) {
        self.timestamp = scan.stamp;
        self.scans
            .set_current(scan.to_point_cloud(self.config.echo_selection));
    }

    /// Run one cycle on the current scan
    pub fn update(&mut self) -> CycleOutcome {
        let outcome = if self.scans.current().is_empty() {
            log::debug!("cycle {}: empty scan, skipping", self.cycle_count);
            CycleOutcome::Skipped(SkipReason::EmptyScan)
        } else if !self.scans.has_pair() {
            log::info!(
                "first scan at t={:.3} with {} points",
                self.timestamp,
                self.scans.current().len()
            );
            CycleOutcome::Skipped(SkipReason::NoPreviousScan)
        } else {
            self.register()
        };

        self.scans.rotate();
        self.cycle_count += 1;
        outcome
    }

    /// Ingest a scan and run a cycle on it
    pub fn process_scan(&mut self, scan: &LaserScan) -> CycleOutcome {
        self.ingest_scan(scan);
        self.update()
    }

    fn register(&mut self) -> CycleOutcome {
        let correspondences =
            find_correspondences(self.scans.current(), self.scans.previous(), &self.delta);
        let summary = self.registration.solve(&correspondences);
        self.delta = summary.delta;
        if !summary.has_motion_estimate() {
            log::debug!("cycle {}: no correspondences", self.cycle_count);
            return CycleOutcome::Skipped(SkipReason::NoCorrespondences);
        }

        self.pose = integrate(&self.pose, &self.delta);
        let map = self.grid.update(self.scans.current(), &self.pose);
        log::debug!(
            "cycle {}: pose ({:.3}, {:.3}, {:.3}), {} rays",
            self.cycle_count,
            self.pose.x(),
            self.pose.y(),
            self.pose.theta,
            map.rays
        );
        self.render();

        CycleOutcome::Registered {
            delta: self.delta,
            pose: self.pose,
            summary,
            map,
        }
    }

    fn render(&mut self) {
        let Some(visualizer) = self.visualizer.as_mut() else {
            return;
        };
        visualizer.push_pose(self.pose);
        let view = self.grid.view();
        if let Err(e) = visualizer.render(&view, self.grid.known_bounds()) {
            log::warn!("map rendering failed: {}", e);
        }
    }

    /// One Gauss-Newton step of the current scan against the map. Does not
    /// change the pose.
    pub fn scan_map_match(&self) -> RefinementOutcome {
        self.refiner.solve(&self.grid, self.scans.current(), &self.pose)
    }

    /// Refine the pose against the map and apply the correction if the
    /// system was solvable
    pub fn refine_pose_with_map(&mut self) -> RefinementOutcome {
        let outcome = self.scan_map_match();
        if let RefinementOutcome::Step { delta, .. } = &outcome {
            self.pose = apply_correction(&self.pose, delta);
        }
        outcome
    }

    pub fn config(&self) -> &Slam2DConfig {
        &self.config
    }

    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Last solved scan-to-scan delta
    pub fn delta(&self) -> DeltaPose2D {
        self.delta
    }

    pub fn map(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn map_view(&self) -> GridView<'_> {
        self.grid.view()
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Stamp of the last ingested scan
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn current_scan(&self) -> &PointCloud {
        self.scans.current()
    }

    /// Current scan and pose, if there is a scan
    pub fn keyframe(&self) -> Option<Keyframe> {
        if self.scans.current().is_empty() {
            return None;
        }
        Some(Keyframe {
            stamp: self.timestamp,
            pose: self.pose,
            scan: self.scans.current().clone(),
        })
    }

    pub fn visualizer_mut(&mut self) -> Option<&mut MapVisualizer> {
        self.visualizer.as_mut()
    }

    /// Save the map and trajectory to PNG. No-op unless visualization is on.
    pub fn save_map_png(&mut self, path: &str, width: u32, height: u32) -> SlamResult<()> {
        let Some(visualizer) = self.visualizer.as_mut() else {
            return Ok(());
        };
        visualizer.save_png(&self.grid.view(), self.grid.known_bounds(), path, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{GridConfig, UNKNOWN_CELL};
    use crate::utils::simulation::{Room, ScanSimulator, ScanSimulatorConfig};
    use approx::assert_abs_diff_eq;

    fn small_config() -> Slam2DConfig {
        Slam2DConfig {
            grid: GridConfig {
                width: 200,
                height: 200,
                ..GridConfig::default()
            },
            ..Slam2DConfig::default()
        }
    }

    fn simulator() -> ScanSimulator {
        ScanSimulator::new(Room::rectangle(8.0, 5.0), ScanSimulatorConfig::default()).unwrap()
    }

    #[test]
    fn test_new_engine_state() {
        let slam = Slam2D::new(Slam2DConfig::default()).unwrap();
        assert_eq!(slam.cycle_count(), 0);
        assert!(slam.pose().is_identity());
        assert!(slam.delta().is_identity());
        assert!(slam.map_view().data.iter().all(|&v| v == UNKNOWN_CELL));
        assert_eq!(slam.map().info().width, 2000);
        assert!(slam.keyframe().is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = small_config();
        config.grid.resolution = 0.0;
        assert!(Slam2D::new(config).is_err());
    }

    #[test]
    fn test_first_cycle_only_buffers() {
        let mut slam = Slam2D::new(small_config()).unwrap();
        let outcome = slam.process_scan(&simulator().scan(&Pose2D::identity(), 0.5));
        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::NoPreviousScan));
        assert_eq!(slam.cycle_count(), 1);
        assert_eq!(slam.timestamp(), 0.5);
        assert!(slam.pose().is_identity());
        assert!(slam.map().known_bounds().is_none());
    }

    #[test]
    fn test_identical_scans_register_at_identity() {
        let mut slam = Slam2D::new(small_config()).unwrap();
        let scan = simulator().scan(&Pose2D::identity(), 0.0);
        slam.process_scan(&scan);
        let outcome = slam.process_scan(&scan);

        match outcome {
            CycleOutcome::Registered { delta, pose, map, .. } => {
                assert_abs_diff_eq!(delta.theta, 0.0, epsilon = 1e-6);
                assert_abs_diff_eq!(delta.t.norm(), 0.0, epsilon = 1e-6);
                assert_abs_diff_eq!(pose.t.norm(), 0.0, epsilon = 1e-6);
                assert_eq!(map.rays, 360);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert!(slam.map().known_bounds().is_some());
        assert_eq!(slam.map().update_count(), 1);
    }

    #[test]
    fn test_empty_scan_keeps_previous() {
        let mut slam = Slam2D::new(small_config()).unwrap();
        let mut sim = simulator();
        slam.process_scan(&sim.scan(&Pose2D::identity(), 0.0));

        let empty = LaserScan::single_echo(0.1, 0.0, 0.01, Vec::new());
        assert_eq!(slam.process_scan(&empty), CycleOutcome::Skipped(SkipReason::EmptyScan));
        assert!(slam.keyframe().is_none());
        assert!(slam.map().known_bounds().is_none());

        let outcome = slam.process_scan(&sim.scan(&Pose2D::new(0.0, 0.05, 0.0), 0.2));
        assert!(outcome.is_registered());
        assert_abs_diff_eq!(slam.pose().x(), 0.05, epsilon = 5e-3);
        assert_eq!(slam.cycle_count(), 3);
    }

    #[test]
    fn test_no_correspondences_resets_delta() {
        let mut slam = Slam2D::new(small_config()).unwrap();
        let single = LaserScan::single_echo(0.0, 0.0, 0.1, vec![2.0]);
        slam.process_scan(&single);
        let outcome = slam.process_scan(&single);
        assert_eq!(outcome, CycleOutcome::Skipped(SkipReason::NoCorrespondences));
        assert!(slam.delta().is_identity());
        assert!(slam.pose().is_identity());
        assert!(slam.map().known_bounds().is_none());
    }

    #[test]
    fn test_keyframe_carries_current_scan() {
        let mut slam = Slam2D::new(small_config()).unwrap();
        let scan = simulator().scan(&Pose2D::identity(), 3.0);
        slam.process_scan(&scan);
        let keyframe = slam.keyframe().unwrap();
        assert_eq!(keyframe.stamp, 3.0);
        assert_eq!(keyframe.scan.len(), 360);
        assert_eq!(&keyframe.scan, slam.current_scan());
    }

    #[test]
    fn test_refinement_on_unknown_map_does_nothing() {
        let mut slam = Slam2D::new(small_config()).unwrap();
        slam.process_scan(&simulator().scan(&Pose2D::identity(), 0.0));
        assert_eq!(slam.refine_pose_with_map(), RefinementOutcome::NoUpdate);
        assert!(slam.pose().is_identity());
    }
}
