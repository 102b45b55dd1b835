// 2D laser SLAM on a simulated room
//
// usage: slam2d_sim [config.toml]

use std::f64::consts::PI;
use std::path::Path;

use env_logger::{Builder, Env};
use log::info;

use slam2d::utils::{Room, ScanSimulator, ScanSimulatorConfig, Wall};
use slam2d::{CycleOutcome, Point2D, Pose2D, Slam2D, Slam2DConfig, SlamResult};

const STEPS: usize = 400;
const DT: f64 = 0.1;

/// Rounded-rectangle loop through the room
fn ground_truth(step: usize) -> Pose2D {
    let s = step as f64 / STEPS as f64 * 2.0 * PI;
    let (x, y) = (3.0 * s.cos(), 1.5 * s.sin());
    let heading = (1.5 * s.cos()).atan2(-3.0 * s.sin());
    Pose2D::new(heading, x, y)
}

fn main() -> SlamResult<()> {
    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = match std::env::args().nth(1) {
        Some(path) => Slam2DConfig::load(Path::new(&path))?,
        None => Slam2DConfig::default(),
    };
    info!("2D laser SLAM simulation start!");

    let room = Room::rectangle(10.0, 6.0)
        .with_wall(Wall::new(Point2D::new(-0.5, -0.3), Point2D::new(0.5, -0.3)))
        .with_wall(Wall::new(Point2D::new(0.5, -0.3), Point2D::new(0.5, 0.4)));
    let mut simulator = ScanSimulator::new(
        room,
        ScanSimulatorConfig {
            range_noise: 0.005,
            seed: 42,
            ..Default::default()
        },
    )?;

    // Scans are reported in the frame of the first pose.
    let start = ground_truth(0);
    let mut slam = Slam2D::new(config)?;

    for step in 0..=STEPS {
        let truth = ground_truth(step);
        let scan = simulator.scan(&truth, step as f64 * DT);
        let outcome = slam.process_scan(&scan);

        let relative = start.inverse().compose(&truth);
        if let Some(vis) = slam.visualizer_mut() {
            vis.push_ground_truth(relative);
        }
        if let CycleOutcome::Registered { pose, .. } = outcome {
            if step % 50 == 0 {
                let err = (pose.t - relative.t).norm();
                info!(
                    "step {:3}: estimate ({:6.3}, {:6.3}, {:6.3}) truth ({:6.3}, {:6.3}, {:6.3}) error {:.3}",
                    step,
                    pose.x(),
                    pose.y(),
                    pose.normalized().theta,
                    relative.x(),
                    relative.y(),
                    relative.normalized().theta,
                    err
                );
            }
        }
    }

    let final_truth = start.inverse().compose(&ground_truth(STEPS));
    info!(
        "done after {} cycles, final position error {:.3}",
        slam.cycle_count(),
        (slam.pose().t - final_truth.t).norm()
    );

    if slam.config().visualize {
        std::fs::create_dir_all("img/slam")?;
        slam.save_map_png("img/slam/slam2d.png", 800, 600)?;
        info!("Plot saved to img/slam/slam2d.png");
    }
    Ok(())
}
