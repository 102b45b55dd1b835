//! Visualization utilities for slam2d
//!
//! Renders the occupancy grid as a gnuplot heatmap with the estimated
//! trajectory on top.

use std::time::Duration;

use gnuplot::{AutoOption, AxesCommon, Caption, Color, Figure, LineWidth, PointSize, PointSymbol};

use crate::common::{GridIndex, Pose2D, SlamError, SlamResult};
use crate::mapping::{GridView, UNKNOWN_CELL};

/// Color palette for consistent styling
pub mod colors {
    pub const ROBOT: &str = "#00FFFF";
    pub const ESTIMATED: &str = "#35C788";
    pub const GROUND_TRUTH: &str = "#0000FF";
}

/// Cropped heatmap data ready for gnuplot
#[derive(Debug, Clone, PartialEq)]
pub struct MapImage {
    /// Row-major values, unknown cells as NaN
    pub values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    /// World extent `(x_min, y_min, x_max, y_max)` of the cell centres
    pub extent: (f64, f64, f64, f64),
}

impl MapImage {
    /// Crop `view` to the inclusive cell rectangle `lo..=hi`
    pub fn crop(view: &GridView<'_>, lo: GridIndex, hi: GridIndex) -> Self {
        let info = view.info;
        let (x0, y0) = (lo.x.max(0) as usize, lo.y.max(0) as usize);
        let x1 = (hi.x.max(0) as usize).min(info.width - 1);
        let y1 = (hi.y.max(0) as usize).min(info.height - 1);
        let cols = (x1 + 1).saturating_sub(x0);
        let rows = (y1 + 1).saturating_sub(y0);

        let mut values = Vec::with_capacity(rows * cols);
        for iy in y0..=y1 {
            for ix in x0..=x1 {
                let v = view.data[iy * info.width + ix];
                values.push(if v == UNKNOWN_CELL { f64::NAN } else { v as f64 });
            }
        }

        let world = |i: usize, o: f64| o + i as f64 * info.resolution;
        Self {
            values,
            rows,
            cols,
            extent: (
                world(x0, info.origin.x),
                world(y0, info.origin.y),
                world(x1, info.origin.x),
                world(y1, info.origin.y),
            ),
        }
    }
}

/// Live map window
pub struct MapVisualizer {
    figure: Figure,
    pause: Duration,
    trajectory: Vec<Pose2D>,
    ground_truth: Vec<Pose2D>,
}

impl MapVisualizer {
    /// Create a new visualizer that sleeps `pause_ms` after each frame
    pub fn new(pause_ms: u64) -> Self {
        Self {
            figure: Figure::new(),
            pause: Duration::from_millis(pause_ms),
            trajectory: Vec::new(),
            ground_truth: Vec::new(),
        }
    }

    pub fn push_pose(&mut self, pose: Pose2D) {
        self.trajectory.push(pose);
    }

    pub fn push_ground_truth(&mut self, pose: Pose2D) {
        self.ground_truth.push(pose);
    }

    pub fn trajectory(&self) -> &[Pose2D] {
        &self.trajectory
    }

    fn draw(&mut self, view: &GridView<'_>, bounds: Option<(GridIndex, GridIndex)>) {
        self.figure.clear_axes();
        let axes = self.figure.axes2d();
        axes.set_title("slam2d", &[])
            .set_x_label("x [m]", &[])
            .set_y_label("y [m]", &[])
            .set_aspect_ratio(AutoOption::Fix(1.0));

        if let Some((lo, hi)) = bounds {
            let image = MapImage::crop(view, lo, hi);
            axes.image(
                image.values.iter().cloned(),
                image.rows,
                image.cols,
                Some(image.extent),
                &[Caption("Map")],
            );
        }

        let xy = |poses: &[Pose2D]| -> (Vec<f64>, Vec<f64>) {
            poses.iter().map(|p| (p.x(), p.y())).unzip()
        };
        if !self.ground_truth.is_empty() {
            let (x, y) = xy(&self.ground_truth);
            axes.lines(&x, &y, &[Caption("Ground truth"), Color(colors::GROUND_TRUTH), LineWidth(1.5)]);
        }
        if let Some(last) = self.trajectory.last() {
            let (x, y) = xy(&self.trajectory);
            axes.lines(&x, &y, &[Caption("Estimate"), Color(colors::ESTIMATED), LineWidth(2.0)])
                .points(&[last.x()], &[last.y()], &[
                    Caption("Robot"),
                    Color(colors::ROBOT),
                    PointSymbol('O'),
                    PointSize(1.5),
                ]);
        }
    }

    /// Draw the map and trajectory, then pause
    pub fn render(&mut self, view: &GridView<'_>, bounds: Option<(GridIndex, GridIndex)>) -> SlamResult<()> {
        self.draw(view, bounds);
        self.figure
            .show_and_keep_running()
            .map_err(|e| SlamError::Visualization(e.to_string()))?;
        std::thread::sleep(self.pause);
        Ok(())
    }

    /// Save the current frame to PNG
    pub fn save_png(
        &mut self,
        view: &GridView<'_>,
        bounds: Option<(GridIndex, GridIndex)>,
        path: &str,
        width: u32,
        height: u32,
    ) -> SlamResult<()> {
        self.draw(view, bounds);
        self.figure
            .save_to_png(path, width, height)
            .map_err(|e| SlamError::Visualization(e.to_string()))
    }
}
