//! Grid rasterization primitives for map updates.
//!
//! - [`GridLine`]: 4-connected line traversal between two cells. Every step
//!   moves along exactly one axis, so consecutive cells always share an edge
//!   and a ray from `(0,0)` to `(dx,dy)` visits `|dx| + |dy| + 1` cells.
//! - [`disk`]: filled disk of cells around a center.
//!
//! ```text
//! From (0,0) to (4,2), 4-connected:
//!
//!     2 │        ●●
//!     1 │   ●●●●
//!     0 ●●●
//!       └──────────
//!        0 1 2 3 4
//! ```
//!
//! Neither primitive knows about grid bounds; callers drop cells that fall
//! outside the grid.

use crate::common::GridIndex;

/// 4-connected line iterator from `start` to `end`, both inclusive.
#[derive(Debug, Clone)]
pub struct GridLine {
    x: i32,
    y: i32,
    dx: i32,
    dy: i32,
    sx: i32,
    sy: i32,
    error: i32,
    remaining: u32,
}

impl GridLine {
    pub fn new(start: GridIndex, end: GridIndex) -> Self {
        let dx = (end.x - start.x).abs();
        let dy = (end.y - start.y).abs();
        Self {
            x: start.x,
            y: start.y,
            dx,
            dy,
            sx: if end.x >= start.x { 1 } else { -1 },
            sy: if end.y >= start.y { 1 } else { -1 },
            error: 0,
            remaining: (dx + dy + 1) as u32,
        }
    }
}

impl Iterator for GridLine {
    type Item = GridIndex;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let cell = GridIndex::new(self.x, self.y);

        // Take whichever single-axis step keeps the accumulated error smaller.
        let step_x = self.error + self.dy;
        let step_y = self.error - self.dx;
        if step_x.abs() < step_y.abs() {
            self.x += self.sx;
            self.error = step_x;
        } else {
            self.y += self.sy;
            self.error = step_y;
        }
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for GridLine {}

/// Cells of a filled disk: all `c` with `|c - center|² <= radius²`.
///
/// A radius of zero yields only the center.
pub fn disk(center: GridIndex, radius: i32) -> impl Iterator<Item = GridIndex> {
    let r = radius.max(0);
    (-r..=r).flat_map(move |dy| {
        (-r..=r)
            .filter(move |dx| dx * dx + dy * dy <= r * r)
            .map(move |dx| GridIndex::new(center.x + dx, center.y + dy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(x0: i32, y0: i32, x1: i32, y1: i32) -> Vec<GridIndex> {
        GridLine::new(GridIndex::new(x0, y0), GridIndex::new(x1, y1)).collect()
    }

    #[test]
    fn test_horizontal_line() {
        let cells = line(0, 0, 4, 0);
        assert_eq!(cells.len(), 5);
        for (i, c) in cells.iter().enumerate() {
            assert_eq!(*c, GridIndex::new(i as i32, 0));
        }
    }

    #[test]
    fn test_vertical_line_negative_direction() {
        let cells = line(3, 2, 3, -2);
        assert_eq!(cells.len(), 5);
        assert_eq!(cells[0], GridIndex::new(3, 2));
        assert_eq!(cells[4], GridIndex::new(3, -2));
        assert!(cells.iter().all(|c| c.x == 3));
    }

    #[test]
    fn test_single_cell_line() {
        assert_eq!(line(7, 7, 7, 7), vec![GridIndex::new(7, 7)]);
    }

    #[test]
    fn test_line_is_four_connected_and_reaches_end() {
        for &(x1, y1) in &[(7, 3), (-5, 9), (2, -11), (-6, -6), (13, 1)] {
            let cells = line(0, 0, x1, y1);
            assert_eq!(cells.len() as i32, x1.abs() + y1.abs() + 1);
            assert_eq!(*cells.first().unwrap(), GridIndex::new(0, 0));
            assert_eq!(*cells.last().unwrap(), GridIndex::new(x1, y1));
            for w in cells.windows(2) {
                let step = (w[1].x - w[0].x).abs() + (w[1].y - w[0].y).abs();
                assert_eq!(step, 1, "cells {:?} -> {:?} are not edge neighbours", w[0], w[1]);
            }
        }
    }

    #[test]
    fn test_disk_radius_one() {
        let mut cells: Vec<_> = disk(GridIndex::new(10, 10), 1).collect();
        cells.sort_by_key(|c| (c.y, c.x));
        assert_eq!(
            cells,
            vec![
                GridIndex::new(10, 9),
                GridIndex::new(9, 10),
                GridIndex::new(10, 10),
                GridIndex::new(11, 10),
                GridIndex::new(10, 11),
            ]
        );
    }

    #[test]
    fn test_disk_radius_zero_is_center() {
        let cells: Vec<_> = disk(GridIndex::new(-1, 4), 0).collect();
        assert_eq!(cells, vec![GridIndex::new(-1, 4)]);
    }
}
