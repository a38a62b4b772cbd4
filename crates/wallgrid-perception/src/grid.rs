//! Grid mapping between pixel space and `(row, col)` cells.
//!
//! The unit square is divided into `N × N` half-open cells.  A point whose
//! unit-square coordinate falls outside `[0, 1)` on either axis has no cell;
//! in particular `u == 1.0` or `v == 1.0` is out of bounds so that no index
//! ever reaches `N`.

use wallgrid_types::{Cell, GridSize, Point2};

use crate::homography::Homography;

/// Warped grid lines for drawing the perspective grid over the camera image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridLines {
    /// `N + 1` polylines of constant `u`, each running top to bottom.
    pub vertical: Vec<Vec<Point2>>,
    /// `N + 1` polylines of constant `v`, each running left to right.
    pub horizontal: Vec<Vec<Point2>>,
}

/// Converts between pixel points and cells for one grid resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridMapper {
    size: GridSize,
}

impl GridMapper {
    pub fn new(size: GridSize) -> Self {
        Self { size }
    }

    pub fn size(&self) -> GridSize {
        self.size
    }

    /// The cell containing `pixel`, or `None` when it lies outside the
    /// calibrated area.
    pub fn to_cell(&self, forward: &Homography, pixel: Point2) -> Option<Cell> {
        let uv = forward.warp(pixel)?;
        self.cell_at_unit(uv)
    }

    /// The cell containing unit-square point `uv`.
    pub fn cell_at_unit(&self, uv: Point2) -> Option<Cell> {
        let inside = |t: f64| (0.0..1.0).contains(&t);
        if !inside(uv.x) || !inside(uv.y) {
            return None;
        }
        let n = self.size.get();
        let nf = f64::from(n);
        // `t < 1` can still round up to `n` after scaling.
        let index = |t: f64| ((t * nf).floor() as u32).min(n - 1);
        Some(Cell::new(index(uv.y), index(uv.x)))
    }

    /// Pixel-space outline of `cell`: top-left, top-right, bottom-right,
    /// bottom-left.
    ///
    /// Returns `None` if the cell is outside the grid or a corner cannot be
    /// warped.
    pub fn cell_polygon(&self, inverse: &Homography, cell: Cell) -> Option<[Point2; 4]> {
        if !self.size.contains(cell) {
            return None;
        }
        let nf = f64::from(self.size.get());
        let (r, c) = (f64::from(cell.row), f64::from(cell.col));
        Some([
            inverse.warp(Point2::new(c / nf, r / nf))?,
            inverse.warp(Point2::new((c + 1.0) / nf, r / nf))?,
            inverse.warp(Point2::new((c + 1.0) / nf, (r + 1.0) / nf))?,
            inverse.warp(Point2::new(c / nf, (r + 1.0) / nf))?,
        ])
    }

    /// All grid lines, warped into pixel space.
    pub fn grid_lines(&self, inverse: &Homography) -> GridLines {
        let n = self.size.get();
        let nf = f64::from(n);
        let line = |fixed: u32, vertical: bool| -> Vec<Point2> {
            (0..=n)
                .filter_map(|k| {
                    let a = f64::from(fixed) / nf;
                    let b = f64::from(k) / nf;
                    let uv = if vertical { Point2::new(a, b) } else { Point2::new(b, a) };
                    inverse.warp(uv)
                })
                .collect()
        };
        GridLines {
            vertical: (0..=n).map(|i| line(i, true)).collect(),
            horizontal: (0..=n).map(|j| line(j, false)).collect(),
        }
    }
}

/// Mean of the four polygon vertices.
pub fn centroid(polygon: &[Point2; 4]) -> Point2 {
    let (sx, sy) = polygon
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2::new(sx / 4.0, sy / 4.0)
}
