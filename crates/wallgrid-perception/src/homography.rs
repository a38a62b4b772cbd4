//! Planar homography between the calibration quad and the unit square.
//!
//! The forward transform `H` takes the four corners (top-left, top-right,
//! bottom-right, bottom-left, in pixel space) to `(0,0)`, `(1,0)`, `(1,1)`,
//! `(0,1)`.  The inverse `Hinv` is solved directly from the swapped point
//! sets rather than by inverting `H`, so both directions carry the same
//! numerical quality.
//!
//! # Example
//!
//! ```rust
//! use wallgrid_perception::homography::TransformPair;
//! use wallgrid_types::Point2;
//!
//! let corners = [
//!     Point2::new(100.0, 100.0),
//!     Point2::new(500.0, 120.0),
//!     Point2::new(480.0, 400.0),
//!     Point2::new(120.0, 380.0),
//! ];
//! let pair = TransformPair::compute(&corners).unwrap();
//! let unit = pair.forward.warp(corners[2]).unwrap();
//! assert!((unit.x - 1.0).abs() < 1e-9 && (unit.y - 1.0).abs() < 1e-9);
//! ```

use wallgrid_types::{Point2, WallGridError};

/// Unit-square corners in calibration order.
pub const UNIT_SQUARE: [Point2; 4] = [
    Point2 { x: 0.0, y: 0.0 },
    Point2 { x: 1.0, y: 0.0 },
    Point2 { x: 1.0, y: 1.0 },
    Point2 { x: 0.0, y: 1.0 },
];

/// Relative tolerance for coincident / collinear corner detection.
const GEOMETRY_EPS: f64 = 1e-9;

/// Pivot magnitude below which the DLT system is treated as singular.
const PIVOT_EPS: f64 = 1e-12;

/// Homogeneous weights closer to zero than this map to infinity.
const W_EPS: f64 = 1e-12;

// ────────────────────────────────────────────────────────────────────────────
// Homography
// ────────────────────────────────────────────────────────────────────────────

/// A 3×3 projective transform, normalized so that `m[2][2] == 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Homography {
    m: [[f64; 3]; 3],
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
        }
    }

    /// Row-major matrix entries.
    pub fn matrix(&self) -> [[f64; 3]; 3] {
        self.m
    }

    /// Solve for the unique homography taking `src[i]` to `dst[i]`.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::DegenerateConfiguration`] when either quad
    /// has coincident corners, three collinear corners, is concave or
    /// self-intersecting, or when the linear system is singular.
    pub fn from_correspondences(
        src: &[Point2; 4],
        dst: &[Point2; 4],
    ) -> Result<Self, WallGridError> {
        validate_quad(src)?;
        validate_quad(dst)?;

        // Two equations per correspondence (x,y) → (u,v), with h33 = 1:
        //   h11 x + h12 y + h13 − u h31 x − u h32 y = u
        //   h21 x + h22 y + h23 − v h31 x − v h32 y = v
        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];
        for i in 0..4 {
            let Point2 { x, y } = src[i];
            let Point2 { x: u, y: v } = dst[i];
            a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y];
            b[2 * i] = u;
            a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y];
            b[2 * i + 1] = v;
        }

        let h = solve_8x8(a, b)?;
        if h.iter().any(|v| !v.is_finite()) {
            return Err(WallGridError::DegenerateConfiguration(
                "homography has non-finite coefficients".to_string(),
            ));
        }

        Ok(Self {
            m: [[h[0], h[1], h[2]], [h[3], h[4], h[5]], [h[6], h[7], 1.0]],
        })
    }

    /// Apply the transform to `p`, including the perspective divide.
    ///
    /// Returns `None` when `p` lies on (or numerically next to) the line the
    /// transform sends to infinity.
    pub fn warp(&self, p: Point2) -> Option<Point2> {
        let m = &self.m;
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w.abs() < W_EPS {
            return None;
        }
        let out = Point2::new(
            (m[0][0] * p.x + m[0][1] * p.y + m[0][2]) / w,
            (m[1][0] * p.x + m[1][1] * p.y + m[1][2]) / w,
        );
        out.is_finite().then_some(out)
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TransformPair
// ────────────────────────────────────────────────────────────────────────────

/// Forward (pixel → unit square) and inverse (unit square → pixel)
/// homographies for one corner set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPair {
    pub forward: Homography,
    pub inverse: Homography,
}

impl TransformPair {
    /// Compute both directions for `corners` (TL, TR, BR, BL).
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::DegenerateConfiguration`] for corner sets that
    /// admit no valid projective solution.  Callers keep their previous pair.
    pub fn compute(corners: &[Point2; 4]) -> Result<Self, WallGridError> {
        let forward = Homography::from_correspondences(corners, &UNIT_SQUARE)?;
        let inverse = Homography::from_correspondences(&UNIT_SQUARE, corners)?;
        Ok(Self { forward, inverse })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Internal helpers
// ────────────────────────────────────────────────────────────────────────────

fn cross(o: Point2, a: Point2, b: Point2) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// Reject quads with no valid projective mapping to a square.
fn validate_quad(q: &[Point2; 4]) -> Result<(), WallGridError> {
    if q.iter().any(|p| !p.is_finite()) {
        return Err(WallGridError::DegenerateConfiguration(
            "corner has non-finite coordinates".to_string(),
        ));
    }

    let mut scale = 0.0f64;
    for i in 0..4 {
        for j in (i + 1)..4 {
            scale = scale.max(q[i].distance(q[j]));
        }
    }
    if scale == 0.0 {
        return Err(WallGridError::DegenerateConfiguration(
            "all corners coincide".to_string(),
        ));
    }

    for i in 0..4 {
        for j in (i + 1)..4 {
            if q[i].distance(q[j]) <= GEOMETRY_EPS * scale {
                return Err(WallGridError::DegenerateConfiguration(format!(
                    "corners {i} and {j} coincide"
                )));
            }
        }
    }

    let area_eps = GEOMETRY_EPS * scale * scale;
    for skip in 0..4 {
        let t: Vec<Point2> = (0..4).filter(|&k| k != skip).map(|k| q[k]).collect();
        if cross(t[0], t[1], t[2]).abs() <= area_eps {
            return Err(WallGridError::DegenerateConfiguration(format!(
                "three corners are collinear (all but corner {skip})"
            )));
        }
    }

    // Every turn must bend the same way; otherwise the quad is concave or
    // self-intersecting.  Either winding is accepted.
    let turns: Vec<f64> = (0..4)
        .map(|i| cross(q[i], q[(i + 1) % 4], q[(i + 2) % 4]))
        .collect();
    let all_left = turns.iter().all(|&t| t > 0.0);
    let all_right = turns.iter().all(|&t| t < 0.0);
    if !(all_left || all_right) {
        return Err(WallGridError::DegenerateConfiguration(
            "corner quad is concave or self-intersecting".to_string(),
        ));
    }

    Ok(())
}

/// Gaussian elimination with partial pivoting.
fn solve_8x8(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Result<[f64; 8], WallGridError> {
    const N: usize = 8;

    for col in 0..N {
        let pivot_row = (col..N)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if pivot_row != col {
            a.swap(col, pivot_row);
            b.swap(col, pivot_row);
        }

        let pivot = a[col][col];
        if pivot.abs() < PIVOT_EPS {
            return Err(WallGridError::DegenerateConfiguration(
                "singular correspondence system".to_string(),
            ));
        }

        for row in (col + 1)..N {
            let factor = a[row][col] / pivot;
            if factor == 0.0 {
                continue;
            }
            for k in col..N {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; N];
    for i in (0..N).rev() {
        let mut sum = b[i];
        for j in (i + 1)..N {
            sum -= a[i][j] * x[j];
        }
        x[i] = sum / a[i][i];
    }
    Ok(x)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
