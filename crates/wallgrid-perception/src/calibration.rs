//! Calibration surface: the four wall corners and the transform derived from
//! them.
//!
//! Corners change from two sources, selected by [`CalibrationMode`]:
//! a person dragging them on screen (`Manual`), or a fiducial-marker
//! tracker reporting one marker per corner (`Markers`).  The surface
//! recomputes the [`TransformPair`] only after a corner moved and keeps the
//! last good pair when a new corner set is degenerate, so the renderer can
//! keep drawing while the mapper skips the frame.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wallgrid_types::{LimbSample, Point2, WallGridError};

use crate::homography::TransformPair;

pub const TOP_LEFT: usize = 0;
pub const TOP_RIGHT: usize = 1;
pub const BOTTOM_RIGHT: usize = 2;
pub const BOTTOM_LEFT: usize = 3;

/// Distance in pixels between the default corners and the frame edges.
pub const DEFAULT_CORNER_INSET: f64 = 200.0;

// ────────────────────────────────────────────────────────────────────────────
// FrameGeometry
// ────────────────────────────────────────────────────────────────────────────

/// Pixel dimensions of the camera frame and whether the displayed image is
/// mirrored horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub width: f64,
    pub height: f64,
    /// The feed is shown selfie-style, so normalized `x` is flipped.
    pub mirrored: bool,
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            mirrored: true,
        }
    }
}

impl FrameGeometry {
    /// Pixel position of a normalized landmark.
    pub fn landmark_to_pixel(&self, sample: &LimbSample) -> Point2 {
        let x = if self.mirrored { 1.0 - sample.x } else { sample.x };
        Point2::new(x * self.width, sample.y * self.height)
    }

    /// Pixel position of a marker given in normalized device coordinates
    /// (`[-1, 1]`, y up).  The horizontal axis is always mirrored to match
    /// the mirrored video feed.
    pub fn marker_to_pixel(&self, ndc: Point2) -> Point2 {
        Point2::new(
            self.width * (1.0 - (ndc.x + 1.0) / 2.0),
            self.height * (1.0 - (ndc.y + 1.0) / 2.0),
        )
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Corners
// ────────────────────────────────────────────────────────────────────────────

/// The four calibration corners in pixel space: top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners(pub [Point2; 4]);

impl Corners {
    /// An axis-aligned rectangle inset `inset` pixels from each frame edge.
    pub fn inset(width: f64, height: f64, inset: f64) -> Self {
        Self([
            Point2::new(inset, inset),
            Point2::new(width - inset, inset),
            Point2::new(width - inset, height - inset),
            Point2::new(inset, height - inset),
        ])
    }

    /// The default calibration rectangle for a frame.
    pub fn for_geometry(geometry: &FrameGeometry) -> Self {
        Self::inset(geometry.width, geometry.height, DEFAULT_CORNER_INSET)
    }

    pub fn points(&self) -> &[Point2; 4] {
        &self.0
    }
}

impl Default for Corners {
    fn default() -> Self {
        Self::for_geometry(&FrameGeometry::default())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CalibrationSurface
// ────────────────────────────────────────────────────────────────────────────

/// Which input currently owns the corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationMode {
    #[default]
    Manual,
    Markers,
}

/// Owns the corner set and caches its transform.
#[derive(Debug, Clone)]
pub struct CalibrationSurface {
    corners: Corners,
    mode: CalibrationMode,
    /// Corners changed since the last computation.
    dirty: bool,
    last_good: Option<TransformPair>,
    /// Failure for the current corner set, if it is degenerate.
    current_error: Option<WallGridError>,
}

impl CalibrationSurface {
    pub fn new(corners: Corners) -> Self {
        Self {
            corners,
            mode: CalibrationMode::Manual,
            dirty: true,
            last_good: None,
            current_error: None,
        }
    }

    pub fn corners(&self) -> &Corners {
        &self.corners
    }

    pub fn mode(&self) -> CalibrationMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: CalibrationMode) {
        self.mode = mode;
    }

    /// Move one corner from manual input.
    ///
    /// Returns `Ok(false)` without changing anything while markers own the
    /// corners.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidCornerIndex`] for `index >= 4`.
    pub fn set_corner(&mut self, index: usize, position: Point2) -> Result<bool, WallGridError> {
        if index >= 4 {
            return Err(WallGridError::InvalidCornerIndex(index));
        }
        if self.mode != CalibrationMode::Manual {
            return Ok(false);
        }
        self.move_corner(index, position);
        Ok(true)
    }

    /// Replace all four corners from manual input.
    ///
    /// Returns `false` without changing anything while markers own the
    /// corners.
    pub fn set_manual_corners(&mut self, corners: Corners) -> bool {
        if self.mode != CalibrationMode::Manual {
            return false;
        }
        self.set_corners(corners);
        true
    }

    /// Replace the whole corner set, regardless of mode.
    pub fn set_corners(&mut self, corners: Corners) {
        if corners != self.corners {
            self.corners = corners;
            self.dirty = true;
        }
    }

    /// Apply a marker-tracker observation for corner `index`.
    ///
    /// Invisible markers leave the corner where it was.  Returns whether the
    /// corner was updated.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidCornerIndex`] for `index >= 4`.
    pub fn apply_marker(
        &mut self,
        index: usize,
        ndc: Point2,
        visible: bool,
        geometry: &FrameGeometry,
    ) -> Result<bool, WallGridError> {
        if index >= 4 {
            return Err(WallGridError::InvalidCornerIndex(index));
        }
        if self.mode != CalibrationMode::Markers || !visible {
            return Ok(false);
        }
        self.move_corner(index, geometry.marker_to_pixel(ndc));
        Ok(true)
    }

    fn move_corner(&mut self, index: usize, position: Point2) {
        if self.corners.0[index] != position {
            self.corners.0[index] = position;
            self.dirty = true;
        }
    }

    /// Transform for the current corners, recomputing if they moved.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::DegenerateConfiguration`] while the current
    /// corner set is degenerate.  [`CalibrationSurface::last_good`] still
    /// holds the previous valid pair.
    pub fn refresh(&mut self) -> Result<&TransformPair, WallGridError> {
        if self.dirty {
            self.dirty = false;
            match TransformPair::compute(self.corners.points()) {
                Ok(pair) => {
                    debug!(corners = ?self.corners, "calibration transform recomputed");
                    self.last_good = Some(pair);
                    self.current_error = None;
                }
                Err(e) => {
                    warn!(error = %e, corners = ?self.corners, "keeping last good calibration");
                    self.current_error = Some(e);
                }
            }
        }

        if let Some(e) = &self.current_error {
            return Err(e.clone());
        }
        self.last_good.as_ref().ok_or_else(|| {
            WallGridError::DegenerateConfiguration("no calibration computed".to_string())
        })
    }

    /// Most recent valid transform, even if the current corners are
    /// degenerate.
    pub fn last_good(&self) -> Option<&TransformPair> {
        self.last_good.as_ref()
    }
}

impl Default for CalibrationSurface {
    fn default() -> Self {
        Self::new(Corners::default())
    }
}
