//! `wallgrid-perception` – wall geometry.
//!
//! Rectifies the camera's oblique view of the climbing wall into a square
//! grid.
//!
//! # Modules
//!
//! - [`homography`] – [`TransformPair`][homography::TransformPair]: the
//!   projective transform from the four calibration corners to the unit
//!   square and its inverse, with degenerate-quad rejection.
//! - [`grid`] – [`GridMapper`][grid::GridMapper]: pixel point → grid cell,
//!   and grid cell → pixel polygon for highlighting.
//! - [`calibration`] – [`CalibrationSurface`][calibration::CalibrationSurface]:
//!   owns the corners, caches the last good transform, and converts
//!   normalized landmarks and marker positions into pixel space.

pub mod calibration;
pub mod grid;
pub mod homography;

pub use calibration::{
    CalibrationMode, CalibrationSurface, Corners, DEFAULT_CORNER_INSET, FrameGeometry,
};
pub use grid::{GridLines, GridMapper};
pub use homography::{Homography, TransformPair};
