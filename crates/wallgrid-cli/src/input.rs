//! Recorded input streams.
//!
//! A recording is a JSON-lines file, one [`InputEvent`] per line, holding
//! everything a live session would receive: pose frames from the estimator,
//! corner drags, marker-tracker updates and the user's grid/reset clicks.
//! Blank lines and lines starting with `#` are skipped.
//!
//! ```text
//! {"type":"corners","corners":[{"x":0,"y":0},{"x":1280,"y":0},{"x":1280,"y":720},{"x":0,"y":720}]}
//! {"type":"frame","timestamp_ms":0,"limbs":{"left_hand":{"x":0.5,"y":0.5,"visibility":0.9}}}
//! {"type":"reset"}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use wallgrid_perception::{CalibrationMode, Corners};
use wallgrid_runtime::{FrameReport, Session};
use wallgrid_types::{LimbSample, Point2, PoseFrame, WallGridError};

/// Which source owns the calibration corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CornerSource {
    Manual,
    Markers,
}

impl From<CornerSource> for CalibrationMode {
    fn from(source: CornerSource) -> Self {
        match source {
            CornerSource::Manual => CalibrationMode::Manual,
            CornerSource::Markers => CalibrationMode::Markers,
        }
    }
}

/// One line of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    /// Pose-estimator output for one camera frame.
    Frame(PoseFrame),
    /// Raw 33-point landmark array from the pose estimator; limbs are picked
    /// by landmark index for the session's limb set.  An empty array is a
    /// frame with no pose.
    Landmarks {
        timestamp_ms: u64,
        #[serde(default)]
        landmarks: Vec<LimbSample>,
    },
    /// Replace all four corners (TL, TR, BR, BL) in pixels.  Ignored while
    /// markers own the corners.
    Corners { corners: [Point2; 4] },
    /// Drag one corner, in pixels.  Ignored while markers own the corners.
    Corner { index: usize, x: f64, y: f64 },
    /// Marker-tracker observation in normalized device coordinates.
    Marker {
        index: usize,
        x: f64,
        y: f64,
        #[serde(default = "visible_by_default")]
        visible: bool,
    },
    CalibrationMode { source: CornerSource },
    GridSize { n: u32 },
    ConfidenceThreshold { threshold: f64 },
    Reset,
}

fn visible_by_default() -> bool {
    true
}

/// Parse a recording.
///
/// # Errors
///
/// Returns a message naming the first line that fails to read or parse.
pub fn parse_events(reader: impl BufRead) -> Result<Vec<InputEvent>, String> {
    let mut events = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| format!("line {}: {}", i + 1, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(trimmed).map_err(|e| format!("line {}: {}", i + 1, e))?;
        events.push(event);
    }
    Ok(events)
}

/// Read and parse a recording from disk.
pub fn load_events(path: &Path) -> Result<Vec<InputEvent>, String> {
    let file = File::open(path).map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
    parse_events(BufReader::new(file))
}

/// Pretty-printed JSON schema of [`InputEvent`].
pub fn schema_json() -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&schemars::schema_for!(InputEvent))
}

/// Apply one event to `session`.  Frames return their report.
///
/// # Errors
///
/// Returns the session's validation error for out-of-range corner indices,
/// grid sizes or thresholds; the session is unchanged in that case.
pub fn apply(session: &mut Session, event: &InputEvent) -> Result<Option<FrameReport>, WallGridError> {
    match event {
        InputEvent::Frame(frame) => return Ok(Some(session.process_frame(frame))),
        InputEvent::Landmarks {
            timestamp_ms,
            landmarks,
        } => {
            let frame = PoseFrame::from_landmarks(*timestamp_ms, landmarks, session.config().limb_set);
            return Ok(Some(session.process_frame(&frame)));
        }
        InputEvent::Corners { corners } => {
            session.set_corners(Corners(*corners));
        }
        InputEvent::Corner { index, x, y } => {
            session.set_corner(*index, Point2::new(*x, *y))?;
        }
        InputEvent::Marker {
            index,
            x,
            y,
            visible,
        } => {
            session.apply_marker(*index, Point2::new(*x, *y), *visible)?;
        }
        InputEvent::CalibrationMode { source } => session.set_calibration_mode((*source).into()),
        InputEvent::GridSize { n } => session.set_grid_size(*n)?,
        InputEvent::ConfidenceThreshold { threshold } => {
            session.set_confidence_threshold(*threshold)?
        }
        InputEvent::Reset => session.reset(),
    }
    Ok(None)
}
