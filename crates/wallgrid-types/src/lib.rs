//! `wallgrid-types` – shared vocabulary for the WallGrid crates.
//!
//! Limbs, grid cells, pose frames and completed moves, plus the
//! [`WallGridError`] enum every crate reports through.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest grid resolution the system accepts.  Row and column indices must
/// fit in one byte of the actuator snapshot, with `255` reserved as the
/// "no cell" sentinel.
pub const MAX_GRID_SIZE: u32 = 255;

/// A tracked limb.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Limb {
    LeftHand,
    RightHand,
    LeftFoot,
    RightFoot,
}

impl Limb {
    /// Index of this limb's landmark in a 33-point body pose model
    /// (wrists for hands, ankles for feet).
    pub fn pose_landmark_index(self) -> usize {
        match self {
            Limb::LeftHand => 15,
            Limb::RightHand => 16,
            Limb::LeftFoot => 27,
            Limb::RightFoot => 28,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Limb::LeftHand => "left_hand",
            Limb::RightHand => "right_hand",
            Limb::LeftFoot => "left_foot",
            Limb::RightFoot => "right_foot",
        }
    }
}

impl fmt::Display for Limb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Limb {
    type Err = WallGridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "left_hand" | "lh" => Ok(Limb::LeftHand),
            "right_hand" | "rh" => Ok(Limb::RightHand),
            "left_foot" | "lf" => Ok(Limb::LeftFoot),
            "right_foot" | "rf" => Ok(Limb::RightFoot),
            other => Err(WallGridError::UnknownLimb(other.to_string())),
        }
    }
}

/// The set of limbs a session tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LimbSet {
    /// Left and right hand only.
    Hands,
    /// Both hands and both feet.
    #[default]
    HandsAndFeet,
}

impl LimbSet {
    /// Active limbs in canonical order.  The actuator snapshot is laid out in
    /// this order.
    pub fn limbs(self) -> &'static [Limb] {
        match self {
            LimbSet::Hands => &[Limb::LeftHand, Limb::RightHand],
            LimbSet::HandsAndFeet => &[
                Limb::LeftHand,
                Limb::RightHand,
                Limb::LeftFoot,
                Limb::RightFoot,
            ],
        }
    }

    pub fn contains(self, limb: Limb) -> bool {
        self.limbs().contains(&limb)
    }
}

impl fmt::Display for LimbSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LimbSet::Hands => f.write_str("hands"),
            LimbSet::HandsAndFeet => f.write_str("hands_and_feet"),
        }
    }
}

impl FromStr for LimbSet {
    type Err = WallGridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hands" => Ok(LimbSet::Hands),
            "hands_and_feet" => Ok(LimbSet::HandsAndFeet),
            other => Err(WallGridError::UnknownLimb(other.to_string())),
        }
    }
}

/// Grid resolution: number of cells per side, validated to `1..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(try_from = "u32", into = "u32")]
pub struct GridSize(u32);

impl GridSize {
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidGridSize`] when `n` is zero or larger
    /// than [`MAX_GRID_SIZE`].
    pub fn new(n: u32) -> Result<Self, WallGridError> {
        if n == 0 || n > MAX_GRID_SIZE {
            return Err(WallGridError::InvalidGridSize(n));
        }
        Ok(Self(n))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn contains(self, cell: Cell) -> bool {
        cell.row < self.0 && cell.col < self.0
    }
}

impl Default for GridSize {
    fn default() -> Self {
        Self(12)
    }
}

impl TryFrom<u32> for GridSize {
    type Error = WallGridError;

    fn try_from(n: u32) -> Result<Self, Self::Error> {
        Self::new(n)
    }
}

impl From<GridSize> for u32 {
    fn from(size: GridSize) -> Self {
        size.0
    }
}

/// One grid cell, addressed by `(row, col)`.  Only meaningful relative to the
/// [`GridSize`] it was computed for.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Euclidean distance between two cells, in cells.
    pub fn distance(self, other: Cell) -> f64 {
        let dr = f64::from(self.row) - f64::from(other.row);
        let dc = f64::from(self.col) - f64::from(other.col);
        (dr * dr + dc * dc).sqrt()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A 2-D point.  Used both for pixel space and for the normalized unit
/// square.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// One landmark reported by the pose estimator, in normalized image
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LimbSample {
    pub x: f64,
    pub y: f64,
    /// Estimator confidence that the landmark is visible, in `[0, 1]`.
    pub visibility: f64,
}

impl LimbSample {
    pub fn new(x: f64, y: f64, visibility: f64) -> Self {
        Self { x, y, visibility }
    }
}

/// All limb data for one camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PoseFrame {
    /// Frame time in milliseconds.
    pub timestamp_ms: u64,
    /// `None` when the estimator found no pose at all.  A limb missing from
    /// the map had no landmark this frame.
    #[serde(default)]
    pub limbs: Option<BTreeMap<Limb, LimbSample>>,
}

impl PoseFrame {
    pub fn new(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            limbs: Some(BTreeMap::new()),
        }
    }

    /// A frame in which no pose was detected.
    pub fn absent(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            limbs: None,
        }
    }

    /// Build a frame from a raw pose-estimator landmark array, picking each
    /// limb of `limb_set` by [`Limb::pose_landmark_index`].
    ///
    /// An empty array means no pose was detected.  A limb whose index lies
    /// past the end of the array is left out, like an unreported landmark.
    pub fn from_landmarks(timestamp_ms: u64, landmarks: &[LimbSample], limb_set: LimbSet) -> Self {
        if landmarks.is_empty() {
            return Self::absent(timestamp_ms);
        }
        let limbs = limb_set
            .limbs()
            .iter()
            .filter_map(|&limb| {
                landmarks
                    .get(limb.pose_landmark_index())
                    .map(|sample| (limb, *sample))
            })
            .collect();
        Self {
            timestamp_ms,
            limbs: Some(limbs),
        }
    }

    pub fn with_limb(mut self, limb: Limb, sample: LimbSample) -> Self {
        self.limbs
            .get_or_insert_with(BTreeMap::new)
            .insert(limb, sample);
        self
    }

    pub fn sample(&self, limb: Limb) -> Option<LimbSample> {
        self.limbs.as_ref().and_then(|m| m.get(&limb).copied())
    }
}

/// A completed hold: one limb dwelt in one cell for at least the hold
/// threshold.  Only `duration_ms` changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Move {
    /// Sequence number, starting at 1 for the first move of a session.
    pub seq: u64,
    pub limb: Limb,
    pub cell: Cell,
    /// Frame time at which the hold first completed.
    pub created_at_ms: u64,
    /// Longest uninterrupted hold observed for this limb and cell.
    pub duration_ms: u64,
}

/// Error type shared across the WallGrid crates.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WallGridError {
    #[error("Degenerate calibration: {0}")]
    DegenerateConfiguration(String),

    #[error("Grid size {0} out of range (1..={MAX_GRID_SIZE})")]
    InvalidGridSize(u32),

    #[error("Confidence threshold {0} outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("Corner index {0} out of range (0..4)")]
    InvalidCornerIndex(usize),

    #[error("Unknown limb or limb set: {0}")]
    UnknownLimb(String),

    #[error("Link fault on {link}: {details}")]
    LinkFault { link: String, details: String },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_size_rejects_zero_and_oversize() {
        assert_eq!(GridSize::new(0), Err(WallGridError::InvalidGridSize(0)));
        assert_eq!(GridSize::new(256), Err(WallGridError::InvalidGridSize(256)));
        assert_eq!(GridSize::new(255).unwrap().get(), 255);
        assert_eq!(GridSize::new(1).unwrap().get(), 1);
    }

    #[test]
    fn grid_size_deserialization_validates() {
        let ok: GridSize = serde_json::from_str("5").unwrap();
        assert_eq!(ok.get(), 5);
        assert!(serde_json::from_str::<GridSize>("0").is_err());
    }

    #[test]
    fn grid_size_contains_is_half_open() {
        let n = GridSize::new(5).unwrap();
        assert!(n.contains(Cell::new(4, 4)));
        assert!(!n.contains(Cell::new(5, 0)));
        assert!(!n.contains(Cell::new(0, 5)));
    }

    #[test]
    fn limb_sets_have_canonical_order() {
        assert_eq!(LimbSet::Hands.limbs(), &[Limb::LeftHand, Limb::RightHand]);
        assert_eq!(LimbSet::HandsAndFeet.limbs().len(), 4);
        assert!(!LimbSet::Hands.contains(Limb::LeftFoot));
        assert!(LimbSet::HandsAndFeet.contains(Limb::RightFoot));
    }

    #[test]
    fn limb_parses_from_names_and_short_forms() {
        assert_eq!("left_hand".parse::<Limb>().unwrap(), Limb::LeftHand);
        assert_eq!("Right-Foot".parse::<Limb>().unwrap(), Limb::RightFoot);
        assert_eq!("lf".parse::<Limb>().unwrap(), Limb::LeftFoot);
        assert!("tail".parse::<Limb>().is_err());
    }

    #[test]
    fn cell_distance_is_euclidean() {
        assert!((Cell::new(0, 0).distance(Cell::new(0, 3)) - 3.0).abs() < 1e-12);
        assert!((Cell::new(1, 1).distance(Cell::new(4, 5)) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn pose_frame_json_uses_limb_names_as_keys() {
        let frame = PoseFrame::new(40).with_limb(Limb::LeftHand, LimbSample::new(0.5, 0.25, 0.9));
        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("\"left_hand\""), "json was {json}");
        let back: PoseFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn pose_frame_without_limbs_field_is_absent() {
        let frame: PoseFrame = serde_json::from_str(r#"{"timestamp_ms": 7}"#).unwrap();
        assert!(frame.limbs.is_none());
        assert!(frame.sample(Limb::LeftHand).is_none());
    }

    fn landmark_array(len: usize) -> Vec<LimbSample> {
        (0..len)
            .map(|i| LimbSample::new(i as f64 / 100.0, 0.5, 0.9))
            .collect()
    }

    #[test]
    fn landmark_array_selects_wrists_and_ankles() {
        let frame = PoseFrame::from_landmarks(10, &landmark_array(33), LimbSet::HandsAndFeet);
        assert_eq!(frame.timestamp_ms, 10);
        assert_eq!(frame.sample(Limb::LeftHand).unwrap().x, 0.15);
        assert_eq!(frame.sample(Limb::RightHand).unwrap().x, 0.16);
        assert_eq!(frame.sample(Limb::LeftFoot).unwrap().x, 0.27);
        assert_eq!(frame.sample(Limb::RightFoot).unwrap().x, 0.28);

        let hands = PoseFrame::from_landmarks(10, &landmark_array(33), LimbSet::Hands);
        assert_eq!(hands.limbs.as_ref().unwrap().len(), 2);
        assert!(hands.sample(Limb::LeftFoot).is_none());
    }

    #[test]
    fn short_landmark_array_drops_missing_limbs() {
        let frame = PoseFrame::from_landmarks(10, &landmark_array(20), LimbSet::HandsAndFeet);
        assert!(frame.limbs.is_some());
        assert!(frame.sample(Limb::RightHand).is_some());
        assert!(frame.sample(Limb::LeftFoot).is_none());
        assert!(frame.sample(Limb::RightFoot).is_none());

        let none = PoseFrame::from_landmarks(10, &landmark_array(16), LimbSet::Hands);
        assert!(none.sample(Limb::LeftHand).is_some());
        assert!(none.sample(Limb::RightHand).is_none());
    }

    #[test]
    fn empty_landmark_array_is_an_absent_pose() {
        assert_eq!(
            PoseFrame::from_landmarks(3, &[], LimbSet::Hands),
            PoseFrame::absent(3)
        );
    }

    #[test]
    fn error_display_mentions_details() {
        let err = WallGridError::LinkFault {
            link: "led_board".to_string(),
            details: "closed".to_string(),
        };
        assert!(err.to_string().contains("led_board"));
        assert!(WallGridError::InvalidGridSize(0).to_string().contains("255"));
    }
}
