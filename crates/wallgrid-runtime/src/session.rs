//! Session coordinator.
//!
//! A [`Session`] owns every piece of mutable tracking state for one climbing
//! session: the calibration surface, the grid, the per-limb hold timers, the
//! move ledger, the speed history and the latest per-limb cells.  Frames and
//! user input events are applied to it one at a time, and the operations
//! that invalidate state ([`Session::set_grid_size`], [`Session::reset`])
//! clear everything that depends on it before returning.
//!
//! # Example
//!
//! ```rust
//! use wallgrid_runtime::session::{Session, SessionConfig};
//! use wallgrid_types::{Limb, LimbSample, PoseFrame};
//!
//! let mut session = Session::new(SessionConfig::default()).unwrap();
//! let hand = LimbSample::new(0.5, 0.5, 0.9);
//!
//! for t in (0..=1_200).step_by(100) {
//!     session.process_frame(&PoseFrame::new(t).with_limb(Limb::LeftHand, hand));
//! }
//! assert_eq!(session.ledger().len(), 1);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;
use wallgrid_hal::{ActuatorScale, SnapshotEncoder};
use wallgrid_memory::{
    LedgerError, LedgerUpdate, LimbSpeed, MoveLedger, ReplayState, SessionRecord, SpeedAnalyzer,
    state_at,
};
use wallgrid_perception::{
    CalibrationMode, CalibrationSurface, Corners, FrameGeometry, GridLines, GridMapper,
};
use wallgrid_types::{Cell, GridSize, Limb, LimbSet, Move, PoseFrame, Point2, WallGridError};

use crate::contact::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_HOLD_DURATION_MS, LimbContact, LimbContactTracker,
};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Optional session features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    /// Per-limb speed analytics.
    pub analytics: bool,
    /// Ledger replay queries.
    pub replay: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            analytics: true,
            replay: true,
        }
    }
}

/// Configuration for a [`Session`].
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub grid_size: GridSize,
    pub limb_set: LimbSet,
    pub hold_duration_ms: u64,
    /// Minimum landmark visibility, in `[0, 1]`.
    pub confidence_threshold: f64,
    pub geometry: FrameGeometry,
    pub features: FeatureFlags,
    /// Down-scale snapshots onto a coarser actuator board.
    pub actuator_scale: Option<ActuatorScale>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grid_size: GridSize::default(),
            limb_set: LimbSet::default(),
            hold_duration_ms: DEFAULT_HOLD_DURATION_MS,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            geometry: FrameGeometry::default(),
            features: FeatureFlags::default(),
            actuator_scale: None,
        }
    }
}

/// Outcome of [`Session::process_frame`].
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub timestamp_ms: u64,
    /// One entry per active limb, in canonical limb order.  Empty when
    /// the frame was skipped.
    pub contacts: Vec<LimbContact>,
    /// Ledger appends and duration extensions caused by this frame.
    pub ledger_updates: Vec<LedgerUpdate>,
    /// The calibration was degenerate and the frame was not mapped.
    pub skipped: bool,
}

impl FrameReport {
    fn skipped(timestamp_ms: u64) -> Self {
        Self {
            timestamp_ms,
            contacts: Vec::new(),
            ledger_updates: Vec::new(),
            skipped: true,
        }
    }

    /// Moves first recorded by this frame.
    pub fn appended(&self) -> impl Iterator<Item = &Move> {
        self.ledger_updates.iter().filter_map(|u| match u {
            LedgerUpdate::Appended(m) => Some(m),
            _ => None,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

pub struct Session {
    config: SessionConfig,
    calibration: CalibrationSurface,
    mapper: GridMapper,
    tracker: LimbContactTracker,
    ledger: MoveLedger,
    speed: SpeedAnalyzer,
    /// Cell each limb occupied in the last mapped frame.
    current: BTreeMap<Limb, Cell>,
    id: Uuid,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Start a session with the default calibration rectangle for the
    /// configured frame.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidThreshold`] for a confidence
    /// threshold outside `[0, 1]`.
    pub fn new(config: SessionConfig) -> Result<Self, WallGridError> {
        let tracker = LimbContactTracker::new(config.hold_duration_ms, config.confidence_threshold)?;
        let calibration = CalibrationSurface::new(Corners::for_geometry(&config.geometry));
        let session = Self {
            mapper: GridMapper::new(config.grid_size),
            calibration,
            tracker,
            ledger: MoveLedger::new(),
            speed: SpeedAnalyzer::new(),
            current: BTreeMap::new(),
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
        };
        info!(
            session = %session.id,
            grid = session.config.grid_size.get(),
            limbs = %session.config.limb_set,
            "session started"
        );
        Ok(session)
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    // ── Frame processing ────────────────────────────────────────────────────

    /// Run one frame through calibration, mapping and hold tracking.
    ///
    /// While the corner set is degenerate the frame is skipped and no timer
    /// or cell is touched.
    pub fn process_frame(&mut self, frame: &PoseFrame) -> FrameReport {
        let forward = match self.calibration.refresh() {
            Ok(pair) => pair.forward,
            Err(e) => {
                debug!(t = frame.timestamp_ms, error = %e, "frame skipped");
                return FrameReport::skipped(frame.timestamp_ms);
            }
        };

        let limbs = self.config.limb_set.limbs();
        let mut contacts = Vec::with_capacity(limbs.len());
        let mut ledger_updates = Vec::new();
        for &limb in limbs {
            let (contact, update) = self.tracker.track(
                limb,
                frame.sample(limb),
                frame.timestamp_ms,
                &self.config.geometry,
                &self.mapper,
                &forward,
                &mut self.ledger,
            );
            match contact.cell {
                Some(cell) => self.current.insert(limb, cell),
                None => self.current.remove(&limb),
            };
            if let Some(update) = update
                && !matches!(update, LedgerUpdate::Unchanged { .. })
            {
                ledger_updates.push(update);
            }
            contacts.push(contact);
        }

        FrameReport {
            timestamp_ms: frame.timestamp_ms,
            contacts,
            ledger_updates,
            skipped: false,
        }
    }

    // ── Calibration input ───────────────────────────────────────────────────

    pub fn calibration(&self) -> &CalibrationSurface {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationSurface {
        &mut self.calibration
    }

    pub fn set_calibration_mode(&mut self, mode: CalibrationMode) {
        self.calibration.set_mode(mode);
    }

    /// Manual corner edit; ignored in marker mode.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidCornerIndex`] for `index >= 4`.
    pub fn set_corner(&mut self, index: usize, position: Point2) -> Result<bool, WallGridError> {
        self.calibration.set_corner(index, position)
    }

    /// Manual replacement of all four corners; ignored in marker mode.
    pub fn set_corners(&mut self, corners: Corners) -> bool {
        self.calibration.set_manual_corners(corners)
    }

    /// Marker observation in normalized device coordinates, projected with
    /// the session's frame geometry; ignored in manual mode.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidCornerIndex`] for `index >= 4`.
    pub fn apply_marker(
        &mut self,
        index: usize,
        ndc: Point2,
        visible: bool,
    ) -> Result<bool, WallGridError> {
        self.calibration
            .apply_marker(index, ndc, visible, &self.config.geometry)
    }

    /// Warped grid lines for the last valid calibration.
    pub fn grid_lines(&self) -> Option<GridLines> {
        self.calibration
            .last_good()
            .map(|pair| self.mapper.grid_lines(&pair.inverse))
    }

    /// Pixel polygon of `cell` for the last valid calibration.
    pub fn cell_polygon(&self, cell: Cell) -> Option<[Point2; 4]> {
        let pair = self.calibration.last_good()?;
        self.mapper.cell_polygon(&pair.inverse, cell)
    }

    // ── Configuration changes ───────────────────────────────────────────────

    /// Change the grid resolution.  Any actual change clears timers, cells
    /// and the ledger, and starts a new session id.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidGridSize`] for `n` outside `1..=255`;
    /// the session is left untouched.
    pub fn set_grid_size(&mut self, n: u32) -> Result<(), WallGridError> {
        let size = GridSize::new(n)?;
        if size == self.config.grid_size {
            return Ok(());
        }
        self.config.grid_size = size;
        self.mapper = GridMapper::new(size);
        self.restart();
        info!(session = %self.id, grid = n, "grid resized, session cleared");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidThreshold`] unless `threshold` lies in
    /// `[0, 1]`.
    pub fn set_confidence_threshold(&mut self, threshold: f64) -> Result<(), WallGridError> {
        self.tracker.set_confidence_threshold(threshold)?;
        self.config.confidence_threshold = threshold;
        Ok(())
    }

    /// Clear timers, cells, ledger and analytics history and start a new
    /// session id.  Calibration and configuration are kept.
    pub fn reset(&mut self) {
        self.restart();
        info!(session = %self.id, "session reset");
    }

    fn restart(&mut self) {
        self.tracker.clear_all();
        self.ledger.reset();
        self.speed.clear();
        self.current.clear();
        self.id = Uuid::new_v4();
        self.started_at = Utc::now();
    }

    /// Replace this session's ledger with a persisted one.  Live timers and
    /// cells are dropped; calibration is kept.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if the record's moves are inconsistent; the
    /// session is left untouched.
    pub fn restore(&mut self, record: &SessionRecord) -> Result<(), LedgerError> {
        let ledger = record.ledger()?;
        self.tracker.clear_all();
        self.speed.clear();
        self.current.clear();
        self.ledger = ledger;
        self.config.grid_size = record.grid_size;
        self.config.limb_set = record.limb_set;
        self.mapper = GridMapper::new(record.grid_size);
        self.id = record.id;
        self.started_at = record.started_at;
        info!(session = %self.id, moves = self.ledger.len(), "session restored");
        Ok(())
    }

    // ── Outputs ─────────────────────────────────────────────────────────────

    pub fn ledger(&self) -> &MoveLedger {
        &self.ledger
    }

    pub fn tracker(&self) -> &LimbContactTracker {
        &self.tracker
    }

    /// Cell each limb occupied in the last mapped frame.
    pub fn current_cells(&self) -> &BTreeMap<Limb, Cell> {
        &self.current
    }

    /// Latest encoded occupancy snapshot for actuator transmission.
    pub fn snapshot(&self) -> Vec<u8> {
        SnapshotEncoder::new(self.config.limb_set, self.config.grid_size)
            .with_scale(self.config.actuator_scale)
            .encode(&self.current)
    }

    /// Speed profile of `limb`; `None` when analytics are off.
    pub fn speed_for(&mut self, limb: Limb) -> Option<LimbSpeed> {
        self.config
            .features
            .analytics
            .then(|| self.speed.analyze(&self.ledger, limb))
    }

    /// Past speed averages of `limb`, oldest first; `None` when analytics
    /// are off.
    pub fn speed_history(&self, limb: Limb) -> Option<Vec<f64>> {
        self.config
            .features
            .analytics
            .then(|| self.speed.history(limb))
    }

    /// Grid state after the first `index` moves; `None` when replay is off.
    pub fn replay_at(&self, index: usize) -> Option<ReplayState> {
        self.config
            .features
            .replay
            .then(|| state_at(self.ledger.moves(), index))
    }

    /// Export the session for persistence.
    pub fn record(&self) -> SessionRecord {
        SessionRecord {
            id: self.id,
            started_at: self.started_at,
            grid_size: self.config.grid_size,
            limb_set: self.config.limb_set,
            moves: self.ledger.moves().to_vec(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
