//! Limb contact tracking.
//!
//! [`LimbContactTracker`] turns one limb's per-frame landmark into a current
//! cell and a hold timer keyed by `(limb, cell)`.  Once a timer reaches the
//! hold duration the contact is reported to the [`MoveLedger`] on every
//! frame it is sustained; the ledger's idempotency keeps that to one move.
//!
//! A limb keeps at most one live timer.  Any frame in which the limb is not
//! confidently inside the calibrated area, or maps to a different cell,
//! clears all of its timers: progress is forfeited, never paused.
//!
//! # Example
//!
//! ```rust
//! use wallgrid_memory::MoveLedger;
//! use wallgrid_perception::{FrameGeometry, GridMapper, Homography};
//! use wallgrid_runtime::contact::LimbContactTracker;
//! use wallgrid_types::{GridSize, Limb, LimbSample};
//!
//! let geometry = FrameGeometry { width: 1.0, height: 1.0, mirrored: false };
//! let mapper = GridMapper::new(GridSize::new(5).unwrap());
//! let forward = Homography::identity();
//! let mut tracker = LimbContactTracker::new(1000, 0.5).unwrap();
//! let mut ledger = MoveLedger::new();
//!
//! let sample = Some(LimbSample::new(0.7, 0.5, 0.9));
//! for t in [0, 600, 1_200] {
//!     tracker.track(Limb::LeftHand, sample, t, &geometry, &mapper, &forward, &mut ledger);
//! }
//! assert_eq!(ledger.len(), 1);
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;
use wallgrid_memory::{LedgerUpdate, MoveLedger};
use wallgrid_perception::{FrameGeometry, GridMapper, Homography};
use wallgrid_types::{Cell, Limb, LimbSample, WallGridError};

/// Time a limb must dwell in one cell before the contact becomes a move.
pub const DEFAULT_HOLD_DURATION_MS: u64 = 1000;

/// Minimum landmark visibility for a limb to be tracked.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HoldTimer {
    start_ms: u64,
    elapsed_ms: u64,
}

/// Per-frame tracking result for one limb, for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LimbContact {
    pub limb: Limb,
    /// Cell the limb is in this frame, if any.
    pub cell: Option<Cell>,
    /// Hold progress in `[0, 1]`; `0` whenever `cell` is `None`.
    pub progress: f64,
}

impl LimbContact {
    fn idle(limb: Limb) -> Self {
        Self {
            limb,
            cell: None,
            progress: 0.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LimbContactTracker
// ────────────────────────────────────────────────────────────────────────────

/// Hold timers for every tracked limb.
#[derive(Debug, Clone)]
pub struct LimbContactTracker {
    hold_duration_ms: u64,
    confidence_threshold: f64,
    timers: HashMap<(Limb, Cell), HoldTimer>,
}

impl LimbContactTracker {
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidThreshold`] unless
    /// `confidence_threshold` lies in `[0, 1]`.
    pub fn new(hold_duration_ms: u64, confidence_threshold: f64) -> Result<Self, WallGridError> {
        validate_threshold(confidence_threshold)?;
        Ok(Self {
            hold_duration_ms,
            confidence_threshold,
            timers: HashMap::new(),
        })
    }

    pub fn hold_duration_ms(&self) -> u64 {
        self.hold_duration_ms
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidThreshold`] unless `threshold` lies in
    /// `[0, 1]`; the previous threshold is kept.
    pub fn set_confidence_threshold(&mut self, threshold: f64) -> Result<(), WallGridError> {
        validate_threshold(threshold)?;
        self.confidence_threshold = threshold;
        Ok(())
    }

    /// Advance `limb` by one frame.
    ///
    /// `sample` is `None` when no landmark was reported.  Returns the
    /// limb's contact for rendering and, once the hold is complete, the
    /// ledger's answer to the completion.
    #[allow(clippy::too_many_arguments)]
    pub fn track(
        &mut self,
        limb: Limb,
        sample: Option<LimbSample>,
        now_ms: u64,
        geometry: &FrameGeometry,
        mapper: &GridMapper,
        forward: &Homography,
        ledger: &mut MoveLedger,
    ) -> (LimbContact, Option<LedgerUpdate>) {
        let Some(sample) = sample.filter(|s| s.visibility >= self.confidence_threshold) else {
            self.clear_limb(limb);
            return (LimbContact::idle(limb), None);
        };

        let pixel = geometry.landmark_to_pixel(&sample);
        let Some(cell) = mapper.to_cell(forward, pixel) else {
            self.clear_limb(limb);
            return (LimbContact::idle(limb), None);
        };

        // Timers for any other cell of this limb are stale.
        self.timers.retain(|&(l, c), _| l != limb || c == cell);

        let timer = self.timers.entry((limb, cell)).or_insert_with(|| {
            debug!(limb = %limb, row = cell.row, col = cell.col, "hold started");
            HoldTimer {
                start_ms: now_ms,
                elapsed_ms: 0,
            }
        });
        timer.elapsed_ms = now_ms.saturating_sub(timer.start_ms);
        let elapsed_ms = timer.elapsed_ms;

        let progress = if self.hold_duration_ms == 0 {
            1.0
        } else {
            (elapsed_ms as f64 / self.hold_duration_ms as f64).min(1.0)
        };

        let update = (elapsed_ms >= self.hold_duration_ms)
            .then(|| ledger.record_or_update(limb, cell, elapsed_ms, now_ms));

        (
            LimbContact {
                limb,
                cell: Some(cell),
                progress,
            },
            update,
        )
    }

    /// Drop every timer belonging to `limb`.
    pub fn clear_limb(&mut self, limb: Limb) {
        let before = self.timers.len();
        self.timers.retain(|&(l, _), _| l != limb);
        if self.timers.len() != before {
            debug!(limb = %limb, "hold timers cleared");
        }
    }

    pub fn clear_all(&mut self) {
        self.timers.clear();
    }

    /// Number of live timers across all limbs.
    pub fn timer_count(&self) -> usize {
        self.timers.len()
    }

    /// The live timer of `limb`, as `(cell, elapsed_ms)`.
    pub fn active_hold(&self, limb: Limb) -> Option<(Cell, u64)> {
        self.timers
            .iter()
            .find(|((l, _), _)| *l == limb)
            .map(|((_, c), t)| (*c, t.elapsed_ms))
    }
}

fn validate_threshold(threshold: f64) -> Result<(), WallGridError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(WallGridError::InvalidThreshold(threshold))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wallgrid_types::GridSize;

    struct Rig {
        geometry: FrameGeometry,
        mapper: GridMapper,
        forward: Homography,
        tracker: LimbContactTracker,
        ledger: MoveLedger,
    }

    impl Rig {
        /// Unit frame with identity calibration: normalized `(x, y)` is `(u, v)`.
        fn new(n: u32) -> Self {
            Self {
                geometry: FrameGeometry {
                    width: 1.0,
                    height: 1.0,
                    mirrored: false,
                },
                mapper: GridMapper::new(GridSize::new(n).unwrap()),
                forward: Homography::identity(),
                tracker: LimbContactTracker::new(1000, 0.5).unwrap(),
                ledger: MoveLedger::new(),
            }
        }

        fn step(
            &mut self,
            limb: Limb,
            sample: Option<LimbSample>,
            t: u64,
        ) -> (LimbContact, Option<LedgerUpdate>) {
            self.tracker.track(
                limb,
                sample,
                t,
                &self.geometry,
                &self.mapper,
                &self.forward,
                &mut self.ledger,
            )
        }
    }

    fn at(x: f64, y: f64) -> Option<LimbSample> {
        Some(LimbSample::new(x, y, 0.9))
    }

    #[test]
    fn progress_grows_then_saturates() {
        let mut rig = Rig::new(5);
        let (c0, _) = rig.step(Limb::LeftHand, at(0.7, 0.5), 0);
        assert_eq!(c0.cell, Some(Cell::new(2, 3)));
        assert_eq!(c0.progress, 0.0);

        let (c1, u1) = rig.step(Limb::LeftHand, at(0.7, 0.5), 500);
        assert!((c1.progress - 0.5).abs() < 1e-12);
        assert!(u1.is_none());

        let (c2, u2) = rig.step(Limb::LeftHand, at(0.7, 0.5), 1_500);
        assert_eq!(c2.progress, 1.0);
        assert!(matches!(u2, Some(LedgerUpdate::Appended(_))));
    }

    #[test]
    fn sustained_hold_extends_duration() {
        let mut rig = Rig::new(5);
        for t in [0, 1_000, 1_400, 2_000] {
            rig.step(Limb::RightHand, at(0.1, 0.1), t);
        }
        assert_eq!(rig.ledger.len(), 1);
        assert_eq!(rig.ledger.moves()[0].duration_ms, 2_000);
        assert_eq!(rig.ledger.moves()[0].created_at_ms, 1_000);
    }

    #[test]
    fn low_visibility_clears_timers() {
        let mut rig = Rig::new(5);
        rig.step(Limb::LeftHand, at(0.7, 0.5), 0);
        assert_eq!(rig.tracker.timer_count(), 1);
        let (c, _) = rig.step(Limb::LeftHand, Some(LimbSample::new(0.7, 0.5, 0.2)), 900);
        assert_eq!(c.cell, None);
        assert_eq!(rig.tracker.timer_count(), 0);
    }

    #[test]
    fn nan_visibility_is_gated() {
        let mut rig = Rig::new(5);
        let (c, _) = rig.step(Limb::LeftHand, Some(LimbSample::new(0.7, 0.5, f64::NAN)), 0);
        assert_eq!(c.cell, None);
        assert_eq!(rig.tracker.timer_count(), 0);
    }

    #[test]
    fn leaving_the_grid_clears_timers() {
        let mut rig = Rig::new(5);
        rig.step(Limb::LeftFoot, at(0.5, 0.5), 0);
        let (c, _) = rig.step(Limb::LeftFoot, at(1.2, 0.5), 100);
        assert_eq!(c.cell, None);
        assert!(rig.tracker.active_hold(Limb::LeftFoot).is_none());
    }

    #[test]
    fn changing_cell_restarts_from_zero() {
        let mut rig = Rig::new(5);
        rig.step(Limb::LeftHand, at(0.7, 0.5), 0);
        rig.step(Limb::LeftHand, at(0.7, 0.5), 800);
        let (c, _) = rig.step(Limb::LeftHand, at(0.9, 0.5), 900);
        assert_eq!(c.cell, Some(Cell::new(2, 4)));
        assert_eq!(c.progress, 0.0);
        assert_eq!(rig.tracker.timer_count(), 1);
        assert_eq!(rig.tracker.active_hold(Limb::LeftHand), Some((Cell::new(2, 4), 0)));
    }

    #[test]
    fn limbs_are_independent() {
        let mut rig = Rig::new(5);
        rig.step(Limb::LeftHand, at(0.1, 0.1), 0);
        rig.step(Limb::RightHand, at(0.9, 0.9), 0);
        rig.step(Limb::LeftHand, None, 500);
        assert!(rig.tracker.active_hold(Limb::LeftHand).is_none());
        assert_eq!(rig.tracker.active_hold(Limb::RightHand), Some((Cell::new(4, 4), 0)));
    }

    #[test]
    fn clock_going_backwards_does_not_underflow() {
        let mut rig = Rig::new(5);
        rig.step(Limb::LeftHand, at(0.5, 0.5), 5_000);
        let (c, _) = rig.step(Limb::LeftHand, at(0.5, 0.5), 4_000);
        assert_eq!(c.progress, 0.0);
    }

    #[test]
    fn zero_hold_duration_completes_immediately() {
        let mut rig = Rig::new(5);
        rig.tracker = LimbContactTracker::new(0, 0.5).unwrap();
        let (c, u) = rig.step(Limb::LeftHand, at(0.5, 0.5), 10);
        assert_eq!(c.progress, 1.0);
        assert!(matches!(u, Some(LedgerUpdate::Appended(_))));
    }

    #[test]
    fn threshold_is_validated() {
        assert!(matches!(
            LimbContactTracker::new(1000, 1.5),
            Err(WallGridError::InvalidThreshold(_))
        ));
        let mut tracker = LimbContactTracker::new(1000, 0.5).unwrap();
        assert!(tracker.set_confidence_threshold(-0.1).is_err());
        assert_eq!(tracker.confidence_threshold(), 0.5);
        tracker.set_confidence_threshold(0.8).unwrap();
        assert_eq!(tracker.confidence_threshold(), 0.8);
    }
}
