//! Limb speed analytics.
//!
//! For each pair of consecutive ledger entries made by the same limb, the
//! speed sample is the Euclidean distance between the two cells divided by
//! the time between their creation stamps, in cells per second.  A zero or
//! negative time delta yields a sample of `0.0`.
//!
//! The session average is the plain mean of all samples.  Separately,
//! [`SpeedAnalyzer`] keeps the last [`HISTORY_CAPACITY`] averages it has
//! computed per limb, for charting; that history never feeds back into the
//! average.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use wallgrid_types::{Limb, Move};

use crate::ledger::MoveLedger;

/// Number of past averages retained per limb.
pub const HISTORY_CAPACITY: usize = 50;

/// Speed samples for one limb and their mean.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LimbSpeed {
    /// Cells per second between consecutive moves, in ledger order.
    pub samples: Vec<f64>,
    /// Mean of `samples`, or `0.0` when there are none.
    pub average: f64,
}

/// Compute the speed profile of `limb` over `moves`.
pub fn speed_for(moves: &[Move], limb: Limb) -> LimbSpeed {
    let own: Vec<&Move> = moves.iter().filter(|m| m.limb == limb).collect();
    let samples: Vec<f64> = own
        .windows(2)
        .map(|pair| {
            let (a, b) = (pair[0], pair[1]);
            let dt_s = (b.created_at_ms as f64 - a.created_at_ms as f64) / 1000.0;
            if dt_s <= 0.0 {
                0.0
            } else {
                a.cell.distance(b.cell) / dt_s
            }
        })
        .collect();
    let average = if samples.is_empty() {
        0.0
    } else {
        samples.iter().sum::<f64>() / samples.len() as f64
    };
    LimbSpeed { samples, average }
}

/// Computes limb speeds and remembers a bounded history of averages.
#[derive(Debug, Clone)]
pub struct SpeedAnalyzer {
    capacity: usize,
    history: HashMap<Limb, VecDeque<f64>>,
}

impl SpeedAnalyzer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    /// `capacity` is clamped to at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: HashMap::new(),
        }
    }

    /// Compute the current speed of `limb` and append its average to the
    /// limb's history, evicting the oldest value past capacity.
    pub fn analyze(&mut self, ledger: &MoveLedger, limb: Limb) -> LimbSpeed {
        let speed = speed_for(ledger.moves(), limb);
        let history = self.history.entry(limb).or_default();
        history.push_back(speed.average);
        while history.len() > self.capacity {
            history.pop_front();
        }
        speed
    }

    /// Past averages for `limb`, oldest first.
    pub fn history(&self, limb: Limb) -> Vec<f64> {
        self.history
            .get(&limb)
            .map(|h| h.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for SpeedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wallgrid_types::Cell;

    fn mv(seq: u64, limb: Limb, row: u32, col: u32, t_ms: u64) -> Move {
        Move {
            seq,
            limb,
            cell: Cell::new(row, col),
            created_at_ms: t_ms,
            duration_ms: 1000,
        }
    }

    #[test]
    fn three_cells_in_two_seconds_is_one_and_a_half() {
        let moves = [
            mv(1, Limb::LeftHand, 0, 0, 0),
            mv(2, Limb::LeftHand, 0, 3, 2_000),
        ];
        let s = speed_for(&moves, Limb::LeftHand);
        assert_eq!(s.samples.len(), 1);
        assert!((s.samples[0] - 1.5).abs() < 1e-12);
        assert!((s.average - 1.5).abs() < 1e-12);
    }

    #[test]
    fn other_limbs_are_skipped_between_pairs() {
        let moves = [
            mv(1, Limb::LeftHand, 0, 0, 0),
            mv(2, Limb::RightHand, 5, 5, 500),
            mv(3, Limb::LeftHand, 3, 4, 1_000),
        ];
        let s = speed_for(&moves, Limb::LeftHand);
        assert_eq!(s.samples, vec![5.0]);
        assert!(speed_for(&moves, Limb::RightHand).samples.is_empty());
    }

    #[test]
    fn non_positive_time_delta_yields_zero() {
        let moves = [
            mv(1, Limb::LeftFoot, 0, 0, 1_000),
            mv(2, Limb::LeftFoot, 0, 1, 1_000),
            mv(3, Limb::LeftFoot, 0, 2, 500),
        ];
        let s = speed_for(&moves, Limb::LeftFoot);
        assert_eq!(s.samples, vec![0.0, 0.0]);
        assert_eq!(s.average, 0.0);
    }

    #[test]
    fn average_is_mean_of_all_samples() {
        let moves = [
            mv(1, Limb::RightHand, 0, 0, 0),
            mv(2, Limb::RightHand, 0, 2, 1_000),
            mv(3, Limb::RightHand, 0, 6, 2_000),
        ];
        let s = speed_for(&moves, Limb::RightHand);
        assert_eq!(s.samples, vec![2.0, 4.0]);
        assert!((s.average - 3.0).abs() < 1e-12);
    }

    #[test]
    fn no_moves_means_zero_average() {
        let s = speed_for(&[], Limb::LeftHand);
        assert!(s.samples.is_empty());
        assert_eq!(s.average, 0.0);
    }

    #[test]
    fn history_is_capped() {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::LeftHand, Cell::new(0, 0), 1000, 0);
        ledger.record_or_update(Limb::LeftHand, Cell::new(0, 3), 1000, 2_000);

        let mut analyzer = SpeedAnalyzer::with_capacity(3);
        for _ in 0..5 {
            analyzer.analyze(&ledger, Limb::LeftHand);
        }
        assert_eq!(analyzer.history(Limb::LeftHand), vec![1.5, 1.5, 1.5]);
        assert!(analyzer.history(Limb::RightHand).is_empty());
    }

    #[test]
    fn default_history_capacity_is_fifty() {
        let ledger = MoveLedger::new();
        let mut analyzer = SpeedAnalyzer::new();
        for _ in 0..60 {
            analyzer.analyze(&ledger, Limb::RightFoot);
        }
        assert_eq!(analyzer.history(Limb::RightFoot).len(), HISTORY_CAPACITY);
        analyzer.clear();
        assert!(analyzer.history(Limb::RightFoot).is_empty());
    }
}
