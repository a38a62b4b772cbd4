//! Move Ledger.
//!
//! The ordered log of every [`Move`] completed in a session.  Insertion order
//! is completion order and is the ground truth for replay; entries are never
//! re-sorted by timestamp.
//!
//! A `(limb, cell)` pair appears at most once.  Completing the same hold
//! again only raises the stored duration, so callers may report a sustained
//! hold on every frame.
//!
//! # Example
//!
//! ```rust
//! use wallgrid_memory::ledger::{LedgerUpdate, MoveLedger};
//! use wallgrid_types::{Cell, Limb};
//!
//! let mut ledger = MoveLedger::new();
//! let cell = Cell::new(2, 3);
//!
//! assert!(matches!(
//!     ledger.record_or_update(Limb::LeftHand, cell, 1000, 5_000),
//!     LedgerUpdate::Appended(_)
//! ));
//! ledger.record_or_update(Limb::LeftHand, cell, 1200, 5_200);
//!
//! assert_eq!(ledger.len(), 1);
//! assert_eq!(ledger.moves()[0].duration_ms, 1200);
//! ```

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;
use wallgrid_types::{Cell, Limb, LimbSet, Move};

/// Errors raised when rebuilding a ledger from persisted moves.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("duplicate move for {limb} at {cell}")]
    DuplicateMove { limb: Limb, cell: Cell },
    #[error("sequence number {seq} does not follow {previous}")]
    OutOfOrder { seq: u64, previous: u64 },
    #[error("move for {limb} at {cell} lies outside a {grid}×{grid} grid")]
    CellOutsideGrid { limb: Limb, cell: Cell, grid: u32 },
    #[error("move for {limb} but the session tracks {limb_set}")]
    LimbNotTracked { limb: Limb, limb_set: LimbSet },
}

/// Outcome of [`MoveLedger::record_or_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    /// A new move was appended.
    Appended(Move),
    /// An existing move's duration grew.
    Extended { seq: u64, duration_ms: u64 },
    /// An existing move already had an equal or longer duration.
    Unchanged { seq: u64 },
}

/// Append-only, idempotent move log.
#[derive(Debug, Clone, Default)]
pub struct MoveLedger {
    moves: Vec<Move>,
    /// Position in `moves` of each recorded `(limb, cell)`.
    index: HashMap<(Limb, Cell), usize>,
    /// Last sequence number issued; 0 for an empty session.
    last_seq: u64,
}

impl MoveLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a ledger from moves in their original order.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError`] if a `(limb, cell)` repeats or sequence numbers
    /// are not strictly increasing.
    pub fn from_moves(moves: Vec<Move>) -> Result<Self, LedgerError> {
        let mut index = HashMap::with_capacity(moves.len());
        let mut last_seq = 0;
        for (pos, m) in moves.iter().enumerate() {
            if m.seq <= last_seq {
                return Err(LedgerError::OutOfOrder {
                    seq: m.seq,
                    previous: last_seq,
                });
            }
            if index.insert((m.limb, m.cell), pos).is_some() {
                return Err(LedgerError::DuplicateMove {
                    limb: m.limb,
                    cell: m.cell,
                });
            }
            last_seq = m.seq;
        }
        Ok(Self {
            moves,
            index,
            last_seq,
        })
    }

    /// Record a completed hold of `limb` on `cell`.
    ///
    /// The first completion appends a move stamped `now_ms` and consumes the
    /// next sequence number.  Later completions set the duration to
    /// `max(existing, elapsed_ms)`.
    pub fn record_or_update(
        &mut self,
        limb: Limb,
        cell: Cell,
        elapsed_ms: u64,
        now_ms: u64,
    ) -> LedgerUpdate {
        if let Some(&pos) = self.index.get(&(limb, cell)) {
            let existing = &mut self.moves[pos];
            if elapsed_ms > existing.duration_ms {
                existing.duration_ms = elapsed_ms;
                return LedgerUpdate::Extended {
                    seq: existing.seq,
                    duration_ms: elapsed_ms,
                };
            }
            return LedgerUpdate::Unchanged { seq: existing.seq };
        }

        self.last_seq += 1;
        let m = Move {
            seq: self.last_seq,
            limb,
            cell,
            created_at_ms: now_ms,
            duration_ms: elapsed_ms,
        };
        self.index.insert((limb, cell), self.moves.len());
        self.moves.push(m);
        info!(seq = m.seq, limb = %limb, row = cell.row, col = cell.col, "move recorded");
        LedgerUpdate::Appended(m)
    }

    /// Drop every move and restart sequence numbering.
    pub fn reset(&mut self) {
        self.moves.clear();
        self.index.clear();
        self.last_seq = 0;
    }

    /// All moves in completion order.
    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    /// Last sequence number issued (0 if none).
    pub fn sequence(&self) -> u64 {
        self.last_seq
    }

    pub fn get(&self, limb: Limb, cell: Cell) -> Option<&Move> {
        self.index.get(&(limb, cell)).map(|&pos| &self.moves[pos])
    }

    /// Whether `limb` has completed a hold on `cell` this session.
    pub fn is_filled(&self, limb: Limb, cell: Cell) -> bool {
        self.index.contains_key(&(limb, cell))
    }

    /// Moves made by `limb`, in ledger order.
    pub fn moves_for(&self, limb: Limb) -> impl Iterator<Item = &Move> {
        self.moves.iter().filter(move |m| m.limb == limb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(row: u32, col: u32) -> Cell {
        Cell::new(row, col)
    }

    #[test]
    fn first_completion_appends_with_sequence_one() {
        let mut ledger = MoveLedger::new();
        let update = ledger.record_or_update(Limb::LeftHand, c(2, 3), 1000, 1_200);
        let LedgerUpdate::Appended(m) = update else {
            panic!("expected append, got {update:?}");
        };
        assert_eq!(m.seq, 1);
        assert_eq!(m.created_at_ms, 1_200);
        assert_eq!(m.duration_ms, 1000);
        assert_eq!(ledger.sequence(), 1);
    }

    #[test]
    fn repeated_completion_never_appends() {
        let mut ledger = MoveLedger::new();
        for (i, d) in [1000, 1000, 1016, 1033, 1500].into_iter().enumerate() {
            ledger.record_or_update(Limb::LeftHand, c(1, 1), d, 1000 + i as u64 * 16);
        }
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.sequence(), 1);
    }

    #[test]
    fn duration_takes_the_maximum() {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::RightHand, c(0, 0), 1000, 0);
        assert_eq!(
            ledger.record_or_update(Limb::RightHand, c(0, 0), 1800, 0),
            LedgerUpdate::Extended {
                seq: 1,
                duration_ms: 1800
            }
        );
        assert_eq!(
            ledger.record_or_update(Limb::RightHand, c(0, 0), 1100, 0),
            LedgerUpdate::Unchanged { seq: 1 }
        );
        assert_eq!(ledger.get(Limb::RightHand, c(0, 0)).unwrap().duration_ms, 1800);
    }

    #[test]
    fn creation_time_is_not_touched_by_updates() {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::LeftFoot, c(3, 3), 1000, 4_000);
        ledger.record_or_update(Limb::LeftFoot, c(3, 3), 2000, 5_000);
        assert_eq!(ledger.moves()[0].created_at_ms, 4_000);
    }

    #[test]
    fn ledger_length_counts_distinct_limb_cell_pairs() {
        let mut ledger = MoveLedger::new();
        let keys = [
            (Limb::LeftHand, c(0, 0)),
            (Limb::RightHand, c(0, 0)),
            (Limb::LeftHand, c(0, 1)),
        ];
        for frame in 0..10u64 {
            for (limb, cell) in keys {
                ledger.record_or_update(limb, cell, 1000 + frame, frame);
            }
        }
        assert_eq!(ledger.len(), 3);
        let seqs: Vec<u64> = ledger.moves().iter().map(|m| m.seq).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn insertion_order_is_preserved_even_with_earlier_timestamps() {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::LeftHand, c(0, 0), 1000, 9_000);
        ledger.record_or_update(Limb::RightHand, c(1, 1), 1000, 3_000);
        assert_eq!(ledger.moves()[0].limb, Limb::LeftHand);
        assert_eq!(ledger.moves()[1].limb, Limb::RightHand);
    }

    #[test]
    fn reset_clears_moves_and_sequence() {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::LeftHand, c(0, 0), 1000, 0);
        ledger.record_or_update(Limb::LeftHand, c(0, 1), 1000, 0);
        ledger.reset();
        assert!(ledger.is_empty());
        assert_eq!(ledger.sequence(), 0);
        assert!(!ledger.is_filled(Limb::LeftHand, c(0, 0)));

        let LedgerUpdate::Appended(m) = ledger.record_or_update(Limb::LeftHand, c(0, 0), 1000, 0)
        else {
            panic!("expected append after reset");
        };
        assert_eq!(m.seq, 1);
    }

    #[test]
    fn moves_for_filters_by_limb() {
        let mut ledger = MoveLedger::new();
        ledger.record_or_update(Limb::LeftHand, c(0, 0), 1000, 0);
        ledger.record_or_update(Limb::RightHand, c(0, 0), 1000, 0);
        ledger.record_or_update(Limb::LeftHand, c(0, 1), 1000, 0);
        assert_eq!(ledger.moves_for(Limb::LeftHand).count(), 2);
        assert_eq!(ledger.moves_for(Limb::RightFoot).count(), 0);
    }

    #[test]
    fn from_moves_rebuilds_index() {
        let mut original = MoveLedger::new();
        original.record_or_update(Limb::LeftHand, c(0, 0), 1000, 10);
        original.record_or_update(Limb::RightHand, c(2, 2), 1300, 20);

        let mut rebuilt = MoveLedger::from_moves(original.moves().to_vec()).unwrap();
        assert_eq!(rebuilt.sequence(), 2);
        assert!(rebuilt.is_filled(Limb::RightHand, c(2, 2)));
        assert!(matches!(
            rebuilt.record_or_update(Limb::LeftHand, c(0, 0), 900, 30),
            LedgerUpdate::Unchanged { seq: 1 }
        ));
    }

    #[test]
    fn from_moves_rejects_duplicates_and_disorder() {
        let m = |seq, col| Move {
            seq,
            limb: Limb::LeftHand,
            cell: c(0, col),
            created_at_ms: 0,
            duration_ms: 1000,
        };
        assert_eq!(
            MoveLedger::from_moves(vec![m(1, 0), m(2, 0)]).unwrap_err(),
            LedgerError::DuplicateMove {
                limb: Limb::LeftHand,
                cell: c(0, 0)
            }
        );
        assert_eq!(
            MoveLedger::from_moves(vec![m(2, 0), m(1, 1)]).unwrap_err(),
            LedgerError::OutOfOrder { seq: 1, previous: 2 }
        );
    }
}
