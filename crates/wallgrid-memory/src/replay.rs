//! Ledger replay.
//!
//! [`state_at`] reconstructs the grid as it stood after the first `index`
//! moves of a ledger.  It reads nothing but its arguments, so scrubbing to
//! the same index always produces the same state, whichever direction the
//! scrub came from.

use std::collections::BTreeSet;

use wallgrid_types::{Cell, Limb, Move};

/// Grid state after a prefix of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReplayState {
    /// Prefix length actually used, after clamping.
    pub index: usize,
    /// `(limb, cell)` of every move in the prefix.
    pub filled: BTreeSet<(Limb, Cell)>,
    /// Last move of the prefix, if any.
    pub current: Option<Move>,
}

/// State after the first `index` moves.  `index` is clamped to
/// `0..=moves.len()`; `0` means nothing is filled.
pub fn state_at(moves: &[Move], index: usize) -> ReplayState {
    let index = index.min(moves.len());
    let prefix = &moves[..index];
    ReplayState {
        index,
        filled: prefix.iter().map(|m| (m.limb, m.cell)).collect(),
        current: prefix.last().copied(),
    }
}

/// Scrub position over a ledger of known length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayCursor {
    position: usize,
    len: usize,
}

impl ReplayCursor {
    /// Cursor at index 0 over `len` moves.
    pub fn new(len: usize) -> Self {
        Self { position: 0, len }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_at_end(&self) -> bool {
        self.position == self.len
    }

    /// Follow a ledger that grew or shrank, keeping the position in range.
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        self.position = self.position.min(len);
    }

    pub fn seek(&mut self, index: usize) -> usize {
        self.position = index.min(self.len);
        self.position
    }

    /// Advance one move.  Returns `false` at the end.
    pub fn step_forward(&mut self) -> bool {
        if self.position < self.len {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Go back one move.  Returns `false` at index 0.
    pub fn step_back(&mut self) -> bool {
        if self.position > 0 {
            self.position -= 1;
            true
        } else {
            false
        }
    }

    pub fn state(&self, moves: &[Move]) -> ReplayState {
        state_at(moves, self.position)
    }
}
