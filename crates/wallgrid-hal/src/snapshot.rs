//! Occupancy snapshot codec.
//!
//! A snapshot is `2 × limbs` bytes: for each limb of the session's
//! [`LimbSet`], in canonical order, the `(row, col)` of the cell it currently
//! occupies, or `(255, 255)` when it occupies none.
//!
//! Peripherals are often coarser than the tracking grid (the reference LED
//! board is 3×3).  An [`ActuatorScale`] maps each tracking cell onto the
//! board cell that covers it before encoding.

use std::collections::BTreeMap;

use wallgrid_types::{Cell, GridSize, Limb, LimbSet, WallGridError};

/// Sentinel row/column byte for "no current cell".
pub const NO_CELL: u8 = 255;

/// Resolution of a coarser actuator board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorScale {
    resolution: GridSize,
}

impl ActuatorScale {
    /// # Errors
    ///
    /// Returns [`WallGridError::InvalidGridSize`] when `resolution` is not a
    /// valid grid size.
    pub fn new(resolution: u32) -> Result<Self, WallGridError> {
        Ok(Self {
            resolution: GridSize::new(resolution)?,
        })
    }

    pub fn resolution(&self) -> u32 {
        self.resolution.get()
    }

    /// The board cell covering `cell` of an `grid`-sized tracking grid.
    pub fn project(&self, cell: Cell, grid: GridSize) -> Cell {
        let n = u64::from(grid.get());
        let r = u64::from(self.resolution.get());
        let scale = |i: u32| {
            let scaled = u64::from(i) * r / n;
            u32::try_from(scaled).unwrap_or(u32::MAX).min(self.resolution.get() - 1)
        };
        Cell::new(scale(cell.row), scale(cell.col))
    }
}

/// Raw snapshot of `current`, one `(row, col)` pair per limb of
/// `limb_set` in canonical order.
pub fn encode_snapshot(limb_set: LimbSet, current: &BTreeMap<Limb, Cell>) -> Vec<u8> {
    let mut frame = Vec::with_capacity(2 * limb_set.limbs().len());
    for limb in limb_set.limbs() {
        match current.get(limb) {
            Some(c) => {
                frame.push(u8::try_from(c.row).unwrap_or(NO_CELL));
                frame.push(u8::try_from(c.col).unwrap_or(NO_CELL));
            }
            None => frame.extend_from_slice(&[NO_CELL, NO_CELL]),
        }
    }
    frame
}

/// Encodes per-limb current cells into snapshot frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotEncoder {
    limb_set: LimbSet,
    grid: GridSize,
    scale: Option<ActuatorScale>,
}

impl SnapshotEncoder {
    pub fn new(limb_set: LimbSet, grid: GridSize) -> Self {
        Self {
            limb_set,
            grid,
            scale: None,
        }
    }

    pub fn with_scale(mut self, scale: Option<ActuatorScale>) -> Self {
        self.scale = scale;
        self
    }

    /// Frame length in bytes.
    pub fn frame_len(&self) -> usize {
        2 * self.limb_set.limbs().len()
    }

    /// Encode the current cell of every limb.  Limbs absent from `current`
    /// or outside the grid get the sentinel pair.
    pub fn encode(&self, current: &BTreeMap<Limb, Cell>) -> Vec<u8> {
        let projected: BTreeMap<Limb, Cell> = current
            .iter()
            .filter(|(_, c)| self.grid.contains(**c))
            .map(|(&limb, &c)| {
                let c = match self.scale {
                    Some(scale) => scale.project(c, self.grid),
                    None => c,
                };
                (limb, c)
            })
            .collect();
        encode_snapshot(self.limb_set, &projected)
    }

    /// Decode a frame back into per-limb cells (`None` for the sentinel).
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::Serialization`] when the frame length does
    /// not match the limb set.
    pub fn decode(&self, frame: &[u8]) -> Result<BTreeMap<Limb, Option<Cell>>, WallGridError> {
        if frame.len() != self.frame_len() {
            return Err(WallGridError::Serialization(format!(
                "snapshot has {} bytes, expected {}",
                frame.len(),
                self.frame_len()
            )));
        }
        Ok(self
            .limb_set
            .limbs()
            .iter()
            .zip(frame.chunks_exact(2))
            .map(|(&limb, pair)| {
                let cell = (pair[0] != NO_CELL && pair[1] != NO_CELL)
                    .then(|| Cell::new(u32::from(pair[0]), u32::from(pair[1])));
                (limb, cell)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(n: u32) -> GridSize {
        GridSize::new(n).unwrap()
    }

    #[test]
    fn empty_snapshot_is_all_sentinels() {
        let enc = SnapshotEncoder::new(LimbSet::HandsAndFeet, grid(12));
        assert_eq!(enc.encode(&BTreeMap::new()), vec![NO_CELL; 8]);
        assert_eq!(enc.frame_len(), 8);
    }

    #[test]
    fn limbs_are_written_in_canonical_order() {
        let enc = SnapshotEncoder::new(LimbSet::HandsAndFeet, grid(12));
        let current: BTreeMap<Limb, Cell> = [
            (Limb::RightFoot, Cell::new(11, 0)),
            (Limb::LeftHand, Cell::new(2, 3)),
        ]
        .into_iter()
        .collect();
        assert_eq!(
            enc.encode(&current),
            vec![2, 3, NO_CELL, NO_CELL, NO_CELL, NO_CELL, 11, 0]
        );
    }

    #[test]
    fn two_limb_variant_has_four_bytes_and_ignores_feet() {
        let enc = SnapshotEncoder::new(LimbSet::Hands, grid(5));
        let current: BTreeMap<Limb, Cell> = [
            (Limb::RightHand, Cell::new(4, 4)),
            (Limb::LeftFoot, Cell::new(1, 1)),
        ]
        .into_iter()
        .collect();
        assert_eq!(enc.encode(&current), vec![NO_CELL, NO_CELL, 4, 4]);
    }

    #[test]
    fn scale_projects_onto_three_by_three_board() {
        let scale = ActuatorScale::new(3).unwrap();
        let n = grid(12);
        assert_eq!(scale.project(Cell::new(0, 3), n), Cell::new(0, 0));
        assert_eq!(scale.project(Cell::new(4, 7), n), Cell::new(1, 1));
        assert_eq!(scale.project(Cell::new(11, 8), n), Cell::new(2, 2));

        let enc = SnapshotEncoder::new(LimbSet::Hands, n).with_scale(Some(scale));
        let current: BTreeMap<Limb, Cell> = [(Limb::LeftHand, Cell::new(11, 8))].into_iter().collect();
        assert_eq!(enc.encode(&current), vec![2, 2, NO_CELL, NO_CELL]);
    }

    #[test]
    fn scale_with_uneven_division_stays_in_range() {
        let scale = ActuatorScale::new(3).unwrap();
        let n = grid(5);
        for i in 0..5 {
            let p = scale.project(Cell::new(i, i), n);
            assert!(p.row < 3 && p.col < 3);
        }
        assert!(ActuatorScale::new(0).is_err());
    }

    #[test]
    fn free_encoder_skips_grid_checks() {
        let current: BTreeMap<Limb, Cell> = [(Limb::LeftHand, Cell::new(300, 1))].into_iter().collect();
        assert_eq!(
            encode_snapshot(LimbSet::Hands, &current),
            vec![NO_CELL, 1, NO_CELL, NO_CELL]
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let enc = SnapshotEncoder::new(LimbSet::HandsAndFeet, grid(12));
        let frame = vec![2, 3, NO_CELL, NO_CELL, 0, 0, 11, 11];
        let decoded = enc.decode(&frame).unwrap();
        assert_eq!(decoded[&Limb::LeftHand], Some(Cell::new(2, 3)));
        assert_eq!(decoded[&Limb::RightHand], None);
        assert_eq!(decoded[&Limb::LeftFoot], Some(Cell::new(0, 0)));
        assert!(enc.decode(&frame[..4]).is_err());
    }
}
