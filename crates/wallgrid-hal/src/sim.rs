//! In-process actuator link for tests and headless runs.
//!
//! [`SimLink`] records the frames it is handed instead of driving real
//! hardware.  It can be told to fail a number of upcoming transmissions,
//! which lets retry behaviour be exercised without a flaky peripheral.
//!
//! # Example
//!
//! ```rust
//! use wallgrid_hal::{ActuatorLink, SimLink};
//!
//! let mut link = SimLink::new("led_board");
//! link.transmit(&[2, 3, 255, 255]).expect("sim transmit must succeed");
//! assert_eq!(link.last_frame(), Some(&[2u8, 3, 255, 255][..]));
//! ```

use wallgrid_types::WallGridError;

use crate::link::ActuatorLink;

// ────────────────────────────────────────────────────────────────────────────
// Stub link
// ────────────────────────────────────────────────────────────────────────────

/// A simulated peripheral that keeps delivered frames, optionally only the
/// most recent ones.
#[derive(Debug, Default)]
pub struct SimLink {
    id: String,
    frames: Vec<Vec<u8>>,
    /// Retain at most this many frames; `None` keeps all of them.
    history: Option<usize>,
    delivered: u64,
    failures_pending: usize,
}

impl SimLink {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frames: Vec::new(),
            history: None,
            delivered: 0,
            failures_pending: 0,
        }
    }

    /// Keep only the newest `limit` frames (at least one).
    pub fn with_history(mut self, limit: usize) -> Self {
        self.history = Some(limit.max(1));
        self
    }

    /// Make the next `count` transmissions fail with a link fault.
    pub fn fail_next(&mut self, count: usize) {
        self.failures_pending = count;
    }

    /// Retained frames, oldest first.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Number of successful transmissions, including frames no longer
    /// retained.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn last_frame(&self) -> Option<&[u8]> {
        self.frames.last().map(Vec::as_slice)
    }
}

impl ActuatorLink for SimLink {
    fn id(&self) -> &str {
        &self.id
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), WallGridError> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(WallGridError::LinkFault {
                link: self.id.clone(),
                details: "simulated disconnect".to_string(),
            });
        }
        self.frames.push(frame.to_vec());
        self.delivered += 1;
        if let Some(limit) = self.history
            && self.frames.len() > limit
        {
            let excess = self.frames.len() - limit;
            self.frames.drain(..excess);
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_frames_in_order() {
        let mut link = SimLink::new("board");
        link.transmit(&[1, 1]).unwrap();
        link.transmit(&[2, 2]).unwrap();
        assert_eq!(link.frames(), &[vec![1, 1], vec![2, 2]]);
        assert_eq!(link.last_frame(), Some(&[2u8, 2][..]));
    }

    #[test]
    fn scripted_failures_are_consumed() {
        let mut link = SimLink::new("board");
        link.fail_next(1);
        let err = link.transmit(&[0]).unwrap_err();
        assert!(matches!(err, WallGridError::LinkFault { ref link, .. } if link == "board"));
        assert!(link.frames().is_empty());
        link.transmit(&[0]).unwrap();
        assert_eq!(link.frames().len(), 1);
        assert_eq!(link.delivered(), 1);
    }

    #[test]
    fn bounded_history_keeps_newest_frames() {
        let mut link = SimLink::new("board").with_history(2);
        for i in 0..5u8 {
            link.transmit(&[i]).unwrap();
        }
        assert_eq!(link.frames(), &[vec![3], vec![4]]);
        assert_eq!(link.last_frame(), Some(&[4u8][..]));
        assert_eq!(link.delivered(), 5);
    }

    #[test]
    fn zero_history_still_keeps_last_frame() {
        let mut link = SimLink::new("board").with_history(0);
        link.transmit(&[7]).unwrap();
        link.transmit(&[8]).unwrap();
        assert_eq!(link.frames(), &[vec![8]]);
    }
}
