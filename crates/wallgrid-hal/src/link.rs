//! Generic `ActuatorLink` trait for peripherals that consume occupancy
//! snapshots.
//!
//! Drivers implement this trait; the rest of the system only ever hands
//! them encoded frames, so a WebSocket bridge, a serial port, or a radio can
//! be swapped without touching the tracking engine.

use wallgrid_types::WallGridError;

/// A peripheral that accepts encoded snapshot frames.
pub trait ActuatorLink: Send {
    /// Stable identifier for this link, e.g. `"led_board"`.
    fn id(&self) -> &str;

    /// Send one frame.  Frames are independent; a later frame fully
    /// supersedes an earlier one.
    ///
    /// # Errors
    ///
    /// Returns [`WallGridError::LinkFault`] when the frame cannot be
    /// delivered (e.g. the peripheral disconnected).
    fn transmit(&mut self, frame: &[u8]) -> Result<(), WallGridError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal in-process link used only for tests.
    struct MockLink {
        id: String,
        last: Vec<u8>,
    }

    impl ActuatorLink for MockLink {
        fn id(&self) -> &str {
            &self.id
        }

        fn transmit(&mut self, frame: &[u8]) -> Result<(), WallGridError> {
            self.last = frame.to_vec();
            Ok(())
        }
    }

    #[test]
    fn mock_link_keeps_last_frame() {
        let mut link = MockLink {
            id: "board".to_string(),
            last: Vec::new(),
        };
        let dyn_link: &mut dyn ActuatorLink = &mut link;
        dyn_link.transmit(&[1, 2]).unwrap();
        dyn_link.transmit(&[3, 4]).unwrap();
        assert_eq!(dyn_link.id(), "board");
        assert_eq!(link.last, vec![3, 4]);
    }
}
