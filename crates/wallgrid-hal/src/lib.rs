//! `wallgrid-hal` – Hardware Abstraction Layer.
//!
//! Carries grid occupancy out to physical peripherals (an LED board behind
//! the wall, a haptic wristband, …) without the tracking engine knowing which
//! device is on the other end.
//!
//! # Modules
//!
//! - [`link`] – [`ActuatorLink`][link::ActuatorLink]: byte-frame transport to
//!   a peripheral.
//! - [`snapshot`] – [`SnapshotEncoder`][snapshot::SnapshotEncoder]: the
//!   fixed-size `(row, col)` per-limb occupancy frame, with optional
//!   down-scaling onto a coarser actuator board.
//! - [`publisher`] – [`SnapshotPublisher`][publisher::SnapshotPublisher]:
//!   re-sends the latest snapshot on a fixed period, last value wins.
//! - [`sim`] – [`SimLink`][sim::SimLink]: in-process link that records what
//!   it was sent, for tests and headless runs.

pub mod link;
pub mod publisher;
pub mod sim;
pub mod snapshot;

pub use link::ActuatorLink;
pub use publisher::{DEFAULT_PERIOD_MS, PublishOutcome, SnapshotPublisher};
pub use sim::SimLink;
pub use snapshot::{ActuatorScale, NO_CELL, SnapshotEncoder, encode_snapshot};
