//! `wallgrid-runtime` – frame-driven tracking runtime.
//!
//! Ties perception, the move ledger and the actuator snapshot together.
//! Every piece of mutable state lives in one [`Session`][session::Session];
//! callers feed it frames and discrete input events from a single context,
//! so no operation ever observes a half-updated session.
//!
//! # Modules
//!
//! - [`contact`] – [`LimbContactTracker`][contact::LimbContactTracker]:
//!   per-limb hold timers that promote a sustained contact into a move.
//! - [`session`] – [`Session`][session::Session]: the coordinator that owns
//!   calibration, grid, timers, ledger and analytics for one climbing session.

pub mod contact;
pub mod session;

pub use contact::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_HOLD_DURATION_MS, LimbContact, LimbContactTracker,
};
pub use session::{FeatureFlags, FrameReport, Session, SessionConfig};
