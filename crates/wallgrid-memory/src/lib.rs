//! `wallgrid-memory` – the session record.
//!
//! Everything a climbing session leaves behind, and everything derived from
//! it after the fact.
//!
//! # Modules
//!
//! - [`ledger`] – [`MoveLedger`][ledger::MoveLedger]: append-only,
//!   idempotent log of completed moves, one per limb and cell.
//! - [`speed`] – [`SpeedAnalyzer`][speed::SpeedAnalyzer]: per-limb movement
//!   speed between consecutive moves, with a bounded history of averages.
//! - [`replay`] – [`state_at`][replay::state_at] and
//!   [`ReplayCursor`][replay::ReplayCursor]: deterministic reconstruction of
//!   the filled grid at any point in the ledger.
//! - [`store`] – [`SessionStore`][store::SessionStore]: SQLite persistence of
//!   finished sessions so they can be replayed later.

pub mod ledger;
pub mod replay;
pub mod speed;
pub mod store;

pub use ledger::{LedgerError, LedgerUpdate, MoveLedger};
pub use replay::{ReplayCursor, ReplayState, state_at};
pub use speed::{LimbSpeed, SpeedAnalyzer, speed_for};
pub use store::{SessionRecord, SessionStore, SessionSummary, StoreError};
