//! Fixed-period snapshot publishing.
//!
//! Peripherals only care about where limbs are *now*, so the publisher keeps
//! no queue: each due tick transmits whatever snapshot the caller currently
//! holds.  A failed transmission is logged and the next poll tries again
//! with the then-current snapshot.

use tracing::{debug, warn};

use crate::link::ActuatorLink;

/// Default publishing period (20 Hz).
pub const DEFAULT_PERIOD_MS: u64 = 50;

/// Result of one [`SnapshotPublisher::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Sent,
    /// The period has not elapsed since the last successful send.
    NotDue,
    /// The link rejected the frame; the next poll retries.
    Failed,
}

#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    period_ms: u64,
    last_sent_ms: Option<u64>,
}

impl SnapshotPublisher {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_sent_ms: None,
        }
    }

    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Send `snapshot` over `link` if a period has elapsed since the last
    /// successful send.  The first poll always sends.
    pub fn poll(
        &mut self,
        now_ms: u64,
        snapshot: &[u8],
        link: &mut dyn ActuatorLink,
    ) -> PublishOutcome {
        if let Some(last) = self.last_sent_ms
            && now_ms.saturating_sub(last) < self.period_ms
        {
            return PublishOutcome::NotDue;
        }
        match link.transmit(snapshot) {
            Ok(()) => {
                self.last_sent_ms = Some(now_ms);
                debug!(link = link.id(), bytes = snapshot.len(), "snapshot published");
                PublishOutcome::Sent
            }
            Err(e) => {
                warn!(link = link.id(), error = %e, "snapshot publish failed");
                PublishOutcome::Failed
            }
        }
    }
}

impl Default for SnapshotPublisher {
    fn default() -> Self {
        Self::new(DEFAULT_PERIOD_MS)
    }
}
