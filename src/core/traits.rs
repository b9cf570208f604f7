//! Capabilities the engine borrows from its host.
//!
//! The host owns persistence and power management; the engine only needs
//! these narrow seams.

use std::sync::Arc;
use std::time::Duration;

use super::error::StoreError;
use super::types::PeerIdentity;

/// Durable storage for the last-known peer.
///
/// Read on `reconnect`, written on every successful low-level connect.
pub trait IdentityStore: Send + Sync + 'static {
    /// Load the persisted peer, if any.
    fn load(&self) -> Result<Option<PeerIdentity>, StoreError>;

    /// Persist the peer, replacing any previous one.
    fn save(&self, identity: &PeerIdentity) -> Result<(), StoreError>;
}

/// Keeps the host awake while retries or writes are in flight.
///
/// Implementations must tolerate `release` without a matching `acquire`.
pub trait WakeHold: Send + Sync + 'static {
    /// Take the hold, auto-expiring after `max` at the latest.
    fn acquire(&self, tag: &'static str, max: Duration);

    /// Drop the hold.
    fn release(&self, tag: &'static str);
}

/// Wake hold that does nothing, for hosts without power management.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWakeHold;

impl WakeHold for NoopWakeHold {
    fn acquire(&self, _tag: &'static str, _max: Duration) {}

    fn release(&self, _tag: &'static str) {}
}

/// Scoped wake hold, released on drop.
#[must_use = "the hold is released as soon as the guard is dropped"]
pub struct WakeGuard {
    hold: Arc<dyn WakeHold>,
    tag: &'static str,
}

impl WakeGuard {
    /// Acquire `hold` for at most `max`.
    pub fn acquire(hold: Arc<dyn WakeHold>, tag: &'static str, max: Duration) -> Self {
        hold.acquire(tag, max);
        Self { hold, tag }
    }
}

impl std::fmt::Debug for WakeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeGuard").field("tag", &self.tag).finish()
    }
}

impl Drop for WakeGuard {
    fn drop(&mut self) {
        self.hold.release(self.tag);
    }
}
