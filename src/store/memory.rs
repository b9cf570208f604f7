//! In-memory identity store.

use parking_lot::Mutex;

use crate::core::{IdentityStore, PeerIdentity, StoreError};

/// Keeps the last peer in memory only.
#[derive(Debug, Default)]
pub struct MemoryStore {
    identity: Mutex<Option<PeerIdentity>>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `identity`.
    pub fn with_identity(identity: PeerIdentity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }

    /// Current contents.
    pub fn get(&self) -> Option<PeerIdentity> {
        self.identity.lock().clone()
    }
}

impl IdentityStore for MemoryStore {
    fn load(&self) -> Result<Option<PeerIdentity>, StoreError> {
        Ok(self.get())
    }

    fn save(&self, identity: &PeerIdentity) -> Result<(), StoreError> {
        *self.identity.lock() = Some(identity.clone());
        Ok(())
    }
}
