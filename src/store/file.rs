//! JSON-file identity store.
//!
//! The file is a JSON object keyed by namespace; this store only touches
//! its own key, so the file can be shared with other preference owners:
//!
//! ```json
//! { "peerlink": { "address": "D4:8A:FC:11:22:33", "name": "S3 Watch" } }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::constants::STORE_NAMESPACE;
use crate::core::{IdentityStore, PeerIdentity, StoreError};

/// Persists the last peer into a namespaced JSON document.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    namespace: String,
    // Serializes read-modify-write cycles from this process.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Store at `path` using the default namespace.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_namespace(path, STORE_NAMESPACE)
    }

    /// Store at `path` under `namespace`.
    pub fn with_namespace(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            namespace: namespace.into(),
            lock: Mutex::new(()),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&text)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    fn write_document(&self, doc: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl IdentityStore for JsonFileStore {
    fn load(&self) -> Result<Option<PeerIdentity>, StoreError> {
        let _guard = self.lock.lock();
        let mut doc = self.read_document()?;
        match doc.remove(&self.namespace) {
            Some(value) => Ok(serde_json::from_value(value).ok()),
            None => Ok(None),
        }
    }

    fn save(&self, identity: &PeerIdentity) -> Result<(), StoreError> {
        let _guard = self.lock.lock();
        let mut doc = self.read_document()?;
        doc.insert(self.namespace.clone(), serde_json::to_value(identity)?);
        self.write_document(&doc)?;
        debug!(path = %self.path.display(), address = %identity.address, "persisted peer");
        Ok(())
    }
}
