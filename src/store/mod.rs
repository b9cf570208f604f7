//! Persisted peer identity.
//!
//! Implementations of [`IdentityStore`](crate::core::IdentityStore).

#[cfg(feature = "file-store")]
mod file;
mod memory;

#[cfg(feature = "file-store")]
#[cfg_attr(docsrs, doc(cfg(feature = "file-store")))]
pub use file::JsonFileStore;
pub use memory::MemoryStore;
