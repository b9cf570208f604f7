//! Core types, constants, errors and host capabilities.
//!
//! Nothing in here performs I/O or depends on an async runtime.

pub mod constants;
mod error;
mod traits;
mod types;

pub use error::*;
pub use traits::{IdentityStore, NoopWakeHold, WakeGuard, WakeHold};
pub use types::*;

#[cfg(test)]
pub(crate) use traits::testing;
