//! Transport seam between the link engine and the host radio stack.
//!
//! The engine never talks to hardware directly. It issues requests through
//! a [`TransportAdapter`] supplied by the host, and the host reports the
//! asynchronous outcomes back as [`TransportEvent`]s.
//!
//! ```text
//! ┌───────────────┐  open / discover / subscribe / write  ┌──────────────┐
//! │  LinkEngine   │ ─────────────────────────────────────▶│  Transport   │
//! │ (single task) │                                        │   Adapter    │
//! │               │ ◀───────────────────────────────────── │ (host glue)  │
//! └───────────────┘      TransportEvent via event sink     └──────────────┘
//! ```

mod adapter;
mod gatt;
#[cfg(test)]
pub(crate) mod mock;

pub use adapter::{TransportAdapter, TransportEvent};
pub use gatt::{GattCharacteristic, GattProfile, GattService};
