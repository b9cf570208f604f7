//! Bounded, interval-paced reconnection while the link is down.
//!
//! The [`ReconnectScheduler`] watches the link state. When the link drops
//! and reconnection is still wanted (the peer did not ask to stay
//! disconnected, or frames are waiting) it opens one [`ReconnectWindow`]
//! and issues a reconnect every interval until the link is back or the
//! window expires. A wake hold is kept for the lifetime of the window.

mod scheduler;
mod window;

pub use scheduler::{RECONNECT_WAKE_TAG, ReconnectScheduler, ReconnectStatus, ReconnectTarget};
pub use window::ReconnectWindow;
