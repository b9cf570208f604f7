//! Outbound delivery queue.

mod outbound;

pub use outbound::{OutboundQueue, PendingFrame};
