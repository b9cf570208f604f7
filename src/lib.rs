//! # PeerLink
//!
//! Link management and framed-message engine for a single low-power
//! peripheral reached over a connection-oriented, GATT-style transport.
//!
//! PeerLink keeps one logical link to one peer alive and usable:
//!
//! - **Lifecycle**: connect, service/characteristic resolution, notification
//!   subscription and MTU negotiation, driven by a pure state machine
//! - **Framing**: newline-terminated frames, MTU-aware chunking, reassembly
//!   of lines split across packets
//! - **Delivery**: a TTL-bounded FIFO for frames produced while the link is
//!   down, flushed in order once it is back
//! - **Reconnection**: time-boxed, interval-paced windows that respect the
//!   peer's request to stay disconnected unless data is still pending
//! - **Control**: time-sync and sleep hints embedded in the data stream
//!
//! The host supplies the radio through [`TransportAdapter`], persistence
//! through [`IdentityStore`] and power management through [`WakeHold`].
//!
//! ## Feature Flags
//!
//! - `engine` (default): the async engine, reconnection scheduler and
//!   transport seam (tokio)
//! - `file-store` (default): JSON-file identity store
//!
//! ## Modules
//!
//! - [`core`]: constants, errors, shared types and host capabilities
//! - [`codec`]: framing codec and chunker
//! - [`queue`]: outbound queue
//! - [`control`]: remote-control sub-protocol and telemetry
//! - [`store`]: identity stores
//! - [`transport`]: adapter trait and events (requires `engine`)
//! - [`link`]: state machine, engine and handle (requires `engine`)
//! - [`reconnect`]: reconnection scheduler (requires `engine`)
//!
//! ## Example Usage
//!
//! ```rust
//! use peerlink::prelude::*;
//!
//! // Outbound: one frame, split for a 23-byte MTU.
//! let frame = encode_frame(&OutboundMessage::status_read().to_frame());
//! let chunker = Chunker::new(23);
//! let chunks: Vec<&[u8]> = chunker.split(&frame).collect();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0], b"{\"status\":\"read\"}\n");
//!
//! // Inbound: a line split across two notifications.
//! let mut decoder = LineDecoder::new();
//! assert!(decoder.push(b"{\"request\":").is_empty());
//! let lines = decoder.push(b"\"time\"}\r\n");
//! assert_eq!(interpret(&lines[0]), Some(ControlIntent::TimeSync));
//! ```
//!
//! Wiring the engine on a host:
//!
//! ```rust,ignore
//! let handle = LinkEngine::spawn(
//!     EngineConfig::default(),
//!     Arc::new(HostRadio::new()),
//!     Arc::new(JsonFileStore::new(data_dir.join("peer.json"))),
//!     Arc::new(NoopWakeHold),
//! );
//! radio.set_event_sink(handle.transport_events());
//! let _scheduler = ReconnectScheduler::spawn(handle.clone(), Arc::new(NoopWakeHold));
//! handle.connect("C8:2B:96:0A:11:7E", Some("S3 Watch".into()))?;
//! handle.send_notification("com.chat", "Ana", "on my way")?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Framing, queueing and the control sub-protocol (always included)
pub mod codec;
pub mod control;
pub mod queue;

// Identity persistence
pub mod store;

// Transport seam (feature-gated)
#[cfg(feature = "engine")]
#[cfg_attr(docsrs, doc(cfg(feature = "engine")))]
pub mod transport;

// Link engine (feature-gated)
#[cfg(feature = "engine")]
#[cfg_attr(docsrs, doc(cfg(feature = "engine")))]
pub mod link;

// Reconnection scheduler (feature-gated)
#[cfg(feature = "engine")]
#[cfg_attr(docsrs, doc(cfg(feature = "engine")))]
pub mod reconnect;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::codec::{Chunker, LineDecoder, chunk_size_for, encode_frame};
    pub use crate::control::{ControlIntent, DeviceTelemetry, OutboundMessage, interpret};
    pub use crate::queue::{OutboundQueue, PendingFrame};
    pub use crate::store::MemoryStore;

    #[cfg(feature = "file-store")]
    pub use crate::store::JsonFileStore;

    // Engine types (when enabled)
    #[cfg(feature = "engine")]
    pub use crate::link::{
        EngineConfig, EngineConfigBuilder, LinkEngine, LinkHandle, LinkSnapshot, ReconnectConfig,
        TransportEventSink,
    };
    #[cfg(feature = "engine")]
    pub use crate::reconnect::{ReconnectScheduler, ReconnectStatus, ReconnectTarget};
    #[cfg(feature = "engine")]
    pub use crate::transport::{
        GattCharacteristic, GattProfile, GattService, TransportAdapter, TransportEvent,
    };
}

// Re-export commonly used items at crate root
pub use crate::core::{
    IdentityStore, LinkError, LinkResult, LinkState, PeerAddress, PeerIdentity, WakeHold,
};

#[cfg(feature = "engine")]
pub use link::{EngineConfig, LinkEngine, LinkHandle, TransportEventSink};
#[cfg(feature = "engine")]
pub use reconnect::ReconnectScheduler;
#[cfg(feature = "engine")]
pub use transport::{TransportAdapter, TransportEvent};
