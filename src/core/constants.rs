//! Protocol and timing constants.
//!
//! These seed [`EngineConfig`](crate::link::EngineConfig) defaults. Hosts
//! override them through the builder, never by editing these values.

use std::time::Duration;

use uuid::{Uuid, uuid};

// =============================================================================
// GATT LAYOUT (Nordic UART Service)
// =============================================================================

/// Primary service carrying the framed message stream.
pub const DEFAULT_SERVICE_UUID: Uuid = uuid!("6e400001-b5a3-f393-e0a9-e50e24dcca9e");

/// Host -> peer characteristic (write).
pub const DEFAULT_WRITE_CHARACTERISTIC_UUID: Uuid = uuid!("6e400002-b5a3-f393-e0a9-e50e24dcca9e");

/// Peer -> host characteristic (notify).
pub const DEFAULT_NOTIFY_CHARACTERISTIC_UUID: Uuid =
    uuid!("6e400003-b5a3-f393-e0a9-e50e24dcca9e");

/// Client Characteristic Configuration Descriptor.
pub const CCCD_UUID: Uuid = uuid!("00002902-0000-1000-8000-00805f9b34fb");

// =============================================================================
// FRAMING
// =============================================================================

/// Frame terminator on the wire.
pub const FRAME_TERMINATOR: u8 = b'\n';

/// Max payload assumed before (or without) MTU negotiation.
/// Includes the ATT header.
pub const DEFAULT_MAX_PAYLOAD: usize = 503;

/// ATT header bytes subtracted from the negotiated MTU.
pub const ATT_HEADER_OVERHEAD: usize = 3;

/// Chunks never shrink below this size.
pub const MIN_CHUNK_SIZE: usize = 20;

/// MTU requested once notifications are enabled.
pub const REQUESTED_MTU: u16 = 128;

// =============================================================================
// TIMING
// =============================================================================

/// Wait after the low-level connect before discovering services.
pub const SETTLE_DELAY: Duration = Duration::from_millis(600);

/// Longest wait for the MTU answer before the queue is flushed with defaults.
pub const MTU_WAIT: Duration = Duration::from_millis(500);

/// Gap between queued frames during a flush.
pub const FLUSH_PACING: Duration = Duration::from_millis(10);

/// Maximum age of a queued frame.
pub const QUEUE_TTL: Duration = Duration::from_secs(60);

/// Upper bound on the wake hold taken while writing one frame.
pub const SEND_WAKE_HOLD: Duration = Duration::from_secs(10);

/// Pause between reconnection attempts.
pub const RECONNECT_INTERVAL: Duration = Duration::from_secs(15);

/// Length of one reconnection window.
pub const RECONNECT_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Extra wake-hold time on top of the reconnection window.
pub const RECONNECT_WAKE_MARGIN: Duration = Duration::from_secs(10);

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Namespace under which the last peer is stored.
pub const STORE_NAMESPACE: &str = "peerlink";
