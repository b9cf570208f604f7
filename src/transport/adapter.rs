//! The host transport seam.

use async_trait::async_trait;
use uuid::Uuid;

use crate::core::{GattStatus, PeerAddress, TransportError, WriteMode};

use super::gatt::GattService;

/// Asynchronous callbacks from the host stack.
///
/// Posted through a [`TransportEventSink`](crate::link::TransportEventSink)
/// and applied by the engine one at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Low-level connection is up.
    Connected {
        /// Peer address.
        address: PeerAddress,
        /// Name the stack knows for the peer.
        name: Option<String>,
    },
    /// Connection attempt or established connection failed.
    ConnectionFailed {
        /// Stack status.
        status: GattStatus,
    },
    /// Connection closed cleanly (by either side).
    Disconnected,
    /// Service discovery finished.
    ServicesDiscovered(Result<Vec<GattService>, GattStatus>),
    /// Notification-configuration descriptor write finished.
    NotificationsEnabled(Result<(), GattStatus>),
    /// MTU exchange finished; `None` when the stack does not report a value.
    MtuChanged(Result<Option<u16>, GattStatus>),
    /// Peer reported (or changed) its name.
    NameResolved(String),
    /// Notification payload from the peer.
    DataReceived(Vec<u8>),
    /// Peer acknowledged (or refused) a write request.
    WriteCompleted(Result<(), GattStatus>),
}

/// Operations the engine needs from the host stack.
///
/// Methods return once the stack accepted the request; outcomes that the
/// stack reports later arrive as [`TransportEvent`]s. An `Err` means the
/// request was refused outright.
#[async_trait]
pub trait TransportAdapter: Send + Sync + 'static {
    /// Adapter present, enabled and permitted.
    fn check_ready(&self) -> Result<(), TransportError>;

    /// Start connecting. Outcome: `Connected` or `ConnectionFailed`.
    async fn open(&self, address: &PeerAddress) -> Result<(), TransportError>;

    /// Start service discovery. Outcome: `ServicesDiscovered`.
    async fn discover_services(&self) -> Result<(), TransportError>;

    /// Enable notifications and write `descriptor`. Outcome: `NotificationsEnabled`.
    async fn enable_notifications(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
    ) -> Result<(), TransportError>;

    /// Request an MTU. Outcome: `MtuChanged`.
    async fn request_mtu(&self, mtu: u16) -> Result<(), TransportError>;

    /// Write one chunk. Returns when the stack accepted it.
    async fn write(
        &self,
        characteristic: Uuid,
        chunk: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError>;

    /// Start a graceful disconnect. Outcome: `Disconnected`.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Release every handle of the current session. Infallible and idempotent.
    async fn close(&self);
}
