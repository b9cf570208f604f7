//! Error types for the link engine.

use thiserror::Error;

/// GATT status code reported by the host stack.
pub type GattStatus = i32;

/// Errors surfaced by the link engine.
///
/// None of these are fatal to the process: after any of them the engine is
/// back in `Disconnected` or `Error` and accepts new commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Adapter missing or switched off.
    #[error("transport unavailable")]
    TransportUnavailable,

    /// Host platform refused the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The adapter rejected the peer address.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// Low-level connection failed or dropped with an error status.
    #[error("connection failed (status {status})")]
    ConnectionFailed {
        /// Stack status code.
        status: GattStatus,
    },

    /// Service discovery itself failed.
    #[error("service discovery failed (status {status})")]
    ServiceDiscoveryFailed {
        /// Stack status code.
        status: GattStatus,
    },

    /// Required service absent on the peer.
    #[error("required service not found")]
    ServiceNotFound,

    /// One of the data characteristics is absent.
    #[error("required characteristic not found")]
    CharacteristicNotFound,

    /// Enabling notifications on the peer failed.
    #[error("notification subscribe failed: {0}")]
    NotificationSubscribeFailed(String),

    /// A chunk write was rejected; the rest of the frame was not sent.
    #[error("write failed at chunk {chunk}: {reason}")]
    WriteFailed {
        /// Index of the rejected chunk.
        chunk: usize,
        /// Transport-provided reason.
        reason: String,
    },

    /// The peer refused an acknowledged write after the stack accepted it.
    #[error("peer rejected write (status {status})")]
    WriteRejected {
        /// Stack status code.
        status: GattStatus,
    },

    /// `reconnect` was called but no peer was ever persisted.
    #[error("no saved peer to reconnect to")]
    NoSavedPeer,

    /// Identity persistence failed.
    #[error("identity store error: {0}")]
    Store(String),

    /// The engine task has stopped.
    #[error("link engine closed")]
    EngineClosed,
}

impl LinkError {
    /// Check if this error ends the current transport session.
    ///
    /// Session-fatal errors move the link to `Error` and tear down the
    /// low-level session before anything else happens.
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            LinkError::InvalidAddress(_)
                | LinkError::ConnectionFailed { .. }
                | LinkError::ServiceDiscoveryFailed { .. }
                | LinkError::ServiceNotFound
                | LinkError::CharacteristicNotFound
                | LinkError::NotificationSubscribeFailed(_)
        )
    }

    /// Check if automatic reconnection may help.
    ///
    /// Adapter and permission problems need external action first.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LinkError::TransportUnavailable
                | LinkError::PermissionDenied(_)
                | LinkError::InvalidAddress(_)
                | LinkError::NoSavedPeer
                | LinkError::EngineClosed
        )
    }

    /// Check if the user has to act before the link can come up.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            LinkError::TransportUnavailable
                | LinkError::PermissionDenied(_)
                | LinkError::NoSavedPeer
        )
    }
}

/// Failure reported by a [`TransportAdapter`](crate::transport::TransportAdapter) call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No usable adapter.
    #[error("adapter unavailable")]
    Unavailable,

    /// Platform permission missing.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Address not understood by the adapter.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Operation refused by the stack.
    #[error("rejected (status {status}): {message}")]
    Rejected {
        /// Stack status code.
        status: GattStatus,
        /// Human-readable detail.
        message: String,
    },

    /// No session is open.
    #[error("not connected")]
    NotConnected,
}

impl TransportError {
    /// Stack status carried by the error, if any.
    pub fn status(&self) -> GattStatus {
        match self {
            TransportError::Rejected { status, .. } => *status,
            _ => -1,
        }
    }
}

/// Errors from an [`IdentityStore`](super::IdentityStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        LinkError::Store(err.to_string())
    }
}

/// Result type for engine operations.
pub type LinkResult<T> = Result<T, LinkError>;
