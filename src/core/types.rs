//! Shared link data model.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::DEFAULT_MAX_PAYLOAD;

/// Link lifecycle state as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LinkState {
    /// No session.
    #[default]
    Disconnected,
    /// Session opening or being negotiated.
    Connecting,
    /// Notifications confirmed, link usable.
    Connected,
    /// Last session ended with a failure.
    Error,
}

impl LinkState {
    /// Whether a session is in progress or established.
    pub fn is_active(self) -> bool {
        matches!(self, LinkState::Connecting | LinkState::Connected)
    }

    /// Whether the reconnection scheduler should consider this state.
    pub fn is_down(self) -> bool {
        matches!(self, LinkState::Disconnected | LinkState::Error)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
            LinkState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Opaque transport identifier of a peer (e.g. a MAC address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(String);

impl PeerAddress {
    /// Wrap an address string.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Address as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PeerAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The single peer this engine talks to.
///
/// Retained across disconnects so the link can be re-established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Transport address.
    pub address: PeerAddress,
    /// Name reported by the peer or supplied as a hint.
    #[serde(rename = "name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl PeerIdentity {
    /// Create an identity.
    pub fn new(address: impl Into<PeerAddress>, display_name: Option<String>) -> Self {
        Self {
            address: address.into(),
            display_name,
        }
    }

    /// Name to show, falling back to the address.
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.address.to_string())
    }
}

/// How chunks are written to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Write request; the peer acknowledges each chunk.
    #[default]
    AckRequired,
    /// Write command; no acknowledgment.
    NoAck,
}

/// Parameters fixed once per connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedLinkParams {
    /// Negotiated MTU, including transport header.
    pub max_payload: usize,
    /// Write mode chosen from the characteristic properties.
    pub write_mode: WriteMode,
}

impl Default for NegotiatedLinkParams {
    fn default() -> Self {
        Self {
            max_payload: DEFAULT_MAX_PAYLOAD,
            write_mode: WriteMode::AckRequired,
        }
    }
}
