//! Cheap, cloneable access to a running [`LinkEngine`](super::LinkEngine).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::control::{DeviceTelemetry, OutboundMessage};
use crate::core::{
    LinkError, LinkResult, LinkState, NegotiatedLinkParams, PeerAddress, PeerIdentity,
};
use crate::queue::OutboundQueue;
use crate::reconnect::ReconnectTarget;
use crate::transport::TransportEvent;

use super::config::ReconnectConfig;
use super::engine::now;
use super::machine::SetupPhase;

/// Message processed by the engine task.
#[derive(Debug)]
pub(crate) enum Command {
    Connect {
        address: PeerAddress,
        name_hint: Option<String>,
    },
    Reconnect,
    Disconnect,
    Send(Vec<u8>),
    Transport(TransportEvent),
    SettleElapsed {
        epoch: u64,
    },
    MtuWaitElapsed {
        epoch: u64,
    },
    FlushTick {
        epoch: u64,
    },
    Snapshot(oneshot::Sender<LinkSnapshot>),
    Shutdown,
}

/// State shared by the engine and every handle.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) queue: OutboundQueue,
    pub(crate) suppressed: AtomicBool,
}

/// Receivers for everything the engine publishes.
#[derive(Debug, Clone)]
pub(crate) struct Observers {
    pub(crate) state: watch::Receiver<LinkState>,
    pub(crate) display_name: watch::Receiver<Option<String>>,
    pub(crate) last_error: watch::Receiver<Option<LinkError>>,
    pub(crate) telemetry: watch::Receiver<Option<DeviceTelemetry>>,
    pub(crate) lines: broadcast::Sender<String>,
}

/// Point-in-time view of the engine, taken on the engine task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSnapshot {
    /// Link state.
    pub state: LinkState,
    /// Setup phase of the current session.
    pub phase: SetupPhase,
    /// Known peer.
    pub peer: Option<PeerIdentity>,
    /// Parameters of the current connection; `None` until the MTU is settled.
    pub params: Option<NegotiatedLinkParams>,
    /// Frames waiting in the outbound queue.
    pub pending: usize,
    /// Whether the peer asked not to be reconnected.
    pub suppressed: bool,
    /// Last reported error.
    pub last_error: Option<LinkError>,
}

/// Where the host's transport glue posts its callbacks.
///
/// Posting never blocks and may be done from any thread.
#[derive(Debug, Clone)]
pub struct TransportEventSink {
    tx: mpsc::UnboundedSender<Command>,
}

impl TransportEventSink {
    /// Post `event` to the engine. Returns `false` once the engine stopped.
    pub fn post(&self, event: TransportEvent) -> bool {
        self.tx.send(Command::Transport(event)).is_ok()
    }
}

/// Handle to the link engine.
///
/// Every command is applied on the engine task in the order it was issued.
/// Commands return as soon as they are queued; outcomes are observed
/// through the watch channels.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    observers: Observers,
    reconnect: ReconnectConfig,
}

impl LinkHandle {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<Command>,
        shared: Arc<Shared>,
        observers: Observers,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            tx,
            shared,
            observers,
            reconnect,
        }
    }

    fn command(&self, command: Command) -> LinkResult<()> {
        self.tx.send(command).map_err(|_| LinkError::EngineClosed)
    }

    /// Connect to `address`.
    ///
    /// No-op while connecting, or when already connected to `address`.
    pub fn connect(
        &self,
        address: impl Into<PeerAddress>,
        name_hint: Option<String>,
    ) -> LinkResult<()> {
        self.command(Command::Connect {
            address: address.into(),
            name_hint,
        })
    }

    /// Connect to the last persisted peer.
    pub fn reconnect(&self) -> LinkResult<()> {
        self.command(Command::Reconnect)
    }

    /// Disconnect. Idempotent.
    pub fn disconnect(&self) -> LinkResult<()> {
        self.command(Command::Disconnect)
    }

    /// Send one frame payload (without terminator).
    ///
    /// Queued while the link is not ready; queuing while down also starts
    /// a reconnect.
    pub fn send(&self, payload: impl Into<Vec<u8>>) -> LinkResult<()> {
        self.command(Command::Send(payload.into()))
    }

    /// Send a control message.
    pub fn send_message(&self, message: &OutboundMessage) -> LinkResult<()> {
        self.send(message.to_frame())
    }

    /// Push the current local time.
    pub fn send_datetime(&self) -> LinkResult<()> {
        self.send_message(&OutboundMessage::datetime_now())
    }

    /// Send the `{"status":"read"}` ping.
    pub fn send_status(&self) -> LinkResult<()> {
        self.send_message(&OutboundMessage::status_read())
    }

    /// Forward a notification, stamped with the current local time.
    pub fn send_notification(
        &self,
        app: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> LinkResult<()> {
        self.send_message(&OutboundMessage::notification(app, title, message))
    }

    /// Whether the peer has not asked to stay disconnected.
    pub fn should_auto_reconnect(&self) -> bool {
        !self.shared.suppressed.load(Ordering::SeqCst)
    }

    /// Forget a peer request to stay disconnected.
    pub fn clear_reconnect_suppression(&self) {
        self.shared.suppressed.store(false, Ordering::SeqCst);
    }

    /// Whether unexpired frames are waiting.
    pub fn has_pending_to_send(&self) -> bool {
        !self.shared.queue.is_empty_at(now())
    }

    /// Number of unexpired frames waiting.
    pub fn pending_len(&self) -> usize {
        self.shared.queue.len_at(now())
    }

    /// Take a snapshot on the engine task.
    ///
    /// Resolves after every command issued before it has been applied.
    pub async fn snapshot(&self) -> LinkResult<LinkSnapshot> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Snapshot(tx))?;
        rx.await.map_err(|_| LinkError::EngineClosed)
    }

    /// Stop the engine, closing any session.
    pub fn shutdown(&self) -> LinkResult<()> {
        self.command(Command::Shutdown)
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        *self.observers.state.borrow()
    }

    /// Observe the link state.
    pub fn watch_state(&self) -> watch::Receiver<LinkState> {
        self.observers.state.clone()
    }

    /// Observe the peer display name (name, falling back to address).
    pub fn watch_display_name(&self) -> watch::Receiver<Option<String>> {
        self.observers.display_name.clone()
    }

    /// Observe the last error; `None` once a connection succeeds.
    pub fn watch_last_error(&self) -> watch::Receiver<Option<LinkError>> {
        self.observers.last_error.clone()
    }

    /// Observe battery and activity reports.
    pub fn watch_telemetry(&self) -> watch::Receiver<Option<DeviceTelemetry>> {
        self.observers.telemetry.clone()
    }

    /// Receive every decoded inbound line.
    pub fn subscribe_lines(&self) -> broadcast::Receiver<String> {
        self.observers.lines.subscribe()
    }

    /// Sink for transport callbacks.
    pub fn transport_events(&self) -> TransportEventSink {
        TransportEventSink {
            tx: self.tx.clone(),
        }
    }
}

impl ReconnectTarget for LinkHandle {
    fn reconnect(&self) {
        if let Err(err) = LinkHandle::reconnect(self) {
            tracing::debug!(error = %err, "reconnect not issued");
        }
    }

    fn should_auto_reconnect(&self) -> bool {
        LinkHandle::should_auto_reconnect(self)
    }

    fn has_pending_to_send(&self) -> bool {
        LinkHandle::has_pending_to_send(self)
    }

    fn subscribe_state(&self) -> watch::Receiver<LinkState> {
        self.watch_state()
    }

    fn reconnect_config(&self) -> ReconnectConfig {
        self.reconnect
    }
}
