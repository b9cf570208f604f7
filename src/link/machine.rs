//! Pure link state machine.
//!
//! [`LinkMachine::step`] consumes one [`LinkInput`] and returns the
//! [`Action`]s the engine must perform. It does no I/O and reads no clock,
//! so every transition can be driven directly in tests.

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::{LinkError, LinkState, NegotiatedLinkParams, PeerAddress, PeerIdentity, WriteMode};
use crate::transport::{GattProfile, GattService, TransportEvent};

use super::config::EngineConfig;

/// Where a session is within `Connecting`, or whether one exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SetupPhase {
    /// No transport session.
    #[default]
    Idle,
    /// Waiting for the low-level connection.
    Opening,
    /// Connected, waiting out the settle delay.
    Settling,
    /// Service discovery in progress.
    Discovering,
    /// Notification subscription in progress.
    Subscribing,
    /// Link usable.
    Ready,
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkInput {
    /// Connect to `target`. `availability` is the adapter readiness check.
    Connect {
        /// Peer to connect to.
        target: PeerIdentity,
        /// Result of the adapter readiness check.
        availability: Result<(), LinkError>,
    },
    /// Caller asked to disconnect.
    Disconnect,
    /// `reconnect` found nothing persisted.
    NoSavedPeer,
    /// The settle timer of session `epoch` fired.
    SettleElapsed {
        /// Session the timer belongs to.
        epoch: u64,
    },
    /// The MTU wait of session `epoch` ran out.
    MtuWaitElapsed {
        /// Session the timer belongs to.
        epoch: u64,
    },
    /// An adapter request was refused outright.
    SessionFailed(LinkError),
    /// Callback from the host stack.
    Transport(TransportEvent),
}

/// Effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Start a low-level connection.
    OpenSession(PeerAddress),
    /// Release every handle of the current session.
    CloseSession,
    /// Ask the transport for a graceful disconnect.
    RequestDisconnect,
    /// Fire `MtuWaitElapsed { epoch }` after `delay`.
    StartMtuTimer {
        /// Session the timer belongs to.
        epoch: u64,
        /// Longest wait for the MTU answer.
        delay: Duration,
    },
    /// Fire `SettleElapsed { epoch }` after `delay`.
    StartSettleTimer {
        /// Session the timer belongs to.
        epoch: u64,
        /// Settle delay.
        delay: Duration,
    },
    /// Start service discovery.
    DiscoverServices,
    /// Enable notifications on `characteristic` through `descriptor`.
    Subscribe {
        /// Notify characteristic.
        characteristic: Uuid,
        /// Notification configuration descriptor.
        descriptor: Uuid,
    },
    /// Request an MTU.
    RequestMtu(u16),
    /// Persist the peer.
    PersistIdentity(PeerIdentity),
    /// Start draining the outbound queue.
    FlushQueue,
    /// Feed inbound bytes to the decoder.
    Inbound(Vec<u8>),
    /// Publish an error.
    ReportError(LinkError),
    /// Clear the published error.
    ClearError,
}

/// Link state, owned by exactly one engine.
#[derive(Debug, Clone)]
pub struct LinkMachine {
    profile: GattProfile,
    settle_delay: Duration,
    requested_mtu: u16,
    mtu_wait: Duration,
    default_max_payload: usize,

    state: LinkState,
    phase: SetupPhase,
    peer: Option<PeerIdentity>,
    params: Option<NegotiatedLinkParams>,
    write_mode: WriteMode,
    epoch: u64,
}

impl LinkMachine {
    /// Create a disconnected machine, optionally knowing a persisted peer.
    pub fn new(config: &EngineConfig, peer: Option<PeerIdentity>) -> Self {
        Self {
            profile: config.profile,
            settle_delay: config.settle_delay,
            requested_mtu: config.requested_mtu,
            mtu_wait: config.mtu_wait,
            default_max_payload: config.default_max_payload,
            state: LinkState::Disconnected,
            phase: SetupPhase::Idle,
            peer,
            params: None,
            write_mode: WriteMode::default(),
            epoch: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Current setup phase.
    pub fn phase(&self) -> SetupPhase {
        self.phase
    }

    /// Known peer.
    pub fn peer(&self) -> Option<&PeerIdentity> {
        self.peer.as_ref()
    }

    /// Parameters of the current connection.
    ///
    /// Set once the MTU answer arrives, or when the wait for it runs out.
    pub fn params(&self) -> Option<NegotiatedLinkParams> {
        self.params
    }

    /// Session counter, bumped on every connect.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether the queue may be drained.
    pub fn is_ready(&self) -> bool {
        self.state == LinkState::Connected && self.params.is_some()
    }

    /// Whether a transport session exists.
    pub fn has_session(&self) -> bool {
        self.phase != SetupPhase::Idle
    }

    /// Apply one input.
    pub fn step(&mut self, input: LinkInput) -> Vec<Action> {
        match input {
            LinkInput::Connect {
                target,
                availability,
            } => self.on_connect(target, availability),
            LinkInput::Disconnect => self.on_disconnect(),
            LinkInput::NoSavedPeer => {
                if !self.has_session() {
                    self.state = LinkState::Disconnected;
                }
                vec![Action::ReportError(LinkError::NoSavedPeer)]
            }
            LinkInput::SettleElapsed { epoch } => {
                if epoch != self.epoch || self.phase != SetupPhase::Settling {
                    debug!(epoch, current = self.epoch, "ignoring stale settle timer");
                    return Vec::new();
                }
                self.phase = SetupPhase::Discovering;
                vec![Action::DiscoverServices]
            }
            LinkInput::MtuWaitElapsed { epoch } => {
                if epoch != self.epoch || self.phase != SetupPhase::Ready || self.params.is_some() {
                    return Vec::new();
                }
                warn!(epoch, "no mtu answer, using default payload size");
                self.settle_params(self.default_max_payload)
            }
            LinkInput::SessionFailed(err) => {
                if !self.has_session() {
                    debug!(error = %err, "ignoring failure without a session");
                    return Vec::new();
                }
                self.fail(err)
            }
            LinkInput::Transport(event) => self.on_event(event),
        }
    }

    fn on_connect(
        &mut self,
        target: PeerIdentity,
        availability: Result<(), LinkError>,
    ) -> Vec<Action> {
        if let Err(err) = availability {
            warn!(error = %err, address = %target.address, "transport not available");
            return vec![Action::ReportError(err)];
        }

        match self.state {
            LinkState::Connecting => {
                info!(address = %target.address, "connect ignored: already connecting");
                return Vec::new();
            }
            LinkState::Connected if self.is_current(&target.address) => {
                info!(address = %target.address, "connect ignored: already connected");
                return Vec::new();
            }
            _ => {}
        }

        let mut actions = Vec::new();
        if self.has_session() {
            actions.push(Action::CloseSession);
        }

        let display_name = target.display_name.or_else(|| {
            self.peer
                .as_ref()
                .filter(|p| p.address == target.address)
                .and_then(|p| p.display_name.clone())
        });
        let address = target.address;

        self.epoch += 1;
        self.state = LinkState::Connecting;
        self.phase = SetupPhase::Opening;
        self.params = None;
        self.write_mode = WriteMode::default();
        self.peer = Some(PeerIdentity::new(address.clone(), display_name));

        info!(address = %address, epoch = self.epoch, "connecting");
        actions.push(Action::OpenSession(address));
        actions
    }

    fn on_disconnect(&mut self) -> Vec<Action> {
        if !self.has_session() {
            debug!(state = %self.state, "disconnect without session");
            self.state = LinkState::Disconnected;
            return Vec::new();
        }
        info!(epoch = self.epoch, "disconnecting");
        self.reset_session(LinkState::Disconnected);
        vec![Action::RequestDisconnect, Action::CloseSession]
    }

    fn on_event(&mut self, event: TransportEvent) -> Vec<Action> {
        match (self.phase, event) {
            (SetupPhase::Opening, TransportEvent::Connected { address, name }) => {
                let name = name.or_else(|| self.peer.as_ref().and_then(|p| p.display_name.clone()));
                let identity = PeerIdentity::new(address, name);
                info!(address = %identity.address, name = ?identity.display_name, "transport connected");
                self.peer = Some(identity.clone());
                self.phase = SetupPhase::Settling;
                vec![
                    Action::PersistIdentity(identity),
                    Action::StartSettleTimer {
                        epoch: self.epoch,
                        delay: self.settle_delay,
                    },
                ]
            }

            (phase, TransportEvent::ConnectionFailed { status }) if phase != SetupPhase::Idle => {
                self.fail(LinkError::ConnectionFailed { status })
            }

            (phase, TransportEvent::Disconnected) if phase != SetupPhase::Idle => {
                info!(epoch = self.epoch, "transport disconnected");
                self.reset_session(LinkState::Disconnected);
                vec![Action::CloseSession]
            }

            (SetupPhase::Discovering, TransportEvent::ServicesDiscovered(Ok(services))) => {
                self.on_services(&services)
            }

            (SetupPhase::Discovering, TransportEvent::ServicesDiscovered(Err(status))) => {
                self.fail(LinkError::ServiceDiscoveryFailed { status })
            }

            (SetupPhase::Subscribing, TransportEvent::NotificationsEnabled(Ok(()))) => {
                self.state = LinkState::Connected;
                self.phase = SetupPhase::Ready;
                info!(epoch = self.epoch, write_mode = ?self.write_mode, "link connected");
                vec![
                    Action::ClearError,
                    Action::RequestMtu(self.requested_mtu),
                    Action::StartMtuTimer {
                        epoch: self.epoch,
                        delay: self.mtu_wait,
                    },
                ]
            }

            (SetupPhase::Subscribing, TransportEvent::NotificationsEnabled(Err(status))) => self
                .fail(LinkError::NotificationSubscribeFailed(format!(
                    "descriptor write failed (status {status})"
                ))),

            (SetupPhase::Ready, TransportEvent::MtuChanged(result)) => {
                let max_payload = match result {
                    Ok(Some(mtu)) => usize::from(mtu),
                    Ok(None) => self.default_max_payload,
                    Err(status) => {
                        warn!(status, "mtu negotiation failed, keeping defaults");
                        self.params
                            .map_or(self.default_max_payload, |params| params.max_payload)
                    }
                };
                match self.params.as_mut() {
                    Some(params) => {
                        params.max_payload = max_payload;
                        debug!(max_payload, "late mtu answer");
                        Vec::new()
                    }
                    None => self.settle_params(max_payload),
                }
            }

            (phase, TransportEvent::NameResolved(name)) if phase != SetupPhase::Idle => {
                match self.peer.as_mut() {
                    Some(peer) if peer.display_name.as_deref() != Some(name.as_str()) => {
                        debug!(name = %name, "peer name changed");
                        peer.display_name = Some(name);
                        vec![Action::PersistIdentity(peer.clone())]
                    }
                    _ => Vec::new(),
                }
            }

            (phase, TransportEvent::DataReceived(bytes)) if phase != SetupPhase::Idle => {
                vec![Action::Inbound(bytes)]
            }

            (SetupPhase::Ready, TransportEvent::WriteCompleted(Err(status))) => {
                vec![Action::ReportError(LinkError::WriteRejected { status })]
            }

            (SetupPhase::Ready, TransportEvent::WriteCompleted(Ok(()))) => Vec::new(),

            (phase, event) => {
                debug!(?phase, ?event, "ignoring event out of phase");
                Vec::new()
            }
        }
    }

    /// Fix the link parameters and start draining the queue.
    fn settle_params(&mut self, max_payload: usize) -> Vec<Action> {
        let params = NegotiatedLinkParams {
            max_payload,
            write_mode: self.write_mode,
        };
        self.params = Some(params);
        info!(epoch = self.epoch, max_payload, write_mode = ?params.write_mode, "link ready");
        vec![Action::FlushQueue]
    }

    fn on_services(&mut self, services: &[GattService]) -> Vec<Action> {
        let Some(service) = services.iter().find(|s| s.uuid == self.profile.service) else {
            return self.fail(LinkError::ServiceNotFound);
        };
        let notify = service.characteristic(self.profile.notify_characteristic);
        let write = service.characteristic(self.profile.write_characteristic);
        let (Some(notify), Some(write)) = (notify, write) else {
            return self.fail(LinkError::CharacteristicNotFound);
        };
        if !notify.has_descriptor(self.profile.cccd) {
            return self.fail(LinkError::NotificationSubscribeFailed(
                "notification descriptor missing".to_string(),
            ));
        }

        self.write_mode = write.write_mode();
        self.phase = SetupPhase::Subscribing;
        debug!(write_mode = ?self.write_mode, "services resolved");
        vec![Action::Subscribe {
            characteristic: self.profile.notify_characteristic,
            descriptor: self.profile.cccd,
        }]
    }

    fn fail(&mut self, err: LinkError) -> Vec<Action> {
        warn!(error = %err, epoch = self.epoch, phase = ?self.phase, "link failed");
        self.reset_session(LinkState::Error);
        vec![Action::ReportError(err), Action::CloseSession]
    }

    fn reset_session(&mut self, state: LinkState) {
        self.state = state;
        self.phase = SetupPhase::Idle;
        self.params = None;
        self.write_mode = WriteMode::default();
    }

    fn is_current(&self, address: &PeerAddress) -> bool {
        self.peer.as_ref().is_some_and(|p| &p.address == address)
    }
}
