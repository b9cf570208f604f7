//! Link engine task.
//!
//! One task owns the [`LinkMachine`] and is the only writer of link state.
//! Commands from [`LinkHandle`]s, callbacks posted through the
//! [`TransportEventSink`](super::TransportEventSink) and timer firings all
//! arrive on one channel and are applied strictly one at a time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::codec::{Chunker, LineDecoder, encode_frame};
use crate::control::{ControlIntent, DeviceTelemetry, OutboundMessage, interpret};
use crate::core::{
    IdentityStore, LinkError, LinkState, NegotiatedLinkParams, PeerIdentity, TransportError,
    WakeGuard, WakeHold,
};
use crate::queue::OutboundQueue;
use crate::transport::{TransportAdapter, TransportEvent};

use super::config::EngineConfig;
use super::handle::{Command, LinkHandle, LinkSnapshot, Observers, Shared};
use super::machine::{Action, LinkInput, LinkMachine};

/// Capacity of the inbound line broadcast.
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Wake-hold tag used while a frame is written.
const SEND_WAKE_TAG: &str = "send";

/// Current time on the runtime clock.
///
/// Follows tokio's clock so paused-time tests see consistent queue ages.
pub(crate) fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

/// The link engine.
pub struct LinkEngine {
    config: EngineConfig,
    machine: LinkMachine,
    adapter: Arc<dyn TransportAdapter>,
    store: Arc<dyn IdentityStore>,
    wake: Arc<dyn WakeHold>,
    shared: Arc<Shared>,
    decoder: LineDecoder,

    commands: mpsc::UnboundedReceiver<Command>,
    self_tx: mpsc::WeakUnboundedSender<Command>,

    flushing: bool,
    settle_timer: Option<JoinHandle<()>>,
    mtu_timer: Option<JoinHandle<()>>,
    flush_timer: Option<JoinHandle<()>>,

    state_tx: watch::Sender<LinkState>,
    name_tx: watch::Sender<Option<String>>,
    error_tx: watch::Sender<Option<LinkError>>,
    telemetry_tx: watch::Sender<Option<DeviceTelemetry>>,
    lines_tx: broadcast::Sender<String>,
}

impl LinkEngine {
    /// Create an engine and its first handle.
    ///
    /// The persisted peer, if any, is loaded now so its name is observable
    /// before the first connection.
    pub fn new(
        config: EngineConfig,
        adapter: Arc<dyn TransportAdapter>,
        store: Arc<dyn IdentityStore>,
        wake: Arc<dyn WakeHold>,
    ) -> (Self, LinkHandle) {
        let saved = match store.load() {
            Ok(saved) => saved,
            Err(err) => {
                warn!(error = %err, "failed to load persisted peer");
                None
            }
        };
        let machine = LinkMachine::new(&config, saved.clone());

        let (tx, commands) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(LinkState::Disconnected);
        let (name_tx, display_name) = watch::channel(saved.as_ref().map(PeerIdentity::label));
        let (error_tx, last_error) = watch::channel(None);
        let (telemetry_tx, telemetry) = watch::channel(None);
        let (lines_tx, _) = broadcast::channel(LINE_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            queue: OutboundQueue::with_ttl(config.queue_ttl),
            suppressed: AtomicBool::new(false),
        });
        let observers = Observers {
            state,
            display_name,
            last_error,
            telemetry,
            lines: lines_tx.clone(),
        };
        let handle = LinkHandle::new(tx.clone(), shared.clone(), observers, config.reconnect);

        let engine = Self {
            config,
            machine,
            adapter,
            store,
            wake,
            shared,
            decoder: LineDecoder::new(),
            commands,
            self_tx: tx.downgrade(),
            flushing: false,
            settle_timer: None,
            mtu_timer: None,
            flush_timer: None,
            state_tx,
            name_tx,
            error_tx,
            telemetry_tx,
            lines_tx,
        };
        (engine, handle)
    }

    /// Create an engine and run it on the current tokio runtime.
    pub fn spawn(
        config: EngineConfig,
        adapter: Arc<dyn TransportAdapter>,
        store: Arc<dyn IdentityStore>,
        wake: Arc<dyn WakeHold>,
    ) -> LinkHandle {
        let (engine, handle) = Self::new(config, adapter, store, wake);
        tokio::spawn(engine.run());
        handle
    }

    /// Process commands until shutdown or until every handle is dropped.
    pub async fn run(mut self) {
        info!("link engine started");
        while let Some(command) = self.commands.recv().await {
            if !self.handle_command(command).await {
                break;
            }
        }
        self.stop_timers();
        if self.machine.has_session() {
            self.adapter.close().await;
        }
        info!("link engine stopped");
    }

    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Connect { address, name_hint } => {
                self.connect(PeerIdentity::new(address, name_hint)).await;
            }
            Command::Reconnect => self.reconnect().await,
            Command::Disconnect => self.apply(LinkInput::Disconnect).await,
            Command::Send(payload) => self.send(payload).await,
            Command::Transport(event) => self.apply(LinkInput::Transport(event)).await,
            Command::SettleElapsed { epoch } => {
                self.settle_timer = None;
                self.apply(LinkInput::SettleElapsed { epoch }).await;
            }
            Command::MtuWaitElapsed { epoch } => {
                self.mtu_timer = None;
                self.apply(LinkInput::MtuWaitElapsed { epoch }).await;
            }
            Command::FlushTick { epoch } => {
                self.flush_timer = None;
                if epoch == self.machine.epoch() && self.flushing {
                    self.flush_step().await;
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => return false,
        }
        true
    }

    async fn connect(&mut self, target: PeerIdentity) {
        let availability = self.adapter.check_ready().map_err(availability_error);
        self.apply(LinkInput::Connect {
            target,
            availability,
        })
        .await;
    }

    async fn reconnect(&mut self) {
        match self.store.load() {
            Ok(Some(identity)) => {
                debug!(address = %identity.address, "reconnecting to saved peer");
                self.connect(identity).await;
            }
            Ok(None) => self.apply(LinkInput::NoSavedPeer).await,
            Err(err) => {
                warn!(error = %err, "failed to load persisted peer");
                self.report(err.into());
            }
        }
    }

    /// Run `input` and every follow-up input produced by failing actions.
    async fn apply(&mut self, input: LinkInput) {
        let mut inputs = VecDeque::from([input]);
        while let Some(input) = inputs.pop_front() {
            for action in self.machine.step(input) {
                if let Some(follow_up) = self.execute(action).await {
                    inputs.push_back(follow_up);
                }
            }
        }
        self.publish();
    }

    async fn execute(&mut self, action: Action) -> Option<LinkInput> {
        match action {
            Action::OpenSession(address) => {
                self.decoder.reset();
                if let Err(err) = self.adapter.open(&address).await {
                    return Some(LinkInput::SessionFailed(open_error(err)));
                }
            }
            Action::CloseSession => {
                self.stop_timers();
                self.adapter.close().await;
            }
            Action::RequestDisconnect => {
                if let Err(err) = self.adapter.disconnect().await {
                    debug!(error = %err, "disconnect request refused");
                }
            }
            Action::StartSettleTimer { epoch, delay } => {
                if let Some(timer) = self.settle_timer.take() {
                    timer.abort();
                }
                self.settle_timer = Some(self.schedule(delay, Command::SettleElapsed { epoch }));
            }
            Action::StartMtuTimer { epoch, delay } => {
                if let Some(timer) = self.mtu_timer.take() {
                    timer.abort();
                }
                self.mtu_timer = Some(self.schedule(delay, Command::MtuWaitElapsed { epoch }));
            }
            Action::DiscoverServices => {
                if let Err(err) = self.adapter.discover_services().await {
                    return Some(LinkInput::SessionFailed(LinkError::ServiceDiscoveryFailed {
                        status: err.status(),
                    }));
                }
            }
            Action::Subscribe {
                characteristic,
                descriptor,
            } => {
                if let Err(err) = self
                    .adapter
                    .enable_notifications(characteristic, descriptor)
                    .await
                {
                    return Some(LinkInput::SessionFailed(
                        LinkError::NotificationSubscribeFailed(err.to_string()),
                    ));
                }
            }
            Action::RequestMtu(mtu) => {
                if let Err(err) = self.adapter.request_mtu(mtu).await {
                    return Some(LinkInput::Transport(TransportEvent::MtuChanged(Err(
                        err.status(),
                    ))));
                }
            }
            Action::PersistIdentity(identity) => {
                if let Err(err) = self.store.save(&identity) {
                    warn!(error = %err, address = %identity.address, "failed to persist peer");
                    self.report(err.into());
                }
            }
            Action::FlushQueue => {
                if let Some(timer) = self.mtu_timer.take() {
                    timer.abort();
                }
                self.flushing = true;
                self.flush_step().await;
            }
            Action::Inbound(bytes) => self.inbound(&bytes),
            Action::ReportError(err) => self.report(err),
            Action::ClearError => {
                self.error_tx.send_replace(None);
            }
        }
        None
    }

    async fn send(&mut self, payload: Vec<u8>) {
        let now = now();
        let idle = !self.flushing && self.shared.queue.is_empty_at(now);
        if let Some(params) = self.ready_params().filter(|_| idle) {
            if let Err(err) = self.transmit(&payload, params).await {
                warn!(error = %err, "direct send failed, frame dropped");
                self.report(err);
            }
            return;
        }

        let id = self.shared.queue.enqueue_at(payload, now);
        debug!(id, state = %self.machine.state(), "frame queued");

        if !self.machine.state().is_active() {
            self.reconnect().await;
        } else if self.machine.is_ready() && !self.flushing {
            self.flushing = true;
            self.flush_step().await;
        }
    }

    /// Send the queue head, then schedule the next step.
    async fn flush_step(&mut self) {
        let Some(params) = self.ready_params() else {
            debug!("flush stopped: link not ready");
            self.flushing = false;
            return;
        };
        let Some(head) = self.shared.queue.peek_ready_at(now()) else {
            trace!("queue drained");
            self.flushing = false;
            return;
        };

        match self.transmit(&head.payload, params).await {
            Ok(()) => {
                self.shared.queue.complete(head.id);
                debug!(id = head.id, remaining = self.shared.queue.len(), "queued frame sent");
                let tick = Command::FlushTick {
                    epoch: self.machine.epoch(),
                };
                self.flush_timer = Some(self.schedule(self.config.flush_pacing, tick));
            }
            Err(err) => {
                warn!(error = %err, id = head.id, "flush stopped, frame stays queued");
                self.flushing = false;
                self.report(err);
            }
        }
    }

    /// Write one frame as chunks, aborting at the first rejected chunk.
    async fn transmit(
        &self,
        payload: &[u8],
        params: NegotiatedLinkParams,
    ) -> Result<(), LinkError> {
        let _hold = WakeGuard::acquire(
            self.wake.clone(),
            SEND_WAKE_TAG,
            self.config.send_wake_hold,
        );
        let frame = encode_frame(payload);
        let chunker = Chunker::with_overhead(
            params.max_payload,
            self.config.header_overhead,
            self.config.min_chunk,
        );
        let characteristic = self.config.profile.write_characteristic;

        for (index, chunk) in chunker.split(&frame).enumerate() {
            self.adapter
                .write(characteristic, chunk, params.write_mode)
                .await
                .map_err(|err| LinkError::WriteFailed {
                    chunk: index,
                    reason: err.to_string(),
                })?;
        }
        trace!(bytes = frame.len(), chunks = chunker.chunk_count(frame.len()), "frame written");
        Ok(())
    }

    fn inbound(&mut self, bytes: &[u8]) {
        for line in self.decoder.push(bytes) {
            trace!(line = %line, "line received");
            match interpret(&line) {
                Some(ControlIntent::TimeSync) => {
                    info!("peer requested time sync");
                    self.post(Command::Send(OutboundMessage::datetime_now().to_frame()));
                    self.post(Command::Send(OutboundMessage::ack("datetime").to_frame()));
                }
                Some(ControlIntent::SuppressReconnect) => {
                    info!("peer signalled disconnect, suppressing auto-reconnect");
                    self.shared.suppressed.store(true, Ordering::SeqCst);
                }
                None => {}
            }
            if let Some(telemetry) = DeviceTelemetry::from_line(&line) {
                self.telemetry_tx.send_replace(Some(telemetry));
            }
            // No subscribers is fine.
            let _ = self.lines_tx.send(line);
        }
    }

    fn ready_params(&self) -> Option<NegotiatedLinkParams> {
        self.machine.is_ready().then(|| self.machine.params()).flatten()
    }

    fn report(&self, err: LinkError) {
        self.error_tx.send_replace(Some(err));
    }

    fn publish(&self) {
        let state = self.machine.state();
        self.state_tx.send_if_modified(|current| {
            let changed = *current != state;
            if changed {
                debug!(from = %current, to = %state, "link state changed");
                *current = state;
            }
            changed
        });

        let name = self.machine.peer().map(PeerIdentity::label);
        self.name_tx.send_if_modified(|current| {
            let changed = *current != name;
            if changed {
                current.clone_from(&name);
            }
            changed
        });
    }

    fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            state: self.machine.state(),
            phase: self.machine.phase(),
            peer: self.machine.peer().cloned(),
            params: self.machine.params(),
            pending: self.shared.queue.len_at(now()),
            suppressed: self.shared.suppressed.load(Ordering::SeqCst),
            last_error: self.error_tx.borrow().clone(),
        }
    }

    fn post(&self, command: Command) {
        if let Some(tx) = self.self_tx.upgrade() {
            let _ = tx.send(command);
        }
    }

    fn schedule(&self, delay: Duration, command: Command) -> JoinHandle<()> {
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(command);
            }
        })
    }

    fn stop_timers(&mut self) {
        self.flushing = false;
        for timer in [
            self.settle_timer.take(),
            self.mtu_timer.take(),
            self.flush_timer.take(),
        ]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

/// Classify a failed readiness check.
fn availability_error(err: TransportError) -> LinkError {
    match err {
        TransportError::PermissionDenied(what) => LinkError::PermissionDenied(what),
        _ => LinkError::TransportUnavailable,
    }
}

/// Classify a refused `open`.
fn open_error(err: TransportError) -> LinkError {
    match err {
        TransportError::Unavailable => LinkError::TransportUnavailable,
        TransportError::PermissionDenied(what) => LinkError::PermissionDenied(what),
        TransportError::InvalidAddress(address) => LinkError::InvalidAddress(address),
        other => LinkError::ConnectionFailed {
            status: other.status(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::RecordingWakeHold;
    use crate::store::MemoryStore;
    use crate::transport::mock::{Call, MockTransport};
    use crate::transport::{GattProfile, GattService, TransportEvent};

    const ADDR: &str = "AA:BB:CC:DD:EE:FF";

    struct Harness {
        handle: LinkHandle,
        mock: Arc<MockTransport>,
        store: Arc<MemoryStore>,
        wake: Arc<RecordingWakeHold>,
    }

    fn harness_with(mock: MockTransport, store: MemoryStore) -> Harness {
        let mock = Arc::new(mock);
        let store = Arc::new(store);
        let wake = Arc::new(RecordingWakeHold::default());
        let handle = LinkEngine::spawn(
            EngineConfig::default(),
            mock.clone(),
            store.clone(),
            wake.clone(),
        );
        mock.attach(handle.transport_events());
        Harness {
            handle,
            mock,
            store,
            wake,
        }
    }

    fn harness() -> Harness {
        harness_with(
            MockTransport::healthy(&GattProfile::default()),
            MemoryStore::new(),
        )
    }

    /// Let timers and posted events run to completion.
    async fn settle() {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    async fn connected() -> Harness {
        let h = harness();
        h.handle.connect(ADDR, None).unwrap();
        settle().await;
        assert_eq!(h.handle.state(), LinkState::Connected);
        h
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_flushes_prequeued_frame() {
        let h = harness();
        h.handle.send_status().unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.pending, 1);
        assert_eq!(snap.state, LinkState::Disconnected);
        assert_eq!(snap.last_error, Some(LinkError::NoSavedPeer));

        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Connected);
        assert_eq!(snap.pending, 0);
        assert_eq!(snap.last_error, None);
        assert_eq!(snap.params.map(|p| p.max_payload), Some(128));
        assert_eq!(h.mock.frames(), vec![r#"{"status":"read"}"#.to_string()]);

        let profile = GattProfile::default();
        let calls = h.mock.calls();
        assert_eq!(calls[0], Call::Open(ADDR.into()));
        assert_eq!(calls[1], Call::Discover);
        assert_eq!(
            calls[2],
            Call::EnableNotifications(profile.notify_characteristic, profile.cccd)
        );
        assert_eq!(calls[3], Call::RequestMtu(128));
        assert!(matches!(calls[4], Call::Write(_, crate::core::WriteMode::NoAck)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_discovery_waits_for_settle_delay() {
        let h = harness();
        h.handle.connect(ADDR, None).unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(h.mock.count(|c| *c == Call::Discover), 0);
        assert_eq!(h.handle.state(), LinkState::Connecting);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(h.mock.count(|c| *c == Call::Discover), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_persists_identity_and_name() {
        let h = connected().await;
        assert_eq!(
            h.store.get(),
            Some(PeerIdentity::new(ADDR, Some("S3 Watch".into())))
        );
        assert_eq!(
            *h.handle.watch_display_name().borrow(),
            Some("S3 Watch".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_saved_name_published_at_startup() {
        let h = harness_with(
            MockTransport::manual(),
            MemoryStore::with_identity(PeerIdentity::new(ADDR, Some("Watch".into()))),
        );
        assert_eq!(*h.handle.watch_display_name().borrow(), Some("Watch".to_string()));
        assert_eq!(h.handle.state(), LinkState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_disconnected_queues_and_reconnects_once() {
        let h = harness_with(
            MockTransport::manual(),
            MemoryStore::with_identity(PeerIdentity::new(ADDR, None)),
        );
        h.handle.send(r#"{"status":"read"}"#).unwrap();
        let snap = h.handle.snapshot().await.unwrap();

        assert_eq!(snap.pending, 1);
        assert!(h.handle.has_pending_to_send());
        assert_eq!(snap.state, LinkState::Connecting);
        assert_eq!(h.mock.opens(), 1);

        h.handle.send(r#"{"status":"read"}"#).unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.pending, 2);
        assert_eq!(h.mock.opens(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_frames_flush_in_order() {
        let h = harness();
        for payload in ["o1", "o2", "o3"] {
            h.handle.send(payload).unwrap();
        }
        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        assert_eq!(h.mock.frames(), vec!["o1", "o2", "o3"]);
        assert!(!h.handle.has_pending_to_send());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_frames_skipped_on_flush() {
        let h = harness();
        h.handle.send("stale").unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        h.handle.send("fresh").unwrap();
        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        assert_eq!(h.mock.frames(), vec!["fresh"]);
    }

    /// Manual transport driven up to the subscribe ack, before any MTU answer.
    async fn awaiting_mtu() -> Harness {
        let h = harness_with(MockTransport::manual(), MemoryStore::new());
        h.handle.connect(ADDR, None).unwrap();
        h.mock.emit(TransportEvent::Connected {
            address: ADDR.into(),
            name: None,
        });
        settle().await;
        h.mock.emit(TransportEvent::ServicesDiscovered(Ok(vec![
            GattService::for_profile(&GattProfile::default()),
        ])));
        h.mock.emit(TransportEvent::NotificationsEnabled(Ok(())));
        h.handle.send(vec![b'x'; 300]).unwrap();

        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Connected);
        assert_eq!(snap.params, None);
        assert_eq!(snap.pending, 1);
        assert!(h.mock.chunks().is_empty());
        h
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_flush_uses_negotiated_mtu() {
        let h = awaiting_mtu().await;
        h.mock.emit(TransportEvent::MtuChanged(Ok(Some(100))));
        h.handle.snapshot().await.unwrap();

        let sizes: Vec<usize> = h.mock.chunks().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![97, 97, 97, 10]);
        assert!(!h.handle.has_pending_to_send());
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_falls_back_when_mtu_never_answered() {
        let h = awaiting_mtu().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(h.mock.chunks().is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        let sizes: Vec<usize> = h.mock.chunks().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![301]);
        assert_eq!(
            h.handle.snapshot().await.unwrap().params.map(|p| p.max_payload),
            Some(503)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_ready_writes_chunks() {
        let h = connected().await;
        let payload = vec![b'x'; 300];
        h.handle.send(payload.clone()).unwrap();
        h.handle.snapshot().await.unwrap();

        let sizes: Vec<usize> = h.mock.chunks().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![125, 125, 51]);
        assert_eq!(h.mock.frames(), vec![String::from_utf8(payload).unwrap()]);

        assert_eq!(h.wake.acquired(SEND_WAKE_TAG), 1);
        assert!(!h.wake.is_held(SEND_WAKE_TAG));
    }

    #[tokio::test(start_paused = true)]
    async fn test_direct_write_failure_drops_frame() {
        let h = connected().await;
        h.mock.fail_writes(true);
        h.handle.send("lost").unwrap();

        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Connected);
        assert_eq!(snap.pending, 0);
        assert!(matches!(
            snap.last_error,
            Some(LinkError::WriteFailed { chunk: 0, .. })
        ));
        assert!(!h.wake.is_held(SEND_WAKE_TAG));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_failure_keeps_frame_queued() {
        let h = harness();
        h.mock.fail_writes(true);
        h.handle.send("kept").unwrap();
        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Connected);
        assert_eq!(snap.pending, 1);
        assert!(matches!(snap.last_error, Some(LinkError::WriteFailed { .. })));

        // Sends behind the stuck head keep FIFO order.
        h.mock.fail_writes(false);
        h.handle.send("next").unwrap();
        settle().await;
        assert_eq!(h.mock.frames(), vec!["kept", "next"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_request_answers_datetime_then_ack() {
        let h = connected().await;
        let mut lines = h.handle.subscribe_lines();

        h.mock.emit(TransportEvent::DataReceived(br#"{"request":"ti"#.to_vec()));
        h.mock.emit(TransportEvent::DataReceived(b"me\"}\r\n".to_vec()));
        settle().await;

        let frames = h.mock.frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].starts_with(r#"{"datetime":""#));
        assert_eq!(frames[1], r#"{"ack":"datetime"}"#);
        assert_eq!(lines.try_recv().unwrap(), r#"{"request":"time"}"#);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_hint_sets_suppression() {
        let h = connected().await;
        assert!(h.handle.should_auto_reconnect());

        h.mock.emit(TransportEvent::DataReceived(b"{\"state\":\"sleep\"}\n".to_vec()));
        let snap = h.handle.snapshot().await.unwrap();
        assert!(snap.suppressed);
        assert!(!h.handle.should_auto_reconnect());
        assert_eq!(snap.state, LinkState::Connected);

        h.handle.clear_reconnect_suppression();
        assert!(h.handle.should_auto_reconnect());
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_published() {
        let h = connected().await;
        h.mock.emit(TransportEvent::DataReceived(
            b"{\"battery\":80,\"charging\":true,\"steps\":1200}\n".to_vec(),
        ));
        h.handle.snapshot().await.unwrap();

        let telemetry = *h.handle.watch_telemetry().borrow();
        assert_eq!(
            telemetry,
            Some(DeviceTelemetry {
                battery: 80,
                charging: true,
                steps: 1200
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_without_saved_peer() {
        let h = harness();
        h.handle.reconnect().unwrap();
        let snap = h.handle.snapshot().await.unwrap();

        assert_eq!(snap.state, LinkState::Disconnected);
        assert_eq!(snap.last_error, Some(LinkError::NoSavedPeer));
        assert_eq!(h.mock.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_adapter() {
        let h = harness();
        h.mock.set_ready(Err(TransportError::Unavailable));
        h.handle.connect(ADDR, None).unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Disconnected);
        assert_eq!(snap.last_error, Some(LinkError::TransportUnavailable));

        h.mock
            .set_ready(Err(TransportError::PermissionDenied("BLUETOOTH_CONNECT".into())));
        h.handle.connect(ADDR, None).unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(
            snap.last_error,
            Some(LinkError::PermissionDenied("BLUETOOTH_CONNECT".into()))
        );
        assert_eq!(h.mock.opens(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_address_moves_to_error() {
        let h = harness();
        h.mock.fail_open(TransportError::InvalidAddress("nope".into()));
        h.handle.connect("nope", None).unwrap();
        let snap = h.handle.snapshot().await.unwrap();

        assert_eq!(snap.state, LinkState::Error);
        assert_eq!(snap.last_error, Some(LinkError::InvalidAddress("nope".into())));
        assert_eq!(h.mock.count(|c| *c == Call::Close), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_service_moves_to_error() {
        let h = harness();
        h.mock.set_services(Ok(Vec::new()));
        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Error);
        assert_eq!(snap.last_error, Some(LinkError::ServiceNotFound));
        assert_eq!(h.mock.count(|c| *c == Call::Close), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_subscription_moves_to_error() {
        let h = harness();
        h.mock.set_subscribe(Err(3));
        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.state, LinkState::Error);
        assert!(matches!(
            snap.last_error,
            Some(LinkError::NotificationSubscribeFailed(_))
        ));
        assert_eq!(h.mock.count(|c| *c == Call::RequestMtu(128)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mtu_answer_without_value_keeps_default() {
        let h = harness();
        h.mock.set_mtu(None);
        h.handle.connect(ADDR, None).unwrap();
        settle().await;

        h.handle.send(vec![b'x'; 300]).unwrap();
        let snap = h.handle.snapshot().await.unwrap();
        assert_eq!(snap.params.map(|p| p.max_payload), Some(503));
        let sizes: Vec<usize> = h.mock.chunks().iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![301]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_command() {
        let h = connected().await;
        h.handle.disconnect().unwrap();
        settle().await;

        assert_eq!(h.handle.state(), LinkState::Disconnected);
        assert_eq!(h.mock.count(|c| *c == Call::Disconnect), 1);
        assert_eq!(h.mock.count(|c| *c == Call::Close), 1);

        // Idempotent.
        h.handle.disconnect().unwrap();
        h.handle.snapshot().await.unwrap();
        assert_eq!(h.mock.count(|c| *c == Call::Disconnect), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_session() {
        let h = connected().await;
        h.handle.shutdown().unwrap();
        settle().await;

        assert_eq!(h.mock.count(|c| *c == Call::Close), 1);
        assert_eq!(h.handle.snapshot().await, Err(LinkError::EngineClosed));
    }
}
