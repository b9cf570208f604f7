//! Scripted transport for engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::{GattStatus, PeerAddress, TransportError, WriteMode};
use crate::link::TransportEventSink;

use super::{GattProfile, GattService, TransportAdapter, TransportEvent};

/// An adapter call, as recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Open(PeerAddress),
    Discover,
    EnableNotifications(Uuid, Uuid),
    RequestMtu(u16),
    Write(Vec<u8>, WriteMode),
    Disconnect,
    Close,
}

#[derive(Debug)]
struct Script {
    sink: Option<TransportEventSink>,
    calls: Vec<Call>,
    ready: Result<(), TransportError>,
    open_error: Option<TransportError>,
    fail_writes: bool,
    auto: bool,
    name: Option<String>,
    services: Result<Vec<GattService>, GattStatus>,
    subscribe: Result<(), GattStatus>,
    mtu: Option<u16>,
}

/// Records every call and, in auto mode, answers like a healthy peer.
#[derive(Debug)]
pub(crate) struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    /// A peer that exposes `profile` and completes every step.
    pub fn healthy(profile: &GattProfile) -> Self {
        Self {
            script: Mutex::new(Script {
                sink: None,
                calls: Vec::new(),
                ready: Ok(()),
                open_error: None,
                fail_writes: false,
                auto: true,
                name: Some("S3 Watch".to_string()),
                services: Ok(vec![GattService::for_profile(profile)]),
                subscribe: Ok(()),
                mtu: Some(128),
            }),
        }
    }

    /// A peer that only records calls; tests post every event themselves.
    pub fn manual() -> Self {
        let mock = Self::healthy(&GattProfile::default());
        mock.script.lock().auto = false;
        mock
    }

    pub fn attach(&self, sink: TransportEventSink) {
        self.script.lock().sink = Some(sink);
    }

    pub fn emit(&self, event: TransportEvent) {
        let sink = self.script.lock().sink.clone();
        if let Some(sink) = sink {
            sink.post(event);
        }
    }

    pub fn set_ready(&self, ready: Result<(), TransportError>) {
        self.script.lock().ready = ready;
    }

    pub fn fail_open(&self, err: TransportError) {
        self.script.lock().open_error = Some(err);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.script.lock().fail_writes = fail;
    }

    pub fn set_services(&self, services: Result<Vec<GattService>, GattStatus>) {
        self.script.lock().services = services;
    }

    pub fn set_subscribe(&self, result: Result<(), GattStatus>) {
        self.script.lock().subscribe = result;
    }

    pub fn set_mtu(&self, mtu: Option<u16>) {
        self.script.lock().mtu = mtu;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn opens(&self) -> usize {
        self.count(|c| matches!(c, Call::Open(_)))
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.script.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Accepted chunks, in write order.
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.script
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Write(chunk, _) => Some(chunk.clone()),
                _ => None,
            })
            .collect()
    }

    /// Accepted bytes reassembled into lines, terminators stripped.
    pub fn frames(&self) -> Vec<String> {
        let bytes: Vec<u8> = self.chunks().concat();
        bytes
            .split(|b| *b == b'\n')
            .filter(|line| !line.is_empty())
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    /// Record `call` and return the event to answer with, if in auto mode.
    fn record(&self, call: Call, answer: impl FnOnce(&Script) -> TransportEvent) {
        let (sink, event) = {
            let mut script = self.script.lock();
            script.calls.push(call);
            let event = script.auto.then(|| answer(&script));
            (script.sink.clone(), event)
        };
        if let (Some(sink), Some(event)) = (sink, event) {
            sink.post(event);
        }
    }
}

#[async_trait]
impl TransportAdapter for MockTransport {
    fn check_ready(&self) -> Result<(), TransportError> {
        self.script.lock().ready.clone()
    }

    async fn open(&self, address: &PeerAddress) -> Result<(), TransportError> {
        let open_error = self.script.lock().open_error.clone();
        if let Some(err) = open_error {
            self.script.lock().calls.push(Call::Open(address.clone()));
            return Err(err);
        }
        let address = address.clone();
        self.record(Call::Open(address.clone()), |s| TransportEvent::Connected {
            address,
            name: s.name.clone(),
        });
        Ok(())
    }

    async fn discover_services(&self) -> Result<(), TransportError> {
        self.record(Call::Discover, |s| {
            TransportEvent::ServicesDiscovered(s.services.clone())
        });
        Ok(())
    }

    async fn enable_notifications(
        &self,
        characteristic: Uuid,
        descriptor: Uuid,
    ) -> Result<(), TransportError> {
        self.record(
            Call::EnableNotifications(characteristic, descriptor),
            |s| TransportEvent::NotificationsEnabled(s.subscribe),
        );
        Ok(())
    }

    async fn request_mtu(&self, mtu: u16) -> Result<(), TransportError> {
        self.record(Call::RequestMtu(mtu), |s| {
            TransportEvent::MtuChanged(Ok(s.mtu))
        });
        Ok(())
    }

    async fn write(
        &self,
        _characteristic: Uuid,
        chunk: &[u8],
        mode: WriteMode,
    ) -> Result<(), TransportError> {
        let mut script = self.script.lock();
        if script.fail_writes {
            return Err(TransportError::Rejected {
                status: 1,
                message: "write refused".to_string(),
            });
        }
        script.calls.push(Call::Write(chunk.to_vec(), mode));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.record(Call::Disconnect, |_| TransportEvent::Disconnected);
        Ok(())
    }

    async fn close(&self) {
        self.script.lock().calls.push(Call::Close);
    }
}
