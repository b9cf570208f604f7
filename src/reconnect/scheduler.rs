//! Reconnection supervisor and window task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::core::{LinkState, WakeGuard, WakeHold};
use crate::link::ReconnectConfig;

use super::window::ReconnectWindow;

/// Wake-hold tag held for the length of a window.
pub const RECONNECT_WAKE_TAG: &str = "reconnect";

/// What the scheduler needs from the link.
pub trait ReconnectTarget: Send + Sync + 'static {
    /// Issue one reconnect attempt. Must not block.
    fn reconnect(&self);

    /// Whether the peer has not asked to stay disconnected.
    fn should_auto_reconnect(&self) -> bool;

    /// Whether frames are waiting for delivery.
    fn has_pending_to_send(&self) -> bool;

    /// Observe the link state.
    fn subscribe_state(&self) -> watch::Receiver<LinkState>;

    /// Window settings to supervise with.
    fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig::default()
    }
}

/// Scheduler status, for display by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectStatus {
    /// No window active.
    #[default]
    Idle,
    /// Window active; last attempt issued `elapsed` after it opened.
    Reconnecting {
        /// Time since the window opened.
        elapsed: Duration,
    },
    /// The peer asked to stay disconnected and nothing is pending.
    RemoteOff,
    /// Link is up.
    Connected,
}

/// Drives bounded reconnection windows whenever the link goes down.
///
/// Dropping the scheduler stops it; an active window is cancelled and its
/// wake hold released.
#[derive(Debug)]
pub struct ReconnectScheduler {
    supervisor: JoinHandle<()>,
    status: watch::Receiver<ReconnectStatus>,
}

impl ReconnectScheduler {
    /// Start supervising `target`.
    ///
    /// Window settings come from [`ReconnectTarget::reconnect_config`]. A
    /// window opens right away if the link is not connected and
    /// reconnection is wanted.
    pub fn spawn<T: ReconnectTarget>(target: T, wake: Arc<dyn WakeHold>) -> Self {
        let (status_tx, status) = watch::channel(ReconnectStatus::Idle);
        let config = target.reconnect_config();
        let supervisor = Supervisor {
            target: Arc::new(target),
            wake,
            config,
            status: Arc::new(status_tx),
            window: None,
        };
        Self {
            supervisor: tokio::spawn(supervisor.run()),
            status,
        }
    }

    /// Current status.
    pub fn status(&self) -> ReconnectStatus {
        *self.status.borrow()
    }

    /// Observe the status.
    pub fn watch_status(&self) -> watch::Receiver<ReconnectStatus> {
        self.status.clone()
    }

    /// Stop supervising.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for ReconnectScheduler {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

struct Supervisor<T> {
    target: Arc<T>,
    wake: Arc<dyn WakeHold>,
    config: ReconnectConfig,
    status: Arc<watch::Sender<ReconnectStatus>>,
    window: Option<JoinHandle<()>>,
}

impl<T: ReconnectTarget> Supervisor<T> {
    async fn run(mut self) {
        let mut states = self.target.subscribe_state();
        let initial = *states.borrow_and_update();
        match initial {
            LinkState::Connecting if self.wants_link() => self.start_window(),
            state => self.on_state(state),
        }

        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            self.on_state(state);
        }
        debug!("link state closed, reconnect supervisor exiting");
    }

    fn wants_link(&self) -> bool {
        self.target.should_auto_reconnect() || self.target.has_pending_to_send()
    }

    fn on_state(&mut self, state: LinkState) {
        match state {
            LinkState::Connected => {
                self.cancel_window();
                self.status.send_replace(ReconnectStatus::Connected);
            }
            LinkState::Connecting => {}
            LinkState::Disconnected | LinkState::Error => {
                if self.wants_link() {
                    self.start_window();
                } else {
                    info!(%state, "peer asked to stay disconnected, not reconnecting");
                    self.cancel_window();
                    self.status.send_replace(ReconnectStatus::RemoteOff);
                }
            }
        }
    }

    fn start_window(&mut self) {
        if self.window.as_ref().is_some_and(|w| !w.is_finished()) {
            debug!("reconnect window already active");
            return;
        }
        let window = run_window(
            self.target.clone(),
            self.wake.clone(),
            self.config,
            self.status.clone(),
        );
        self.window = Some(tokio::spawn(window));
    }

    fn cancel_window(&mut self) {
        if let Some(window) = self.window.take() {
            if !window.is_finished() {
                debug!("reconnect window cancelled");
            }
            window.abort();
        }
    }
}

impl<T> Drop for Supervisor<T> {
    fn drop(&mut self) {
        if let Some(window) = self.window.take() {
            window.abort();
        }
    }
}

async fn run_window<T: ReconnectTarget>(
    target: Arc<T>,
    wake: Arc<dyn WakeHold>,
    config: ReconnectConfig,
    status: Arc<watch::Sender<ReconnectStatus>>,
) {
    let _hold = WakeGuard::acquire(wake, RECONNECT_WAKE_TAG, config.wake_hold_duration());
    let window = ReconnectWindow::open(Instant::now(), &config);
    info!(window = ?config.window, interval = ?config.interval, "reconnect window opened");

    let mut attempts = 0u32;
    loop {
        let now = Instant::now();
        if window.is_expired(now) {
            info!(attempts, "reconnect window expired");
            status.send_replace(ReconnectStatus::Idle);
            return;
        }
        if !target.should_auto_reconnect() && !target.has_pending_to_send() {
            info!(attempts, "reconnect suppressed and nothing pending, closing window");
            status.send_replace(ReconnectStatus::RemoteOff);
            return;
        }

        attempts += 1;
        let elapsed = window.elapsed(now);
        debug!(attempt = attempts, elapsed = ?elapsed, "reconnect attempt");
        target.reconnect();
        status.send_replace(ReconnectStatus::Reconnecting { elapsed });

        tokio::time::sleep_until(window.next_attempt(now)).await;
    }
}
