//! Engine configuration.

use std::time::Duration;

use crate::core::constants::{
    ATT_HEADER_OVERHEAD, DEFAULT_MAX_PAYLOAD, FLUSH_PACING, MIN_CHUNK_SIZE, MTU_WAIT, QUEUE_TTL,
    RECONNECT_INTERVAL, RECONNECT_WAKE_MARGIN, RECONNECT_WINDOW, REQUESTED_MTU, SEND_WAKE_HOLD,
    SETTLE_DELAY,
};
use crate::transport::GattProfile;

/// Reconnection window settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Pause between attempts.
    pub interval: Duration,
    /// Window length.
    pub window: Duration,
    /// Extra wake-hold time beyond the window.
    pub wake_margin: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            interval: RECONNECT_INTERVAL,
            window: RECONNECT_WINDOW,
            wake_margin: RECONNECT_WAKE_MARGIN,
        }
    }
}

impl ReconnectConfig {
    /// Upper bound passed to the wake hold for one window.
    pub fn wake_hold_duration(&self) -> Duration {
        self.window + self.wake_margin
    }
}

/// Link engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// GATT identifiers on the peer.
    pub profile: GattProfile,
    /// Delay between low-level connect and service discovery.
    pub settle_delay: Duration,
    /// Gap between frames while flushing the queue.
    pub flush_pacing: Duration,
    /// Queue entry time-to-live.
    pub queue_ttl: Duration,
    /// MTU requested after notifications are enabled.
    pub requested_mtu: u16,
    /// Longest wait for the MTU answer before flushing with defaults.
    pub mtu_wait: Duration,
    /// Max payload used until (or unless) the MTU is negotiated.
    pub default_max_payload: usize,
    /// Transport header bytes per chunk.
    pub header_overhead: usize,
    /// Smallest chunk size.
    pub min_chunk: usize,
    /// Wake-hold bound while one frame is written.
    pub send_wake_hold: Duration,
    /// Reconnection window settings.
    pub reconnect: ReconnectConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profile: GattProfile::default(),
            settle_delay: SETTLE_DELAY,
            flush_pacing: FLUSH_PACING,
            queue_ttl: QUEUE_TTL,
            requested_mtu: REQUESTED_MTU,
            mtu_wait: MTU_WAIT,
            default_max_payload: DEFAULT_MAX_PAYLOAD,
            header_overhead: ATT_HEADER_OVERHEAD,
            min_chunk: MIN_CHUNK_SIZE,
            send_wake_hold: SEND_WAKE_HOLD,
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Start a builder from the defaults.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the GATT profile.
    pub fn profile(mut self, profile: GattProfile) -> Self {
        self.config.profile = profile;
        self
    }

    /// Set the settle delay before service discovery.
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Set the gap between flushed frames.
    pub fn flush_pacing(mut self, pacing: Duration) -> Self {
        self.config.flush_pacing = pacing;
        self
    }

    /// Set the queue TTL.
    pub fn queue_ttl(mut self, ttl: Duration) -> Self {
        self.config.queue_ttl = ttl;
        self
    }

    /// Set the requested MTU.
    pub fn requested_mtu(mut self, mtu: u16) -> Self {
        self.config.requested_mtu = mtu;
        self
    }

    /// Set the longest wait for the MTU answer.
    pub fn mtu_wait(mut self, wait: Duration) -> Self {
        self.config.mtu_wait = wait;
        self
    }

    /// Set the default max payload.
    pub fn default_max_payload(mut self, max_payload: usize) -> Self {
        self.config.default_max_payload = max_payload;
        self
    }

    /// Set the per-chunk header overhead.
    pub fn header_overhead(mut self, overhead: usize) -> Self {
        self.config.header_overhead = overhead;
        self
    }

    /// Set the wake-hold bound per frame.
    pub fn send_wake_hold(mut self, duration: Duration) -> Self {
        self.config.send_wake_hold = duration;
        self
    }

    /// Set the reconnection interval.
    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.config.reconnect.interval = interval;
        self
    }

    /// Set the reconnection window length.
    pub fn reconnect_window(mut self, window: Duration) -> Self {
        self.config.reconnect.window = window;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

impl Default for EngineConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.settle_delay, Duration::from_millis(600));
        assert_eq!(config.queue_ttl, Duration::from_secs(60));
        assert_eq!(config.mtu_wait, Duration::from_millis(500));
        assert_eq!(config.reconnect.interval, Duration::from_secs(15));
        assert_eq!(
            config.reconnect.wake_hold_duration(),
            Duration::from_secs(310)
        );
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::builder()
            .settle_delay(Duration::from_millis(100))
            .requested_mtu(247)
            .reconnect_window(Duration::from_secs(60))
            .build();

        assert_eq!(config.settle_delay, Duration::from_millis(100));
        assert_eq!(config.requested_mtu, 247);
        assert_eq!(config.reconnect.window, Duration::from_secs(60));
        assert_eq!(config.flush_pacing, FLUSH_PACING);
    }
}
