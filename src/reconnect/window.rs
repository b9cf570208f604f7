//! One bounded reconnection cycle.

use std::time::Duration;

use tokio::time::Instant;

use crate::link::ReconnectConfig;

/// Deadline and pacing of one reconnection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectWindow {
    started_at: Instant,
    deadline: Instant,
    interval: Duration,
}

impl ReconnectWindow {
    /// Open a window at `now`.
    pub fn open(now: Instant, config: &ReconnectConfig) -> Self {
        Self {
            started_at: now,
            deadline: now + config.window,
            interval: config.interval,
        }
    }

    /// When the window opened.
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// When the window closes.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Pause between attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Time since the window opened.
    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    /// When to attempt next, never past the deadline.
    pub fn next_attempt(&self, now: Instant) -> Instant {
        (now + self.interval).min(self.deadline)
    }
}
