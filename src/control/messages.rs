//! Outbound control frames.

use chrono::{Local, NaiveDateTime};
use serde::Serialize;

/// Seconds-precision ISO-8601 local date-time, without offset.
pub fn iso_seconds(at: NaiveDateTime) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Current local time in [`iso_seconds`] form.
pub fn local_now() -> String {
    iso_seconds(Local::now().naive_local())
}

/// A frame the host sends to the peer.
///
/// Serialized as a flat JSON object; field order is part of the format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// Time-sync push.
    DateTime {
        /// Local date-time, seconds precision.
        datetime: String,
    },
    /// Acknowledges a peer request.
    Ack {
        /// Acknowledged event name.
        ack: String,
    },
    /// Forwarded notification.
    Notification {
        /// Local date-time the notification was forwarded.
        notification: String,
        /// Source application id.
        app: String,
        /// Notification title.
        title: String,
        /// Notification body.
        message: String,
    },
    /// Liveness/status ping.
    Status {
        /// Requested status.
        status: String,
    },
}

impl OutboundMessage {
    /// Time-sync frame for `at`.
    pub fn datetime_at(at: NaiveDateTime) -> Self {
        OutboundMessage::DateTime {
            datetime: iso_seconds(at),
        }
    }

    /// Time-sync frame for the current local time.
    pub fn datetime_now() -> Self {
        OutboundMessage::DateTime {
            datetime: local_now(),
        }
    }

    /// Acknowledgment of `event`.
    pub fn ack(event: impl Into<String>) -> Self {
        OutboundMessage::Ack { ack: event.into() }
    }

    /// Notification stamped with the current local time.
    pub fn notification(
        app: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        OutboundMessage::Notification {
            notification: local_now(),
            app: app.into(),
            title: title.into(),
            message: message.into(),
        }
    }

    /// `{"status":"read"}` ping.
    pub fn status_read() -> Self {
        OutboundMessage::Status {
            status: "read".to_string(),
        }
    }

    /// Serialize to a frame payload (terminator is added by the codec).
    pub fn to_frame(&self) -> Vec<u8> {
        // Only strings are serialized, which cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
