//! Status reports pushed by the peer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Battery and activity snapshot reported by the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceTelemetry {
    /// Battery level, percent.
    #[serde(default)]
    pub battery: u8,
    /// Whether the peer is charging.
    #[serde(default)]
    pub charging: bool,
    /// Step counter.
    #[serde(default)]
    pub steps: u32,
}

impl DeviceTelemetry {
    /// Parse a telemetry line.
    ///
    /// Only objects carrying `battery`, `charging` or `steps` qualify, so
    /// control frames are not mistaken for an all-zero report.
    pub fn from_line(line: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(line).ok()?;
        let obj = value.as_object()?;
        if !["battery", "charging", "steps"]
            .iter()
            .any(|k| obj.contains_key(*k))
        {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}
