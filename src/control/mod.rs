//! Remote-control sub-protocol carried in the framed stream.
//!
//! | Direction | Shape | Meaning |
//! |---|---|---|
//! | out | `{"datetime": "<ISO-8601>"}` | time sync push |
//! | out | `{"ack": "datetime"}` | acknowledges a time-sync request |
//! | out | `{"notification": …, "app": …, "title": …, "message": …}` | forwarded notification |
//! | out | `{"status": "read"}` | status ping |
//! | in  | `{"request"/"get"/"cmd": …}`, `{"request_datetime": true}` | time-sync request |
//! | in  | `{"request"/"cmd"/"event"/"state": "disconnect"/…}` | intentional disconnect |
//! | in  | `{"battery": …, "charging": …, "steps": …}` | telemetry |

mod interpreter;
mod messages;
mod telemetry;

pub use interpreter::{ControlIntent, interpret};
pub use messages::{OutboundMessage, iso_seconds, local_now};
pub use telemetry::DeviceTelemetry;
