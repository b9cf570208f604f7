//! Link lifecycle: state machine, engine task and its handle.
//!
//! ```text
//! LinkHandle ──┐
//!              ├──▶ command channel ──▶ LinkEngine ──▶ TransportAdapter
//! EventSink ───┘                         │   ▲
//!                                        ▼   │
//!                                     LinkMachine::step
//! ```
//!
//! [`LinkMachine`] decides, [`LinkEngine`] performs. Nothing else mutates
//! link state.

mod config;
mod engine;
mod handle;
mod machine;

pub use config::{EngineConfig, EngineConfigBuilder, ReconnectConfig};
pub use engine::LinkEngine;
pub use handle::{LinkHandle, LinkSnapshot, TransportEventSink};
pub use machine::{Action, LinkInput, LinkMachine, SetupPhase};
