//! Shared test support for the autoserv workspace.
//!
//! - [`StompBroker`]: a STOMP-over-WebSocket broker on an ephemeral port
//! - [`FakeScheduleApi`]: an in-memory schedule backend with failure injection
//! - fixtures for sessions, tasks and dashboard payloads

mod broker;
mod fixtures;
mod schedule;

pub use broker::StompBroker;
pub use fixtures::*;
pub use schedule::{FakeScheduleApi, ScheduleCall};
