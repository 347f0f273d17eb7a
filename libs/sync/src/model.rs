//! Dashboard data model.

use serde::{Deserialize, Serialize};

/// Counters shown on a customer's dashboard.
///
/// Replaced wholesale on every fetch or push. Missing counters in a payload
/// default to zero; the payload still replaces the whole snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardSnapshot {
    pub active_services: u64,
    pub completed_services: u64,
    pub upcoming_appointments: u64,
    pub active_projects: u64,
    pub completed_projects: u64,
}

/// A dashboard snapshot received on the live subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveUpdateEvent {
    pub snapshot: DashboardSnapshot,

    /// Optional monotonic sequence, from a `sequence` payload field or a
    /// `sequence` frame header. The backend does not send one today.
    pub sequence: Option<u64>,
}

impl LiveUpdateEvent {
    /// Interpret a parsed JSON payload.
    ///
    /// A payload `sequence` field takes precedence over the frame header.
    pub fn from_json(
        payload: serde_json::Value,
        header_sequence: Option<u64>,
    ) -> Result<Self, serde_json::Error> {
        let sequence = payload
            .get("sequence")
            .and_then(serde_json::Value::as_u64)
            .or(header_sequence);
        let snapshot = serde_json::from_value(payload)?;
        Ok(Self { snapshot, sequence })
    }
}
