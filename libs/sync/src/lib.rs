//! # autoserv-sync
//!
//! Client for the service portal's live dashboard and schedule board.
//!
//! ## Components
//!
//! - [`TransportAdapter`]: one STOMP-over-WebSocket subscription per owner,
//!   with automatic reconnection
//! - [`SnapshotFetcher`]: one-shot authoritative dashboard read
//! - [`DashboardState`]: folds the baseline and pushes into one visible
//!   snapshot (push wins)
//! - [`BoardController`]: schedule board with optimistic moves and rollback
//! - [`RebalanceCoordinator`]: server-side auto-balance requests
//!
//! ## Sessions
//!
//! Authentication is cookie based. The cookie comes from an injected
//! [`CredentialProvider`]; nothing in this crate reads global session state.

mod client;
mod config;
mod credentials;
mod dashboard;
mod error;
mod idempotency;
mod model;
mod notify;
pub mod schedule;
mod snapshot;
pub mod transport;

pub use client::ApiClient;
pub use config::{SyncConfig, DEFAULT_API_URL, DEFAULT_WS_URL};
pub use credentials::{CredentialProvider, SessionCredentials, StaticCredentials};
pub use dashboard::{DashboardSession, DashboardState};
pub use error::SyncError;
pub use idempotency::{idempotency_key, IDEMPOTENCY_KEY_HEADER};
pub use model::{DashboardSnapshot, LiveUpdateEvent};
pub use notify::{Notification, Notifier};
pub use schedule::{
    BoardController, BoardError, DateRange, MoveRequest, RebalanceCoordinator, RebalanceResult,
    RebalanceStatus, ScheduleApi, ScheduleBoard, ScheduleTask, TaskStatus, TimeWindow,
};
pub use snapshot::{SnapshotFetcher, DASHBOARD_OVERVIEW_PATH};
pub use transport::{ConnectionStatus, InboundMessage, InboundSink, TransportAdapter};

pub use autoserv_reconcile::OrderingPolicy;
