//! Live dashboard: baseline fetch plus pushed updates.
//!
//! A [`DashboardSession`] is what a view mounts. It starts two writers
//! against one [`DashboardState`]:
//!
//! - the snapshot fetcher, whose result is adopted only if nothing has been
//!   pushed yet
//! - the transport adapter, whose pushes always replace the state
//!
//! Unmounting closes the state before tearing the socket down, so nothing is
//! applied once unmount has started.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use autoserv_id::Username;
use autoserv_reconcile::{Applied, LiveState, OrderingPolicy};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::ApiClient;
use crate::config::SyncConfig;
use crate::credentials::CredentialProvider;
use crate::model::{DashboardSnapshot, LiveUpdateEvent};
use crate::snapshot::SnapshotFetcher;
use crate::transport::{ConnectionStatus, InboundMessage, InboundSink, TransportAdapter};
use crate::SyncError;

/// The dashboard snapshot visible to consumers.
///
/// Consumers only get read access (a cloned value or a watch receiver); the
/// write paths are crate-private.
#[derive(Debug)]
pub struct DashboardState {
    live: Mutex<LiveState<DashboardSnapshot>>,
    tx: watch::Sender<Option<DashboardSnapshot>>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(OrderingPolicy::default())
    }
}

impl DashboardState {
    pub fn new(policy: OrderingPolicy) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            live: Mutex::new(LiveState::new(policy)),
            tx,
        }
    }

    /// Current snapshot; `None` means unknown.
    pub fn current(&self) -> Option<DashboardSnapshot> {
        *self.tx.borrow()
    }

    /// Watch the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardSnapshot>> {
        self.tx.subscribe()
    }

    pub fn pushes_applied(&self) -> u64 {
        self.lock().pushes_applied()
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_closed()
    }

    pub(crate) fn apply_baseline(&self, snapshot: DashboardSnapshot) -> Applied {
        let mut live = self.lock();
        let applied = live.apply_baseline(snapshot);
        self.publish(&live, applied);
        applied
    }

    pub(crate) fn apply_push(&self, snapshot: DashboardSnapshot, sequence: Option<u64>) -> Applied {
        let mut live = self.lock();
        let applied = live.apply_push(snapshot, sequence);
        self.publish(&live, applied);
        applied
    }

    pub(crate) fn close(&self) {
        self.lock().close();
    }

    // Publishing under the lock keeps watchers in write order.
    fn publish(&self, live: &LiveState<DashboardSnapshot>, applied: Applied) {
        if applied.is_change() {
            self.tx.send_replace(live.current().copied());
        }
    }

    fn lock(&self) -> MutexGuard<'_, LiveState<DashboardSnapshot>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InboundSink for DashboardState {
    fn deliver(&self, message: InboundMessage) {
        let event = match LiveUpdateEvent::from_json(message.payload, message.sequence) {
            Ok(event) => event,
            Err(e) => {
                warn!(
                    destination = %message.destination,
                    error = %e,
                    "Dropping malformed dashboard payload"
                );
                return;
            }
        };

        let applied = self.apply_push(event.snapshot, event.sequence);
        match applied {
            Applied::RejectedStale { sequence, last } => {
                warn!(sequence, last, "Dropping stale dashboard push");
            }
            other => debug!(applied = ?other, "Dashboard push"),
        }
    }
}

/// A mounted dashboard view.
pub struct DashboardSession {
    state: Arc<DashboardState>,
    transport: TransportAdapter,
    fetch_task: Option<JoinHandle<()>>,
    channel_key: Option<Username>,
}

impl DashboardSession {
    /// Mount against the configured backend.
    pub fn mount(
        config: &SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, SyncError> {
        let api = ApiClient::new(&config.api_url, Arc::clone(&credentials))?;
        Ok(Self::mount_with(config, credentials, SnapshotFetcher::new(api)))
    }

    /// Mount with an explicit fetcher.
    ///
    /// Starts the baseline fetch and opens the live channel keyed by the
    /// session's username. Without a session only the fetch runs.
    pub fn mount_with(
        config: &SyncConfig,
        credentials: Arc<dyn CredentialProvider>,
        fetcher: SnapshotFetcher,
    ) -> Self {
        let state = Arc::new(DashboardState::new(config.ordering));

        let fetch_state = Arc::clone(&state);
        let fetch_task = tokio::spawn(async move {
            if let Some(snapshot) = fetcher.fetch().await {
                let applied = fetch_state.apply_baseline(snapshot);
                debug!(applied = ?applied, "Dashboard baseline");
            }
        });

        let mut transport = TransportAdapter::new(config, Arc::clone(&credentials));
        let channel_key = credentials.session().map(|s| s.username);
        match &channel_key {
            Some(username) => {
                let sink: Arc<dyn InboundSink> = state.clone();
                transport.connect(username.as_str(), sink);
            }
            None => warn!("No session, live dashboard updates disabled"),
        }

        info!(channel = ?channel_key.as_ref().map(Username::as_str), "Dashboard mounted");

        Self {
            state,
            transport,
            fetch_task: Some(fetch_task),
            channel_key,
        }
    }

    /// Stop applying updates and close the live channel. Idempotent.
    pub async fn unmount(&mut self) {
        self.state.close();
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
        self.transport.disconnect().await;
        debug!("Dashboard unmounted");
    }

    /// Current snapshot; `None` means unknown.
    pub fn snapshot(&self) -> Option<DashboardSnapshot> {
        self.state.current()
    }

    /// Watch the snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<DashboardSnapshot>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    /// Watch the live channel status.
    pub fn connection_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.transport.status()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub fn last_error(&self) -> Option<String> {
        self.transport.last_error()
    }

    pub fn channel_key(&self) -> Option<&Username> {
        self.channel_key.as_ref()
    }
}

impl Drop for DashboardSession {
    fn drop(&mut self) {
        self.state.close();
        if let Some(task) = self.fetch_task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(active_services: u64) -> DashboardSnapshot {
        DashboardSnapshot {
            active_services,
            ..DashboardSnapshot::default()
        }
    }

    fn message(payload: serde_json::Value) -> InboundMessage {
        InboundMessage {
            destination: "/topic/customer/dashboard/alice".to_string(),
            payload,
            message_id: None,
            sequence: None,
        }
    }

    #[test]
    fn test_baseline_after_push_is_ignored() {
        let state = DashboardState::default();
        state.deliver(message(json!({"activeServices": 3})));
        assert_eq!(state.apply_baseline(snapshot(2)), Applied::IgnoredBaseline);
        assert_eq!(state.current(), Some(snapshot(3)));
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let state = DashboardState::default();
        state.apply_baseline(snapshot(2));
        state.deliver(message(json!({"activeServices": "lots"})));
        assert_eq!(state.current(), Some(snapshot(2)));
        assert_eq!(state.pushes_applied(), 0);
    }

    #[test]
    fn test_closed_state_ignores_writes() {
        let state = DashboardState::default();
        let rx = state.subscribe();
        state.close();
        state.deliver(message(json!({"activeServices": 3})));
        assert_eq!(state.current(), None);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn test_sequenced_rejects_stale_push() {
        let state = DashboardState::new(OrderingPolicy::Sequenced);
        state.deliver(message(json!({"activeServices": 5, "sequence": 2})));
        state.deliver(message(json!({"activeServices": 4, "sequence": 1})));
        assert_eq!(state.current(), Some(snapshot(5)));
    }

    #[tokio::test]
    async fn test_watchers_see_every_change() {
        let state = DashboardState::default();
        let mut rx = state.subscribe();
        state.apply_baseline(snapshot(1));
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(snapshot(1)));

        state.deliver(message(json!({"activeServices": 1})));
        assert!(!rx.has_changed().unwrap());
    }
}
