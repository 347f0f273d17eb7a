//! Transport adapter: one STOMP subscription over a WebSocket.
//!
//! The adapter owns a background session task that:
//! 1. Opens the socket (with the session cookie) and performs the STOMP
//!    `CONNECT` / `CONNECTED` handshake
//! 2. Subscribes to the channel topic, then asks the backend to push the
//!    current state
//! 3. Hands every `MESSAGE` payload, parsed as JSON, to the inbound sink
//! 4. On any transport failure, waits a fixed delay and starts over
//!
//! Failures never escape the adapter; they show up in [`ConnectionStatus`].

mod session;

use std::sync::Arc;
use std::time::Duration;

use autoserv_stomp::HeartBeat;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::credentials::CredentialProvider;

/// How long `disconnect` waits for a graceful teardown before aborting.
const TEARDOWN_GRACE: Duration = Duration::from_secs(5);

/// Connection state as seen by consumers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Never connected.
    #[default]
    Idle,
    /// Opening the socket / handshaking.
    Connecting,
    /// Subscribed and receiving.
    Connected,
    /// Last attempt failed; retrying after the fixed delay.
    Reconnecting { attempt: u32, error: String },
    /// Torn down by `disconnect`.
    Closed,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Error from the last failed attempt, if currently retrying.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Reconnecting { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// A JSON payload received on the subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub destination: String,
    pub payload: serde_json::Value,
    pub message_id: Option<String>,

    /// From a `sequence` frame header, when the broker sends one.
    pub sequence: Option<u64>,
}

/// Receives inbound messages in arrival order.
///
/// Called from the session task; implementations must not block.
pub trait InboundSink: Send + Sync + 'static {
    fn deliver(&self, message: InboundMessage);
}

/// Transport settings, taken from [`SyncConfig`].
#[derive(Debug, Clone)]
pub(crate) struct TransportSettings {
    pub ws_url: String,
    pub topic_prefix: String,
    pub request_destination: String,
    pub reconnect_delay: Duration,
    pub handshake_timeout: Duration,
    pub heart_beat: HeartBeat,
}

impl From<&SyncConfig> for TransportSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            ws_url: config.ws_url.clone(),
            topic_prefix: config.dashboard_topic_prefix.clone(),
            request_destination: config.dashboard_request_destination.clone(),
            reconnect_delay: config.reconnect_delay,
            handshake_timeout: config.handshake_timeout,
            heart_beat: config.heart_beat,
        }
    }
}

struct ActiveChannel {
    key: String,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns at most one live subscription.
///
/// Created per consumer; never shared. Dropping the adapter tears the
/// session down.
pub struct TransportAdapter {
    settings: TransportSettings,
    credentials: Arc<dyn CredentialProvider>,
    status_tx: watch::Sender<ConnectionStatus>,
    active: Option<ActiveChannel>,
}

impl TransportAdapter {
    pub fn new(config: &SyncConfig, credentials: Arc<dyn CredentialProvider>) -> Self {
        let (status_tx, _rx) = watch::channel(ConnectionStatus::Idle);
        Self {
            settings: TransportSettings::from(config),
            credentials,
            status_tx,
            active: None,
        }
    }

    /// Open the channel for `channel_key` and deliver messages to `sink`.
    ///
    /// No-op while a session (for any key) is still running. Returns true if
    /// a new session was started.
    pub fn connect(&mut self, channel_key: &str, sink: Arc<dyn InboundSink>) -> bool {
        if let Some(active) = &self.active {
            if !active.task.is_finished() {
                debug!(
                    active = %active.key,
                    requested = %channel_key,
                    "Channel already open, ignoring connect"
                );
                return false;
            }
        }

        info!(channel = %channel_key, url = %self.settings.ws_url, "Opening live channel");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(session::run(
            self.settings.clone(),
            channel_key.to_string(),
            Arc::clone(&self.credentials),
            sink,
            self.status_tx.clone(),
            shutdown_rx,
        ));

        self.active = Some(ActiveChannel {
            key: channel_key.to_string(),
            shutdown_tx,
            task,
        });
        true
    }

    /// Unsubscribe and close the socket. Safe to call repeatedly, or without
    /// ever connecting.
    pub async fn disconnect(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        info!(channel = %active.key, "Closing live channel");
        let _ = active.shutdown_tx.send(true);

        let mut task = active.task;
        if tokio::time::timeout(TEARDOWN_GRACE, &mut task).await.is_err() {
            warn!(channel = %active.key, "Graceful teardown timed out, aborting");
            task.abort();
        }

        self.status_tx.send_replace(ConnectionStatus::Closed);
    }

    /// Watch the connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status_tx.borrow().is_connected()
    }

    /// Error string from the last failed attempt, if retrying.
    pub fn last_error(&self) -> Option<String> {
        self.status_tx.borrow().error().map(str::to_string)
    }

    /// Key of the open channel.
    pub fn channel_key(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.key.as_str())
    }
}

impl Drop for TransportAdapter {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.shutdown_tx.send(true);
            active.task.abort();
            self.status_tx.send_replace(ConnectionStatus::Closed);
        }
    }
}
