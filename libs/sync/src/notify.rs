//! User-facing notifications for mutation outcomes.

use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 64;

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Success(String),
    Error(String),
}

impl Notification {
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Broadcasts notifications to any number of listeners.
///
/// Sending never fails: with no listeners the notification is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.send(Notification::Success(message.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.send(Notification::Error(message.into()));
    }

    fn send(&self, notification: Notification) {
        if self.tx.send(notification).is_err() {
            debug!("No notification listeners");
        }
    }
}
