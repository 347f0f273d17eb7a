//! Configuration for the sync client.

use std::time::Duration;

use autoserv_reconcile::OrderingPolicy;
use autoserv_stomp::HeartBeat;

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080";

/// Default STOMP WebSocket endpoint.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8080/ws";

/// Sync client configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// REST base URL.
    pub api_url: String,

    /// STOMP-over-WebSocket endpoint.
    pub ws_url: String,

    /// Topic prefix; the channel key (username) is appended.
    pub dashboard_topic_prefix: String,

    /// Destination for "push me the current dashboard" requests.
    pub dashboard_request_destination: String,

    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,

    /// Upper bound for socket open plus STOMP handshake.
    pub handshake_timeout: Duration,

    /// Heart-beat offer sent in `CONNECT`.
    pub heart_beat: HeartBeat,

    /// Upper bound for move and rebalance requests.
    pub mutation_timeout: Duration,

    /// Push ordering policy for the dashboard state.
    pub ordering: OrderingPolicy,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            dashboard_topic_prefix: "/topic/customer/dashboard/".to_string(),
            dashboard_request_destination: "/app/customer/dashboard/request".to_string(),
            reconnect_delay: Duration::from_secs(5),
            handshake_timeout: Duration::from_secs(30),
            heart_beat: HeartBeat::new(10_000, 10_000),
            mutation_timeout: Duration::from_secs(60),
            ordering: OrderingPolicy::DeliveryOrder,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("AUTOSERV_API_URL") {
            config.api_url = url;
        }
        if let Ok(url) = std::env::var("AUTOSERV_WS_URL") {
            config.ws_url = url;
        }
        if let Ok(prefix) = std::env::var("AUTOSERV_DASHBOARD_TOPIC_PREFIX") {
            config.dashboard_topic_prefix = prefix;
        }
        if let Ok(dest) = std::env::var("AUTOSERV_DASHBOARD_REQUEST_DESTINATION") {
            config.dashboard_request_destination = dest;
        }
        if let Some(ms) = env_u64("AUTOSERV_RECONNECT_DELAY_MS") {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = env_u64("AUTOSERV_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = env_u64("AUTOSERV_MUTATION_TIMEOUT_SECS") {
            config.mutation_timeout = Duration::from_secs(secs);
        }
        if let Some(hb) = std::env::var("AUTOSERV_HEART_BEAT")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.heart_beat = hb;
        }
        if std::env::var("AUTOSERV_SEQUENCED_PUSHES").is_ok_and(|v| v == "1" || v == "true") {
            config.ordering = OrderingPolicy::Sequenced;
        }

        config
    }

    /// Topic for a channel key.
    pub fn dashboard_topic(&self, channel_key: &str) -> String {
        format!("{}{}", self.dashboard_topic_prefix, channel_key)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(
            config.dashboard_topic("alice"),
            "/topic/customer/dashboard/alice"
        );
        assert_eq!(
            config.dashboard_request_destination,
            "/app/customer/dashboard/request"
        );
        assert!(config.mutation_timeout > Duration::ZERO);
    }
}
