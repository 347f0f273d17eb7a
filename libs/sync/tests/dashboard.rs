//! Live dashboard against an in-process broker and a mocked REST backend.

use std::sync::Arc;
use std::time::Duration;

use autoserv_stomp::{Command, HeartBeat};
use autoserv_sync::{
    ConnectionStatus, DashboardSession, InboundMessage, InboundSink, SyncConfig,
    TransportAdapter, DASHBOARD_OVERVIEW_PATH,
};
use autoserv_testing::{init_tracing, session, snapshot, snapshot_json, test_config, StompBroker};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WAIT: Duration = Duration::from_secs(5);
const TOPIC: &str = "/topic/customer/dashboard/alice";

async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

async fn overview_server(body: serde_json::Value, delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(DASHBOARD_OVERVIEW_PATH))
        .and(header("cookie", "SESSION=test-alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
        .mount(&server)
        .await;
    server
}

async fn setup(body: serde_json::Value, delay: Duration) -> (MockServer, StompBroker, SyncConfig) {
    init_tracing();
    let server = overview_server(body, delay).await;
    let broker = StompBroker::spawn().await.unwrap();
    let config = test_config(&server.uri(), &broker.ws_url());
    (server, broker, config)
}

#[tokio::test]
async fn test_push_replaces_fetched_baseline() {
    let baseline = snapshot(2, 5, 1, 0, 3);
    let pushed = snapshot(3, 5, 1, 1, 3);
    let (_server, broker, config) = setup(snapshot_json(&baseline), Duration::ZERO).await;

    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();

    assert!(eventually(|| dashboard.snapshot() == Some(baseline)).await);
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 1).await);

    assert_eq!(broker.publish(TOPIC, &snapshot_json(&pushed)), 1);
    assert!(eventually(|| dashboard.snapshot() == Some(pushed)).await);

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_late_baseline_is_ignored() {
    let baseline = snapshot(2, 5, 1, 0, 3);
    let pushed = snapshot(3, 5, 1, 1, 3);
    let (server, broker, config) =
        setup(snapshot_json(&baseline), Duration::from_millis(300)).await;
    broker.reply_to_requests(
        &config.dashboard_request_destination,
        &config.dashboard_topic_prefix,
        &snapshot_json(&pushed),
    );

    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(eventually(|| dashboard.snapshot() == Some(pushed)).await);

    // Let the slow fetch land.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    assert_eq!(dashboard.snapshot(), Some(pushed));
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_last_push_wins() {
    let (_server, broker, config) =
        setup(snapshot_json(&snapshot(0, 0, 0, 0, 0)), Duration::ZERO).await;
    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 1).await);

    for n in 1..=20 {
        broker.publish(TOPIC, &snapshot_json(&snapshot(n, n, 0, 0, 0)));
    }
    let last = snapshot(20, 20, 0, 0, 0);
    assert!(eventually(|| dashboard.snapshot() == Some(last)).await);
    assert!(dashboard.state().pushes_applied() >= 20);

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_handshake_carries_session_and_requests_push() {
    let (_server, broker, config) =
        setup(snapshot_json(&snapshot(1, 0, 0, 0, 0)), Duration::ZERO).await;
    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();

    assert!(broker.wait_until(WAIT, |b| !b.frames(Command::Send).is_empty()).await);
    assert_eq!(broker.cookies(), vec![Some("SESSION=test-alice".to_string())]);

    let subscribe = &broker.frames(Command::Subscribe)[0];
    assert_eq!(subscribe.get_header("destination"), Some(TOPIC));

    let request = &broker.frames(Command::Send)[0];
    assert_eq!(
        request.get_header("destination"),
        Some("/app/customer/dashboard/request")
    );
    assert_eq!(request.body_str().unwrap(), "alice");
    assert!(dashboard.is_connected());
    assert_eq!(dashboard.channel_key().map(|u| u.as_str()), Some("alice"));

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_unmount_stops_updates() {
    let (_server, broker, config) =
        setup(snapshot_json(&snapshot(1, 0, 0, 0, 0)), Duration::ZERO).await;
    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(eventually(|| dashboard.is_connected()).await);
    assert!(eventually(|| dashboard.snapshot().is_some()).await);
    let before = dashboard.snapshot();

    dashboard.unmount().await;

    assert!(!dashboard.is_connected());
    assert_eq!(*dashboard.connection_status().borrow(), ConnectionStatus::Closed);
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 0).await);
    assert!(broker.wait_until(WAIT, |b| b.frames(Command::Disconnect).len() == 1).await);
    assert_eq!(broker.frames(Command::Unsubscribe).len(), 1);

    assert_eq!(broker.publish(TOPIC, &snapshot_json(&snapshot(9, 9, 9, 9, 9))), 0);
    assert_eq!(dashboard.snapshot(), before);
    assert!(dashboard.state().is_closed());

    // Idempotent.
    dashboard.unmount().await;
}

#[tokio::test]
async fn test_malformed_payload_keeps_subscription() {
    let (_server, broker, config) =
        setup(snapshot_json(&snapshot(1, 0, 0, 0, 0)), Duration::ZERO).await;
    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 1).await);

    broker.publish_raw(TOPIC, "{not json", &[]);
    broker.publish_raw(TOPIC, r#"{"activeServices":"many"}"#, &[]);
    broker.publish(TOPIC, &snapshot_json(&snapshot(4, 0, 0, 0, 0)));

    assert!(eventually(|| dashboard.snapshot() == Some(snapshot(4, 0, 0, 0, 0))).await);
    assert!(dashboard.is_connected());
    assert_eq!(broker.total_connections(), 1);

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_reconnects_without_duplicate_subscriptions() {
    let (_server, broker, config) =
        setup(snapshot_json(&snapshot(1, 0, 0, 0, 0)), Duration::ZERO).await;
    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 1).await);

    broker.drop_connections();

    assert!(broker.wait_until(WAIT, |b| b.total_connections() == 2).await);
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 1).await);
    assert!(eventually(|| dashboard.is_connected()).await);
    // A fresh push is requested after every reconnect.
    assert!(broker.wait_until(WAIT, |b| b.frames(Command::Send).len() == 2).await);

    broker.publish(TOPIC, &snapshot_json(&snapshot(7, 0, 0, 0, 0)));
    assert!(eventually(|| dashboard.snapshot() == Some(snapshot(7, 0, 0, 0, 0))).await);

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_broker_error_surfaces_as_status() {
    let (_server, broker, config) =
        setup(snapshot_json(&snapshot(1, 0, 0, 0, 0)), Duration::ZERO).await;
    broker.reject_connects(Some("access denied"));

    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(eventually(|| {
        dashboard
            .last_error()
            .is_some_and(|e| e.contains("access denied"))
    })
    .await);
    assert!(!dashboard.is_connected());

    // Recovers on its own once the broker accepts again.
    broker.reject_connects(None);
    assert!(eventually(|| dashboard.is_connected()).await);
    assert_eq!(dashboard.last_error(), None);

    dashboard.unmount().await;
}

#[tokio::test]
async fn test_silent_server_triggers_reconnect() {
    let (_server, broker, mut config) =
        setup(snapshot_json(&snapshot(1, 0, 0, 0, 0)), Duration::ZERO).await;
    // The broker promises heart-beats every 100ms but never sends any.
    broker.set_heart_beat(HeartBeat::new(100, 0));
    config.heart_beat = HeartBeat::new(0, 100);

    let mut dashboard = DashboardSession::mount(&config, session("alice")).unwrap();
    assert!(broker.wait_until(WAIT, |b| b.total_connections() >= 2).await);

    dashboard.unmount().await;
}

struct Recorder(std::sync::Mutex<Vec<InboundMessage>>);

impl InboundSink for Recorder {
    fn deliver(&self, message: InboundMessage) {
        self.0.lock().unwrap().push(message);
    }
}

#[tokio::test]
async fn test_adapter_connect_is_noop_while_open() {
    init_tracing();
    let broker = StompBroker::spawn().await.unwrap();
    let config = test_config("http://127.0.0.1:9", &broker.ws_url());
    let sink = Arc::new(Recorder(std::sync::Mutex::new(Vec::new())));

    let mut adapter = TransportAdapter::new(&config, session("alice"));
    assert!(adapter.connect("alice", sink.clone()));
    assert!(!adapter.connect("alice", sink.clone()));
    assert!(!adapter.connect("bob", sink.clone()));
    assert!(broker.wait_until(WAIT, |b| b.subscription_count(TOPIC) == 1).await);
    assert_eq!(broker.subscription_count("/topic/customer/dashboard/bob"), 0);

    broker.publish_raw(TOPIC, r#"{"activeServices":1}"#, &[("sequence", "7")]);
    assert!(eventually(|| !sink.0.lock().unwrap().is_empty()).await);
    let received = sink.0.lock().unwrap()[0].clone();
    assert_eq!(received.destination, TOPIC);
    assert_eq!(received.sequence, Some(7));
    assert_eq!(received.payload["activeServices"], 1);

    adapter.disconnect().await;
    adapter.disconnect().await;
    assert!(!adapter.is_connected());
    assert_eq!(adapter.channel_key(), None);
}

#[tokio::test]
async fn test_adapter_disconnect_without_connect() {
    let config = SyncConfig::default();
    let mut adapter = TransportAdapter::new(&config, session("alice"));
    adapter.disconnect().await;
    assert!(!adapter.is_connected());
    assert_eq!(*adapter.status().borrow(), ConnectionStatus::Idle);
}
