//! In-process STOMP-over-WebSocket broker.
//!
//! Speaks enough STOMP 1.2 for client tests: CONNECT, SUBSCRIBE, UNSUBSCRIBE,
//! SEND and DISCONNECT from clients; CONNECTED, MESSAGE, RECEIPT and ERROR
//! back. Everything a client sends is recorded for assertions.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use autoserv_stomp::{Command, Frame, FrameDecoder, HeartBeat, Incoming};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

/// Auto-reply for "push me the current state" requests.
#[derive(Debug, Clone)]
struct RequestReply {
    destination: String,
    topic_prefix: String,
    payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Subscription {
    id: String,
    destination: String,
}

struct Connection {
    tx: mpsc::UnboundedSender<Message>,
    subscriptions: Vec<Subscription>,
}

#[derive(Default)]
struct BrokerState {
    connections: Mutex<HashMap<u64, Connection>>,
    cookies: Mutex<Vec<Option<String>>>,
    received: Mutex<Vec<Frame>>,
    request_reply: Mutex<Option<RequestReply>>,
    reject_connect: Mutex<Option<String>>,
    heart_beat: Mutex<HeartBeat>,
    next_connection: AtomicU64,
    next_message: AtomicU64,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

impl BrokerState {
    fn send_to(&self, conn_id: u64, frame: &Frame) {
        if let Some(conn) = lock(&self.connections).get(&conn_id) {
            let _ = conn.tx.send(encode(frame));
        }
    }

    fn publish(&self, destination: &str, body: &str, extra: &[(&str, &str)]) -> usize {
        let connections = lock(&self.connections);
        let mut delivered = 0;
        for conn in connections.values() {
            for sub in conn
                .subscriptions
                .iter()
                .filter(|s| s.destination == destination)
            {
                let message_id = self.next_message.fetch_add(1, Ordering::Relaxed);
                let mut frame = Frame::new(Command::Message)
                    .header("subscription", sub.id.as_str())
                    .header("message-id", message_id.to_string())
                    .header("destination", destination)
                    .header("content-type", "application/json");
                for (name, value) in extra {
                    frame = frame.header(*name, *value);
                }
                let frame = frame.with_body(body.to_string());
                if conn.tx.send(encode(&frame)).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

fn encode(frame: &Frame) -> Message {
    Message::binary(frame.encode())
}

/// A running broker. Shut down on drop.
pub struct StompBroker {
    addr: SocketAddr,
    state: Arc<BrokerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl StompBroker {
    /// Bind to an ephemeral localhost port and start accepting.
    pub async fn spawn() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(BrokerState {
            heart_beat: Mutex::new(HeartBeat::disabled()),
            ..BrokerState::default()
        });

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let accept_state = Arc::clone(&state);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => {
                            tokio::spawn(serve(stream, Arc::clone(&accept_state)));
                        }
                        Err(_) => break,
                    },
                    _ = &mut shutdown_rx => break,
                }
            }
        });

        Ok(Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    /// WebSocket URL for clients.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Reply to SENDs on `destination` by publishing `payload` to
    /// `{topic_prefix}{body}`, the way the portal answers push requests.
    pub fn reply_to_requests(
        &self,
        destination: &str,
        topic_prefix: &str,
        payload: &serde_json::Value,
    ) {
        *lock(&self.state.request_reply) = Some(RequestReply {
            destination: destination.to_string(),
            topic_prefix: topic_prefix.to_string(),
            payload: payload.to_string(),
        });
    }

    /// Answer every CONNECT with an ERROR frame carrying `message`.
    pub fn reject_connects(&self, message: Option<&str>) {
        *lock(&self.state.reject_connect) = message.map(str::to_string);
    }

    /// Heart-beat value announced in CONNECTED.
    pub fn set_heart_beat(&self, heart_beat: HeartBeat) {
        *lock(&self.state.heart_beat) = heart_beat;
    }

    /// Publish a JSON payload. Returns how many subscriptions received it.
    pub fn publish(&self, destination: &str, payload: &serde_json::Value) -> usize {
        self.state.publish(destination, &payload.to_string(), &[])
    }

    /// Publish a raw body with extra headers.
    pub fn publish_raw(&self, destination: &str, body: &str, headers: &[(&str, &str)]) -> usize {
        self.state.publish(destination, body, headers)
    }

    /// Active subscriptions on a destination, across all connections.
    pub fn subscription_count(&self, destination: &str) -> usize {
        lock(&self.state.connections)
            .values()
            .flat_map(|c| c.subscriptions.iter())
            .filter(|s| s.destination == destination)
            .count()
    }

    /// Currently open connections.
    pub fn open_connections(&self) -> usize {
        lock(&self.state.connections).len()
    }

    /// Connections accepted since start.
    pub fn total_connections(&self) -> u64 {
        self.state.next_connection.load(Ordering::Relaxed)
    }

    /// `Cookie` header of every handshake, in order.
    pub fn cookies(&self) -> Vec<Option<String>> {
        lock(&self.state.cookies).clone()
    }

    /// Client frames received with the given command.
    pub fn frames(&self, command: Command) -> Vec<Frame> {
        lock(&self.state.received)
            .iter()
            .filter(|f| f.command == command)
            .cloned()
            .collect()
    }

    /// Close every connection from the server side.
    pub fn drop_connections(&self) {
        let mut connections = lock(&self.state.connections);
        for (id, conn) in connections.drain() {
            debug!(connection = id, "Dropping connection");
            let _ = conn.tx.send(Message::Close(None));
        }
    }

    /// Poll `condition` until it holds or `timeout` elapses.
    pub async fn wait_until(&self, timeout: Duration, condition: impl Fn(&Self) -> bool) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if condition(self) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for StompBroker {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        self.drop_connections();
    }
}

async fn serve(stream: TcpStream, state: Arc<BrokerState>) {
    let mut cookie = None;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        cookie = req
            .headers()
            .get(COOKIE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(resp)
    };

    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            debug!(error = %e, "WebSocket handshake failed");
            return;
        }
    };
    lock(&state.cookies).push(cookie);

    let conn_id = state.next_connection.fetch_add(1, Ordering::Relaxed);
    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    lock(&state.connections).insert(
        conn_id,
        Connection {
            tx,
            subscriptions: Vec::new(),
        },
    );

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if write.send(msg).await.is_err() || closing {
                break;
            }
        }
        let _ = write.close().await;
    });

    let mut decoder = FrameDecoder::new();
    while let Some(Ok(msg)) = read.next().await {
        match msg {
            Message::Text(text) => decoder.push(text.as_bytes()),
            Message::Binary(data) => decoder.push(&data),
            Message::Close(_) => break,
            _ => continue,
        }

        loop {
            match decoder.next_frame() {
                Ok(Some(Incoming::Frame(frame))) => handle(conn_id, frame, &state),
                Ok(Some(Incoming::HeartBeat)) => {}
                Ok(None) => break,
                Err(e) => {
                    debug!(connection = conn_id, error = %e, "Bad client frame");
                    break;
                }
            }
        }
    }

    lock(&state.connections).remove(&conn_id);
    debug!(connection = conn_id, "Connection closed");
}

fn handle(conn_id: u64, frame: Frame, state: &BrokerState) {
    lock(&state.received).push(frame.clone());

    match frame.command {
        Command::Connect | Command::Stomp => {
            if let Some(message) = lock(&state.reject_connect).clone() {
                state.send_to(
                    conn_id,
                    &Frame::new(Command::Error).header("message", message),
                );
                if let Some(conn) = lock(&state.connections).remove(&conn_id) {
                    let _ = conn.tx.send(Message::Close(None));
                }
                return;
            }
            let heart_beat = *lock(&state.heart_beat);
            state.send_to(
                conn_id,
                &Frame::new(Command::Connected)
                    .header("version", "1.2")
                    .header("server", "autoserv-testing")
                    .header("heart-beat", heart_beat.to_string()),
            );
        }
        Command::Subscribe => {
            let (Some(id), Some(destination)) =
                (frame.get_header("id"), frame.get_header("destination"))
            else {
                return;
            };
            if let Some(conn) = lock(&state.connections).get_mut(&conn_id) {
                conn.subscriptions.push(Subscription {
                    id: id.to_string(),
                    destination: destination.to_string(),
                });
            }
        }
        Command::Unsubscribe => {
            if let (Some(id), Some(conn)) = (
                frame.get_header("id"),
                lock(&state.connections).get_mut(&conn_id),
            ) {
                conn.subscriptions.retain(|s| s.id != id);
            }
        }
        Command::Send => {
            let reply = lock(&state.request_reply).clone();
            if let Some(reply) = reply {
                if frame.get_header("destination") == Some(reply.destination.as_str()) {
                    if let Ok(key) = frame.body_str() {
                        let topic = format!("{}{}", reply.topic_prefix, key);
                        state.publish(&topic, &reply.payload, &[]);
                    }
                }
            }
        }
        Command::Disconnect => {
            if let Some(receipt) = frame.get_header("receipt") {
                state.send_to(
                    conn_id,
                    &Frame::new(Command::Receipt).header("receipt-id", receipt),
                );
            }
        }
        _ => {}
    }
}
