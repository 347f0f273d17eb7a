//! Session task: connect, subscribe, stream, reconnect.

use std::sync::Arc;
use std::time::Duration;

use autoserv_stomp::{Command, Frame, FrameDecoder, HeartBeat, Incoming};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{ConnectionStatus, InboundMessage, InboundSink, TransportSettings};
use crate::credentials::CredentialProvider;
use crate::SyncError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Subscription ids only need to be unique per connection.
const SUBSCRIPTION_ID: &str = "sub-0";

/// Server silence tolerated, as a multiple of the negotiated interval.
const SILENCE_FACTOR: u32 = 2;

enum SessionEnd {
    Shutdown,
    ClosedByServer,
}

/// Run until shutdown is requested, reconnecting after every failure.
pub(super) async fn run(
    settings: TransportSettings,
    channel_key: String,
    credentials: Arc<dyn CredentialProvider>,
    sink: Arc<dyn InboundSink>,
    status_tx: watch::Sender<ConnectionStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut attempt: u32 = 0;
    status_tx.send_replace(ConnectionStatus::Connecting);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let outcome = connect_and_stream(
            &settings,
            &channel_key,
            credentials.as_ref(),
            sink.as_ref(),
            &status_tx,
            &mut shutdown_rx,
        )
        .await;

        let error = match outcome {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::ClosedByServer) => "connection closed by server".to_string(),
            Err(e) => e.to_string(),
        };

        if status_tx.borrow().is_connected() {
            attempt = 0;
        }
        attempt = attempt.saturating_add(1);

        warn!(
            channel = %channel_key,
            attempt,
            error = %error,
            retry_in_ms = settings.reconnect_delay.as_millis() as u64,
            "Live channel lost, reconnecting"
        );
        status_tx.send_replace(ConnectionStatus::Reconnecting { attempt, error });

        tokio::select! {
            _ = tokio::time::sleep(settings.reconnect_delay) => {}
            () = stop_requested(&mut shutdown_rx) => break,
        }
    }

    debug!(channel = %channel_key, "Session task finished");
    status_tx.send_replace(ConnectionStatus::Closed);
}

async fn connect_and_stream(
    settings: &TransportSettings,
    channel_key: &str,
    credentials: &dyn CredentialProvider,
    sink: &dyn InboundSink,
    status_tx: &watch::Sender<ConnectionStatus>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Result<SessionEnd, SyncError> {
    let mut request = settings.ws_url.as_str().into_client_request()?;
    let host = request.uri().host().unwrap_or("localhost").to_string();

    match credentials.session() {
        Some(session) => {
            let cookie = HeaderValue::from_str(&session.cookie)
                .map_err(|e| SyncError::Config(format!("invalid session cookie: {e}")))?;
            request.headers_mut().insert(COOKIE, cookie);
        }
        None => debug!("No session available, connecting without cookie"),
    }

    let handshake = async {
        let (ws, _response) = connect_async(request).await?;
        let (mut write, read) = ws.split();
        let mut reader = FrameReader::new(read);
        send_frame(&mut write, &Frame::connect(&host, settings.heart_beat)).await?;
        let server_heart_beat = await_connected(&mut reader).await?;
        Ok::<_, SyncError>((write, reader, server_heart_beat))
    };

    let (mut write, mut reader, server_heart_beat) = tokio::select! {
        result = tokio::time::timeout(settings.handshake_timeout, handshake) => {
            result.map_err(|_| SyncError::Timeout {
                operation: "STOMP handshake",
                elapsed: settings.handshake_timeout,
            })??
        }
        () = stop_requested(shutdown_rx) => return Ok(SessionEnd::Shutdown),
    };

    let destination = format!("{}{}", settings.topic_prefix, channel_key);
    send_frame(&mut write, &Frame::subscribe(SUBSCRIPTION_ID, &destination)).await?;
    send_frame(
        &mut write,
        &Frame::send(
            &settings.request_destination,
            "text/plain",
            channel_key.to_string(),
        ),
    )
    .await?;

    let (outgoing, incoming) = settings.heart_beat.negotiate(&server_heart_beat);
    info!(
        channel = %channel_key,
        destination = %destination,
        outgoing_heart_beat_ms = outgoing.map(|d| d.as_millis() as u64),
        incoming_heart_beat_ms = incoming.map(|d| d.as_millis() as u64),
        "Live channel connected"
    );
    status_tx.send_replace(ConnectionStatus::Connected);

    let mut send_tick = outgoing.map(periodic);
    let mut check_tick = incoming.map(periodic);
    let silence_limit = incoming.map(|d| d * SILENCE_FACTOR);
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            () = stop_requested(shutdown_rx) => {
                close_gracefully(&mut write).await;
                return Ok(SessionEnd::Shutdown);
            }

            () = tick(&mut send_tick) => {
                trace!("Sending heart-beat");
                write.send(Message::text("\n")).await?;
            }

            () = tick(&mut check_tick) => {
                if let Some(limit) = silence_limit {
                    if last_seen.elapsed() > limit {
                        return Err(SyncError::WebSocket(format!(
                            "no data from server for {limit:?}"
                        )));
                    }
                }
            }

            item = reader.next() => {
                last_seen = Instant::now();
                match item {
                    Ok(None) => return Ok(SessionEnd::ClosedByServer),
                    Ok(Some(Incoming::HeartBeat)) => trace!("Heart-beat received"),
                    Ok(Some(Incoming::Frame(frame))) => handle_frame(frame, sink)?,
                    Err(SyncError::Stomp(e)) => {
                        warn!(channel = %channel_key, error = %e, "Dropping malformed frame");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }
}

async fn await_connected(reader: &mut FrameReader) -> Result<HeartBeat, SyncError> {
    loop {
        match reader.next().await? {
            None => {
                return Err(SyncError::WebSocket(
                    "connection closed during handshake".to_string(),
                ))
            }
            Some(Incoming::HeartBeat) => {}
            Some(Incoming::Frame(frame)) => match frame.command {
                Command::Connected => {
                    let heart_beat = frame
                        .get_header("heart-beat")
                        .map(str::parse::<HeartBeat>)
                        .transpose()?
                        .unwrap_or_else(HeartBeat::disabled);
                    debug!(
                        version = frame.get_header("version").unwrap_or("unknown"),
                        server = frame.get_header("server").unwrap_or("unknown"),
                        heart_beat = %heart_beat,
                        "STOMP session established"
                    );
                    return Ok(heart_beat);
                }
                Command::Error => return Err(broker_error(&frame)),
                other => debug!(command = %other, "Ignoring frame before CONNECTED"),
            },
        }
    }
}

fn handle_frame(frame: Frame, sink: &dyn InboundSink) -> Result<(), SyncError> {
    match frame.command {
        Command::Message => {
            if let Some(subscription) = frame.get_header("subscription") {
                if subscription != SUBSCRIPTION_ID {
                    debug!(subscription, "Ignoring message for unknown subscription");
                    return Ok(());
                }
            }

            let destination = frame.get_header("destination").unwrap_or_default().to_string();
            let parsed = frame
                .body_str()
                .map_err(SyncError::from)
                .and_then(|body| serde_json::from_str(body).map_err(SyncError::from));
            let payload = match parsed {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(destination = %destination, error = %e, "Dropping malformed payload");
                    return Ok(());
                }
            };

            sink.deliver(InboundMessage {
                destination,
                payload,
                message_id: frame.get_header("message-id").map(str::to_string),
                sequence: frame.get_header("sequence").and_then(|s| s.parse().ok()),
            });
            Ok(())
        }
        Command::Error => Err(broker_error(&frame)),
        Command::Receipt => {
            debug!(receipt = frame.get_header("receipt-id").unwrap_or_default(), "Receipt");
            Ok(())
        }
        other => {
            debug!(command = %other, "Ignoring unexpected frame");
            Ok(())
        }
    }
}

fn broker_error(frame: &Frame) -> SyncError {
    let message = frame
        .get_header("message")
        .map(str::to_string)
        .or_else(|| frame.body_str().ok().map(|b| b.trim().to_string()))
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| "unspecified broker error".to_string());
    SyncError::Broker(message)
}

async fn send_frame(write: &mut WsSink, frame: &Frame) -> Result<(), SyncError> {
    trace!(command = %frame.command, "Sending frame");
    write.send(Message::text(frame.encode_text()?)).await?;
    Ok(())
}

async fn close_gracefully(write: &mut WsSink) {
    let receipt = format!("disconnect-{}", Uuid::new_v4());
    for frame in [
        Frame::unsubscribe(SUBSCRIPTION_ID),
        Frame::disconnect(Some(&receipt)),
    ] {
        if let Err(e) = send_frame(write, &frame).await {
            debug!(error = %e, "Teardown frame not sent");
            return;
        }
    }
    if let Err(e) = write.close().await {
        debug!(error = %e, "WebSocket close failed");
    }
}

/// Resolves once shutdown is requested or the adapter is gone.
async fn stop_requested(shutdown_rx: &mut watch::Receiver<bool>) {
    let _ = shutdown_rx.wait_for(|stop| *stop).await;
}

fn periodic(period: Duration) -> Interval {
    interval_at(Instant::now() + period, period)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Reads WebSocket messages and yields STOMP frames.
struct FrameReader {
    read: SplitStream<WsStream>,
    decoder: FrameDecoder,
}

impl FrameReader {
    fn new(read: SplitStream<WsStream>) -> Self {
        Self {
            read,
            decoder: FrameDecoder::new(),
        }
    }

    /// Next heart-beat or frame; `None` once the socket is closed.
    ///
    /// WebSocket pings count as heart-beats.
    async fn next(&mut self) -> Result<Option<Incoming>, SyncError> {
        loop {
            if let Some(item) = self.decoder.next_frame()? {
                return Ok(Some(item));
            }

            match self.read.next().await {
                Some(Ok(Message::Text(text))) => self.decoder.push(text.as_bytes()),
                Some(Ok(Message::Binary(data))) => self.decoder.push(&data),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                    return Ok(Some(Incoming::HeartBeat))
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(Message::Frame(_))) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}
