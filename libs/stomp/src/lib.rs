//! # autoserv-stomp
//!
//! A small STOMP 1.2 codec for the message channel the backend exposes over
//! WebSocket.
//!
//! ## Frame Layout
//!
//! ```text
//! COMMAND EOL
//! header:value EOL   (zero or more)
//! EOL
//! body NUL
//! ```
//!
//! `EOL` is `\n` or `\r\n`. A bare `EOL` between frames is a heart-beat.
//! When a `content-length` header is present the body is read by length and may
//! contain NUL bytes; otherwise the body ends at the first NUL.
//!
//! Header values are escaped (`\\`, `\n`, `\r`, `\c`) on every frame except
//! `CONNECT` and `CONNECTED`.
//!
//! The codec is transport agnostic: callers feed raw bytes from WebSocket text
//! or binary messages into a [`FrameDecoder`] and write [`Frame::encode`] output
//! back as text messages.

mod codec;
mod error;
mod frame;
mod heartbeat;

pub use codec::{FrameDecoder, Incoming, DEFAULT_MAX_FRAME_LEN};
pub use error::StompError;
pub use frame::{Command, Frame};
pub use heartbeat::HeartBeat;

/// Protocol versions offered in `accept-version`.
pub const ACCEPT_VERSION: &str = "1.2";
