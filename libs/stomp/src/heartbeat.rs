//! Heart-beat negotiation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::StompError;

/// A `heart-beat` header value: `<send-ms>,<recv-ms>`.
///
/// On the client side `send_ms` is the smallest interval at which the client
/// can send heart-beats and `recv_ms` is the interval it would like to receive
/// them at. Zero means "cannot" / "does not want".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartBeat {
    pub send_ms: u64,
    pub recv_ms: u64,
}

impl HeartBeat {
    pub const fn new(send_ms: u64, recv_ms: u64) -> Self {
        Self { send_ms, recv_ms }
    }

    /// Heart-beats disabled in both directions.
    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Negotiate the effective intervals given the server's `CONNECTED` value.
    ///
    /// Returns `(outgoing, incoming)`: how often the client must send, and how
    /// often it should expect to hear from the server.
    pub fn negotiate(&self, server: &HeartBeat) -> (Option<Duration>, Option<Duration>) {
        let outgoing = if self.send_ms == 0 || server.recv_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.send_ms.max(server.recv_ms)))
        };

        let incoming = if self.recv_ms == 0 || server.send_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.recv_ms.max(server.send_ms)))
        };

        (outgoing, incoming)
    }
}

impl fmt::Display for HeartBeat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.send_ms, self.recv_ms)
    }
}

impl FromStr for HeartBeat {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StompError::InvalidHeartBeat(s.to_string());
        let (send, recv) = s.split_once(',').ok_or_else(invalid)?;
        Ok(Self {
            send_ms: send.trim().parse().map_err(|_| invalid())?,
            recv_ms: recv.trim().parse().map_err(|_| invalid())?,
        })
    }
}
