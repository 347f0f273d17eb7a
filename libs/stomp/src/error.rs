//! Error types for STOMP frame handling.

use thiserror::Error;

/// Errors that can occur when encoding or decoding STOMP frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StompError {
    /// The command line is not a known STOMP command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// A header line has no `:` separator.
    #[error("malformed header line: {0}")]
    MalformedHeader(String),

    /// A header value contains an undefined escape sequence.
    #[error("invalid escape sequence in header: {0}")]
    InvalidEscape(String),

    /// The `content-length` header is not a valid length.
    #[error("invalid content-length: {0}")]
    InvalidContentLength(String),

    /// The byte following a length-delimited body is not NUL.
    #[error("missing NUL terminator after {0}-byte body")]
    MissingTerminator(usize),

    /// The frame (or a partial frame) exceeds the decoder limit.
    #[error("frame exceeds {max} bytes")]
    FrameTooLarge { max: usize },

    /// A text section is not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// The `heart-beat` header is not `<cx>,<cy>`.
    #[error("invalid heart-beat header: {0}")]
    InvalidHeartBeat(String),
}
