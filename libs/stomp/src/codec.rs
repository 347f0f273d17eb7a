//! Incremental frame decoder.

use bytes::{Buf, BytesMut};

use crate::frame::unescape_header;
use crate::{Command, Frame, StompError};

/// Default upper bound for a single buffered frame (1 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 1024 * 1024;

/// Something read off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// A bare end-of-line between frames.
    HeartBeat,
    /// A complete frame.
    Frame(Frame),
}

/// Buffers raw bytes and yields complete frames.
///
/// A WebSocket message usually carries exactly one frame, but some brokers
/// batch several frames (or heart-beats) into one message, so the decoder is
/// fed incrementally and drained with [`FrameDecoder::next_frame`].
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_frame_len: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_len(DEFAULT_MAX_FRAME_LEN)
    }

    pub fn with_max_frame_len(max_frame_len: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            max_frame_len,
        }
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of bytes waiting for a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Decode the next heart-beat or frame.
    ///
    /// Returns `Ok(None)` when more input is needed. On error the buffer is
    /// discarded, since the stream position can no longer be trusted.
    pub fn next_frame(&mut self) -> Result<Option<Incoming>, StompError> {
        match self.decode_one() {
            Ok(item) => Ok(item),
            Err(e) => {
                self.buf.clear();
                Err(e)
            }
        }
    }

    fn decode_one(&mut self) -> Result<Option<Incoming>, StompError> {
        match self.buf.first() {
            None => return Ok(None),
            Some(b'\n') => {
                self.buf.advance(1);
                return Ok(Some(Incoming::HeartBeat));
            }
            Some(b'\r') => match self.buf.get(1) {
                None => return Ok(None),
                Some(b'\n') => {
                    self.buf.advance(2);
                    return Ok(Some(Incoming::HeartBeat));
                }
                Some(_) => {}
            },
            Some(_) => {}
        }

        // Command and header lines.
        let mut pos = 0;
        let mut lines: Vec<(usize, usize)> = Vec::new();
        loop {
            let Some(rel) = self.buf[pos..].iter().position(|b| *b == b'\n') else {
                return self.need_more();
            };
            let mut end = pos + rel;
            if end > pos && self.buf[end - 1] == b'\r' {
                end -= 1;
            }
            let line = (pos, end);
            pos += rel + 1;
            if line.0 == line.1 {
                break;
            }
            lines.push(line);
        }

        let text = |(start, end): (usize, usize)| {
            std::str::from_utf8(&self.buf[start..end]).map_err(|_| StompError::InvalidUtf8)
        };

        let Some((&first, rest)) = lines.split_first() else {
            return Err(StompError::UnknownCommand(String::new()));
        };
        let mut frame = Frame::new(text(first)?.parse::<Command>()?);
        let escape = frame.escapes_headers();

        for &line in rest {
            let line = text(line)?;
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            if escape {
                frame.push_raw_header(unescape_header(name)?, unescape_header(value)?);
            } else {
                frame.push_raw_header(name.to_string(), value.to_string());
            }
        }

        // Body.
        let body_end = match frame.get_header("content-length") {
            Some(raw) => {
                let len: usize = raw
                    .trim()
                    .parse()
                    .map_err(|_| StompError::InvalidContentLength(raw.to_string()))?;
                if len > self.max_frame_len {
                    return Err(StompError::FrameTooLarge {
                        max: self.max_frame_len,
                    });
                }
                if self.buf.len() < pos + len + 1 {
                    return self.need_more();
                }
                if self.buf[pos + len] != 0 {
                    return Err(StompError::MissingTerminator(len));
                }
                pos + len
            }
            None => match self.buf[pos..].iter().position(|b| *b == 0) {
                Some(rel) => pos + rel,
                None => return self.need_more(),
            },
        };

        let raw = self.buf.split_to(body_end + 1).freeze();
        frame.body = raw.slice(pos..body_end);

        Ok(Some(Incoming::Frame(frame)))
    }

    fn need_more(&self) -> Result<Option<Incoming>, StompError> {
        if self.buf.len() > self.max_frame_len {
            return Err(StompError::FrameTooLarge {
                max: self.max_frame_len,
            });
        }
        Ok(None)
    }
}
