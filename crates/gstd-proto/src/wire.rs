// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Line framing for commands and responses.
//!
//! Both directions carry one frame per line:
//!
//! ``FRAME || '\n'``
//!
//! * a request frame is a [`Command`] line
//! * a response frame is a compact JSON [`Response`] (compact JSON never
//!   contains a raw newline)
//!
//! A trailing `'\r'` or NUL before the terminator is tolerated so that
//! `telnet`/`nc` sessions and NUL-terminated legacy clients work.

use crate::{Command, ProtoError, Response};

/// Frame terminator.
pub const TERMINATOR: u8 = b'\n';
/// Default upper bound on a single frame, terminator excluded.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Encode a command frame.
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let mut out = cmd.to_line().into_bytes();
    out.push(TERMINATOR);
    out
}

/// Encode a response frame.
pub fn encode_response(resp: &Response) -> Result<Vec<u8>, ProtoError> {
    let mut out = serde_json::to_vec(resp)?;
    out.push(TERMINATOR);
    Ok(out)
}

/// Decode one response frame (terminator optional).
pub fn decode_response(frame: &[u8]) -> Result<Response, ProtoError> {
    let text = strip_terminator(frame);
    Ok(serde_json::from_slice(text)?)
}

fn strip_terminator(mut frame: &[u8]) -> &[u8] {
    while let [head @ .., last] = frame {
        if matches!(*last, b'\n' | b'\r' | 0) {
            frame = head;
        } else {
            break;
        }
    }
    frame
}

/// Accumulates raw socket reads and yields complete lines.
///
/// Short reads never desynchronize framing: bytes stay buffered until a
/// terminator arrives.
#[derive(Debug)]
pub struct LineBuffer {
    acc: Vec<u8>,
    max: usize,
}

impl LineBuffer {
    /// New buffer enforcing `max` bytes per line.
    pub fn new(max: usize) -> Self {
        Self {
            acc: Vec::with_capacity(max.min(16 * 1024)),
            max,
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.acc.extend_from_slice(bytes);
    }

    /// `true` when no partial line is buffered.
    pub fn is_empty(&self) -> bool {
        self.acc.is_empty()
    }

    /// Pop the next complete line, if one is buffered.
    ///
    /// Returns [`ProtoError::LineTooLong`] as soon as the buffered partial line
    /// (or a complete one) exceeds the limit.
    pub fn next_line(&mut self) -> Result<Option<String>, ProtoError> {
        let Some(pos) = self.acc.iter().position(|b| *b == TERMINATOR) else {
            if self.acc.len() > self.max {
                return Err(ProtoError::LineTooLong {
                    len: self.acc.len(),
                    max: self.max,
                });
            }
            return Ok(None);
        };
        if pos > self.max {
            return Err(ProtoError::LineTooLong {
                len: pos,
                max: self.max,
            });
        }
        let raw: Vec<u8> = self.acc.drain(..=pos).collect();
        let line = String::from_utf8(strip_terminator(&raw).to_vec())?;
        Ok(Some(line))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::{Payload, ReturnCode, Verb};

    #[test]
    fn line_buffer_survives_split_reads() {
        let mut buf = LineBuffer::new(DEFAULT_MAX_LINE_BYTES);
        buf.push(b"read /pipe");
        assert_eq!(buf.next_line().unwrap(), None);
        buf.push(b"lines\r\nread /");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("read /pipelines"));
        assert_eq!(buf.next_line().unwrap(), None);
        buf.push(b"\0\n");
        assert_eq!(buf.next_line().unwrap().as_deref(), Some("read /"));
        assert!(buf.is_empty());
    }

    #[test]
    fn line_buffer_rejects_oversized_lines() {
        let mut buf = LineBuffer::new(8);
        buf.push(b"read /pipelines");
        assert!(matches!(
            buf.next_line(),
            Err(ProtoError::LineTooLong { max: 8, .. })
        ));
    }

    #[test]
    fn command_frame_is_newline_terminated() {
        let cmd = Command::new(Verb::Update, "/pipelines/p0/state", Some("playing".into()));
        assert_eq!(encode_command(&cmd), b"update /pipelines/p0/state playing\n");
    }

    #[test]
    fn response_frame_decodes_with_or_without_terminator() {
        let resp = Response::ok(Some(Payload::text("playing")));
        let frame = encode_response(&resp).unwrap();
        assert_eq!(frame.last(), Some(&TERMINATOR));
        assert_eq!(decode_response(&frame).unwrap(), resp);
        assert_eq!(decode_response(&frame[..frame.len() - 1]).unwrap(), resp);

        let err = decode_response(br#"{"code":42,"description":"?","response":null}"#);
        assert!(err.is_err());
        let timeout = decode_response(br#"{"code":8,"description":"Timed out","response":null}"#)
            .unwrap();
        assert_eq!(timeout.code, ReturnCode::Timeout);
    }
}
