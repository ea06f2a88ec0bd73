// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request/response transports.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use gstd_proto::wire::TERMINATOR;
use tracing::debug;

use crate::ClientError;

/// Carries one command line to the daemon and returns its response line.
///
/// Implementations send `line` plus a terminator and read exactly one
/// terminated response. The client serializes calls, so a transport never
/// sees two requests at once.
pub trait Transport: Send {
    /// Round-trip one request.
    fn request(&mut self, line: &str) -> Result<String, ClientError>;
}

/// TCP transport, per-call or persistent.
#[derive(Debug)]
pub struct TcpTransport {
    address: String,
    port: u16,
    timeout: Option<Duration>,
    persistent: bool,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpTransport {
    /// Transport to `address:port`. `timeout` bounds connect, send and
    /// receive; `None` blocks. `persistent` keeps one socket across calls.
    pub fn new(
        address: impl Into<String>,
        port: u16,
        timeout: Option<Duration>,
        persistent: bool,
    ) -> Self {
        Self {
            address: address.into(),
            port,
            timeout,
            persistent,
            stream: None,
        }
    }

    /// Open the socket now instead of on the first request.
    pub fn connect(&mut self) -> Result<(), ClientError> {
        if self.stream.is_none() {
            self.stream = Some(self.open()?);
        }
        Ok(())
    }

    fn open(&self) -> Result<BufReader<TcpStream>, ClientError> {
        let addrs = (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(ClientError::Unreachable)?;
        let mut last = io::Error::new(io::ErrorKind::AddrNotAvailable, "no address resolved");
        for addr in addrs {
            let attempt = match self.timeout {
                Some(t) => TcpStream::connect_timeout(&addr, t),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    stream
                        .set_read_timeout(self.timeout)
                        .map_err(ClientError::Unreachable)?;
                    stream
                        .set_write_timeout(self.timeout)
                        .map_err(ClientError::Unreachable)?;
                    debug!(%addr, "connected");
                    return Ok(BufReader::new(stream));
                }
                Err(err) => last = err,
            }
        }
        Err(ClientError::Unreachable(last))
    }

    fn exchange(stream: &mut BufReader<TcpStream>, line: &str) -> Result<String, ClientError> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(TERMINATOR);
        let sock = stream.get_mut();
        sock.write_all(&frame).map_err(|e| io_error(e, ClientError::Send))?;
        sock.flush().map_err(|e| io_error(e, ClientError::Send))?;

        let mut buf = Vec::new();
        let n = stream
            .read_until(TERMINATOR, &mut buf)
            .map_err(|e| io_error(e, ClientError::Recv))?;
        if n == 0 || buf.last() != Some(&TERMINATOR) {
            return Err(ClientError::Recv(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before a full response",
            )));
        }
        String::from_utf8(buf).map_err(|e| ClientError::Malformed(e.into()))
    }
}

fn io_error(err: io::Error, wrap: fn(io::Error) -> ClientError) -> ClientError {
    match err.kind() {
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ClientError::Timeout,
        _ => wrap(err),
    }
}

impl Transport for TcpTransport {
    fn request(&mut self, line: &str) -> Result<String, ClientError> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.open()?,
        };
        let result = Self::exchange(&mut stream, line);
        if self.persistent && result.is_ok() {
            self.stream = Some(stream);
        }
        result
    }
}
