// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! TCP transport: accept loop and per-connection line handling.
//!
//! Each connection runs in its own task. Command lines are executed on the
//! blocking pool because a signal `read` may park its thread until the
//! engine fires or the timeout expires.

use std::sync::Arc;

use anyhow::Result;
use gstd_core::Daemon;
use gstd_proto::wire::{encode_response, LineBuffer, DEFAULT_MAX_LINE_BYTES};
use gstd_proto::{ProtoError, Response};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Per-connection behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerOptions {
    /// Serve further commands after the first response.
    pub keep_connection_open: bool,
    /// Longest accepted command line.
    pub max_line_bytes: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            keep_connection_open: true,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

/// Accept connections forever, one task each.
pub async fn serve(
    listener: TcpListener,
    daemon: Arc<Daemon>,
    options: ServerOptions,
) -> Result<()> {
    info!(addr = ?listener.local_addr().ok(), "gstd listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "connection accepted");
        let daemon = Arc::clone(&daemon);
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, daemon, options).await {
                warn!(%peer, ?err, "client handler error");
            }
            debug!(%peer, "connection closed");
        });
    }
}

async fn send(stream: &mut TcpStream, response: &Response) -> Result<()> {
    let frame = encode_response(response)?;
    stream.write_all(&frame).await?;
    Ok(())
}

/// Serve one connection until EOF, an oversized line, or (in close mode)
/// the first response.
pub async fn handle_client(
    mut stream: TcpStream,
    daemon: Arc<Daemon>,
    options: ServerOptions,
) -> Result<()> {
    let mut read_buf = vec![0u8; 16 * 1024];
    let mut lines = LineBuffer::new(options.max_line_bytes);
    loop {
        let n = stream.read(&mut read_buf).await?;
        if n == 0 {
            if !lines.is_empty() {
                debug!("dropping unterminated trailing line");
            }
            return Ok(());
        }
        lines.push(&read_buf[..n]);

        loop {
            let line = match lines.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err @ ProtoError::LineTooLong { .. }) => {
                    warn!(%err, "closing connection");
                    send(&mut stream, &Response::error(err.return_code())).await?;
                    stream.shutdown().await?;
                    return Ok(());
                }
                Err(err) => {
                    warn!(%err, "undecodable line");
                    send(&mut stream, &Response::error(err.return_code())).await?;
                    continue;
                }
            };
            let d = Arc::clone(&daemon);
            let response = tokio::task::spawn_blocking(move || d.execute(&line)).await?;
            send(&mut stream, &response).await?;
            if !options.keep_connection_open {
                stream.shutdown().await?;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gstd_core::engine::sim::SimEngine;
    use gstd_proto::wire::decode_response;
    use gstd_proto::ReturnCode;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::time::{timeout, Duration};

    async fn start(options: ServerOptions) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let daemon = Arc::new(Daemon::new(Arc::new(SimEngine::new())));
        tokio::spawn(serve(listener, daemon, options));
        addr
    }

    async fn read_line(reader: &mut BufReader<TcpStream>) -> String {
        let mut line = String::new();
        timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        line
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn serves_pipelined_commands_with_split_writes() {
        let addr = start(ServerOptions::default()).await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);

        reader
            .get_mut()
            .write_all(b"create /pipelines p0 fakesink\r\nread /pipe")
            .await
            .unwrap();
        let first = decode_response(read_line(&mut reader).await.as_bytes()).unwrap();
        assert_eq!(first.code, ReturnCode::Ok);

        reader.get_mut().write_all(b"lines\n").await.unwrap();
        let second = decode_response(read_line(&mut reader).await.as_bytes()).unwrap();
        assert_eq!(second.response.unwrap().as_list().unwrap(), ["p0".to_string()]);

        reader.get_mut().write_all(b"jump /\n").await.unwrap();
        let third = decode_response(read_line(&mut reader).await.as_bytes()).unwrap();
        assert_eq!(third.code, ReturnCode::BadCommand);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_mode_answers_once() {
        let addr = start(ServerOptions {
            keep_connection_open: false,
            ..ServerOptions::default()
        })
        .await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        reader
            .get_mut()
            .write_all(b"read /\n")
            .await
            .unwrap();
        let first = decode_response(read_line(&mut reader).await.as_bytes()).unwrap();
        assert_eq!(first.code, ReturnCode::Ok);
        assert_eq!(read_line(&mut reader).await, "");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_lines_close_with_bad_value() {
        let addr = start(ServerOptions {
            keep_connection_open: true,
            max_line_bytes: 32,
        })
        .await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut reader = BufReader::new(stream);
        let long = format!("read /{}\n", "x".repeat(64));
        reader.get_mut().write_all(long.as_bytes()).await.unwrap();
        let resp = decode_response(read_line(&mut reader).await.as_bytes()).unwrap();
        assert_eq!(resp.code, ReturnCode::BadValue);
        assert_eq!(read_line(&mut reader).await, "");
    }
}
