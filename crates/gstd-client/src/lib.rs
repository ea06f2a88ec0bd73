// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Blocking client for the gstd daemon.
//!
//! Every call formats one `"<verb> <path>[ <arg>]"` line, sends it over a
//! [`Transport`] and parses the JSON response. Non-`Ok` codes come back as
//! [`ClientError::Daemon`]. Empty names are refused locally with
//! [`ClientError::NullArgument`]; names holding `/` or whitespace and
//! arguments holding a line break or NUL are refused with
//! [`ClientError::InvalidArgument`]. Nothing is sent in either case.
//!
//! ```no_run
//! use gstd_client::{ClientConfig, GstClient};
//!
//! # fn main() -> Result<(), gstd_client::ClientError> {
//! let client = GstClient::connect(ClientConfig::default())?;
//! client.pipeline_create("p0", "videotestsrc ! identity name=id ! fakesink")?;
//! client.pipeline_play("p0")?;
//! let emission = client.pipeline_signal_connect("p0", "id", "handoff", 1000)?;
//! assert!(emission.as_object().is_some());
//! client.pipeline_delete("p0")?;
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use gstd_proto::wire::decode_response;
use gstd_proto::{Command, Payload, ProtoError, ReturnCode, Verb, DEFAULT_ADDRESS, DEFAULT_PORT};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

mod transport;

pub use transport::{TcpTransport, Transport};

/// Client failures.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required name or argument was empty.
    #[error("required argument is missing")]
    NullArgument,
    /// A name or argument cannot be carried in one command line.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No connection could be made.
    #[error("daemon unreachable: {0}")]
    Unreachable(#[source] io::Error),
    /// The daemon did not answer within the configured timeout.
    #[error("timed out waiting for the daemon")]
    Timeout,
    /// Writing the request failed.
    #[error("send failed: {0}")]
    Send(#[source] io::Error),
    /// Reading the response failed.
    #[error("receive failed: {0}")]
    Recv(#[source] io::Error),
    /// The response did not parse.
    #[error("malformed response: {0}")]
    Malformed(#[from] ProtoError),
    /// The response parsed but did not have the expected shape.
    #[error("unexpected payload: {0}")]
    UnexpectedPayload(String),
    /// The daemon answered with a failure code.
    #[error("daemon returned {code}: {description}")]
    Daemon {
        /// Result code.
        code: ReturnCode,
        /// Description sent by the daemon.
        description: String,
    },
}

impl ClientError {
    /// Protocol code equivalent of this failure.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            ClientError::NullArgument => ReturnCode::NullArgument,
            ClientError::Timeout => ReturnCode::Timeout,
            ClientError::Unreachable(_) | ClientError::Send(_) | ClientError::Recv(_) => {
                ReturnCode::IoError
            }
            ClientError::InvalidArgument(_)
            | ClientError::Malformed(_)
            | ClientError::UnexpectedPayload(_) => ReturnCode::BadValue,
            ClientError::Daemon { code, .. } => *code,
        }
    }
}

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Daemon address.
    pub address: String,
    /// Daemon port.
    pub port: u16,
    /// Bound on connect/send/receive; `None` blocks.
    pub timeout: Option<Duration>,
    /// Keep one connection for all calls instead of one per call.
    pub keep_connection_open: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            timeout: None,
            keep_connection_open: false,
        }
    }
}

/// Seek parameters for [`GstClient::pipeline_seek`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeekParams {
    /// Playback rate, non-zero.
    pub rate: f64,
    /// Format id (3 = time).
    pub format: i32,
    /// Seek flags bitmask.
    pub flags: u32,
    /// Start type (0 none, 1 set, 2 end).
    pub start_type: i32,
    /// Start position.
    pub start: i64,
    /// Stop type (0 none, 1 set, 2 end).
    pub stop_type: i32,
    /// Stop position, `-1` for none.
    pub stop: i64,
}

impl Default for SeekParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            format: 3,
            flags: 1,
            start_type: 1,
            start: 0,
            stop_type: 1,
            stop: -1,
        }
    }
}

/// Typed client over a [`Transport`].
pub struct GstClient {
    transport: Mutex<Box<dyn Transport>>,
}

impl std::fmt::Debug for GstClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GstClient").finish_non_exhaustive()
    }
}

/// Names become path segments or the first word of an argument.
fn require(names: &[&str]) -> Result<(), ClientError> {
    if names.iter().any(|n| n.is_empty()) {
        return Err(ClientError::NullArgument);
    }
    match names
        .iter()
        .find(|n| n.contains(|c: char| c == '/' || c.is_whitespace() || c.is_control()))
    {
        Some(bad) => Err(ClientError::InvalidArgument(format!("invalid name {bad:?}"))),
        None => Ok(()),
    }
}

fn require_text(text: &str) -> Result<(), ClientError> {
    if text.is_empty() {
        Err(ClientError::NullArgument)
    } else {
        single_line(text)
    }
}

fn single_line(text: &str) -> Result<(), ClientError> {
    if text.contains(|c: char| matches!(c, '\n' | '\r' | '\0')) {
        Err(ClientError::InvalidArgument(format!("{text:?} does not fit on one line")))
    } else {
        Ok(())
    }
}

fn element_path(pipeline: &str, element: &str) -> String {
    format!("/pipelines/{pipeline}/elements/{element}")
}

fn signal_path(pipeline: &str, element: &str, signal: &str) -> String {
    format!("{}/signals/{signal}", element_path(pipeline, element))
}

fn names(payload: Option<Payload>) -> Result<Vec<String>, ClientError> {
    match payload {
        Some(Payload::List(names)) => Ok(names),
        other => Err(ClientError::UnexpectedPayload(format!("expected a list, got {other:?}"))),
    }
}

impl GstClient {
    /// TCP client. In persistent mode the socket is opened immediately so
    /// an unreachable daemon is reported here.
    pub fn connect(config: ClientConfig) -> Result<Self, ClientError> {
        let mut transport = TcpTransport::new(
            config.address,
            config.port,
            config.timeout,
            config.keep_connection_open,
        );
        if config.keep_connection_open {
            transport.connect()?;
        }
        Ok(Self::with_transport(transport))
    }

    /// Client over any transport.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Mutex::new(Box::new(transport)),
        }
    }

    /// Send one command and return the payload of a successful response.
    pub fn call(
        &self,
        verb: Verb,
        path: &str,
        arg: Option<String>,
    ) -> Result<Option<Payload>, ClientError> {
        single_line(path)?;
        if let Some(arg) = &arg {
            single_line(arg)?;
        }
        let line = Command::new(verb, path, arg).to_line();
        debug!(%line, "request");
        let raw = {
            let mut transport = self.transport.lock().unwrap_or_else(PoisonError::into_inner);
            transport.request(&line)?
        };
        let response = decode_response(raw.as_bytes())?;
        if response.code.is_ok() {
            Ok(response.response)
        } else {
            Err(ClientError::Daemon {
                code: response.code,
                description: response.description,
            })
        }
    }

    /// Check that the daemon answers.
    pub fn ping(&self) -> Result<(), ClientError> {
        self.call(Verb::Read, "/", None).map(drop)
    }

    /// Names of all pipelines.
    pub fn list_pipelines(&self) -> Result<Vec<String>, ClientError> {
        names(self.call(Verb::Read, "/pipelines", None)?)
    }

    /// Create `name` from a launch description.
    pub fn pipeline_create(&self, name: &str, description: &str) -> Result<(), ClientError> {
        require(&[name])?;
        require_text(description)?;
        self.call(Verb::Create, "/pipelines", Some(format!("{name} {description}")))
            .map(drop)
    }

    /// Delete `name`.
    pub fn pipeline_delete(&self, name: &str) -> Result<(), ClientError> {
        require(&[name])?;
        self.call(Verb::Delete, "/pipelines", Some(name.to_string()))
            .map(drop)
    }

    fn set_state(&self, name: &str, state: &str) -> Result<(), ClientError> {
        require(&[name])?;
        self.call(
            Verb::Update,
            &format!("/pipelines/{name}/state"),
            Some(state.to_string()),
        )
        .map(drop)
    }

    /// Set `name` to PLAYING.
    pub fn pipeline_play(&self, name: &str) -> Result<(), ClientError> {
        self.set_state(name, "playing")
    }

    /// Set `name` to PAUSED.
    pub fn pipeline_pause(&self, name: &str) -> Result<(), ClientError> {
        self.set_state(name, "paused")
    }

    /// Set `name` to NULL.
    pub fn pipeline_stop(&self, name: &str) -> Result<(), ClientError> {
        self.set_state(name, "null")
    }

    /// Current state token of `name`.
    pub fn pipeline_get_state(&self, name: &str) -> Result<String, ClientError> {
        require(&[name])?;
        match self.call(Verb::Read, &format!("/pipelines/{name}/state"), None)? {
            Some(Payload::Scalar(Value::String(state))) => Ok(state),
            other => Err(ClientError::UnexpectedPayload(format!(
                "expected a state, got {other:?}"
            ))),
        }
    }

    /// Element names of `name`.
    pub fn pipeline_list_elements(&self, name: &str) -> Result<Vec<String>, ClientError> {
        require(&[name])?;
        names(self.call(Verb::Read, &format!("/pipelines/{name}/elements"), None)?)
    }

    /// Property names of an element.
    pub fn element_properties_list(
        &self,
        pipeline: &str,
        element: &str,
    ) -> Result<Vec<String>, ClientError> {
        require(&[pipeline, element])?;
        names(self.call(
            Verb::Read,
            &format!("{}/properties", element_path(pipeline, element)),
            None,
        )?)
    }

    /// Current value of a property, in its JSON form.
    pub fn element_get(
        &self,
        pipeline: &str,
        element: &str,
        property: &str,
    ) -> Result<Value, ClientError> {
        require(&[pipeline, element, property])?;
        let payload = self.call(
            Verb::Read,
            &format!("{}/properties/{property}", element_path(pipeline, element)),
            None,
        )?;
        Ok(payload
            .as_ref()
            .and_then(Payload::as_object)
            .and_then(|o| o.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Assign a property from its literal form.
    pub fn element_set(
        &self,
        pipeline: &str,
        element: &str,
        property: &str,
        value: &str,
    ) -> Result<(), ClientError> {
        require(&[pipeline, element, property])?;
        require_text(value)?;
        self.call(
            Verb::Update,
            &format!("{}/properties/{property}", element_path(pipeline, element)),
            Some(value.to_string()),
        )
        .map(drop)
    }

    fn pipeline_event(&self, name: &str, event: &str) -> Result<(), ClientError> {
        require(&[name])?;
        self.call(
            Verb::Create,
            &format!("/pipelines/{name}/event"),
            Some(event.to_string()),
        )
        .map(drop)
    }

    /// Send end-of-stream.
    pub fn pipeline_eos(&self, name: &str) -> Result<(), ClientError> {
        self.pipeline_event(name, "eos")
    }

    /// Start flushing.
    pub fn pipeline_flush_start(&self, name: &str) -> Result<(), ClientError> {
        self.pipeline_event(name, "flush_start")
    }

    /// Stop flushing; `reset` resets running time.
    pub fn pipeline_flush_stop(&self, name: &str, reset: bool) -> Result<(), ClientError> {
        self.pipeline_event(name, &format!("flush_stop {reset}"))
    }

    /// Seek.
    pub fn pipeline_seek(&self, name: &str, seek: SeekParams) -> Result<(), ClientError> {
        self.pipeline_event(
            name,
            &format!(
                "seek {} {} {} {} {} {} {}",
                seek.rate,
                seek.format,
                seek.flags,
                seek.start_type,
                seek.start,
                seek.stop_type,
                seek.stop
            ),
        )
    }

    /// Send any event kind to one element.
    pub fn element_send_event(
        &self,
        pipeline: &str,
        element: &str,
        event: &str,
        params: &str,
    ) -> Result<(), ClientError> {
        require(&[pipeline, element, event])?;
        single_line(params)?;
        let arg = if params.is_empty() {
            event.to_string()
        } else {
            format!("{event} {params}")
        };
        self.call(
            Verb::Create,
            &format!("{}/event", element_path(pipeline, element)),
            Some(arg),
        )
        .map(drop)
    }

    /// Set the await timeout of a signal in milliseconds (`-1` waits
    /// forever).
    pub fn pipeline_signal_timeout(
        &self,
        pipeline: &str,
        element: &str,
        signal: &str,
        timeout_ms: i64,
    ) -> Result<(), ClientError> {
        require(&[pipeline, element, signal])?;
        self.call(
            Verb::Update,
            &format!("{}/timeout", signal_path(pipeline, element, signal)),
            Some(timeout_ms.to_string()),
        )
        .map(drop)
    }

    /// Wait for the next emission of a signal: sets the timeout, then reads
    /// the callback. Returns `{name, arguments}`.
    pub fn pipeline_signal_connect(
        &self,
        pipeline: &str,
        element: &str,
        signal: &str,
        timeout_ms: i64,
    ) -> Result<Payload, ClientError> {
        self.pipeline_signal_timeout(pipeline, element, signal, timeout_ms)?;
        let payload = self.call(
            Verb::Read,
            &format!("{}/callback", signal_path(pipeline, element, signal)),
            None,
        )?;
        payload.ok_or_else(|| ClientError::UnexpectedPayload("emission without arguments".into()))
    }

    /// Disconnect a signal, releasing any blocked reader.
    pub fn pipeline_signal_disconnect(
        &self,
        pipeline: &str,
        element: &str,
        signal: &str,
    ) -> Result<(), ClientError> {
        require(&[pipeline, element, signal])?;
        self.call(
            Verb::Read,
            &format!("{}/disconnect", signal_path(pipeline, element, signal)),
            None,
        )
        .map(drop)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<String>);

    impl Transport for Scripted {
        fn request(&mut self, _line: &str) -> Result<String, ClientError> {
            self.0.pop_front().ok_or(ClientError::Timeout)
        }
    }

    fn client(responses: &[&str]) -> GstClient {
        GstClient::with_transport(Scripted(responses.iter().map(|s| (*s).to_string()).collect()))
    }

    #[test]
    fn failure_codes_become_daemon_errors() {
        let c = client(&[r#"{"code":3,"description":"Resource not found","response":null}"#]);
        let err = c.pipeline_delete("p9").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Daemon { code: ReturnCode::NotFound, .. }
        ));
        assert_eq!(err.return_code(), ReturnCode::NotFound);
    }

    #[test]
    fn payload_shapes_are_checked() {
        let c = client(&[
            concat!(
                r#"{"code":0,"description":"Success","#,
                r#""response":{"nodes":[{"name":"a"},{"name":"b"}]}}"#
            ),
            r#"{"code":0,"description":"Success","response":"paused"}"#,
            r#"{"code":0,"description":"Success","response":7}"#,
        ]);
        assert_eq!(c.list_pipelines().unwrap(), ["a", "b"]);
        assert_eq!(c.pipeline_get_state("p0").unwrap(), "paused");
        assert!(matches!(
            c.pipeline_get_state("p0"),
            Err(ClientError::UnexpectedPayload(_))
        ));
    }

    #[test]
    fn garbage_is_malformed() {
        let c = client(&["not json\n"]);
        let err = c.ping().unwrap_err();
        assert!(matches!(err, ClientError::Malformed(_)));
        assert_eq!(err.return_code(), ReturnCode::BadValue);
    }

    #[test]
    fn line_breaking_arguments_map_to_bad_value() {
        let c = client(&[]);
        let err = c
            .element_set("p0", "sink", "sync", "true\r\nread /")
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidArgument(_)));
        assert_eq!(err.return_code(), ReturnCode::BadValue);
        assert!(matches!(
            c.pipeline_create("p0", ""),
            Err(ClientError::NullArgument)
        ));
    }

    #[test]
    fn transport_errors_pass_through() {
        let c = client(&[]);
        assert_eq!(c.ping().unwrap_err().return_code(), ReturnCode::Timeout);
    }

    #[test]
    fn unreachable_daemon_fails_persistent_connect() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let err = GstClient::connect(ClientConfig {
            port,
            timeout: Some(Duration::from_millis(500)),
            keep_connection_open: true,
            ..ClientConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, ClientError::Unreachable(_)));
        assert_eq!(err.return_code(), ReturnCode::IoError);
    }
}
