// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Wire schema for the gstd control protocol.
//!
//! A request is one text line, `"<verb> <path>[ <arg>]"`. A response is one
//! compact JSON document, `{"code", "description", "response"}`, where
//! `response` is a [`Payload`] (scalar, property bag, or child list) or `null`.
//!
//! Numeric [`ReturnCode`] values are part of the protocol: new codes are
//! appended, existing ones are never renumbered.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

pub mod wire;

/// Default TCP address the daemon binds and the client dials.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
/// Default TCP port for the daemon.
pub const DEFAULT_PORT: u16 = 5000;

/// Result taxonomy shared by the daemon and the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCode {
    /// Command succeeded.
    Ok,
    /// A required argument was missing or empty.
    NullArgument,
    /// A literal, path or description failed to parse or validate.
    BadValue,
    /// The path does not resolve.
    NotFound,
    /// The resolved node does not expose the requested capability.
    MethodNotAllowed,
    /// The resource already exists (duplicate create, wait already pending).
    AlreadyExists,
    /// The target lacks the introspection data needed for the operation.
    MissingInitialization,
    /// The receiver rejected a well-formed event.
    EventError,
    /// A signal await expired.
    Timeout,
    /// A signal waiter was released because the signal was disconnected.
    Cancelled,
    /// Transport failure.
    IoError,
    /// The verb is not one of create/read/update/delete.
    BadCommand,
    /// The engine refused a pipeline state change.
    StateError,
}

impl ReturnCode {
    const ALL: [ReturnCode; 13] = [
        ReturnCode::Ok,
        ReturnCode::NullArgument,
        ReturnCode::BadValue,
        ReturnCode::NotFound,
        ReturnCode::MethodNotAllowed,
        ReturnCode::AlreadyExists,
        ReturnCode::MissingInitialization,
        ReturnCode::EventError,
        ReturnCode::Timeout,
        ReturnCode::Cancelled,
        ReturnCode::IoError,
        ReturnCode::BadCommand,
        ReturnCode::StateError,
    ];

    /// Stable wire ordinal.
    pub fn code(self) -> i32 {
        match self {
            ReturnCode::Ok => 0,
            ReturnCode::NullArgument => 1,
            ReturnCode::BadValue => 2,
            ReturnCode::NotFound => 3,
            ReturnCode::MethodNotAllowed => 4,
            ReturnCode::AlreadyExists => 5,
            ReturnCode::MissingInitialization => 6,
            ReturnCode::EventError => 7,
            ReturnCode::Timeout => 8,
            ReturnCode::Cancelled => 9,
            ReturnCode::IoError => 10,
            ReturnCode::BadCommand => 11,
            ReturnCode::StateError => 12,
        }
    }

    /// Map a wire ordinal back to a code. Unknown ordinals yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.code() == code)
    }

    /// Human readable description carried next to the code.
    pub fn description(self) -> &'static str {
        match self {
            ReturnCode::Ok => "Success",
            ReturnCode::NullArgument => "Required argument is missing",
            ReturnCode::BadValue => "Bad value",
            ReturnCode::NotFound => "Resource not found",
            ReturnCode::MethodNotAllowed => "Operation not allowed on this resource",
            ReturnCode::AlreadyExists => "Resource already exists",
            ReturnCode::MissingInitialization => "Missing initialization",
            ReturnCode::EventError => "Receiver rejected the event",
            ReturnCode::Timeout => "Timed out",
            ReturnCode::Cancelled => "Cancelled",
            ReturnCode::IoError => "I/O error",
            ReturnCode::BadCommand => "Bad command",
            ReturnCode::StateError => "Failed to change pipeline state",
        }
    }

    /// `true` for [`ReturnCode::Ok`].
    pub fn is_ok(self) -> bool {
        self == ReturnCode::Ok
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}

impl Serialize for ReturnCode {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(self.code())
    }
}

impl<'de> Deserialize<'de> for ReturnCode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = i32::deserialize(deserializer)?;
        ReturnCode::from_code(raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown return code {raw}")))
    }
}

/// CRUD verb of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Instantiate (or, for events, send) a resource.
    Create,
    /// Read a resource.
    Read,
    /// Update a resource.
    Update,
    /// Delete a resource.
    Delete,
}

impl Verb {
    /// Keyword used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Create => "create",
            Verb::Read => "read",
            Verb::Update => "update",
            Verb::Delete => "delete",
        }
    }

    /// Parse a wire keyword (exact, lowercase).
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "create" => Some(Verb::Create),
            "read" => Some(Verb::Read),
            "update" => Some(Verb::Update),
            "delete" => Some(Verb::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while framing or parsing protocol text.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// The command line was empty.
    #[error("empty command")]
    EmptyCommand,
    /// The first token is not a known verb.
    #[error("unknown verb {0:?}")]
    UnknownVerb(String),
    /// The verb was not followed by a path.
    #[error("missing path")]
    MissingPath,
    /// A frame exceeded the configured line limit.
    #[error("line of {len} bytes exceeds limit of {max}")]
    LineTooLong {
        /// Observed length.
        len: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Frame bytes were not UTF-8.
    #[error("frame is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// Response JSON was malformed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProtoError {
    /// Return code reported to the peer for this framing failure.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            ProtoError::EmptyCommand | ProtoError::MissingPath => ReturnCode::NullArgument,
            ProtoError::UnknownVerb(_) => ReturnCode::BadCommand,
            ProtoError::LineTooLong { .. } | ProtoError::Utf8(_) | ProtoError::Json(_) => {
                ReturnCode::BadValue
            }
        }
    }
}

/// A single request: verb, path and optional argument string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Requested capability.
    pub verb: Verb,
    /// Slash-separated resource path.
    pub path: String,
    /// Remaining text after the path, if any.
    pub arg: Option<String>,
}

impl Command {
    /// Build a command.
    pub fn new(verb: Verb, path: impl Into<String>, arg: Option<String>) -> Self {
        Self {
            verb,
            path: path.into(),
            arg,
        }
    }

    /// Parse `"<verb> <path>[ <arg>]"`. Leading and trailing whitespace is
    /// ignored; the argument keeps its inner spacing.
    pub fn parse(line: &str) -> Result<Self, ProtoError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ProtoError::EmptyCommand);
        }
        let (verb_tok, rest) = split_word(line);
        let verb = Verb::parse(verb_tok).ok_or_else(|| ProtoError::UnknownVerb(verb_tok.into()))?;
        let (path, arg) = split_word(rest);
        if path.is_empty() {
            return Err(ProtoError::MissingPath);
        }
        let arg = (!arg.is_empty()).then(|| arg.to_string());
        Ok(Self::new(verb, path, arg))
    }

    /// Render as a wire line (without terminator).
    pub fn to_line(&self) -> String {
        match &self.arg {
            Some(arg) => format!("{} {} {}", self.verb, self.path, arg),
            None => format!("{} {}", self.verb, self.path),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Split off the first whitespace-delimited word; the remainder is trimmed
/// at its start only.
pub fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(idx) => (&s[..idx], s[idx..].trim_start()),
        None => (s, ""),
    }
}

/// Read payload shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// A single JSON scalar (number, string, boolean).
    Scalar(serde_json::Value),
    /// Named values (a property bag).
    Object(serde_json::Map<String, serde_json::Value>),
    /// Ordered enumeration of child names.
    List(Vec<String>),
}

impl Payload {
    /// Shorthand for a string scalar.
    pub fn text(s: impl Into<String>) -> Self {
        Payload::Scalar(serde_json::Value::String(s.into()))
    }

    /// JSON representation used on the wire.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Payload::Scalar(v) => v.clone(),
            Payload::Object(map) => serde_json::Value::Object(map.clone()),
            Payload::List(names) => {
                let nodes = names
                    .iter()
                    .map(|n| serde_json::json!({ "name": n }))
                    .collect::<Vec<_>>();
                serde_json::json!({ "nodes": nodes })
            }
        }
    }

    /// Classify a JSON document back into a payload shape.
    ///
    /// An object whose only key is `nodes` holding `{name}` entries is a list.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(map) => match list_names(&map) {
                Some(names) => Payload::List(names),
                None => Payload::Object(map),
            },
            other => Payload::Scalar(other),
        }
    }

    /// Child names when this payload is a list.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Payload::List(names) => Some(names),
            _ => None,
        }
    }

    /// Property bag when this payload is an object.
    pub fn as_object(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
        match self {
            Payload::Object(map) => Some(map),
            _ => None,
        }
    }
}

fn list_names(map: &serde_json::Map<String, serde_json::Value>) -> Option<Vec<String>> {
    if map.len() != 1 {
        return None;
    }
    let nodes = map.get("nodes")?.as_array()?;
    nodes
        .iter()
        .map(|n| n.get("name").and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}

impl Serialize for Payload {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        serde_json::Value::deserialize(deserializer).map(Payload::from_json)
    }
}

/// One response document. Every command yields exactly one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Result code.
    pub code: ReturnCode,
    /// Description of `code`.
    pub description: String,
    /// Payload for successful reads (and some creates); `null` otherwise.
    pub response: Option<Payload>,
}

impl Response {
    /// Successful response with an optional payload.
    pub fn ok(payload: Option<Payload>) -> Self {
        Self {
            code: ReturnCode::Ok,
            description: ReturnCode::Ok.description().to_string(),
            response: payload,
        }
    }

    /// Failure response carrying no payload.
    pub fn error(code: ReturnCode) -> Self {
        Self {
            code,
            description: code.description().to_string(),
            response: None,
        }
    }

    /// Build from a capability result.
    pub fn from_result(result: Result<Option<Payload>, ReturnCode>) -> Self {
        match result {
            Ok(payload) => Self::ok(payload),
            Err(code) => Self::error(code),
        }
    }
}
