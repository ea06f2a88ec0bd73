// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port to the pipeline engine.
//!
//! The daemon never talks to a media framework directly. It sees engine
//! objects through [`EngineObject`] (properties, signals, events),
//! pipelines through [`EnginePipeline`] (elements, state) and the factory
//! through [`Engine`]. [`sim`] provides an in-process implementation.

use gstd_proto::ReturnCode;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

mod factory;
mod launch;
pub mod sim;

/// Dynamically typed engine value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Signed integer (int / int64).
    Int(i64),
    /// Unsigned integer (uint / uint64).
    UInt(u64),
    /// Floating point.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Enum ordinal; meaning is given by the declared [`EnumType`].
    Enum(i32),
    /// Ordered array of values of one element type.
    Array(Vec<Value>),
    /// Reference to another engine object.
    Object {
        /// Engine type name (e.g. `GstIdentity`).
        type_name: String,
        /// Object name.
        name: String,
    },
    /// Value the daemon can only display.
    Opaque {
        /// Engine type name (e.g. `GstBuffer`).
        type_name: String,
        /// Display form.
        repr: String,
    },
}

/// One value of an enum type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumValue {
    /// Ordinal.
    pub value: i32,
    /// Long name (e.g. `SMPTE 100% color bars`).
    pub name: String,
    /// Short token (e.g. `smpte`).
    pub nick: String,
}

/// Named enum type with its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumType {
    /// Engine type name.
    pub name: String,
    /// Declared values.
    pub values: Vec<EnumValue>,
}

impl EnumType {
    /// Look up the value for an ordinal.
    pub fn by_value(&self, value: i32) -> Option<&EnumValue> {
        self.values.iter().find(|v| v.value == value)
    }
}

/// Closed set of value types the engine reports for properties.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    /// Signed integer with inclusive range; `wide` marks a 64-bit type.
    Int {
        /// Lowest accepted value.
        min: i64,
        /// Highest accepted value.
        max: i64,
        /// 64-bit declared width.
        wide: bool,
    },
    /// Unsigned integer with inclusive range; `wide` marks a 64-bit type.
    UInt {
        /// Lowest accepted value.
        min: u64,
        /// Highest accepted value.
        max: u64,
        /// 64-bit declared width.
        wide: bool,
    },
    /// Floating point with inclusive range.
    Double {
        /// Lowest accepted value.
        min: f64,
        /// Highest accepted value.
        max: f64,
    },
    /// Boolean.
    Bool,
    /// String.
    String,
    /// Enumeration.
    Enum(EnumType),
    /// Homogeneous array.
    Array(Box<ValueType>),
    /// A type the engine knows but the daemon has no marshaller for.
    Other(String),
}

/// Marshaller selector derived from a [`ValueType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Signed integers.
    Int,
    /// Unsigned integers.
    UInt,
    /// Floating point.
    Double,
    /// Booleans.
    Bool,
    /// Strings.
    String,
    /// Enums.
    Enum,
    /// Arrays.
    Array,
}

impl ValueType {
    /// 32-bit signed integer with its natural range.
    pub fn int() -> Self {
        ValueType::Int {
            min: i64::from(i32::MIN),
            max: i64::from(i32::MAX),
            wide: false,
        }
    }

    /// 32-bit unsigned integer with its natural range.
    pub fn uint() -> Self {
        ValueType::UInt {
            min: 0,
            max: u64::from(u32::MAX),
            wide: false,
        }
    }

    /// Marshaller tag, `None` for [`ValueType::Other`].
    pub fn tag(&self) -> Option<TypeTag> {
        match self {
            ValueType::Int { .. } => Some(TypeTag::Int),
            ValueType::UInt { .. } => Some(TypeTag::UInt),
            ValueType::Double { .. } => Some(TypeTag::Double),
            ValueType::Bool => Some(TypeTag::Bool),
            ValueType::String => Some(TypeTag::String),
            ValueType::Enum(_) => Some(TypeTag::Enum),
            ValueType::Array(_) => Some(TypeTag::Array),
            ValueType::Other(_) => None,
        }
    }

    /// Engine-facing type name, as reported to clients.
    pub fn type_name(&self) -> String {
        match self {
            ValueType::Int { wide: false, .. } => "gint".into(),
            ValueType::Int { wide: true, .. } => "gint64".into(),
            ValueType::UInt { wide: false, .. } => "guint".into(),
            ValueType::UInt { wide: true, .. } => "guint64".into(),
            ValueType::Double { .. } => "gdouble".into(),
            ValueType::Bool => "gboolean".into(),
            ValueType::String => "gchararray".into(),
            ValueType::Enum(e) => e.name.clone(),
            ValueType::Array(_) => "GstValueArray".into(),
            ValueType::Other(name) => name.clone(),
        }
    }
}

/// Property access flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamFlags {
    /// Property can be read.
    pub readable: bool,
    /// Property can be written.
    pub writable: bool,
}

impl ParamFlags {
    /// Readable and writable.
    pub const READWRITE: ParamFlags = ParamFlags {
        readable: true,
        writable: true,
    };
    /// Read-only.
    pub const READONLY: ParamFlags = ParamFlags {
        readable: true,
        writable: false,
    };

    /// Access string as reported to clients, e.g. `(rw)`.
    pub fn access(self) -> &'static str {
        match (self.readable, self.writable) {
            (true, true) => "(rw)",
            (true, false) => "(r)",
            (false, true) => "(w)",
            (false, false) => "(none)",
        }
    }
}

/// Introspection record for one property.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Property name.
    pub name: String,
    /// One-line description.
    pub blurb: String,
    /// Declared type.
    pub value_type: ValueType,
    /// Access flags.
    pub flags: ParamFlags,
    /// Default value.
    pub default: Value,
}

/// Introspection record for one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSpec {
    /// Signal name.
    pub name: String,
    /// Type names of the emitted parameters, emitter first.
    pub params: Vec<String>,
}

/// Pipeline states, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    /// Initial state, no resources held.
    Null,
    /// Resources allocated.
    Ready,
    /// Prerolled, clock stopped.
    Paused,
    /// Data flowing.
    Playing,
}

impl PipelineState {
    /// Lowercase token used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineState::Null => "null",
            PipelineState::Ready => "ready",
            PipelineState::Paused => "paused",
            PipelineState::Playing => "playing",
        }
    }

    /// Parse a state token, case-insensitive.
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_lowercase().as_str() {
            "null" => Some(PipelineState::Null),
            "ready" => Some(PipelineState::Ready),
            "paused" => Some(PipelineState::Paused),
            "playing" => Some(PipelineState::Playing),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Units of a seek position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Undefined.
    Undefined,
    /// Element default unit (frames, samples).
    Default,
    /// Bytes.
    Bytes,
    /// Nanoseconds.
    Time,
    /// Buffers.
    Buffers,
    /// Percent.
    Percent,
}

impl Format {
    /// Map a numeric format id.
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Format::Undefined),
            1 => Some(Format::Default),
            2 => Some(Format::Bytes),
            3 => Some(Format::Time),
            4 => Some(Format::Buffers),
            5 => Some(Format::Percent),
            _ => None,
        }
    }
}

/// How a seek boundary is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekType {
    /// Leave the boundary unchanged.
    None,
    /// Absolute position.
    Set,
    /// Relative to the end.
    End,
}

impl SeekType {
    /// Map a numeric seek type id.
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(SeekType::None),
            1 => Some(SeekType::Set),
            2 => Some(SeekType::End),
            _ => None,
        }
    }
}

/// Seek parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seek {
    /// Playback rate, non-zero.
    pub rate: f64,
    /// Unit of `start`/`stop`.
    pub format: Format,
    /// Seek flags bitmask.
    pub flags: u32,
    /// Interpretation of `start`.
    pub start_type: SeekType,
    /// Start position.
    pub start: i64,
    /// Interpretation of `stop`.
    pub stop_type: SeekType,
    /// Stop position, `-1` for none.
    pub stop: i64,
}

/// Which way a custom event travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDirection {
    /// Towards the sources.
    Upstream,
    /// Towards the sinks.
    Downstream,
    /// Both directions.
    Both,
}

/// Events the daemon can construct.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// End of stream.
    Eos,
    /// Start flushing.
    FlushStart,
    /// Stop flushing; `reset` resets running time.
    FlushStop {
        /// Reset running time.
        reset: bool,
    },
    /// Seek.
    Seek(Seek),
    /// Application event carrying a named structure.
    Custom {
        /// Travel direction.
        direction: EventDirection,
        /// Structure name.
        structure: String,
    },
}

impl Event {
    /// Event name as used in commands.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Eos => "eos",
            Event::FlushStart => "flush_start",
            Event::FlushStop { .. } => "flush_stop",
            Event::Seek(_) => "seek",
            Event::Custom {
                direction: EventDirection::Upstream,
                ..
            } => "custom_upstream",
            Event::Custom {
                direction: EventDirection::Downstream,
                ..
            } => "custom_downstream",
            Event::Custom {
                direction: EventDirection::Both,
                ..
            } => "custom_both",
        }
    }
}

/// Identifier of a connected signal handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u64);

/// Callback invoked on the engine's thread when a signal is emitted.
pub type SignalHandler = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Engine failures.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    /// The launch description could not be parsed.
    #[error("syntax error in description: {0}")]
    Syntax(String),
    /// No element factory with this name.
    #[error("no element factory {0:?}")]
    NoSuchFactory(String),
    /// Two elements share a name.
    #[error("duplicate element name {0:?}")]
    DuplicateName(String),
    /// The object has no such property.
    #[error("no property {0:?}")]
    NoSuchProperty(String),
    /// The object has no such signal.
    #[error("no signal {0:?}")]
    NoSuchSignal(String),
    /// The property cannot be written.
    #[error("property {0:?} is not writable")]
    NotWritable(String),
    /// The value does not fit the declared type.
    #[error("invalid value for {property:?}: {reason}")]
    InvalidValue {
        /// Property name.
        property: String,
        /// Why it was rejected.
        reason: String,
    },
    /// The requested state change failed.
    #[error("state change to {0} failed")]
    StateChange(PipelineState),
}

impl EngineError {
    /// Wire code reported for this failure.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            EngineError::Syntax(_)
            | EngineError::NoSuchFactory(_)
            | EngineError::DuplicateName(_)
            | EngineError::InvalidValue { .. } => ReturnCode::BadValue,
            EngineError::NoSuchProperty(_) | EngineError::NoSuchSignal(_) => ReturnCode::NotFound,
            EngineError::NotWritable(_) => ReturnCode::MethodNotAllowed,
            EngineError::StateChange(_) => ReturnCode::StateError,
        }
    }
}

/// An engine object: element or pipeline.
///
/// Implementations serialize property access per object; distinct objects
/// never share a lock.
pub trait EngineObject: Send + Sync {
    /// Object name, unique within its pipeline.
    fn name(&self) -> String;
    /// Engine type name (e.g. `GstIdentity`).
    fn type_name(&self) -> String;
    /// Factory the object was made from; defaults to the type name.
    fn factory(&self) -> String {
        self.type_name()
    }
    /// Introspected properties.
    fn properties(&self) -> Vec<ParamSpec>;
    /// Current value of a property.
    fn get_property(&self, name: &str) -> Result<Value, EngineError>;
    /// Assign a property.
    fn set_property(&self, name: &str, value: Value) -> Result<(), EngineError>;
    /// Introspected signals.
    fn signals(&self) -> Vec<SignalSpec>;
    /// Register `handler` for `signal`; it runs on the engine's thread.
    fn connect_signal(&self, signal: &str, handler: SignalHandler)
        -> Result<HandlerId, EngineError>;
    /// Unregister a handler. Unknown ids are ignored.
    fn disconnect_signal(&self, id: HandlerId);
    /// Deliver an event; `false` when the object rejects it.
    fn send_event(&self, event: Event) -> bool;
}

/// A pipeline: an engine object owning elements and a state.
pub trait EnginePipeline: EngineObject {
    /// Description it was launched from.
    fn description(&self) -> String;
    /// Elements in description order.
    fn elements(&self) -> Vec<Arc<dyn EngineObject>>;
    /// Current state.
    fn state(&self) -> PipelineState;
    /// Change state.
    fn set_state(&self, state: PipelineState) -> Result<(), EngineError>;
}

/// Pipeline factory.
pub trait Engine: Send + Sync {
    /// Build a pipeline named `name` from a launch `description`.
    fn launch(&self, name: &str, description: &str)
        -> Result<Arc<dyn EnginePipeline>, EngineError>;
}
