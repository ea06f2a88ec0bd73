// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Element factories known to the simulated engine.

use super::{EnumType, EnumValue, ParamFlags, ParamSpec, SignalSpec, Value, ValueType};

/// Ordinal of `fakesink::state-error` that fails each state step.
pub(crate) mod state_error {
    pub(crate) const NULL_TO_READY: i32 = 1;
    pub(crate) const READY_TO_PAUSED: i32 = 2;
    pub(crate) const PAUSED_TO_PLAYING: i32 = 3;
    pub(crate) const PLAYING_TO_PAUSED: i32 = 4;
    pub(crate) const PAUSED_TO_READY: i32 = 5;
    pub(crate) const READY_TO_NULL: i32 = 6;
}

/// Static description of an element type.
pub(crate) struct Factory {
    pub(crate) name: &'static str,
    pub(crate) type_name: &'static str,
    properties: fn() -> Vec<ParamSpec>,
    signals: &'static [(&'static str, &'static [&'static str])],
}

impl Factory {
    /// Full property list, `name` first.
    pub(crate) fn properties(&self) -> Vec<ParamSpec> {
        let mut props = vec![prop(
            "name",
            "The name of the object",
            ValueType::String,
            ParamFlags::READONLY,
            Value::String(String::new()),
        )];
        props.extend((self.properties)());
        props
    }

    pub(crate) fn signals(&self) -> Vec<SignalSpec> {
        self.signals
            .iter()
            .map(|(name, params)| SignalSpec {
                name: (*name).to_string(),
                params: params.iter().map(|p| (*p).to_string()).collect(),
            })
            .collect()
    }
}

/// Look up a factory by name.
pub(crate) fn find(name: &str) -> Option<&'static Factory> {
    FACTORIES.iter().find(|f| f.name == name)
}

static FACTORIES: [Factory; 13] = [
    Factory {
        name: "videotestsrc",
        type_name: "GstVideoTestSrc",
        properties: videotestsrc,
        signals: &[],
    },
    Factory {
        name: "audiotestsrc",
        type_name: "GstAudioTestSrc",
        properties: audiotestsrc,
        signals: &[],
    },
    Factory {
        name: "identity",
        type_name: "GstIdentity",
        properties: identity,
        signals: &[("handoff", &["GstIdentity", "GstBuffer"])],
    },
    Factory {
        name: "fakesink",
        type_name: "GstFakeSink",
        properties: fakesink,
        signals: &[
            ("handoff", &["GstFakeSink", "GstBuffer", "GstPad"]),
            ("preroll-handoff", &["GstFakeSink", "GstBuffer", "GstPad"]),
        ],
    },
    Factory {
        name: "queue",
        type_name: "GstQueue",
        properties: queue,
        signals: &[
            ("overrun", &["GstQueue"]),
            ("underrun", &["GstQueue"]),
            ("running", &["GstQueue"]),
            ("pushing", &["GstQueue"]),
        ],
    },
    Factory {
        name: "volume",
        type_name: "GstVolume",
        properties: volume,
        signals: &[],
    },
    Factory {
        name: "tee",
        type_name: "GstTee",
        properties: tee,
        signals: &[],
    },
    Factory {
        name: "capsfilter",
        type_name: "GstCapsFilter",
        properties: capsfilter,
        signals: &[],
    },
    Factory {
        name: "videoconvert",
        type_name: "GstVideoConvert",
        properties: converter,
        signals: &[],
    },
    Factory {
        name: "audioconvert",
        type_name: "GstAudioConvert",
        properties: audioconvert,
        signals: &[],
    },
    Factory {
        name: "autovideosink",
        type_name: "GstAutoVideoSink",
        properties: sink,
        signals: &[],
    },
    Factory {
        name: "xvimagesink",
        type_name: "GstXvImageSink",
        properties: xvimagesink,
        signals: &[],
    },
    Factory {
        name: "autoaudiosink",
        type_name: "GstAutoAudioSink",
        properties: sink,
        signals: &[],
    },
];

fn prop(
    name: &str,
    blurb: &str,
    value_type: ValueType,
    flags: ParamFlags,
    default: Value,
) -> ParamSpec {
    ParamSpec {
        name: name.to_string(),
        blurb: blurb.to_string(),
        value_type,
        flags,
        default,
    }
}

fn rw(name: &str, blurb: &str, value_type: ValueType, default: Value) -> ParamSpec {
    prop(name, blurb, value_type, ParamFlags::READWRITE, default)
}

fn enum_type(name: &str, values: &[(i32, &str, &str)]) -> ValueType {
    ValueType::Enum(EnumType {
        name: name.to_string(),
        values: values
            .iter()
            .map(|(value, nick, long)| EnumValue {
                value: *value,
                name: (*long).to_string(),
                nick: (*nick).to_string(),
            })
            .collect(),
    })
}

fn num_buffers() -> ParamSpec {
    rw(
        "num-buffers",
        "Number of buffers to output before sending EOS (-1 = unlimited)",
        ValueType::Int {
            min: -1,
            max: i64::from(i32::MAX),
            wide: false,
        },
        Value::Int(-1),
    )
}

fn is_live() -> ParamSpec {
    rw(
        "is-live",
        "Whether to act as a live source",
        ValueType::Bool,
        Value::Bool(false),
    )
}

fn videotestsrc() -> Vec<ParamSpec> {
    vec![
        num_buffers(),
        is_live(),
        rw(
            "pattern",
            "Type of test pattern to generate",
            enum_type(
                "GstVideoTestSrcPattern",
                &[
                    (0, "smpte", "SMPTE 100% color bars"),
                    (1, "snow", "Random (television snow)"),
                    (2, "black", "100% Black"),
                    (3, "white", "100% White"),
                    (4, "red", "Red"),
                    (5, "green", "Green"),
                    (6, "blue", "Blue"),
                    (18, "ball", "Moving ball"),
                ],
            ),
            Value::Enum(0),
        ),
        rw(
            "horizontal-speed",
            "Scroll image number of pixels per frame (positive is scroll to the left)",
            ValueType::int(),
            Value::Int(0),
        ),
    ]
}

fn audiotestsrc() -> Vec<ParamSpec> {
    vec![
        num_buffers(),
        is_live(),
        rw(
            "wave",
            "Oscillator waveform",
            enum_type(
                "GstAudioTestSrcWave",
                &[
                    (0, "sine", "Sine"),
                    (1, "square", "Square"),
                    (2, "saw", "Saw"),
                    (3, "triangle", "Triangle"),
                    (4, "silence", "Silence"),
                    (5, "white-noise", "White uniform noise"),
                ],
            ),
            Value::Enum(0),
        ),
        rw(
            "freq",
            "Frequency of test signal",
            ValueType::Double {
                min: 0.0,
                max: 20000.0,
            },
            Value::Double(440.0),
        ),
        rw(
            "volume",
            "Volume of test signal",
            ValueType::Double { min: 0.0, max: 1.0 },
            Value::Double(0.8),
        ),
    ]
}

fn identity() -> Vec<ParamSpec> {
    vec![
        rw(
            "sleep-time",
            "Microseconds to sleep between processing",
            ValueType::uint(),
            Value::UInt(0),
        ),
        rw(
            "signal-handoffs",
            "Send a signal before pushing the buffer",
            ValueType::Bool,
            Value::Bool(true),
        ),
        rw(
            "silent",
            "silent",
            ValueType::Bool,
            Value::Bool(true),
        ),
        rw(
            "drop-probability",
            "The Probability a buffer is dropped",
            ValueType::Double { min: 0.0, max: 1.0 },
            Value::Double(0.0),
        ),
        rw(
            "sync",
            "Synchronize to pipeline clock",
            ValueType::Bool,
            Value::Bool(false),
        ),
    ]
}

fn fakesink() -> Vec<ParamSpec> {
    vec![
        num_buffers(),
        rw(
            "sync",
            "Sync on the clock",
            ValueType::Bool,
            Value::Bool(false),
        ),
        rw(
            "signal-handoffs",
            "Send a signal before unreffing the buffer",
            ValueType::Bool,
            Value::Bool(false),
        ),
        rw(
            "silent",
            "Don't produce last_message events",
            ValueType::Bool,
            Value::Bool(true),
        ),
        rw(
            "state-error",
            "Generate a state change error",
            enum_type(
                "GstFakeSinkStateError",
                &[
                    (0, "none", "No state change errors"),
                    (
                        state_error::NULL_TO_READY,
                        "null-to-ready",
                        "Fail state change from NULL to READY",
                    ),
                    (
                        state_error::READY_TO_PAUSED,
                        "ready-to-paused",
                        "Fail state change from READY to PAUSED",
                    ),
                    (
                        state_error::PAUSED_TO_PLAYING,
                        "paused-to-playing",
                        "Fail state change from PAUSED to PLAYING",
                    ),
                    (
                        state_error::PLAYING_TO_PAUSED,
                        "playing-to-paused",
                        "Fail state change from PLAYING to PAUSED",
                    ),
                    (
                        state_error::PAUSED_TO_READY,
                        "paused-to-ready",
                        "Fail state change from PAUSED to READY",
                    ),
                    (
                        state_error::READY_TO_NULL,
                        "ready-to-null",
                        "Fail state change from READY to NULL",
                    ),
                ],
            ),
            Value::Enum(0),
        ),
    ]
}

fn queue() -> Vec<ParamSpec> {
    vec![
        rw(
            "max-size-buffers",
            "Max. number of buffers in the queue (0=disable)",
            ValueType::uint(),
            Value::UInt(200),
        ),
        rw(
            "max-size-time",
            "Max. amount of data in the queue (in ns, 0=disable)",
            ValueType::UInt {
                min: 0,
                max: u64::MAX,
                wide: true,
            },
            Value::UInt(1_000_000_000),
        ),
        rw(
            "leaky",
            "Where the queue leaks, if at all",
            enum_type(
                "GstQueueLeaky",
                &[
                    (0, "no", "Not Leaky"),
                    (1, "upstream", "Leaky on upstream (new buffers)"),
                    (2, "downstream", "Leaky on downstream (old buffers)"),
                ],
            ),
            Value::Enum(0),
        ),
        prop(
            "current-level-buffers",
            "Current number of buffers in the queue",
            ValueType::uint(),
            ParamFlags::READONLY,
            Value::UInt(0),
        ),
    ]
}

fn volume() -> Vec<ParamSpec> {
    vec![
        rw(
            "volume",
            "volume factor, 1.0=100%",
            ValueType::Double {
                min: 0.0,
                max: 10.0,
            },
            Value::Double(1.0),
        ),
        rw("mute", "mute channel", ValueType::Bool, Value::Bool(false)),
    ]
}

fn tee() -> Vec<ParamSpec> {
    vec![
        rw(
            "allow-not-linked",
            "Return GST_FLOW_OK even if there are no source pads or they are all unlinked",
            ValueType::Bool,
            Value::Bool(false),
        ),
        prop(
            "num-src-pads",
            "The number of source pads",
            ValueType::int(),
            ParamFlags::READONLY,
            Value::Int(0),
        ),
    ]
}

fn capsfilter() -> Vec<ParamSpec> {
    vec![rw(
        "caps",
        "Restrict the possible allowed capabilities",
        ValueType::Other("GstCaps".into()),
        Value::Opaque {
            type_name: "GstCaps".into(),
            repr: "ANY".into(),
        },
    )]
}

fn converter() -> Vec<ParamSpec> {
    vec![rw(
        "qos",
        "Handle Quality-of-Service events",
        ValueType::Bool,
        Value::Bool(true),
    )]
}

fn audioconvert() -> Vec<ParamSpec> {
    let mut props = converter();
    props.push(rw(
        "mix-matrix",
        "Transformation matrix for input/output channels",
        ValueType::Array(Box::new(ValueType::Array(Box::new(ValueType::Double {
            min: -1.0,
            max: 1.0,
        })))),
        Value::Array(Vec::new()),
    ));
    props
}

fn sink() -> Vec<ParamSpec> {
    vec![rw(
        "sync",
        "Sync on the clock",
        ValueType::Bool,
        Value::Bool(true),
    )]
}

fn xvimagesink() -> Vec<ParamSpec> {
    let mut props = sink();
    props.push(rw(
        "display",
        "X Display name",
        ValueType::String,
        Value::String(String::new()),
    ));
    props.push(rw(
        "force-aspect-ratio",
        "When enabled, scaling will respect original aspect ratio",
        ValueType::Bool,
        Value::Bool(true),
    ));
    props
}
