// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Event construction and dispatch.
//!
//! `create <path>/event <kind> [<params>]` builds an engine [`Event`] from the
//! kind and its whitespace-separated parameters, then hands it to the
//! receiver captured when the node was built. Malformed input never reaches
//! the receiver.

use std::sync::Arc;

use gstd_proto::ReturnCode;
use tracing::{debug, warn};

use crate::engine::{EngineObject, Event, EventDirection, Format, Seek, SeekType};
use crate::marshal::parse_bool_token;
use crate::resource::{CapResult, Creator, ResourceNode};

/// Seek parameter defaults: rate, format, flags, start type, start, stop
/// type, stop.
const SEEK_DEFAULTS: [&str; 7] = ["1.0", "3", "1", "1", "0", "1", "-1"];

/// Build an event from its kind and parameter string.
pub fn parse_event(kind: &str, params: &str) -> Result<Event, ReturnCode> {
    if kind.is_empty() {
        return Err(ReturnCode::NullArgument);
    }
    let args: Vec<&str> = params.split_whitespace().collect();
    match kind {
        "eos" => no_params(&args).map(|()| Event::Eos),
        "flush_start" => no_params(&args).map(|()| Event::FlushStart),
        "flush_stop" => {
            let reset = match args.as_slice() {
                [] => true,
                [token] => parse_bool_token(token).ok_or(ReturnCode::BadValue)?,
                _ => return Err(ReturnCode::BadValue),
            };
            Ok(Event::FlushStop { reset })
        }
        "seek" => parse_seek(&args).map(Event::Seek),
        "custom_upstream" => custom(EventDirection::Upstream, &args),
        "custom_downstream" => custom(EventDirection::Downstream, &args),
        "custom_both" => custom(EventDirection::Both, &args),
        _ => Err(ReturnCode::BadValue),
    }
}

fn no_params(args: &[&str]) -> Result<(), ReturnCode> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ReturnCode::BadValue)
    }
}

fn parse_seek(args: &[&str]) -> Result<Seek, ReturnCode> {
    if args.len() > SEEK_DEFAULTS.len() {
        return Err(ReturnCode::BadValue);
    }
    let arg = |i: usize| args.get(i).copied().unwrap_or(SEEK_DEFAULTS[i]);
    let int = |i: usize| arg(i).parse::<i64>().map_err(|_| ReturnCode::BadValue);

    let rate: f64 = arg(0).parse().map_err(|_| ReturnCode::BadValue)?;
    if !rate.is_normal() {
        return Err(ReturnCode::BadValue);
    }
    let format = Format::from_id(int(1)?).ok_or(ReturnCode::BadValue)?;
    let flags: u32 = arg(2).parse().map_err(|_| ReturnCode::BadValue)?;
    let start_type = SeekType::from_id(int(3)?).ok_or(ReturnCode::BadValue)?;
    let start = int(4)?;
    let stop_type = SeekType::from_id(int(5)?).ok_or(ReturnCode::BadValue)?;
    let stop = int(6)?;
    Ok(Seek {
        rate,
        format,
        flags,
        start_type,
        start,
        stop_type,
        stop,
    })
}

fn custom(direction: EventDirection, args: &[&str]) -> Result<Event, ReturnCode> {
    let [structure] = args else {
        return Err(ReturnCode::BadValue);
    };
    if !is_structure_name(structure) {
        return Err(ReturnCode::BadValue);
    }
    Ok(Event::Custom {
        direction,
        structure: (*structure).to_string(),
    })
}

fn is_structure_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
}

/// `create` on an `event` node.
pub struct EventCreator {
    receiver: Arc<dyn EngineObject>,
}

impl EventCreator {
    /// Creator that sends to `receiver`.
    pub fn new(receiver: Arc<dyn EngineObject>) -> Self {
        Self { receiver }
    }
}

impl Creator for EventCreator {
    fn create(&self, _node: &Arc<ResourceNode>, name: &str, description: &str) -> CapResult {
        let event = parse_event(name, description)?;
        let kind = event.name();
        if self.receiver.send_event(event) {
            debug!(receiver = %self.receiver.name(), event = kind, "event sent");
            Ok(None)
        } else {
            warn!(receiver = %self.receiver.name(), event = kind, "event rejected");
            Err(ReturnCode::EventError)
        }
    }
}
