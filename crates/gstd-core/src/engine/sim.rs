// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-process simulated engine.
//!
//! Pipelines are built from gst-launch style descriptions against a small
//! factory table. No media flows; a per-pipeline streaming thread runs while
//! the pipeline is PLAYING and emits `handoff` from every element whose
//! `signal-handoffs` property is true, paced by `sleep-time` (microseconds)
//! or the engine tick.
//!
//! Event acceptance follows the pipeline state: nothing is accepted below
//! PAUSED, and seeks are refused on live pipelines.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::factory::{self, state_error, Factory};
use super::launch;
use super::{
    Engine, EngineError, EngineObject, EnginePipeline, Event, Format, HandlerId, ParamFlags,
    ParamSpec, PipelineState, SeekType, SignalHandler, SignalSpec, Value, ValueType,
};
use crate::marshal::MarshallerRegistry;

/// Default streaming tick (one frame at ~30 fps).
pub const DEFAULT_TICK: Duration = Duration::from_millis(33);

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Simulated engine.
pub struct SimEngine {
    registry: Arc<MarshallerRegistry>,
    tick: Duration,
    pipelines: Mutex<HashMap<String, Weak<SimPipeline>>>,
}

impl SimEngine {
    /// Engine with the standard marshallers and default tick.
    pub fn new() -> Self {
        Self::with_tick(DEFAULT_TICK)
    }

    /// Engine with a custom streaming tick.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            registry: Arc::new(MarshallerRegistry::standard()),
            tick,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// Concrete handle to a live pipeline launched by this engine.
    pub fn pipeline(&self, name: &str) -> Option<Arc<SimPipeline>> {
        lock(&self.pipelines).get(name).and_then(Weak::upgrade)
    }

    fn build_element(
        &self,
        decl: &launch::ElementDecl,
        counters: &mut HashMap<&'static str, u32>,
        flow: &Arc<Mutex<Flow>>,
    ) -> Result<SimElement, EngineError> {
        let factory = factory::find(&decl.factory)
            .ok_or_else(|| EngineError::NoSuchFactory(decl.factory.clone()))?;
        let specs = factory.properties();

        let mut values: BTreeMap<String, Value> = specs
            .iter()
            .map(|p| (p.name.clone(), p.default.clone()))
            .collect();
        let mut name = None;
        for (key, literal) in &decl.assignments {
            let spec = specs
                .iter()
                .find(|p| &p.name == key)
                .ok_or_else(|| EngineError::NoSuchProperty(key.clone()))?;
            if key == "name" {
                if literal.is_empty()
                    || literal.contains(|c: char| c == '/' || c.is_whitespace() || c.is_control())
                {
                    return Err(EngineError::InvalidValue {
                        property: key.clone(),
                        reason: format!("{literal:?} is not a usable element name"),
                    });
                }
                name = Some(literal.clone());
                continue;
            }
            let value = match &spec.value_type {
                ValueType::Other(type_name) => Value::Opaque {
                    type_name: type_name.clone(),
                    repr: literal.clone(),
                },
                ty => self.registry.parse(ty, literal).map_err(|code| {
                    EngineError::InvalidValue {
                        property: key.clone(),
                        reason: format!("{literal:?} ({code})"),
                    }
                })?,
            };
            values.insert(key.clone(), value);
        }

        let name = name.unwrap_or_else(|| {
            let n = counters.entry(factory.name).or_insert(0);
            let generated = format!("{}{}", factory.name, n);
            *n += 1;
            generated
        });
        values.insert("name".into(), Value::String(name.clone()));

        Ok(SimElement {
            factory,
            name,
            specs,
            flow: Arc::downgrade(flow),
            next_handler: AtomicU64::new(1),
            inner: Mutex::new(ElementInner {
                values,
                handlers: Vec::new(),
                next_due: None,
            }),
        })
    }
}

impl Default for SimEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for SimEngine {
    fn launch(
        &self,
        name: &str,
        description: &str,
    ) -> Result<Arc<dyn EnginePipeline>, EngineError> {
        let decls = launch::parse(description)?;
        let flow = Arc::new(Mutex::new(Flow::default()));
        let mut counters = HashMap::new();
        let mut elements: Vec<Arc<SimElement>> = Vec::with_capacity(decls.len());
        for decl in &decls {
            let element = self.build_element(decl, &mut counters, &flow)?;
            if elements.iter().any(|e| e.name == element.name) {
                return Err(EngineError::DuplicateName(element.name));
            }
            elements.push(Arc::new(element));
        }

        let pipeline = Arc::new(SimPipeline {
            name: name.to_string(),
            description: description.to_string(),
            elements: Arc::new(elements),
            flow,
            tick: self.tick,
            streaming: Mutex::new(None),
        });
        let mut registry = lock(&self.pipelines);
        registry.retain(|_, weak| weak.strong_count() > 0);
        // First live pipeline under a name keeps the entry.
        registry
            .entry(name.to_string())
            .or_insert_with(|| Arc::downgrade(&pipeline));
        info!(pipeline = %name, elements = pipeline.elements.len(), "launched pipeline");
        Ok(pipeline)
    }
}

#[derive(Debug)]
struct Flow {
    state: PipelineState,
    eos: bool,
    flushing: bool,
    position: i64,
}

impl Default for Flow {
    fn default() -> Self {
        Self {
            state: PipelineState::Null,
            eos: false,
            flushing: false,
            position: 0,
        }
    }
}

struct ElementInner {
    values: BTreeMap<String, Value>,
    handlers: Vec<(HandlerId, String, SignalHandler)>,
    next_due: Option<Instant>,
}

/// Simulated element.
pub struct SimElement {
    factory: &'static Factory,
    name: String,
    specs: Vec<ParamSpec>,
    flow: Weak<Mutex<Flow>>,
    next_handler: AtomicU64,
    inner: Mutex<ElementInner>,
}

impl SimElement {
    /// Emit `signal` with `args`, invoking every connected handler on the
    /// calling thread. Returns how many handlers ran.
    pub fn emit(&self, signal: &str, args: &[Value]) -> Result<usize, EngineError> {
        if !self.factory.signals().iter().any(|s| s.name == signal) {
            return Err(EngineError::NoSuchSignal(signal.to_string()));
        }
        let handlers: Vec<SignalHandler> = lock(&self.inner)
            .handlers
            .iter()
            .filter(|(_, name, _)| name == signal)
            .map(|(_, _, h)| Arc::clone(h))
            .collect();
        for handler in &handlers {
            handler(args);
        }
        Ok(handlers.len())
    }

    /// Emit `handoff` with the arguments the streaming thread would use.
    pub fn emit_handoff(&self, frame: u64, tick: Duration) -> Result<usize, EngineError> {
        let args = self.handoff_args(frame, tick);
        self.emit("handoff", &args)
    }

    fn handoff_args(&self, frame: u64, tick: Duration) -> Vec<Value> {
        let pts = tick.saturating_mul(u32::try_from(frame).unwrap_or(u32::MAX));
        let mut args = vec![
            Value::Object {
                type_name: self.factory.type_name.to_string(),
                name: self.name.clone(),
            },
            Value::Opaque {
                type_name: "GstBuffer".into(),
                repr: format!("buffer: pts={}, offset={frame}", format_clock(pts)),
            },
        ];
        if self.factory.name == "fakesink" {
            args.push(Value::Object {
                type_name: "GstPad".into(),
                name: "sink".into(),
            });
        }
        args
    }

    fn tick(&self, now: Instant, frame: u64, tick: Duration) {
        let due = {
            let mut inner = lock(&self.inner);
            let enabled = matches!(inner.values.get("signal-handoffs"), Some(Value::Bool(true)));
            let has_handlers = inner.handlers.iter().any(|(_, s, _)| s == "handoff");
            if !enabled || !has_handlers {
                inner.next_due = None;
                false
            } else if inner.next_due.is_some_and(|d| d > now) {
                false
            } else {
                let period = match inner.values.get("sleep-time") {
                    Some(Value::UInt(us)) if *us > 0 => Duration::from_micros(*us),
                    _ => tick,
                };
                inner.next_due = Some(now + period);
                true
            }
        };
        if due {
            if let Err(err) = self.emit_handoff(frame, tick) {
                warn!(element = %self.name, %err, "handoff emission failed");
            }
        }
    }

    fn enum_value(&self, property: &str) -> Option<i32> {
        let inner = lock(&self.inner);
        match inner.values.get(property) {
            Some(Value::Enum(v)) => Some(*v),
            _ => None,
        }
    }

    fn is_live(&self) -> bool {
        let inner = lock(&self.inner);
        matches!(inner.values.get("is-live"), Some(Value::Bool(true)))
    }
}

fn format_clock(d: Duration) -> String {
    let secs = d.as_secs();
    format!(
        "{}:{:02}:{:02}.{:09}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        d.subsec_nanos()
    )
}

fn value_fits(ty: &ValueType, value: &Value) -> bool {
    match (ty, value) {
        (ValueType::Int { min, max, .. }, Value::Int(v)) => (*min..=*max).contains(v),
        (ValueType::UInt { min, max, .. }, Value::UInt(v)) => (*min..=*max).contains(v),
        (ValueType::Double { min, max }, Value::Double(v)) => {
            v.is_finite() && *min <= *v && *v <= *max
        }
        (ValueType::Bool, Value::Bool(_)) | (ValueType::String, Value::String(_)) => true,
        (ValueType::Enum(e), Value::Enum(v)) => e.by_value(*v).is_some(),
        (ValueType::Array(elem), Value::Array(items)) => items.iter().all(|i| value_fits(elem, i)),
        (ValueType::Other(name), Value::Opaque { type_name, .. }) => name == type_name,
        _ => false,
    }
}

fn accept_event(flow: &mut Flow, event: &Event, live: bool) -> bool {
    if flow.state < PipelineState::Paused {
        return false;
    }
    match event {
        Event::Eos => flow.eos = true,
        Event::FlushStart => flow.flushing = true,
        Event::FlushStop { reset } => {
            flow.flushing = false;
            if *reset {
                flow.position = 0;
            }
        }
        Event::Seek(seek) => {
            if live || seek.format == Format::Undefined {
                return false;
            }
            if seek.start_type == SeekType::Set {
                flow.position = seek.start;
            }
            flow.eos = false;
        }
        Event::Custom { .. } => {}
    }
    true
}

impl EngineObject for SimElement {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn type_name(&self) -> String {
        self.factory.type_name.to_string()
    }

    fn factory(&self) -> String {
        self.factory.name.to_string()
    }

    fn properties(&self) -> Vec<ParamSpec> {
        self.specs.clone()
    }

    fn get_property(&self, name: &str) -> Result<Value, EngineError> {
        lock(&self.inner)
            .values
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::NoSuchProperty(name.to_string()))
    }

    fn set_property(&self, name: &str, value: Value) -> Result<(), EngineError> {
        let spec = self
            .specs
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| EngineError::NoSuchProperty(name.to_string()))?;
        if !spec.flags.writable {
            return Err(EngineError::NotWritable(name.to_string()));
        }
        if !value_fits(&spec.value_type, &value) {
            return Err(EngineError::InvalidValue {
                property: name.to_string(),
                reason: format!("{value:?} does not fit {}", spec.value_type.type_name()),
            });
        }
        debug!(element = %self.name, property = %name, ?value, "set property");
        lock(&self.inner).values.insert(name.to_string(), value);
        Ok(())
    }

    fn signals(&self) -> Vec<SignalSpec> {
        self.factory.signals()
    }

    fn connect_signal(
        &self,
        signal: &str,
        handler: SignalHandler,
    ) -> Result<HandlerId, EngineError> {
        if !self.factory.signals().iter().any(|s| s.name == signal) {
            return Err(EngineError::NoSuchSignal(signal.to_string()));
        }
        let id = HandlerId(self.next_handler.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner)
            .handlers
            .push((id, signal.to_string(), handler));
        debug!(element = %self.name, %signal, handler = id.0, "connected handler");
        Ok(id)
    }

    fn disconnect_signal(&self, id: HandlerId) {
        lock(&self.inner).handlers.retain(|(h, _, _)| *h != id);
    }

    fn send_event(&self, event: Event) -> bool {
        let Some(flow) = self.flow.upgrade() else {
            return false;
        };
        let live = self.is_live();
        let accepted = accept_event(&mut lock(&flow), &event, live);
        debug!(element = %self.name, event = event.name(), accepted, "event");
        accepted
    }
}

struct Streaming {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Simulated pipeline.
pub struct SimPipeline {
    name: String,
    description: String,
    elements: Arc<Vec<Arc<SimElement>>>,
    flow: Arc<Mutex<Flow>>,
    tick: Duration,
    streaming: Mutex<Option<Streaming>>,
}

impl SimPipeline {
    /// Concrete handle to an element by name.
    pub fn element(&self, name: &str) -> Option<Arc<SimElement>> {
        self.elements.iter().find(|e| e.name == name).cloned()
    }

    /// Last position set by a seek or flush, in the seek's units.
    pub fn position(&self) -> i64 {
        lock(&self.flow).position
    }

    /// True after EOS until the next seek or return to NULL.
    pub fn is_eos(&self) -> bool {
        lock(&self.flow).eos
    }

    /// True between flush-start and flush-stop.
    pub fn is_flushing(&self) -> bool {
        lock(&self.flow).flushing
    }

    fn is_live(&self) -> bool {
        self.elements.iter().any(|e| e.is_live())
    }

    fn step_fails(&self, from: PipelineState, to: PipelineState) -> bool {
        use PipelineState::{Null, Paused, Playing, Ready};
        let id = match (from, to) {
            (Null, Ready) => state_error::NULL_TO_READY,
            (Ready, Paused) => state_error::READY_TO_PAUSED,
            (Paused, Playing) => state_error::PAUSED_TO_PLAYING,
            (Playing, Paused) => state_error::PLAYING_TO_PAUSED,
            (Paused, Ready) => state_error::PAUSED_TO_READY,
            (Ready, Null) => state_error::READY_TO_NULL,
            _ => return false,
        };
        self.elements
            .iter()
            .any(|e| e.enum_value("state-error") == Some(id))
    }

    fn start_streaming(&self) -> Result<(), EngineError> {
        let mut slot = lock(&self.streaming);
        if slot.is_some() {
            return Ok(());
        }
        let (stop, stopped) = mpsc::channel::<()>();
        let elements = Arc::clone(&self.elements);
        let flow = Arc::clone(&self.flow);
        let tick = self.tick;
        let handle = thread::Builder::new()
            .name(format!("{}:streaming", self.name))
            .spawn(move || {
                let mut frame: u64 = 0;
                loop {
                    match stopped.recv_timeout(tick) {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                    let flowing = {
                        let f = lock(&flow);
                        f.state == PipelineState::Playing && !f.eos && !f.flushing
                    };
                    if !flowing {
                        continue;
                    }
                    frame += 1;
                    let now = Instant::now();
                    for element in elements.iter() {
                        element.tick(now, frame, tick);
                    }
                }
            })
            .map_err(|err| {
                warn!(pipeline = %self.name, %err, "failed to spawn streaming thread");
                EngineError::StateChange(PipelineState::Playing)
            })?;
        *slot = Some(Streaming { stop, handle });
        Ok(())
    }

    fn stop_streaming(&self) {
        let streaming = lock(&self.streaming).take();
        if let Some(Streaming { stop, handle }) = streaming {
            drop(stop);
            if handle.join().is_err() {
                warn!(pipeline = %self.name, "streaming thread panicked");
            }
        }
    }
}

impl Drop for SimPipeline {
    fn drop(&mut self) {
        self.stop_streaming();
    }
}

impl EngineObject for SimPipeline {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn type_name(&self) -> String {
        "GstPipeline".into()
    }

    fn properties(&self) -> Vec<ParamSpec> {
        vec![ParamSpec {
            name: "name".into(),
            blurb: "The name of the object".into(),
            value_type: ValueType::String,
            flags: ParamFlags::READONLY,
            default: Value::String(String::new()),
        }]
    }

    fn get_property(&self, name: &str) -> Result<Value, EngineError> {
        match name {
            "name" => Ok(Value::String(self.name.clone())),
            other => Err(EngineError::NoSuchProperty(other.to_string())),
        }
    }

    fn set_property(&self, name: &str, _value: Value) -> Result<(), EngineError> {
        match name {
            "name" => Err(EngineError::NotWritable(name.to_string())),
            other => Err(EngineError::NoSuchProperty(other.to_string())),
        }
    }

    fn signals(&self) -> Vec<SignalSpec> {
        Vec::new()
    }

    fn connect_signal(
        &self,
        signal: &str,
        _handler: SignalHandler,
    ) -> Result<HandlerId, EngineError> {
        Err(EngineError::NoSuchSignal(signal.to_string()))
    }

    fn disconnect_signal(&self, _id: HandlerId) {}

    fn send_event(&self, event: Event) -> bool {
        let live = self.is_live();
        let accepted = accept_event(&mut lock(&self.flow), &event, live);
        debug!(pipeline = %self.name, event = event.name(), accepted, "event");
        accepted
    }
}

impl EnginePipeline for SimPipeline {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn elements(&self) -> Vec<Arc<dyn EngineObject>> {
        self.elements
            .iter()
            .map(|e| Arc::clone(e) as Arc<dyn EngineObject>)
            .collect()
    }

    fn state(&self) -> PipelineState {
        lock(&self.flow).state
    }

    fn set_state(&self, target: PipelineState) -> Result<(), EngineError> {
        const ORDER: [PipelineState; 4] = [
            PipelineState::Null,
            PipelineState::Ready,
            PipelineState::Paused,
            PipelineState::Playing,
        ];
        let mut current = self.state();
        while current != target {
            let idx = ORDER.iter().position(|s| *s == current).unwrap_or(0);
            let next = if target > current {
                ORDER[(idx + 1).min(3)]
            } else {
                ORDER[idx.saturating_sub(1)]
            };
            if self.step_fails(current, next) {
                warn!(pipeline = %self.name, from = %current, to = %next, "state change failed");
                return Err(EngineError::StateChange(target));
            }
            if current == PipelineState::Playing {
                self.stop_streaming();
            }
            {
                let mut flow = lock(&self.flow);
                flow.state = next;
                if next == PipelineState::Null {
                    flow.eos = false;
                    flow.flushing = false;
                    flow.position = 0;
                }
            }
            if next == PipelineState::Playing {
                self.start_streaming()?;
            }
            current = next;
        }
        info!(pipeline = %self.name, state = %target, "state changed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::Seek;
    use std::sync::mpsc::channel;

    fn launch(desc: &str) -> (SimEngine, Arc<dyn EnginePipeline>) {
        let engine = SimEngine::with_tick(Duration::from_millis(5));
        let pipe = engine.launch("p", desc).unwrap();
        (engine, pipe)
    }

    #[test]
    fn launch_names_elements_and_applies_assignments() {
        let (_engine, pipe) =
            launch("videotestsrc pattern=ball ! identity name=id sleep-time=10 ! fakesink");
        let names: Vec<_> = pipe.elements().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["videotestsrc0", "id", "fakesink0"]);
        let id = &pipe.elements()[1];
        assert_eq!(id.get_property("sleep-time").unwrap(), Value::UInt(10));
        assert_eq!(pipe.elements()[0].get_property("pattern").unwrap(), Value::Enum(18));
    }

    #[test]
    fn launch_rejects_unknown_factories_and_properties() {
        let engine = SimEngine::new();
        assert_eq!(
            engine.launch("p", "nosuchthing ! fakesink").err(),
            Some(EngineError::NoSuchFactory("nosuchthing".into()))
        );
        assert!(matches!(
            engine.launch("p", "fakesink bogus=1"),
            Err(EngineError::NoSuchProperty(_))
        ));
        assert!(matches!(
            engine.launch("p", "fakesink sync=maybe"),
            Err(EngineError::InvalidValue { .. })
        ));
        assert!(matches!(
            engine.launch("p", "fakesink name=a ! fakesink name=a"),
            Err(EngineError::DuplicateName(_))
        ));
    }

    #[test]
    fn element_names_must_be_path_segments() {
        let engine = SimEngine::new();
        for desc in [
            "identity name=a/b ! fakesink",
            r#"identity name="a b" ! fakesink"#,
            r#"identity name="" ! fakesink"#,
        ] {
            let err = engine.launch("p", desc).err();
            assert!(
                matches!(
                    &err,
                    Some(EngineError::InvalidValue { property, .. }) if property == "name"
                ),
                "{desc}: {err:?}"
            );
        }
        assert!(engine.pipeline("p").is_none());
    }

    #[test]
    fn registry_keeps_the_first_live_pipeline() {
        let engine = SimEngine::new();
        let first = engine.launch("p", "fakesink").unwrap();
        let second = engine.launch("p", "fakesink").unwrap();
        second.set_state(PipelineState::Paused).unwrap();
        assert_eq!(engine.pipeline("p").unwrap().state(), PipelineState::Null);
        drop(first);
        drop(second);
        assert!(engine.pipeline("p").is_none());
    }

    #[test]
    fn events_follow_pipeline_state() {
        let (engine, pipe) = launch("videotestsrc ! fakesink");
        assert!(!pipe.send_event(Event::Eos));
        pipe.set_state(PipelineState::Paused).unwrap();
        assert!(pipe.send_event(Event::Eos));
        assert!(pipe.elements()[1].send_event(Event::FlushStart));

        let sim = engine.pipeline("p").unwrap();
        assert!(sim.is_eos());
        assert!(sim.is_flushing());
        assert!(pipe.send_event(Event::Seek(Seek {
            rate: 1.0,
            format: Format::Time,
            flags: 1,
            start_type: SeekType::Set,
            start: 42,
            stop_type: SeekType::Set,
            stop: -1,
        })));
        assert_eq!(sim.position(), 42);
        assert!(!sim.is_eos());
    }

    #[test]
    fn live_pipelines_refuse_seeks() {
        let (_engine, pipe) = launch("videotestsrc is-live=true ! fakesink");
        pipe.set_state(PipelineState::Paused).unwrap();
        let seek = Seek {
            rate: 1.0,
            format: Format::Time,
            flags: 1,
            start_type: SeekType::Set,
            start: 0,
            stop_type: SeekType::None,
            stop: -1,
        };
        assert!(!pipe.send_event(Event::Seek(seek)));
        assert!(pipe.send_event(Event::Eos));
    }

    #[test]
    fn state_error_blocks_transition() {
        let (_engine, pipe) = launch("videotestsrc ! fakesink state-error=ready-to-paused");
        assert_eq!(
            pipe.set_state(PipelineState::Playing),
            Err(EngineError::StateChange(PipelineState::Playing))
        );
        assert_eq!(pipe.state(), PipelineState::Ready);
    }

    #[test]
    fn streaming_thread_emits_handoffs_while_playing() {
        let (_engine, pipe) = launch("videotestsrc ! identity name=id ! fakesink");
        let (tx, rx) = channel();
        let tx = Mutex::new(tx);
        let id = pipe.elements()[1].clone();
        id.connect_signal(
            "handoff",
            Arc::new(move |args: &[Value]| {
                let _ = lock(&tx).send(args.to_vec());
            }),
        )
        .unwrap();
        pipe.set_state(PipelineState::Playing).unwrap();
        let args = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            args[0],
            Value::Object {
                type_name: "GstIdentity".into(),
                name: "id".into()
            }
        );
        pipe.set_state(PipelineState::Null).unwrap();
    }

    #[test]
    fn set_property_validates_declared_type() {
        let (_engine, pipe) = launch("fakesink");
        let sink = &pipe.elements()[0];
        assert!(sink.set_property("sync", Value::Bool(true)).is_ok());
        assert!(matches!(
            sink.set_property("sync", Value::Int(1)),
            Err(EngineError::InvalidValue { .. })
        ));
        assert!(matches!(
            sink.set_property("name", Value::String("x".into())),
            Err(EngineError::NotWritable(_))
        ));
    }
}
