// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pipeline, element and property resources.
//!
//! `create /pipelines <name> <description>` launches a pipeline, introspects
//! it and attaches the whole subtree at once:
//!
//! ```text
//! <name>/state
//! <name>/event
//! <name>/elements/<e>/event
//! <name>/elements/<e>/properties/<x>
//! <name>/elements/<e>/signals/<s>/{callback,timeout,disconnect}
//! ```

use std::sync::{Arc, Mutex, PoisonError};

use gstd_proto::{Payload, ReturnCode};
use serde_json::{json, Map, Value as Json};
use tracing::{info, warn};

use crate::engine::{Engine, EngineObject, EnginePipeline, ParamSpec, PipelineState};
use crate::event::EventCreator;
use crate::marshal::MarshallerRegistry;
use crate::resource::{
    CapResult, Creator, Deleter, ListChildren, Reader, ResourceNode, Teardown, Updater,
};
use crate::signal::signal_node;

fn object(value: Json) -> Payload {
    match value {
        Json::Object(map) => Payload::Object(map),
        other => Payload::Scalar(other),
    }
}

/// `/pipelines`: create, list and delete pipelines.
pub struct PipelineList {
    engine: Arc<dyn Engine>,
    registry: Arc<MarshallerRegistry>,
    // Held from the existence check until the subtree is attached.
    creating: Mutex<()>,
}

impl PipelineList {
    /// Capability backed by `engine`; properties use `registry`.
    pub fn new(engine: Arc<dyn Engine>, registry: Arc<MarshallerRegistry>) -> Self {
        Self {
            engine,
            registry,
            creating: Mutex::new(()),
        }
    }
}

fn valid_pipeline_name(name: &str) -> bool {
    !name.contains(|c: char| c == '/' || c.is_whitespace() || c.is_control())
}

impl Creator for PipelineList {
    fn create(&self, node: &Arc<ResourceNode>, name: &str, description: &str) -> CapResult {
        if name.is_empty() || description.is_empty() {
            return Err(ReturnCode::NullArgument);
        }
        if !valid_pipeline_name(name) {
            return Err(ReturnCode::BadValue);
        }
        let _creating = self.creating.lock().unwrap_or_else(PoisonError::into_inner);
        if node.child(name).is_some() {
            return Err(ReturnCode::AlreadyExists);
        }
        let pipeline = self.engine.launch(name, description).map_err(|err| {
            warn!(pipeline = %name, %err, "launch failed");
            err.return_code()
        })?;
        if let Err(code) = node.attach(pipeline_node(&pipeline, &self.registry)) {
            if let Err(err) = pipeline.set_state(PipelineState::Null) {
                warn!(pipeline = %name, %err, "could not stop unattached pipeline");
            }
            return Err(code);
        }
        info!(pipeline = %name, %description, "pipeline created");
        Ok(None)
    }
}

impl Reader for PipelineList {
    fn read(&self, node: &Arc<ResourceNode>) -> CapResult {
        ListChildren.read(node)
    }
}

impl Deleter for PipelineList {
    fn delete(&self, node: &Arc<ResourceNode>, name: &str) -> CapResult {
        if name.is_empty() {
            return Err(ReturnCode::NullArgument);
        }
        node.detach(name)?;
        info!(pipeline = %name, "pipeline deleted");
        Ok(None)
    }
}

struct PipelineInfo(Arc<dyn EnginePipeline>);

impl Reader for PipelineInfo {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        Ok(Some(object(json!({
            "name": self.0.name(),
            "description": self.0.description(),
            "state": self.0.state().as_str(),
        }))))
    }
}

impl Teardown for PipelineInfo {
    fn teardown(&self) {
        if let Err(err) = self.0.set_state(PipelineState::Null) {
            warn!(pipeline = %self.0.name(), %err, "failed to stop pipeline on delete");
        }
    }
}

struct StateResource(Arc<dyn EnginePipeline>);

impl Reader for StateResource {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        Ok(Some(Payload::text(self.0.state().as_str())))
    }
}

impl Updater for StateResource {
    fn update(&self, _node: &Arc<ResourceNode>, value: &str) -> CapResult {
        if value.is_empty() {
            return Err(ReturnCode::NullArgument);
        }
        let target = PipelineState::parse(value).ok_or(ReturnCode::BadValue)?;
        self.0.set_state(target).map_err(|err| {
            warn!(pipeline = %self.0.name(), %err, "state change refused");
            ReturnCode::StateError
        })?;
        Ok(None)
    }
}

struct ElementInfo(Arc<dyn EngineObject>);

impl Reader for ElementInfo {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        Ok(Some(object(json!({
            "name": self.0.name(),
            "factory": self.0.factory(),
        }))))
    }
}

/// One property of one engine object.
pub struct PropertyResource {
    object: Arc<dyn EngineObject>,
    spec: ParamSpec,
    registry: Arc<MarshallerRegistry>,
}

impl PropertyResource {
    /// Resource for `spec` on `object`.
    pub fn new(
        object: Arc<dyn EngineObject>,
        spec: ParamSpec,
        registry: Arc<MarshallerRegistry>,
    ) -> Self {
        Self {
            object,
            spec,
            registry,
        }
    }

    fn value(&self) -> Json {
        if !self.spec.flags.readable {
            return Json::Null;
        }
        match self.object.get_property(&self.spec.name) {
            Ok(value) => self.registry.format(&self.spec.value_type, &value),
            Err(err) => {
                warn!(
                    object = %self.object.name(),
                    property = %self.spec.name,
                    %err,
                    "read failed"
                );
                Json::Null
            }
        }
    }
}

impl Reader for PropertyResource {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        let mut param = Map::new();
        param.insert("description".into(), json!(self.spec.blurb));
        param.insert("type".into(), json!(self.spec.value_type.type_name()));
        param.insert("access".into(), json!(self.spec.flags.access()));
        Ok(Some(object(json!({
            "name": self.spec.name,
            "value": self.value(),
            "param": param,
        }))))
    }
}

impl Updater for PropertyResource {
    fn update(&self, _node: &Arc<ResourceNode>, value: &str) -> CapResult {
        if value.is_empty() {
            return Err(ReturnCode::NullArgument);
        }
        let parsed = self.registry.parse(&self.spec.value_type, value)?;
        self.object
            .set_property(&self.spec.name, parsed)
            .map_err(|err| err.return_code())?;
        info!(object = %self.object.name(), property = %self.spec.name, %value, "property set");
        Ok(None)
    }
}

fn property_node(
    object: &Arc<dyn EngineObject>,
    spec: ParamSpec,
    registry: &Arc<MarshallerRegistry>,
) -> Arc<ResourceNode> {
    let name = spec.name.clone();
    let writable = spec.flags.writable;
    let builder = ResourceNode::builder(name);
    let builder = if writable {
        builder.updater(PropertyResource::new(
            Arc::clone(object),
            spec.clone(),
            Arc::clone(registry),
        ))
    } else {
        builder
    };
    builder
        .reader(PropertyResource::new(
            Arc::clone(object),
            spec,
            Arc::clone(registry),
        ))
        .build()
}

fn element_node(
    element: &Arc<dyn EngineObject>,
    registry: &Arc<MarshallerRegistry>,
) -> Arc<ResourceNode> {
    let properties = element
        .properties()
        .into_iter()
        .fold(ResourceNode::builder("properties").reader(ListChildren), |b, spec| {
            b.child(property_node(element, spec, registry))
        })
        .build();
    let signals = element
        .signals()
        .iter()
        .fold(ResourceNode::builder("signals").reader(ListChildren), |b, s| {
            b.child(signal_node(element, &s.name))
        })
        .build();
    ResourceNode::builder(element.name())
        .reader(ElementInfo(Arc::clone(element)))
        .child(
            ResourceNode::builder("event")
                .creator(EventCreator::new(Arc::clone(element)))
                .build(),
        )
        .child(properties)
        .child(signals)
        .build()
}

/// Subtree for a launched pipeline.
pub fn pipeline_node(
    pipeline: &Arc<dyn EnginePipeline>,
    registry: &Arc<MarshallerRegistry>,
) -> Arc<ResourceNode> {
    let receiver: Arc<dyn EngineObject> = Arc::clone(pipeline) as Arc<dyn EngineObject>;
    let elements = pipeline
        .elements()
        .iter()
        .fold(ResourceNode::builder("elements").reader(ListChildren), |b, e| {
            b.child(element_node(e, registry))
        })
        .build();
    ResourceNode::builder(pipeline.name())
        .reader(PipelineInfo(Arc::clone(pipeline)))
        .teardown(PipelineInfo(Arc::clone(pipeline)))
        .child(
            ResourceNode::builder("state")
                .reader(StateResource(Arc::clone(pipeline)))
                .updater(StateResource(Arc::clone(pipeline)))
                .build(),
        )
        .child(
            ResourceNode::builder("event")
                .creator(EventCreator::new(receiver))
                .build(),
        )
        .child(elements)
        .build()
}
