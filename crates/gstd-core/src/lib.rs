// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! gstd core: the resource namespace and everything a command touches on its
//! way to the pipeline engine.
//!
//! - [`resource`]: the addressable tree and capability traits.
//! - [`router`]: command parsing and dispatch.
//! - [`pipeline`]: pipeline, element, state and property resources.
//! - [`marshal`]: typed literal parsing and JSON formatting.
//! - [`event`]: event construction and delivery.
//! - [`signal`]: the signal-to-blocking-read bridge.
//! - [`engine`]: the engine port and the simulated engine.
//!
//! [`Daemon`] ties an engine to a fresh tree; transports hold one and feed it
//! command lines.

pub mod engine;
pub mod event;
pub mod marshal;
pub mod pipeline;
pub mod resource;
pub mod router;
pub mod signal;

use std::sync::Arc;

use gstd_proto::Response;
use tracing::info;

use crate::engine::Engine;
use crate::marshal::MarshallerRegistry;
use crate::pipeline::PipelineList;
use crate::resource::{ListChildren, ResourceNode};
use crate::router::Router;

/// Name of the node holding all pipelines.
pub const PIPELINES: &str = "pipelines";

/// Daemon context: one engine, one marshaller registry, one tree.
pub struct Daemon {
    router: Router,
}

impl Daemon {
    /// Daemon over `engine` with the standard marshallers.
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self::with_registry(engine, MarshallerRegistry::standard())
    }

    /// Daemon over `engine` with a caller-supplied registry.
    pub fn with_registry(engine: Arc<dyn Engine>, registry: MarshallerRegistry) -> Self {
        let registry = Arc::new(registry);
        let pipelines = ResourceNode::builder(PIPELINES)
            .creator(PipelineList::new(Arc::clone(&engine), Arc::clone(&registry)))
            .reader(PipelineList::new(Arc::clone(&engine), Arc::clone(&registry)))
            .deleter(PipelineList::new(Arc::clone(&engine), Arc::clone(&registry)))
            .build();
        let root = ResourceNode::builder("")
            .reader(ListChildren)
            .child(pipelines)
            .build();
        Self {
            router: Router::new(root),
        }
    }

    /// Execute one command line.
    pub fn execute(&self, line: &str) -> Response {
        self.router.execute(line)
    }

    /// Delete every pipeline, releasing blocked waiters.
    pub fn shutdown(&self) {
        let Some(pipelines) = self.router.root().child(PIPELINES) else {
            return;
        };
        for name in pipelines.child_names() {
            if pipelines.detach(&name).is_ok() {
                info!(pipeline = %name, "pipeline released on shutdown");
            }
        }
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.shutdown();
    }
}
