// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Signal/callback bridge.
//!
//! An engine emits signals on its own threads; a client collects them with a
//! blocking `read` on `.../signals/<s>/callback`. [`SignalBridge`] is the
//! single-slot handoff between the two: the engine handler fires into it and
//! at most one reader waits on it.
//!
//! Phases: `Armed -> Waiting -> Fired -> Armed`, `Waiting -> Armed` on
//! timeout, any phase `-> Deleted` on disconnect. Emissions that arrive while
//! nobody waits are dropped.
//!
//! [`SignalSlot`] owns the per-signal state that outlives a bridge: the
//! configured timeout and the current connection. Disconnecting cancels the
//! bridge and leaves the slot idle, so a later connect builds a fresh one.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use gstd_proto::{Payload, ReturnCode};
use serde_json::json;
use tracing::{debug, info};

use crate::engine::{EngineObject, HandlerId, Value};
use crate::marshal::{describe_value, value_type_name};
use crate::resource::{
    CapResult, Creator, Deleter, ListChildren, Reader, ResourceNode, Teardown, Updater,
};

/// Timeout value meaning "wait until fired or cancelled".
pub const WAIT_FOREVER: i64 = -1;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
enum Phase {
    Armed,
    Waiting,
    Fired(Vec<Value>),
    Deleted,
}

/// One-shot handoff between an engine handler and a blocked reader.
#[derive(Debug)]
pub struct SignalBridge {
    phase: Mutex<Phase>,
    cond: Condvar,
}

impl Default for SignalBridge {
    fn default() -> Self {
        Self {
            phase: Mutex::new(Phase::Armed),
            cond: Condvar::new(),
        }
    }
}

impl SignalBridge {
    /// Fresh armed bridge.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver an emission. Returns `true` when a waiter takes it; emissions
    /// with no waiter are dropped.
    pub fn fire(&self, args: &[Value]) -> bool {
        let mut phase = lock(&self.phase);
        if matches!(*phase, Phase::Waiting) {
            *phase = Phase::Fired(args.to_vec());
            self.cond.notify_all();
            true
        } else {
            false
        }
    }

    /// Block until the next emission, the deadline, or cancellation.
    ///
    /// `None` waits without a deadline. The deadline is measured from the
    /// call. A second concurrent waiter gets [`ReturnCode::AlreadyExists`].
    pub fn wait(&self, timeout: Option<Duration>) -> Result<Vec<Value>, ReturnCode> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut phase = lock(&self.phase);
        match *phase {
            Phase::Armed => *phase = Phase::Waiting,
            Phase::Deleted => return Err(ReturnCode::Cancelled),
            Phase::Waiting | Phase::Fired(_) => return Err(ReturnCode::AlreadyExists),
        }
        loop {
            match std::mem::replace(&mut *phase, Phase::Armed) {
                Phase::Fired(args) => return Ok(args),
                Phase::Deleted => {
                    *phase = Phase::Deleted;
                    return Err(ReturnCode::Cancelled);
                }
                Phase::Armed | Phase::Waiting => *phase = Phase::Waiting,
            }
            phase = match deadline {
                None => self.cond.wait(phase).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        *phase = Phase::Armed;
                        return Err(ReturnCode::Timeout);
                    }
                    self.cond
                        .wait_timeout(phase, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    /// Move to `Deleted` and wake any waiter with [`ReturnCode::Cancelled`].
    pub fn cancel(&self) {
        *lock(&self.phase) = Phase::Deleted;
        self.cond.notify_all();
    }

    /// True while a reader is blocked.
    pub fn has_waiter(&self) -> bool {
        let phase = lock(&self.phase);
        matches!(*phase, Phase::Waiting)
    }

    /// True once cancelled.
    pub fn is_cancelled(&self) -> bool {
        let phase = lock(&self.phase);
        matches!(*phase, Phase::Deleted)
    }
}

struct Link {
    bridge: Arc<SignalBridge>,
    handler: HandlerId,
}

/// Per-signal subscription state.
pub struct SignalSlot {
    object: Arc<dyn EngineObject>,
    signal: String,
    timeout_ms: Mutex<i64>,
    link: Mutex<Option<Link>>,
}

impl SignalSlot {
    /// Idle slot for `signal` on `object`.
    pub fn new(object: Arc<dyn EngineObject>, signal: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            object,
            signal: signal.into(),
            timeout_ms: Mutex::new(WAIT_FOREVER),
            link: Mutex::new(None),
        })
    }

    /// Signal name.
    pub fn signal(&self) -> &str {
        &self.signal
    }

    /// Configured await timeout in milliseconds.
    pub fn timeout_ms(&self) -> i64 {
        *lock(&self.timeout_ms)
    }

    /// Set the await timeout. `-1` waits forever; other values must be
    /// positive.
    pub fn set_timeout_ms(&self, ms: i64) -> Result<(), ReturnCode> {
        if ms != WAIT_FOREVER && ms <= 0 {
            return Err(ReturnCode::BadValue);
        }
        *lock(&self.timeout_ms) = ms;
        Ok(())
    }

    /// True while a handler is registered.
    pub fn is_connected(&self) -> bool {
        lock(&self.link).is_some()
    }

    fn link(&self, link: &mut Option<Link>) -> Result<Arc<SignalBridge>, ReturnCode> {
        let bridge = SignalBridge::new();
        let weak: Weak<SignalBridge> = Arc::downgrade(&bridge);
        let handler = self
            .object
            .connect_signal(
                &self.signal,
                Arc::new(move |args: &[Value]| {
                    if let Some(bridge) = weak.upgrade() {
                        bridge.fire(args);
                    }
                }),
            )
            .map_err(|err| err.return_code())?;
        info!(object = %self.object.name(), signal = %self.signal, "signal connected");
        *link = Some(Link {
            bridge: Arc::clone(&bridge),
            handler,
        });
        Ok(bridge)
    }

    /// Register the engine handler. Fails with `AlreadyExists` when
    /// connected.
    pub fn connect(&self) -> Result<(), ReturnCode> {
        let mut link = lock(&self.link);
        if link.is_some() {
            return Err(ReturnCode::AlreadyExists);
        }
        self.link(&mut link).map(drop)
    }

    /// Wait for the next emission, connecting first if idle.
    pub fn wait(&self) -> Result<Vec<Value>, ReturnCode> {
        let bridge = {
            let mut link = lock(&self.link);
            let existing = link.as_ref().map(|l| Arc::clone(&l.bridge));
            match existing {
                Some(bridge) => bridge,
                None => self.link(&mut link)?,
            }
        };
        let timeout = u64::try_from(self.timeout_ms())
            .ok()
            .map(Duration::from_millis);
        debug!(signal = %self.signal, ?timeout, "awaiting signal");
        bridge.wait(timeout)
    }

    /// Unregister the handler and cancel any waiter. Idle slots are left
    /// alone.
    pub fn disconnect(&self) {
        let link = lock(&self.link).take();
        if let Some(Link { bridge, handler }) = link {
            self.object.disconnect_signal(handler);
            bridge.cancel();
            info!(object = %self.object.name(), signal = %self.signal, "signal disconnected");
        }
    }

    /// Payload reported for one emission.
    pub fn payload(&self, args: &[Value]) -> Payload {
        let arguments: Vec<_> = args
            .iter()
            .map(|v| json!({ "type": value_type_name(v), "value": describe_value(v) }))
            .collect();
        match json!({ "name": self.signal, "arguments": arguments }) {
            serde_json::Value::Object(map) => Payload::Object(map),
            other => Payload::Scalar(other),
        }
    }
}

/// `callback`: create connects, read awaits, delete disconnects.
pub struct CallbackResource(pub Arc<SignalSlot>);

impl Creator for CallbackResource {
    fn create(&self, _node: &Arc<ResourceNode>, _name: &str, _description: &str) -> CapResult {
        self.0.connect().map(|()| None)
    }
}

impl Reader for CallbackResource {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        let args = self.0.wait()?;
        Ok(Some(self.0.payload(&args)))
    }
}

impl Deleter for CallbackResource {
    fn delete(&self, _node: &Arc<ResourceNode>, _name: &str) -> CapResult {
        self.0.disconnect();
        Ok(None)
    }
}

/// `timeout`: milliseconds applied to the next await.
pub struct TimeoutResource(pub Arc<SignalSlot>);

impl Reader for TimeoutResource {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        Ok(Some(Payload::Scalar(json!(self.0.timeout_ms()))))
    }
}

impl Updater for TimeoutResource {
    fn update(&self, _node: &Arc<ResourceNode>, value: &str) -> CapResult {
        if value.is_empty() {
            return Err(ReturnCode::NullArgument);
        }
        let ms: i64 = value.parse().map_err(|_| ReturnCode::BadValue)?;
        self.0.set_timeout_ms(ms).map(|()| None)
    }
}

/// `disconnect`: read disconnects.
pub struct DisconnectResource(pub Arc<SignalSlot>);

impl Reader for DisconnectResource {
    fn read(&self, _node: &Arc<ResourceNode>) -> CapResult {
        self.0.disconnect();
        Ok(None)
    }
}

struct SlotTeardown(Arc<SignalSlot>);

impl Teardown for SlotTeardown {
    fn teardown(&self) {
        self.0.disconnect();
    }
}

/// Subtree for one signal: `callback`, `timeout`, `disconnect`.
pub fn signal_node(object: &Arc<dyn EngineObject>, signal: &str) -> Arc<ResourceNode> {
    let slot = SignalSlot::new(Arc::clone(object), signal);
    ResourceNode::builder(signal)
        .reader(ListChildren)
        .teardown(SlotTeardown(Arc::clone(&slot)))
        .child(
            ResourceNode::builder("callback")
                .creator(CallbackResource(Arc::clone(&slot)))
                .reader(CallbackResource(Arc::clone(&slot)))
                .deleter(CallbackResource(Arc::clone(&slot)))
                .build(),
        )
        .child(
            ResourceNode::builder("timeout")
                .reader(TimeoutResource(Arc::clone(&slot)))
                .updater(TimeoutResource(Arc::clone(&slot)))
                .build(),
        )
        .child(
            ResourceNode::builder("disconnect")
                .reader(DisconnectResource(slot))
                .build(),
        )
        .build()
}
