// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Addressable resource tree.
//!
//! Every node has a name unique among its siblings, an ordered set of
//! children and up to four capabilities, one per verb. A node without the
//! capability for a verb answers [`ReturnCode::MethodNotAllowed`].
//!
//! Each node guards its own child list. Subtrees are built completely and
//! attached in one step; capabilities are invoked by the router after the
//! lookup has released every lock.

use std::sync::{Arc, PoisonError, RwLock};

use gstd_proto::{Payload, ReturnCode};
use tracing::debug;

/// Result of invoking a capability.
pub type CapResult = Result<Option<Payload>, ReturnCode>;

/// `create` capability. `name` is the first word of the argument and
/// `description` the rest; both may be empty.
pub trait Creator: Send + Sync {
    /// Create something under `node`.
    fn create(&self, node: &Arc<ResourceNode>, name: &str, description: &str) -> CapResult;
}

/// `read` capability.
pub trait Reader: Send + Sync {
    /// Read `node`.
    fn read(&self, node: &Arc<ResourceNode>) -> CapResult;
}

/// `update` capability. `value` is the whole argument, possibly empty.
pub trait Updater: Send + Sync {
    /// Update `node`.
    fn update(&self, node: &Arc<ResourceNode>, value: &str) -> CapResult;
}

/// `delete` capability. `name` is the first word of the argument.
pub trait Deleter: Send + Sync {
    /// Delete something under (or behind) `node`.
    fn delete(&self, node: &Arc<ResourceNode>, name: &str) -> CapResult;
}

/// Hook run when a node leaves the tree.
pub trait Teardown: Send + Sync {
    /// Release whatever the node holds.
    fn teardown(&self);
}

/// One node of the namespace.
pub struct ResourceNode {
    name: String,
    creator: Option<Box<dyn Creator>>,
    reader: Option<Box<dyn Reader>>,
    updater: Option<Box<dyn Updater>>,
    deleter: Option<Box<dyn Deleter>>,
    teardown: Option<Box<dyn Teardown>>,
    children: RwLock<Vec<Arc<ResourceNode>>>,
}

impl std::fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceNode")
            .field("name", &self.name)
            .field("children", &self.child_names())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResourceNode`].
pub struct NodeBuilder {
    node: ResourceNode,
}

impl NodeBuilder {
    /// Attach a `create` capability.
    pub fn creator(mut self, c: impl Creator + 'static) -> Self {
        self.node.creator = Some(Box::new(c));
        self
    }

    /// Attach a `read` capability.
    pub fn reader(mut self, r: impl Reader + 'static) -> Self {
        self.node.reader = Some(Box::new(r));
        self
    }

    /// Attach an `update` capability.
    pub fn updater(mut self, u: impl Updater + 'static) -> Self {
        self.node.updater = Some(Box::new(u));
        self
    }

    /// Attach a `delete` capability.
    pub fn deleter(mut self, d: impl Deleter + 'static) -> Self {
        self.node.deleter = Some(Box::new(d));
        self
    }

    /// Attach a teardown hook.
    pub fn teardown(mut self, t: impl Teardown + 'static) -> Self {
        self.node.teardown = Some(Box::new(t));
        self
    }

    /// Add a child. Later children with a duplicate name are ignored.
    pub fn child(self, child: Arc<ResourceNode>) -> Self {
        {
            let mut children = self.node.write_children();
            if !children.iter().any(|c| c.name == child.name) {
                children.push(child);
            }
        }
        self
    }

    /// Finish the node.
    pub fn build(self) -> Arc<ResourceNode> {
        Arc::new(self.node)
    }
}

impl ResourceNode {
    /// Start building a node named `name`.
    pub fn builder(name: impl Into<String>) -> NodeBuilder {
        NodeBuilder {
            node: ResourceNode {
                name: name.into(),
                creator: None,
                reader: None,
                updater: None,
                deleter: None,
                teardown: None,
                children: RwLock::new(Vec::new()),
            },
        }
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn read_children(&self) -> std::sync::RwLockReadGuard<'_, Vec<Arc<ResourceNode>>> {
        self.children.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_children(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Arc<ResourceNode>>> {
        self.children.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direct child by exact name.
    pub fn child(&self, name: &str) -> Option<Arc<ResourceNode>> {
        self.read_children().iter().find(|c| c.name == name).cloned()
    }

    /// Child names in insertion order.
    pub fn child_names(&self) -> Vec<String> {
        self.read_children().iter().map(|c| c.name.clone()).collect()
    }

    /// Attach a fully built subtree.
    pub fn attach(&self, child: Arc<ResourceNode>) -> Result<(), ReturnCode> {
        let mut children = self.write_children();
        if children.iter().any(|c| c.name == child.name) {
            return Err(ReturnCode::AlreadyExists);
        }
        debug!(parent = %self.name, child = %child.name, "attach");
        children.push(child);
        Ok(())
    }

    /// Detach a child and tear down its subtree.
    pub fn detach(&self, name: &str) -> Result<Arc<ResourceNode>, ReturnCode> {
        let child = {
            let mut children = self.write_children();
            let idx = children
                .iter()
                .position(|c| c.name == name)
                .ok_or(ReturnCode::NotFound)?;
            children.remove(idx)
        };
        debug!(parent = %self.name, child = %name, "detach");
        child.teardown_subtree();
        Ok(child)
    }

    /// Run teardown hooks, descendants first.
    pub fn teardown_subtree(&self) {
        let children: Vec<_> = self.read_children().clone();
        for child in children {
            child.teardown_subtree();
        }
        if let Some(t) = &self.teardown {
            t.teardown();
        }
    }

    /// Resolve an absolute path below this node.
    ///
    /// `""` and `"/"` are this node; one trailing slash is tolerated.
    pub fn resolve(self: &Arc<Self>, path: &str) -> Result<Arc<ResourceNode>, ReturnCode> {
        if path.is_empty() || path == "/" {
            return Ok(Arc::clone(self));
        }
        let rest = path.strip_prefix('/').ok_or(ReturnCode::BadValue)?;
        let rest = rest.strip_suffix('/').unwrap_or(rest);
        let mut node = Arc::clone(self);
        for segment in rest.split('/') {
            if segment.is_empty() {
                return Err(ReturnCode::BadValue);
            }
            node = node.child(segment).ok_or(ReturnCode::NotFound)?;
        }
        Ok(node)
    }

    /// `create` capability, if any.
    pub fn creator(&self) -> Option<&dyn Creator> {
        self.creator.as_deref()
    }

    /// `read` capability, if any.
    pub fn reader(&self) -> Option<&dyn Reader> {
        self.reader.as_deref()
    }

    /// `update` capability, if any.
    pub fn updater(&self) -> Option<&dyn Updater> {
        self.updater.as_deref()
    }

    /// `delete` capability, if any.
    pub fn deleter(&self) -> Option<&dyn Deleter> {
        self.deleter.as_deref()
    }
}

/// Reader listing a node's children.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListChildren;

impl Reader for ListChildren {
    fn read(&self, node: &Arc<ResourceNode>) -> CapResult {
        Ok(Some(Payload::List(node.child_names())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Count(Arc<AtomicUsize>);

    impl Teardown for Count {
        fn teardown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tree() -> Arc<ResourceNode> {
        let leaf = ResourceNode::builder("b").reader(ListChildren).build();
        let a = ResourceNode::builder("a").child(leaf).build();
        ResourceNode::builder("").reader(ListChildren).child(a).build()
    }

    #[test]
    fn resolves_paths() {
        let root = tree();
        assert_eq!(root.resolve("/").unwrap().name(), "");
        assert_eq!(root.resolve("").unwrap().name(), "");
        assert_eq!(root.resolve("/a/b").unwrap().name(), "b");
        assert_eq!(root.resolve("/a/b/").unwrap().name(), "b");
        assert_eq!(root.resolve("/a/c").unwrap_err(), ReturnCode::NotFound);
        assert_eq!(root.resolve("/A").unwrap_err(), ReturnCode::NotFound);
        assert_eq!(root.resolve("a/b").unwrap_err(), ReturnCode::BadValue);
        assert_eq!(root.resolve("/a//b").unwrap_err(), ReturnCode::BadValue);
    }

    #[test]
    fn attach_rejects_duplicates_and_detach_tears_down() {
        let root = tree();
        let count = Arc::new(AtomicUsize::new(0));
        let inner = ResourceNode::builder("inner")
            .teardown(Count(Arc::clone(&count)))
            .build();
        let x = ResourceNode::builder("x")
            .teardown(Count(Arc::clone(&count)))
            .child(inner)
            .build();
        root.attach(x).unwrap();
        assert_eq!(
            root.attach(ResourceNode::builder("x").build()),
            Err(ReturnCode::AlreadyExists)
        );
        assert_eq!(root.child_names(), vec!["a", "x"]);
        root.detach("x").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(root.detach("x").unwrap_err(), ReturnCode::NotFound);
    }

    #[test]
    fn list_children_reads_names() {
        let root = tree();
        let payload = root.reader().unwrap().read(&root).unwrap().unwrap();
        assert_eq!(payload.as_list().unwrap(), ["a".to_string()]);
    }
}
