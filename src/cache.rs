//! Object cache and identity layer over the accessibility bus.
//!
//! Raw [`NodeHandle`]s are cheap bus identities; [`Node`] wraps one
//! with memoized property lookups so that repeated reads of name, role,
//! parent, state and child count do not each cost a round trip to the
//! external process. [`NodeCache`] guarantees wrapper identity: two
//! resolutions of the same live handle return the identical `Rc`, so
//! position bookkeeping can compare nodes by pointer.
//!
//! Every memo slot has an explicit invalidation entry point driven by
//! the matching bus notification; a defunct notification evicts the
//! whole entry so a bus-reused handle later resolves to a fresh
//! wrapper.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::geometry::Rect;
use crate::role::Role;
use crate::source::{
    AccessibleSource, Capabilities, LinkSpan, NodeHandle, TextBoundary, TextChunk,
};
use crate::state::StateSet;

/// Shared reference to a cached node wrapper.
///
/// Identity is pointer identity: `Rc::ptr_eq` on two `NodeRef`s decides
/// "same object", which survives handle reuse by the bus.
pub type NodeRef = Rc<Node>;

/// Which memoized field a notification invalidates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Invalidation {
    Name,
    Description,
    Parent,
    States,
    Children,
    All,
}

#[derive(Default)]
struct Fields {
    role: Option<Role>,
    name: Option<String>,
    description: Option<String>,
    states: Option<StateSet>,
    parent: Option<Option<NodeHandle>>,
    child_count: Option<usize>,
    index_in_parent: Option<usize>,
    capabilities: Option<Capabilities>,
}

/// Cached proxy for one external accessible element.
///
/// Scalar properties are fetched on first access and memoized; a failed
/// read (the element vanished) degrades to `None` and is not cached, so
/// a later retry can still succeed. Text and geometry reads are live:
/// they change too often to memoize safely.
pub struct Node {
    handle: NodeHandle,
    source: Rc<dyn AccessibleSource>,
    fields: RefCell<Fields>,
}

impl Node {
    fn new(handle: NodeHandle, source: Rc<dyn AccessibleSource>) -> NodeRef {
        source.ref_handle(handle);
        Rc::new(Self {
            handle,
            source,
            fields: RefCell::new(Fields::default()),
        })
    }

    /// The external handle this wrapper proxies.
    #[must_use]
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    /// Pointer identity of two wrappers.
    #[must_use]
    pub fn same(a: &NodeRef, b: &NodeRef) -> bool {
        Rc::ptr_eq(a, b)
    }

    /// Role, memoized.
    pub fn role(&self) -> Option<Role> {
        if let Some(role) = self.fields.borrow().role {
            return Some(role);
        }
        let role = self.source.role(self.handle)?;
        self.fields.borrow_mut().role = Some(role);
        Some(role)
    }

    /// Accessible name, memoized.
    pub fn name(&self) -> Option<String> {
        if let Some(name) = self.fields.borrow().name.clone() {
            return Some(name);
        }
        let name = self.source.name(self.handle)?;
        self.fields.borrow_mut().name = Some(name.clone());
        Some(name)
    }

    /// Accessible description, memoized.
    pub fn description(&self) -> Option<String> {
        if let Some(d) = self.fields.borrow().description.clone() {
            return Some(d);
        }
        let d = self.source.description(self.handle)?;
        self.fields.borrow_mut().description = Some(d.clone());
        Some(d)
    }

    /// State flags, memoized.
    pub fn states(&self) -> Option<StateSet> {
        if let Some(s) = self.fields.borrow().states {
            return Some(s);
        }
        let s = self.source.states(self.handle)?;
        self.fields.borrow_mut().states = Some(s);
        Some(s)
    }

    /// Parent handle, memoized. `None` at the tree root.
    pub fn parent_handle(&self) -> Option<NodeHandle> {
        if let Some(p) = self.fields.borrow().parent {
            return p;
        }
        let p = self.source.parent(self.handle);
        self.fields.borrow_mut().parent = Some(p);
        p
    }

    /// Child count, memoized.
    pub fn child_count(&self) -> Option<usize> {
        if let Some(c) = self.fields.borrow().child_count {
            return Some(c);
        }
        let c = self.source.child_count(self.handle)?;
        self.fields.borrow_mut().child_count = Some(c);
        Some(c)
    }

    /// Index within the parent's children, memoized.
    pub fn index_in_parent(&self) -> Option<usize> {
        if let Some(i) = self.fields.borrow().index_in_parent {
            return Some(i);
        }
        let i = self.source.index_in_parent(self.handle)?;
        self.fields.borrow_mut().index_in_parent = Some(i);
        Some(i)
    }

    /// Capability set, memoized.
    pub fn capabilities(&self) -> Capabilities {
        if let Some(c) = self.fields.borrow().capabilities {
            return c;
        }
        let c = self.source.capabilities(self.handle);
        self.fields.borrow_mut().capabilities = Some(c);
        c
    }

    /// Check a single capability.
    #[must_use]
    pub fn has(&self, cap: Capabilities) -> bool {
        self.capabilities().contains(cap)
    }

    /// Check whether the bus still answers for this handle.
    ///
    /// Deliberately uncached: this is the liveness probe used to detect
    /// defunct nodes referenced by a stale position.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.source.role(self.handle).is_some()
    }

    // --- live (uncached) capability reads -----------------------------

    pub fn character_count(&self) -> Option<usize> {
        if !self.has(Capabilities::TEXT) {
            return None;
        }
        self.source.character_count(self.handle)
    }

    /// Character at a character offset; `None` when out of bounds.
    pub fn char_at(&self, offset: i32) -> Option<char> {
        if offset < 0 {
            return None;
        }
        let offset = offset as usize;
        self.source
            .text_slice(self.handle, offset, offset + 1)?
            .chars()
            .next()
    }

    pub fn text_slice(&self, start: usize, end: usize) -> Option<String> {
        self.source.text_slice(self.handle, start, end)
    }

    pub fn text_at_offset(&self, offset: usize, boundary: TextBoundary) -> Option<TextChunk> {
        self.source.text_at_offset(self.handle, offset, boundary)
    }

    pub fn range_extents(&self, start: usize, end: usize) -> Option<Rect> {
        self.source.range_extents(self.handle, start, end)
    }

    pub fn text_attributes_at(
        &self,
        offset: usize,
    ) -> Option<(Vec<(String, String)>, usize, usize)> {
        self.source.text_attributes_at(self.handle, offset)
    }

    pub fn caret_offset(&self) -> Option<i32> {
        self.source.caret_offset(self.handle)
    }

    pub fn set_caret_offset(&self, offset: i32) -> bool {
        self.source.set_caret_offset(self.handle, offset)
    }

    pub fn extents(&self) -> Option<Rect> {
        if !self.has(Capabilities::COMPONENT) {
            return None;
        }
        self.source.extents(self.handle)
    }

    pub fn image_description(&self) -> Option<String> {
        if !self.has(Capabilities::IMAGE) {
            return None;
        }
        self.source.image_description(self.handle)
    }

    pub fn table_size(&self) -> Option<(usize, usize)> {
        self.source.table_size(self.handle)
    }

    pub fn cell_coordinates(&self, index: usize) -> Option<(usize, usize)> {
        self.source.cell_coordinates(self.handle, index)
    }

    pub fn link_count(&self) -> Option<usize> {
        if !self.has(Capabilities::HYPERTEXT) {
            return None;
        }
        self.source.link_count(self.handle)
    }

    pub fn link_at(&self, index: usize) -> Option<LinkSpan> {
        self.source.link_at(self.handle, index)
    }

    pub fn action_count(&self) -> Option<usize> {
        if !self.has(Capabilities::ACTION) {
            return None;
        }
        self.source.action_count(self.handle)
    }

    pub fn do_action(&self, index: usize) -> bool {
        self.source.do_action(self.handle, index)
    }

    /// Drop one memoized field (or all of them).
    pub fn invalidate(&self, kind: Invalidation) {
        let mut f = self.fields.borrow_mut();
        match kind {
            Invalidation::Name => f.name = None,
            Invalidation::Description => f.description = None,
            Invalidation::Parent => {
                f.parent = None;
                f.index_in_parent = None;
            }
            Invalidation::States => f.states = None,
            Invalidation::Children => f.child_count = None,
            Invalidation::All => *f = Fields::default(),
        }
    }

    fn cached_parent(&self) -> Option<NodeHandle> {
        self.fields.borrow().parent.flatten()
    }

    fn clear_index_in_parent(&self) {
        self.fields.borrow_mut().index_in_parent = None;
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        // The single release point matching the ref in `Node::new`.
        self.source.unref_handle(self.handle);
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node").field("handle", &self.handle).finish()
    }
}

/// Identity-preserving cache of node wrappers.
///
/// Interior mutability keeps lookups `&self`: a cache invalidation can
/// fire synchronously in the middle of a traversal call without
/// invalidating the borrow the traversal holds. No borrow is ever held
/// across a source round trip.
pub struct NodeCache {
    source: Rc<dyn AccessibleSource>,
    nodes: RefCell<HashMap<NodeHandle, NodeRef>>,
}

impl NodeCache {
    /// Create an empty cache over a source.
    #[must_use]
    pub fn new(source: Rc<dyn AccessibleSource>) -> Self {
        Self {
            source,
            nodes: RefCell::new(HashMap::new()),
        }
    }

    /// Resolve a handle to its wrapper, constructing one on first sight.
    pub fn resolve(&self, handle: NodeHandle) -> NodeRef {
        if let Some(node) = self.nodes.borrow().get(&handle) {
            return Rc::clone(node);
        }
        let node = Node::new(handle, Rc::clone(&self.source));
        self.nodes
            .borrow_mut()
            .insert(handle, Rc::clone(&node));
        node
    }

    /// Look up a wrapper without constructing one.
    #[must_use]
    pub fn lookup(&self, handle: NodeHandle) -> Option<NodeRef> {
        self.nodes.borrow().get(&handle).map(Rc::clone)
    }

    /// Evict a handle. The next `resolve` yields a fresh wrapper even
    /// if the bus reuses the handle for a new element.
    pub fn evict(&self, handle: NodeHandle) {
        self.nodes.borrow_mut().remove(&handle);
    }

    /// Route a field invalidation to the cached wrapper, if any.
    pub fn invalidate(&self, handle: NodeHandle, kind: Invalidation) {
        if let Some(node) = self.lookup(handle) {
            node.invalidate(kind);
        }
        if kind == Invalidation::Children {
            // Sibling order shifted under the mutated parent; the
            // children's cached indices are stale too.
            let children: Vec<NodeRef> = self
                .nodes
                .borrow()
                .values()
                .filter(|n| n.cached_parent() == Some(handle))
                .map(Rc::clone)
                .collect();
            for child in children {
                child.clear_index_in_parent();
            }
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.nodes.borrow_mut().clear();
    }

    /// Number of cached wrappers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    /// Resolve a node's parent wrapper. `None` at the root, and for a
    /// node claiming itself as its own parent (a toolkit cycle).
    pub fn parent_of(&self, node: &NodeRef) -> Option<NodeRef> {
        let parent = node.parent_handle()?;
        if parent == node.handle() {
            return None;
        }
        Some(self.resolve(parent))
    }

    /// Resolve a node's i-th child wrapper.
    pub fn child_of(&self, node: &NodeRef, index: usize) -> Option<NodeRef> {
        let child = self.source.child_at(node.handle(), index)?;
        if child == node.handle() {
            return None;
        }
        Some(self.resolve(child))
    }
}
