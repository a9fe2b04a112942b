//! In-order caret traversal over the flattened document address space.
//!
//! The walk is a two-phase work-list loop (`Scan` a position inside a
//! node, `Climb` out of an exhausted node) rather than recursion, so
//! traversal depth is bounded by explicit state and toolkit cycles
//! terminate instead of overflowing the stack.

use std::collections::HashSet;

use crate::cache::{NodeCache, NodeRef};
use crate::event::{LogLevel, emit_log};
use crate::role::Role;
use crate::source::{Capabilities, EMBEDDED_OBJECT_CHAR, NodeHandle};
use crate::state::StateSet;

use super::{CaretContext, TraversalPolicy};

enum Phase {
    /// Examine the position after/before `1` inside node `0`.
    Scan(NodeRef, i32),
    /// The node is exhausted; resume in its parent.
    Climb(NodeRef),
}

/// Stateless in-order walker over the accessibility tree.
///
/// Borrow one from a [`Session`](crate::session::Session); it carries
/// only the cache and the traversal policy.
pub struct Walker<'a> {
    cache: &'a NodeCache,
    policy: &'a TraversalPolicy,
}

impl<'a> Walker<'a> {
    /// Create a walker over a cache with a policy.
    #[must_use]
    pub fn new(cache: &'a NodeCache, policy: &'a TraversalPolicy) -> Self {
        Self { cache, policy }
    }

    /// Character count usable for caret arithmetic.
    ///
    /// `None` when the node has no text capability or no characters. A
    /// single trailing space is trimmed (policy-controlled) so the
    /// caret never stops on a position the user cannot perceive.
    pub fn usable_text_len(&self, node: &NodeRef) -> Option<i32> {
        if !node.has(Capabilities::TEXT) {
            return None;
        }
        let mut len = node.character_count()? as i32;
        if len == 0 {
            return None;
        }
        if self.policy.trim_trailing_space && node.char_at(len - 1) == Some(' ') {
            len -= 1;
        }
        if len == 0 { None } else { Some(len) }
    }

    /// Resolve the child standing behind the embedded-object character
    /// at `offset`, by the occurrence-order/child-order invariant.
    ///
    /// The occurrence index is recomputed from live text on every call
    /// and validated against the child count; a mismatch (toolkit bug)
    /// yields `None` so the sentinel becomes an unenterable stop.
    pub fn child_for_offset(&self, node: &NodeRef, offset: i32) -> Option<NodeRef> {
        if offset < 0 {
            return None;
        }
        let prefix = node.text_slice(0, offset as usize)?;
        let occurrence = prefix
            .chars()
            .filter(|&c| c == EMBEDDED_OBJECT_CHAR)
            .count();
        let count = node.child_count()?;
        if occurrence >= count {
            emit_log(
                LogLevel::Warn,
                &format!(
                    "embedded object at offset {offset} of {} has no matching child",
                    node.handle()
                ),
            );
            return None;
        }
        self.cache.child_of(node, occurrence)
    }

    /// Inverse of [`child_for_offset`](Self::child_for_offset): the
    /// offset of `node`'s embedded-object character within `parent`.
    pub fn embedded_offset_in_parent(&self, parent: &NodeRef, node: &NodeRef) -> Option<i32> {
        let index = node.index_in_parent()?;
        let len = parent.character_count()?;
        let text = parent.text_slice(0, len)?;
        let mut seen = 0usize;
        for (i, ch) in text.chars().enumerate() {
            if ch == EMBEDDED_OBJECT_CHAR {
                if seen == index {
                    return Some(i as i32);
                }
                seen += 1;
            }
        }
        None
    }

    fn can_descend(&self, node: &NodeRef) -> bool {
        let Some(role) = node.role() else {
            return false;
        };
        let states = node.states().unwrap_or_default();
        if states.contains(StateSet::DEFUNCT)
            || states.contains(StateSet::MANAGES_DESCENDANTS)
            || !states.is_showing()
        {
            return false;
        }
        !self.policy.is_atomic(role, states)
    }

    fn has_presentable_extents(&self, node: &NodeRef) -> bool {
        node.extents().is_some_and(|r| !r.is_empty())
    }

    fn is_document_root(&self, node: &NodeRef) -> bool {
        node.role().is_some_and(Role::is_document)
    }

    /// Normalize a position that might point "at" an embedded object
    /// into the position "inside" it, entering the child from its
    /// start. Textless nodes normalize to the `-1` anchor; offsets
    /// clamp to the text bounds.
    pub fn normalize(&self, node: &NodeRef, offset: i32) -> CaretContext {
        let mut seen: HashSet<NodeHandle> = HashSet::new();
        let mut n = NodeRef::clone(node);
        let mut off = offset;
        seen.insert(n.handle());
        loop {
            let Some(len) = self.usable_text_len(&n) else {
                return CaretContext::new(n, -1);
            };
            let k = off.max(0);
            if k >= len {
                return CaretContext::new(n, len);
            }
            if n.char_at(k) == Some(EMBEDDED_OBJECT_CHAR) {
                if let Some(child) = self.child_for_offset(&n, k) {
                    if seen.insert(child.handle()) {
                        n = child;
                        off = 0;
                        continue;
                    }
                    emit_log(LogLevel::Warn, "cycle while normalizing caret position");
                }
            }
            return CaretContext::new(n, k);
        }
    }

    /// The next valid caret position in document order, or `None` past
    /// the end of the document.
    pub fn next(&self, node: &NodeRef, offset: i32) -> Option<CaretContext> {
        let mut descended: HashSet<NodeHandle> = HashSet::new();
        let mut climbed: HashSet<NodeHandle> = HashSet::new();
        let mut phase = Phase::Scan(NodeRef::clone(node), offset);
        loop {
            phase = match phase {
                Phase::Scan(n, off) => {
                    if let Some(len) = self.usable_text_len(&n) {
                        let k = off.max(-1).saturating_add(1);
                        if k >= len {
                            Phase::Climb(n)
                        } else {
                            match n.char_at(k) {
                                Some(EMBEDDED_OBJECT_CHAR) => {
                                    match self.child_for_offset(&n, k) {
                                        Some(child) if descended.insert(child.handle()) => {
                                            Phase::Scan(child, -1)
                                        }
                                        // Unenterable (or cyclic) object: the
                                        // sentinel itself is the stop.
                                        _ => return Some(CaretContext::new(n, k)),
                                    }
                                }
                                Some(_) => return Some(CaretContext::new(n, k)),
                                None => Phase::Climb(n),
                            }
                        }
                    } else if n.child_count().unwrap_or(0) > 0 && self.can_descend(&n) {
                        match self.cache.child_of(&n, 0) {
                            Some(child) if descended.insert(child.handle()) => {
                                Phase::Scan(child, -1)
                            }
                            _ => Phase::Climb(n),
                        }
                    } else if off < 0
                        && !self.is_document_root(&n)
                        && self.has_presentable_extents(&n)
                    {
                        return Some(CaretContext::new(n, 0));
                    } else {
                        Phase::Climb(n)
                    }
                }
                Phase::Climb(n) => {
                    if self.is_document_root(&n) {
                        return None;
                    }
                    let Some(parent) = self.cache.parent_of(&n) else {
                        return None;
                    };
                    if !climbed.insert(parent.handle()) {
                        emit_log(LogLevel::Warn, "ancestor cycle during forward traversal");
                        return None;
                    }
                    if self.usable_text_len(&parent).is_some() {
                        match self.embedded_offset_in_parent(&parent, &n) {
                            Some(k) => Phase::Scan(parent, k),
                            None => Phase::Climb(parent),
                        }
                    } else {
                        match n.index_in_parent() {
                            Some(i) => match self.cache.child_of(&parent, i + 1) {
                                Some(sib) if descended.insert(sib.handle()) => {
                                    Phase::Scan(sib, -1)
                                }
                                Some(_) => return None,
                                None => Phase::Climb(parent),
                            },
                            None => Phase::Climb(parent),
                        }
                    }
                }
            };
        }
    }

    /// The previous valid caret position in document order, or `None`
    /// before the start of the document.
    ///
    /// Offset `-1` means "enter from the end".
    pub fn previous(&self, node: &NodeRef, offset: i32) -> Option<CaretContext> {
        let mut descended: HashSet<NodeHandle> = HashSet::new();
        let mut climbed: HashSet<NodeHandle> = HashSet::new();
        let mut phase = Phase::Scan(NodeRef::clone(node), offset);
        loop {
            phase = match phase {
                Phase::Scan(n, off) => {
                    if let Some(len) = self.usable_text_len(&n) {
                        let k = if off < 0 { len - 1 } else { off.min(len) - 1 };
                        if k < 0 {
                            Phase::Climb(n)
                        } else {
                            match n.char_at(k) {
                                Some(EMBEDDED_OBJECT_CHAR) => {
                                    match self.child_for_offset(&n, k) {
                                        Some(child) if descended.insert(child.handle()) => {
                                            Phase::Scan(child, -1)
                                        }
                                        _ => return Some(CaretContext::new(n, k)),
                                    }
                                }
                                Some(_) => return Some(CaretContext::new(n, k)),
                                None => Phase::Climb(n),
                            }
                        }
                    } else if n.child_count().unwrap_or(0) > 0 && self.can_descend(&n) {
                        let count = n.child_count().unwrap_or(0);
                        match self.cache.child_of(&n, count - 1) {
                            Some(child) if descended.insert(child.handle()) => {
                                Phase::Scan(child, -1)
                            }
                            _ => Phase::Climb(n),
                        }
                    } else if off < 0
                        && !self.is_document_root(&n)
                        && self.has_presentable_extents(&n)
                    {
                        return Some(CaretContext::new(n, 0));
                    } else {
                        Phase::Climb(n)
                    }
                }
                Phase::Climb(n) => {
                    if self.is_document_root(&n) {
                        return None;
                    }
                    let Some(parent) = self.cache.parent_of(&n) else {
                        return None;
                    };
                    if !climbed.insert(parent.handle()) {
                        emit_log(LogLevel::Warn, "ancestor cycle during backward traversal");
                        return None;
                    }
                    if self.usable_text_len(&parent).is_some() {
                        match self.embedded_offset_in_parent(&parent, &n) {
                            Some(k) => Phase::Scan(parent, k),
                            None => Phase::Climb(parent),
                        }
                    } else {
                        match n.index_in_parent() {
                            Some(i) if i > 0 => match self.cache.child_of(&parent, i - 1) {
                                Some(sib) if descended.insert(sib.handle()) => {
                                    Phase::Scan(sib, -1)
                                }
                                Some(_) => return None,
                                None => Phase::Climb(parent),
                            },
                            _ => Phase::Climb(parent),
                        }
                    }
                }
            };
        }
    }
}
