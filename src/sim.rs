//! Scriptable in-memory accessibility tree.
//!
//! [`SimTree`] implements [`AccessibleSource`] entirely in memory: a
//! tree of nodes with rope-backed text, a monospace layout model for
//! extents (8x16 cells), boundary queries, and mutation helpers that
//! queue the matching bus [`Notification`]s. It exists so tests,
//! benchmarks and examples can exercise the navigation engines without
//! a desktop session, and it keeps the external-refcount books so
//! leaks and double releases show up in tests.
//!
//! The layout model is deliberately simple: a node embedded in its
//! parent's text sits at its sentinel's cell; anything else stacks
//! below its previous sibling. Explicit extents override both.

use std::cell::RefCell;
use std::collections::HashMap;

use ropey::Rope;
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthChar;

use crate::geometry::Rect;
use crate::notify::{ChildChange, Notification, TextChange};
use crate::role::Role;
use crate::source::{
    AccessibleSource, Capabilities, EMBEDDED_OBJECT_CHAR, LinkSpan, NodeHandle, TextBoundary,
    TextChunk,
};
use crate::state::StateSet;

/// Width of one character cell.
const CELL_W: i32 = 8;
/// Height of one text line.
const CELL_H: i32 = 16;
/// Vertical spacing of non-embedded siblings.
const STACK_H: i32 = 32;
/// Recursion guard for layout queries on malformed (cyclic) trees.
const MAX_LAYOUT_DEPTH: u32 = 32;

struct SimNode {
    role: Role,
    name: String,
    description: String,
    image_description: Option<String>,
    states: StateSet,
    parent: Option<u64>,
    children: Vec<u64>,
    text: Option<Rope>,
    caret: Option<i32>,
    extents: Option<Rect>,
    table: Option<(usize, usize)>,
    actions: usize,
    dead: bool,
}

impl SimNode {
    fn new(role: Role) -> Self {
        let actions = usize::from(matches!(
            role,
            Role::PushButton
                | Role::ToggleButton
                | Role::CheckBox
                | Role::RadioButton
                | Role::Link
                | Role::MenuItem
        ));
        Self {
            role,
            name: String::new(),
            description: String::new(),
            image_description: None,
            states: StateSet::SHOWING | StateSet::VISIBLE,
            parent: None,
            children: Vec::new(),
            text: None,
            caret: None,
            extents: None,
            table: None,
            actions,
            dead: false,
        }
    }
}

struct Inner {
    nodes: HashMap<u64, SimNode>,
    next: u64,
}

impl Inner {
    fn node(&self, h: NodeHandle) -> Option<&SimNode> {
        self.nodes.get(&h.0).filter(|n| !n.dead)
    }

    /// Cell width of a character in the monospace layout.
    fn cell_width(ch: char) -> i32 {
        if ch == EMBEDDED_OBJECT_CHAR {
            1
        } else {
            UnicodeWidthChar::width(ch).unwrap_or(0) as i32
        }
    }

    /// The embedded child behind the `occurrence`-th sentinel of `h`.
    fn embedded_child(&self, h: NodeHandle, occurrence: usize) -> Option<u64> {
        let node = self.node(h)?;
        node.children.get(occurrence).copied()
    }

    /// Sentinel occurrence index of `child` within its parent's text,
    /// with the character offset of that sentinel.
    fn embedding_of(&self, child: u64) -> Option<(u64, usize)> {
        let parent_id = self.nodes.get(&child)?.parent?;
        let parent = self.node(NodeHandle(parent_id))?;
        let index = parent.children.iter().position(|&c| c == child)?;
        let text = parent.text.as_ref()?;
        let mut seen = 0usize;
        for (offset, ch) in text.chars().enumerate() {
            if ch == EMBEDDED_OBJECT_CHAR {
                if seen == index {
                    return Some((parent_id, offset));
                }
                seen += 1;
            }
        }
        None
    }

    fn origin(&self, h: NodeHandle, depth: u32) -> (i32, i32) {
        if depth > MAX_LAYOUT_DEPTH {
            return (0, 0);
        }
        let Some(node) = self.node(h) else {
            return (0, 0);
        };
        if let Some(extents) = node.extents {
            return (extents.x, extents.y);
        }
        if let Some((parent, offset)) = self.embedding_of(h.0) {
            if let Some(rect) = self.cell_rect(NodeHandle(parent), offset, depth + 1) {
                return (rect.x, rect.y);
            }
        }
        match node.parent {
            Some(parent) => {
                let (px, py) = self.origin(NodeHandle(parent), depth + 1);
                let index = self
                    .node(NodeHandle(parent))
                    .and_then(|p| p.children.iter().position(|&c| c == h.0))
                    .unwrap_or(0);
                (px, py + STACK_H * index as i32)
            }
            None => (0, 0),
        }
    }

    /// Pure cell-grid rectangle of a character, never consulting the
    /// embedded child (breaks the sentinel/extents recursion).
    fn cell_rect(&self, h: NodeHandle, offset: usize, depth: u32) -> Option<Rect> {
        if depth > MAX_LAYOUT_DEPTH {
            return None;
        }
        let node = self.node(h)?;
        let text = node.text.as_ref()?;
        let len = text.len_chars();
        let (ox, oy) = self.origin(h, depth);
        let (line, col_cells, width) = if offset >= len {
            let line = text.len_lines().saturating_sub(1);
            let start = text.line_to_char(line);
            let cells: i32 = text.slice(start..len).chars().map(Self::cell_width).sum();
            (line, cells, 0)
        } else {
            let line = text.char_to_line(offset);
            let start = text.line_to_char(line);
            let cells: i32 = text
                .slice(start..offset)
                .chars()
                .map(Self::cell_width)
                .sum();
            let ch = text.char(offset);
            (line, cells, Self::cell_width(ch))
        };
        Some(Rect::new(
            ox + col_cells * CELL_W,
            oy + line as i32 * CELL_H,
            (width * CELL_W).max(0) as u32,
            CELL_H as u32,
        ))
    }

    /// Screen rectangle of one character, sentinels resolving to their
    /// embedded child's extents.
    fn char_rect(&self, h: NodeHandle, offset: usize, depth: u32) -> Option<Rect> {
        if depth > MAX_LAYOUT_DEPTH {
            return None;
        }
        let node = self.node(h)?;
        let text = node.text.as_ref()?;
        if offset < text.len_chars() && text.char(offset) == EMBEDDED_OBJECT_CHAR {
            let occurrence = text
                .slice(..offset)
                .chars()
                .filter(|&c| c == EMBEDDED_OBJECT_CHAR)
                .count();
            if let Some(child) = self.embedded_child(h, occurrence) {
                return self.node_extents(NodeHandle(child), depth + 1);
            }
        }
        self.cell_rect(h, offset, depth)
    }

    fn content_size(&self, h: NodeHandle, depth: u32) -> (u32, u32) {
        if depth > MAX_LAYOUT_DEPTH {
            return (0, 0);
        }
        let Some(node) = self.node(h) else {
            return (0, 0);
        };
        if let Some(text) = &node.text {
            let mut widest = 1i32;
            for line in text.lines() {
                let cells: i32 = line
                    .chars()
                    .filter(|&c| c != '\n')
                    .map(Self::cell_width)
                    .sum();
                widest = widest.max(cells);
            }
            let lines = text.len_lines() as i32;
            return ((widest * CELL_W) as u32, (lines * CELL_H) as u32);
        }
        if !node.children.is_empty() {
            let mut rect: Option<Rect> = None;
            for &child in &node.children {
                if let Some(r) = self.node_extents(NodeHandle(child), depth + 1) {
                    rect = Some(rect.map_or(r, |acc| acc.union(&r)));
                }
            }
            if let Some(r) = rect {
                return (r.width, r.height);
            }
        }
        ((2 * CELL_W) as u32, CELL_H as u32)
    }

    fn node_extents(&self, h: NodeHandle, depth: u32) -> Option<Rect> {
        if depth > MAX_LAYOUT_DEPTH {
            return None;
        }
        let node = self.node(h)?;
        if let Some(extents) = node.extents {
            return Some(extents);
        }
        let (x, y) = self.origin(h, depth);
        let (w, hgt) = self.content_size(h, depth);
        Some(Rect::new(x, y, w, hgt))
    }

    fn line_span(text: &Rope, offset: usize) -> (usize, usize) {
        let len = text.len_chars();
        if len == 0 {
            return (0, 0);
        }
        let offset = offset.min(len - 1);
        let line = text.char_to_line(offset);
        let start = text.line_to_char(line);
        let mut end = if line + 1 < text.len_lines() {
            text.line_to_char(line + 1)
        } else {
            len
        };
        // Exclude the line terminator.
        if end > start && text.char(end - 1) == '\n' {
            end -= 1;
        }
        (start, end)
    }

    fn boundary_span(text: &Rope, offset: usize, boundary: TextBoundary) -> (usize, usize) {
        let len = text.len_chars();
        if len == 0 {
            return (0, 0);
        }
        let offset = offset.min(len - 1);
        match boundary {
            TextBoundary::Char => (offset, offset + 1),
            TextBoundary::Line => Self::line_span(text, offset),
            TextBoundary::Word | TextBoundary::Sentence => {
                let full: String = text.to_string();
                let mut char_pos = 0usize;
                let pieces: Vec<&str> = if boundary == TextBoundary::Word {
                    full.split_word_bounds().collect()
                } else {
                    full.split_sentence_bounds().collect()
                };
                for piece in pieces {
                    let count = piece.chars().count();
                    if offset < char_pos + count {
                        return (char_pos, char_pos + count);
                    }
                    char_pos += count;
                }
                (len.saturating_sub(1), len)
            }
        }
    }
}

/// In-memory implementation of [`AccessibleSource`].
pub struct SimTree {
    inner: RefCell<Inner>,
    refs: RefCell<HashMap<u64, i64>>,
    pending: RefCell<Vec<Notification>>,
}

impl SimTree {
    /// Create an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RefCell::new(Inner {
                nodes: HashMap::new(),
                next: 1,
            }),
            refs: RefCell::new(HashMap::new()),
            pending: RefCell::new(Vec::new()),
        }
    }

    fn alloc(&self, role: Role) -> NodeHandle {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next;
        inner.next += 1;
        inner.nodes.insert(id, SimNode::new(role));
        NodeHandle(id)
    }

    /// Add a parentless root node.
    pub fn add_root(&self, role: Role) -> NodeHandle {
        self.alloc(role)
    }

    /// Add a child under `parent`, appended after its siblings.
    pub fn add_child(&self, parent: NodeHandle, role: Role) -> NodeHandle {
        let h = self.alloc(role);
        let mut inner = self.inner.borrow_mut();
        if let Some(node) = inner.nodes.get_mut(&h.0) {
            node.parent = Some(parent.0);
        }
        if let Some(p) = inner.nodes.get_mut(&parent.0) {
            p.children.push(h.0);
        }
        drop(inner);
        self.pending
            .borrow_mut()
            .push(Notification::ChildrenChanged(parent, ChildChange::Added(h)));
        h
    }

    /// Set a node's accessible name.
    pub fn set_name(&self, h: NodeHandle, name: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.name = name.to_string();
        }
        self.pending.borrow_mut().push(Notification::NameChanged(h));
    }

    /// Set a node's accessible description.
    pub fn set_description(&self, h: NodeHandle, description: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.description = description.to_string();
        }
        self.pending
            .borrow_mut()
            .push(Notification::DescriptionChanged(h));
    }

    /// Set an image description (grants the Image capability).
    pub fn set_image_description(&self, h: NodeHandle, description: &str) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.image_description = Some(description.to_string());
        }
    }

    /// Replace a node's text (grants the Text capability).
    pub fn set_text(&self, h: NodeHandle, text: &str) {
        let old = {
            let mut inner = self.inner.borrow_mut();
            let Some(node) = inner.nodes.get_mut(&h.0) else {
                return;
            };
            let old = node.text.as_ref().map(|r| r.to_string());
            node.text = Some(Rope::from_str(text));
            old
        };
        let mut pending = self.pending.borrow_mut();
        if let Some(old) = old.filter(|o| !o.is_empty()) {
            pending.push(Notification::TextChanged(
                h,
                TextChange::Deleted {
                    offset: 0,
                    text: old,
                },
            ));
        }
        pending.push(Notification::TextChanged(
            h,
            TextChange::Inserted {
                offset: 0,
                text: text.to_string(),
            },
        ));
    }

    /// Insert text at a character offset.
    pub fn insert_text(&self, h: NodeHandle, offset: usize, text: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            let Some(node) = inner.nodes.get_mut(&h.0) else {
                return;
            };
            let rope = node.text.get_or_insert_with(Rope::new);
            let at = offset.min(rope.len_chars());
            rope.insert(at, text);
        }
        self.pending.borrow_mut().push(Notification::TextChanged(
            h,
            TextChange::Inserted {
                offset,
                text: text.to_string(),
            },
        ));
    }

    /// Give the parent an embedded-object text model: one sentinel per
    /// child, block children separated by newlines.
    pub fn embed_children(&self, parent: NodeHandle) {
        let text = {
            let inner = self.inner.borrow();
            let Some(node) = inner.node(parent) else {
                return;
            };
            let mut text = String::new();
            for i in 0..node.children.len() {
                if i > 0 {
                    text.push('\n');
                }
                text.push(EMBEDDED_OBJECT_CHAR);
            }
            text
        };
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&parent.0) {
            node.text = Some(Rope::from_str(&text));
        }
    }

    /// Set explicit screen extents.
    pub fn set_extents(&self, h: NodeHandle, extents: Rect) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.extents = Some(extents);
        }
    }

    /// Add state flags.
    pub fn add_state(&self, h: NodeHandle, states: StateSet) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.states |= states;
        }
        for flag in states.iter() {
            self.pending
                .borrow_mut()
                .push(Notification::StateChanged(h, flag, true));
        }
    }

    /// Remove state flags.
    pub fn remove_state(&self, h: NodeHandle, states: StateSet) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.states -= states;
        }
        for flag in states.iter() {
            self.pending
                .borrow_mut()
                .push(Notification::StateChanged(h, flag, false));
        }
    }

    /// Force a node's parent pointer (for malformed-tree tests).
    pub fn set_parent(&self, h: NodeHandle, parent: NodeHandle) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.parent = Some(parent.0);
        }
    }

    /// Declare a table grid (grants the Table capability).
    pub fn set_table_size(&self, h: NodeHandle, rows: usize, columns: usize) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.table = Some((rows, columns));
        }
    }

    /// Move a node's caret, queueing the matching notification.
    pub fn set_caret(&self, h: NodeHandle, offset: i32) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.caret = Some(offset);
        }
        self.pending
            .borrow_mut()
            .push(Notification::CaretMoved(h, offset));
    }

    /// Make a node (and only it) stop answering, as a vanished bus
    /// element does.
    pub fn kill_node(&self, h: NodeHandle) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.dead = true;
        }
    }

    /// Undo [`kill_node`](Self::kill_node) (a bus hiccup, not a new
    /// element).
    pub fn revive_node(&self, h: NodeHandle) {
        if let Some(node) = self.inner.borrow_mut().nodes.get_mut(&h.0) {
            node.dead = false;
        }
    }

    /// Tear a node out of the tree: detach from the parent (text model
    /// included), kill the subtree, queue the notifications.
    pub fn remove_node(&self, h: NodeHandle) {
        let parent = {
            let mut inner = self.inner.borrow_mut();
            let parent = inner.nodes.get(&h.0).and_then(|n| n.parent);
            if let Some(p) = parent {
                let index = inner
                    .nodes
                    .get(&p)
                    .and_then(|pn| pn.children.iter().position(|&c| c == h.0));
                if let Some(index) = index {
                    if let Some(pn) = inner.nodes.get_mut(&p) {
                        pn.children.remove(index);
                        // Drop the matching sentinel from the text model,
                        // with its separator.
                        if let Some(rope) = pn.text.as_mut() {
                            let mut seen = 0usize;
                            let mut at = None;
                            for (i, ch) in rope.chars().enumerate() {
                                if ch == EMBEDDED_OBJECT_CHAR {
                                    if seen == index {
                                        at = Some(i);
                                        break;
                                    }
                                    seen += 1;
                                }
                            }
                            if let Some(i) = at {
                                let mut end = i + 1;
                                if end < rope.len_chars() && rope.char(end) == '\n' {
                                    end += 1;
                                }
                                rope.remove(i..end);
                            }
                        }
                    }
                }
            }
            let mut doomed = vec![h.0];
            while let Some(id) = doomed.pop() {
                if let Some(node) = inner.nodes.get_mut(&id) {
                    node.dead = true;
                    doomed.extend(node.children.iter().copied());
                }
            }
            parent
        };
        let mut pending = self.pending.borrow_mut();
        if let Some(p) = parent {
            pending.push(Notification::ChildrenChanged(
                NodeHandle(p),
                ChildChange::Removed(h),
            ));
        }
        pending.push(Notification::Defunct(h));
    }

    /// Drain the queued notifications, in emission order.
    #[must_use]
    pub fn take_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    /// Outstanding external references on a handle.
    #[must_use]
    pub fn live_refs(&self, h: NodeHandle) -> i64 {
        self.refs.borrow().get(&h.0).copied().unwrap_or(0)
    }

    /// Assert that every taken reference has been released exactly
    /// once.
    pub fn assert_refs_balanced(&self) {
        let refs = self.refs.borrow();
        let unbalanced: Vec<u64> = refs
            .iter()
            .filter(|&(_, &count)| count != 0)
            .map(|(&id, _)| id)
            .collect();
        assert!(unbalanced.is_empty(), "unreleased handles: {unbalanced:?}");
    }
}

impl Default for SimTree {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessibleSource for SimTree {
    fn role(&self, h: NodeHandle) -> Option<Role> {
        self.inner.borrow().node(h).map(|n| n.role)
    }

    fn name(&self, h: NodeHandle) -> Option<String> {
        self.inner.borrow().node(h).map(|n| n.name.clone())
    }

    fn description(&self, h: NodeHandle) -> Option<String> {
        self.inner.borrow().node(h).map(|n| n.description.clone())
    }

    fn states(&self, h: NodeHandle) -> Option<StateSet> {
        self.inner.borrow().node(h).map(|n| n.states)
    }

    fn parent(&self, h: NodeHandle) -> Option<NodeHandle> {
        self.inner.borrow().node(h)?.parent.map(NodeHandle)
    }

    fn child_count(&self, h: NodeHandle) -> Option<usize> {
        self.inner.borrow().node(h).map(|n| n.children.len())
    }

    fn child_at(&self, h: NodeHandle, index: usize) -> Option<NodeHandle> {
        self.inner
            .borrow()
            .node(h)?
            .children
            .get(index)
            .copied()
            .map(NodeHandle)
    }

    fn index_in_parent(&self, h: NodeHandle) -> Option<usize> {
        let inner = self.inner.borrow();
        let parent = inner.node(h)?.parent?;
        inner
            .node(NodeHandle(parent))?
            .children
            .iter()
            .position(|&c| c == h.0)
    }

    fn capabilities(&self, h: NodeHandle) -> Capabilities {
        let inner = self.inner.borrow();
        let Some(node) = inner.node(h) else {
            return Capabilities::empty();
        };
        let mut caps = Capabilities::COMPONENT;
        if node.text.is_some() {
            caps |= Capabilities::TEXT;
        }
        if node.table.is_some() {
            caps |= Capabilities::TABLE;
        }
        if node.image_description.is_some() {
            caps |= Capabilities::IMAGE;
        }
        if node.actions > 0 {
            caps |= Capabilities::ACTION;
        }
        let has_links = node.children.iter().any(|&c| {
            inner
                .node(NodeHandle(c))
                .is_some_and(|n| n.role == Role::Link)
        });
        if has_links && node.text.is_some() {
            caps |= Capabilities::HYPERTEXT;
        }
        caps
    }

    fn character_count(&self, h: NodeHandle) -> Option<usize> {
        self.inner
            .borrow()
            .node(h)?
            .text
            .as_ref()
            .map(Rope::len_chars)
    }

    fn caret_offset(&self, h: NodeHandle) -> Option<i32> {
        self.inner.borrow().node(h)?.caret
    }

    fn set_caret_offset(&self, h: NodeHandle, offset: i32) -> bool {
        let updated = {
            let mut inner = self.inner.borrow_mut();
            match inner.nodes.get_mut(&h.0) {
                Some(node) if !node.dead && node.text.is_some() => {
                    node.caret = Some(offset);
                    true
                }
                _ => false,
            }
        };
        if updated {
            self.pending
                .borrow_mut()
                .push(Notification::CaretMoved(h, offset));
        }
        updated
    }

    fn text_slice(&self, h: NodeHandle, start: usize, end: usize) -> Option<String> {
        let inner = self.inner.borrow();
        let text = inner.node(h)?.text.as_ref()?;
        let len = text.len_chars();
        let start = start.min(len);
        let end = end.clamp(start, len);
        Some(text.slice(start..end).to_string())
    }

    fn text_at_offset(
        &self,
        h: NodeHandle,
        offset: usize,
        boundary: TextBoundary,
    ) -> Option<TextChunk> {
        let inner = self.inner.borrow();
        let text = inner.node(h)?.text.as_ref()?;
        let (start, end) = Inner::boundary_span(text, offset, boundary);
        Some(TextChunk {
            text: text.slice(start..end).to_string(),
            start,
            end,
        })
    }

    fn range_extents(&self, h: NodeHandle, start: usize, end: usize) -> Option<Rect> {
        let inner = self.inner.borrow();
        let len = inner.node(h)?.text.as_ref()?.len_chars();
        if start >= end || start >= len {
            return inner.cell_rect(h, start.min(len), 0);
        }
        let mut rect: Option<Rect> = None;
        for offset in start..end.min(len) {
            if let Some(r) = inner.char_rect(h, offset, 0) {
                rect = Some(rect.map_or(r, |acc| acc.union(&r)));
            }
        }
        rect
    }

    fn text_attributes_at(
        &self,
        h: NodeHandle,
        offset: usize,
    ) -> Option<(Vec<(String, String)>, usize, usize)> {
        let inner = self.inner.borrow();
        let text = inner.node(h)?.text.as_ref()?;
        Some((Vec::new(), 0, text.len_chars().max(offset)))
    }

    fn extents(&self, h: NodeHandle) -> Option<Rect> {
        self.inner.borrow().node_extents(h, 0)
    }

    fn table_size(&self, h: NodeHandle) -> Option<(usize, usize)> {
        self.inner.borrow().node(h)?.table
    }

    fn cell_coordinates(&self, h: NodeHandle, index: usize) -> Option<(usize, usize)> {
        let (rows, columns) = self.inner.borrow().node(h)?.table?;
        if columns == 0 || index >= rows * columns {
            return None;
        }
        Some((index / columns, index % columns))
    }

    fn cell_at(&self, h: NodeHandle, row: usize, column: usize) -> Option<NodeHandle> {
        let inner = self.inner.borrow();
        let node = inner.node(h)?;
        let (rows, columns) = node.table?;
        if row >= rows || column >= columns {
            return None;
        }
        node.children
            .get(row * columns + column)
            .copied()
            .map(NodeHandle)
    }

    fn link_count(&self, h: NodeHandle) -> Option<usize> {
        let inner = self.inner.borrow();
        let node = inner.node(h)?;
        node.text.as_ref()?;
        let count = node
            .children
            .iter()
            .filter(|&&c| {
                inner
                    .node(NodeHandle(c))
                    .is_some_and(|n| n.role == Role::Link)
            })
            .count();
        Some(count)
    }

    fn link_at(&self, h: NodeHandle, index: usize) -> Option<LinkSpan> {
        let inner = self.inner.borrow();
        let node = inner.node(h)?;
        let link = node
            .children
            .iter()
            .copied()
            .filter(|&c| {
                inner
                    .node(NodeHandle(c))
                    .is_some_and(|n| n.role == Role::Link)
            })
            .nth(index)?;
        let (_, offset) = inner.embedding_of(link)?;
        Some(LinkSpan {
            start: offset,
            end: offset + 1,
            target: Some(NodeHandle(link)),
        })
    }

    fn image_description(&self, h: NodeHandle) -> Option<String> {
        self.inner.borrow().node(h)?.image_description.clone()
    }

    fn action_count(&self, h: NodeHandle) -> Option<usize> {
        self.inner.borrow().node(h).map(|n| n.actions)
    }

    fn do_action(&self, h: NodeHandle, index: usize) -> bool {
        self.inner
            .borrow()
            .node(h)
            .is_some_and(|n| index < n.actions)
    }

    fn ref_handle(&self, h: NodeHandle) {
        *self.refs.borrow_mut().entry(h.0).or_insert(0) += 1;
    }

    fn unref_handle(&self, h: NodeHandle) {
        let mut refs = self.refs.borrow_mut();
        let count = refs.entry(h.0).or_insert(0);
        assert!(*count > 0, "double release of handle {h}");
        *count -= 1;
    }
}
