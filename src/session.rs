//! The session: single owner of all shared navigation state.
//!
//! One `Session` exists per screen-reader instance. It owns the source
//! handle, the node cache, the per-document caret contexts and the
//! line-content cache, and is the single dispatch point for bus
//! notifications. Everything is single-threaded by design; interior
//! mutability (not locks) lets a notification arriving mid-call
//! invalidate caches without corrupting the call in flight.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::cache::{Invalidation, NodeCache, NodeRef};
use crate::caret::content::{Content, Extractor, LineSnapshot};
use crate::caret::{CaretContext, SayAll, TraversalPolicy, Walker};
use crate::error::{Error, Result};
use crate::event::{LogLevel, emit_event, emit_log};
use crate::notify::Notification;
use crate::review::{ReviewContext, ReviewOptions};
use crate::role::Role;
use crate::source::{AccessibleSource, Capabilities, LinkSpan, NodeHandle, TextBoundary};
use crate::state::StateSet;

/// Coordinator owning the caches, contexts and policies.
pub struct Session {
    source: Rc<dyn AccessibleSource>,
    cache: NodeCache,
    policy: TraversalPolicy,
    review_options: ReviewOptions,
    contexts: RefCell<HashMap<NodeHandle, CaretContext>>,
    line_cache: RefCell<Option<LineSnapshot>>,
}

impl Session {
    /// Create a session over a source with default policies.
    #[must_use]
    pub fn new(source: Rc<dyn AccessibleSource>) -> Self {
        Self::with_options(source, TraversalPolicy::new(), ReviewOptions::new())
    }

    /// Create a session with explicit policies.
    #[must_use]
    pub fn with_options(
        source: Rc<dyn AccessibleSource>,
        policy: TraversalPolicy,
        review_options: ReviewOptions,
    ) -> Self {
        let cache = NodeCache::new(Rc::clone(&source));
        Self {
            source,
            cache,
            policy,
            review_options,
            contexts: RefCell::new(HashMap::new()),
            line_cache: RefCell::new(None),
        }
    }

    /// The underlying source.
    #[must_use]
    pub fn source(&self) -> &Rc<dyn AccessibleSource> {
        &self.source
    }

    /// The node cache.
    #[must_use]
    pub fn cache(&self) -> &NodeCache {
        &self.cache
    }

    /// The traversal policy in effect.
    #[must_use]
    pub fn policy(&self) -> &TraversalPolicy {
        &self.policy
    }

    /// The review options in effect.
    #[must_use]
    pub fn review_options(&self) -> &ReviewOptions {
        &self.review_options
    }

    /// Resolve a raw handle through the cache.
    pub fn resolve(&self, handle: NodeHandle) -> NodeRef {
        self.cache.resolve(handle)
    }

    fn walker(&self) -> Walker<'_> {
        Walker::new(&self.cache, &self.policy)
    }

    fn extractor(&self) -> Extractor<'_> {
        Extractor::new(
            &self.cache,
            &self.policy,
            self.review_options.same_line_threshold,
        )
    }

    // --- documents and caret contexts ---------------------------------

    /// The document hosting a node (the node itself when it is one).
    pub fn document_of(&self, node: &NodeRef) -> Option<NodeRef> {
        let mut seen: HashSet<NodeHandle> = HashSet::new();
        let mut current = NodeRef::clone(node);
        loop {
            if current.role().is_some_and(Role::is_document) {
                return Some(current);
            }
            if !seen.insert(current.handle()) {
                return None;
            }
            current = self.cache.parent_of(&current)?;
        }
    }

    /// The committed reading position for the document hosting `node`,
    /// derived lazily on first access and re-derived when the
    /// committed node turns out to be defunct.
    pub fn caret_context(&self, node: &NodeRef) -> Result<CaretContext> {
        let doc = self.document_of(node).ok_or(Error::NotADocument)?;
        let cached = self.contexts.borrow().get(&doc.handle()).cloned();
        if let Some(ctx) = cached {
            if ctx.node.is_live() {
                return Ok(ctx);
            }
        }
        // Nothing committed, or the committed node died with the last
        // mutation: derive from scratch.
        if let Some(stale) = self.contexts.borrow_mut().remove(&doc.handle()) {
            emit_event("caret-context-recovered", &stale.node.handle().to_string());
            self.cache.evict(stale.node.handle());
        }
        let derived = self.derive_context(&doc)?;
        self.contexts
            .borrow_mut()
            .insert(doc.handle(), derived.clone());
        Ok(derived)
    }

    /// First position derivation: an externally-reported caret inside
    /// the document if one exists, else the first content in document
    /// order.
    fn derive_context(&self, doc: &NodeRef) -> Result<CaretContext> {
        let walker = self.walker();
        if let Some(focused) = self.find_reported_caret(doc) {
            return Ok(walker.normalize(&focused.node, focused.offset));
        }
        walker
            .next(doc, -1)
            .map(|ctx| walker.normalize(&ctx.node, ctx.offset))
            .ok_or(Error::NoPosition)
    }

    fn find_reported_caret(&self, doc: &NodeRef) -> Option<CaretContext> {
        let mut stack: Vec<NodeRef> = vec![NodeRef::clone(doc)];
        let mut seen: HashSet<NodeHandle> = HashSet::new();
        while let Some(node) = stack.pop() {
            if !seen.insert(node.handle()) {
                continue;
            }
            let states = node.states().unwrap_or_default();
            if states.contains(StateSet::FOCUSED) {
                if node.has(Capabilities::TEXT) {
                    if let Some(offset) = node.caret_offset().filter(|&o| o >= 0) {
                        return Some(CaretContext::new(node, offset));
                    }
                }
                return Some(CaretContext::new(node, -1));
            }
            let count = node.child_count().unwrap_or(0);
            for i in (0..count).rev() {
                if let Some(child) = self.cache.child_of(&node, i) {
                    stack.push(child);
                }
            }
        }
        None
    }

    /// Commit a reading position for the document hosting `node`.
    pub fn set_caret_context(&self, node: &NodeRef, offset: i32) {
        if let Some(doc) = self.document_of(node) {
            self.contexts.borrow_mut().insert(
                doc.handle(),
                CaretContext::new(NodeRef::clone(node), offset),
            );
        }
    }

    // --- traversal surface --------------------------------------------

    /// Normalize a position onto the content it addresses.
    pub fn find_first_caret_context(&self, node: &NodeRef, offset: i32) -> CaretContext {
        self.walker().normalize(node, offset)
    }

    /// Next caret position in document order; `None` past the end.
    pub fn next_caret_in_order(&self, node: &NodeRef, offset: i32) -> Option<CaretContext> {
        self.walker().next(node, offset)
    }

    /// Previous caret position in document order; `None` before the
    /// start.
    pub fn previous_caret_in_order(&self, node: &NodeRef, offset: i32) -> Option<CaretContext> {
        self.walker().previous(node, offset)
    }

    // --- content surface ----------------------------------------------

    /// Contents of the visual line at a position, cached until the
    /// next content mutation.
    pub fn line_contents_at(&self, node: &NodeRef, offset: i32) -> Vec<Content> {
        let ctx = self.walker().normalize(node, offset);
        if let Some(snapshot) = self.line_cache.borrow().as_ref() {
            if snapshot.covers(&ctx.node, ctx.offset) {
                return snapshot.contents.clone();
            }
        }
        let contents = self.extractor().line_contents(&ctx.node, ctx.offset);
        *self.line_cache.borrow_mut() = Some(LineSnapshot {
            contents: contents.clone(),
        });
        contents
    }

    /// Contents of the word at a position.
    pub fn word_contents_at(&self, node: &NodeRef, offset: i32) -> Vec<Content> {
        self.extractor().word_contents(node, offset)
    }

    /// Contents of the sentence at a position.
    pub fn sentence_contents_at(&self, node: &NodeRef, offset: i32) -> Vec<Content> {
        self.extractor().sentence_contents(node, offset)
    }

    // --- caret movement commands --------------------------------------

    /// Move the committed position one character forward.
    pub fn next_character(&self, node: &NodeRef) -> Result<CaretContext> {
        let ctx = self.caret_context(node)?;
        let next = self
            .next_caret_in_order(&ctx.node, ctx.offset)
            .ok_or(Error::NoPosition)?;
        self.set_caret_context(&next.node, next.offset);
        Ok(next)
    }

    /// Move the committed position one character backward.
    pub fn previous_character(&self, node: &NodeRef) -> Result<CaretContext> {
        let ctx = self.caret_context(node)?;
        let prev = self
            .previous_caret_in_order(&ctx.node, ctx.offset)
            .ok_or(Error::NoPosition)?;
        self.set_caret_context(&prev.node, prev.offset);
        Ok(prev)
    }

    fn line_identity(contents: &[Content]) -> Option<(NodeHandle, usize)> {
        contents.first().map(|c| (c.node.handle(), c.start))
    }

    /// Move the committed position to the start of the next line.
    pub fn next_line(&self, node: &NodeRef) -> Result<CaretContext> {
        let ctx = self.caret_context(node)?;
        let line = self.line_contents_at(&ctx.node, ctx.offset);
        let last = line.last().ok_or(Error::NoPosition)?;
        let resume = if last.end > last.start {
            last.end as i32 - 1
        } else {
            last.start as i32
        };
        let key = Self::line_identity(&line);
        let last_node = NodeRef::clone(&last.node);
        let mut pos = self
            .next_caret_in_order(&last_node, resume)
            .ok_or(Error::NoPosition)?;
        loop {
            let candidate = self.line_contents_at(&pos.node, pos.offset);
            if Self::line_identity(&candidate) != key {
                let first = candidate.first().ok_or(Error::NoPosition)?;
                let target = CaretContext::new(NodeRef::clone(&first.node), first.start as i32);
                self.set_caret_context(&target.node, target.offset);
                return Ok(target);
            }
            pos = self
                .next_caret_in_order(&pos.node, pos.offset)
                .ok_or(Error::NoPosition)?;
        }
    }

    /// Move the committed position to the start of the previous line.
    pub fn previous_line(&self, node: &NodeRef) -> Result<CaretContext> {
        let ctx = self.caret_context(node)?;
        let line = self.line_contents_at(&ctx.node, ctx.offset);
        let first = line.first().ok_or(Error::NoPosition)?;
        let key = Self::line_identity(&line);
        let first_node = NodeRef::clone(&first.node);
        let mut pos = self
            .previous_caret_in_order(&first_node, first.start as i32)
            .ok_or(Error::NoPosition)?;
        loop {
            let candidate = self.line_contents_at(&pos.node, pos.offset);
            if Self::line_identity(&candidate) != key {
                let target = candidate.first().ok_or(Error::NoPosition)?;
                let target = CaretContext::new(NodeRef::clone(&target.node), target.start as i32);
                self.set_caret_context(&target.node, target.offset);
                return Ok(target);
            }
            pos = self
                .previous_caret_in_order(&pos.node, pos.offset)
                .ok_or(Error::NoPosition)?;
        }
    }

    /// Move the committed position to the start of the next word.
    pub fn next_word(&self, node: &NodeRef) -> Result<CaretContext> {
        let ctx = self.caret_context(node)?;
        let word = self.word_contents_at(&ctx.node, ctx.offset);
        let last = word.last().ok_or(Error::NoPosition)?;
        let resume = if last.end > last.start {
            last.end as i32 - 1
        } else {
            last.start as i32
        };
        let last_node = NodeRef::clone(&last.node);
        let mut pos = self
            .next_caret_in_order(&last_node, resume)
            .ok_or(Error::NoPosition)?;
        // Step over intervening whitespace to the next word start.
        while pos.offset >= 0 {
            match pos.node.char_at(pos.offset) {
                Some(ch) if ch.is_whitespace() => {
                    pos = self
                        .next_caret_in_order(&pos.node, pos.offset)
                        .ok_or(Error::NoPosition)?;
                }
                _ => break,
            }
        }
        self.set_caret_context(&pos.node, pos.offset);
        Ok(pos)
    }

    /// Move the committed position to the start of the previous word.
    pub fn previous_word(&self, node: &NodeRef) -> Result<CaretContext> {
        let ctx = self.caret_context(node)?;
        let word = self.word_contents_at(&ctx.node, ctx.offset);
        let first = word.first().ok_or(Error::NoPosition)?;
        let first_node = NodeRef::clone(&first.node);
        let mut pos = self
            .previous_caret_in_order(&first_node, first.start as i32)
            .ok_or(Error::NoPosition)?;
        while pos.offset >= 0 {
            match pos.node.char_at(pos.offset) {
                Some(ch) if ch.is_whitespace() => {
                    pos = self
                        .previous_caret_in_order(&pos.node, pos.offset)
                        .ok_or(Error::NoPosition)?;
                }
                _ => break,
            }
        }
        // Snap to the start of the word we landed in.
        let target = if pos.offset > 0 {
            let span = pos
                .node
                .text_at_offset(pos.offset as usize, TextBoundary::Word);
            match span {
                Some(chunk) => CaretContext::new(NodeRef::clone(&pos.node), chunk.start as i32),
                None => pos,
            }
        } else {
            pos
        };
        self.set_caret_context(&target.node, target.offset);
        Ok(target)
    }

    /// Walk forward to the next node of one of the wanted roles
    /// (structural navigation: next heading, next link).
    pub fn find_next_of_role(&self, from: &CaretContext, roles: &[Role]) -> Option<CaretContext> {
        let mut last_handle = from.node.handle();
        let mut pos = self.next_caret_in_order(&from.node, from.offset)?;
        loop {
            if pos.node.handle() != last_handle {
                if pos.node.role().is_some_and(|r| roles.contains(&r)) {
                    return Some(pos);
                }
                last_handle = pos.node.handle();
            }
            pos = self.next_caret_in_order(&pos.node, pos.offset)?;
        }
    }

    /// The hyperlink span covering an offset of a node, if any.
    pub fn link_at_offset(&self, node: &NodeRef, offset: usize) -> Option<LinkSpan> {
        let count = node.link_count()?;
        (0..count)
            .filter_map(|i| node.link_at(i))
            .find(|link| link.start <= offset && offset < link.end)
    }

    /// Row and column of a table cell, via its containing table.
    pub fn cell_coordinates_of(&self, cell: &NodeRef) -> Option<(usize, usize)> {
        let table = {
            let mut seen: HashSet<NodeHandle> = HashSet::new();
            let mut current = self.cache.parent_of(cell)?;
            loop {
                if current.has(Capabilities::TABLE) {
                    break current;
                }
                if !seen.insert(current.handle()) {
                    return None;
                }
                current = self.cache.parent_of(&current)?;
            }
        };
        let index = cell.index_in_parent()?;
        table.cell_coordinates(index)
    }

    /// Stream the document as line chunks from the committed position.
    pub fn say_all(&self, node: &NodeRef) -> Result<SayAll<'_>> {
        let ctx = self.caret_context(node)?;
        Ok(SayAll::new(self, ctx))
    }

    /// Build a flat-review context over `root` with the session's
    /// review options.
    pub fn review(&self, root: &NodeRef) -> Result<ReviewContext> {
        ReviewContext::build(self, root, &self.review_options)
    }

    // --- notification dispatch ----------------------------------------

    /// Route one bus notification to the invalidations it implies.
    pub fn handle_notification(&self, notification: &Notification) {
        match notification {
            Notification::NameChanged(h) => self.cache.invalidate(*h, Invalidation::Name),
            Notification::DescriptionChanged(h) => {
                self.cache.invalidate(*h, Invalidation::Description);
            }
            Notification::ParentChanged(h) => self.cache.invalidate(*h, Invalidation::Parent),
            Notification::StateChanged(h, flags, value) => {
                if flags.contains(StateSet::DEFUNCT) && *value {
                    self.mark_defunct(*h);
                } else {
                    self.cache.invalidate(*h, Invalidation::States);
                }
            }
            Notification::ChildrenChanged(h, _) => {
                self.cache.invalidate(*h, Invalidation::Children);
                self.line_cache.borrow_mut().take();
            }
            Notification::TextChanged(_, _) => {
                self.line_cache.borrow_mut().take();
            }
            Notification::CaretMoved(h, offset) => {
                let node = self.resolve(*h);
                let ctx = self.walker().normalize(&node, *offset);
                self.set_caret_context(&ctx.node, ctx.offset);
            }
            Notification::Defunct(h) => self.mark_defunct(*h),
        }
    }

    fn mark_defunct(&self, handle: NodeHandle) {
        emit_log(LogLevel::Debug, &format!("node {handle} is defunct"));
        self.cache.evict(handle);
        self.line_cache.borrow_mut().take();
        self.contexts.borrow_mut().retain(|doc, ctx| {
            *doc != handle && ctx.node.handle() != handle
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::TextChange;
    use crate::sim::SimTree;

    fn web_page() -> (Rc<SimTree>, NodeHandle, NodeHandle, NodeHandle) {
        let sim = Rc::new(SimTree::new());
        let doc = sim.add_root(Role::DocumentFrame);
        let a = sim.add_child(doc, Role::Paragraph);
        let b = sim.add_child(doc, Role::Paragraph);
        sim.set_text(a, "alpha beta");
        sim.set_text(b, "gamma");
        sim.embed_children(doc);
        (sim, doc, a, b)
    }

    #[test]
    fn test_context_derived_from_document_start() {
        let (sim, doc, a, _) = web_page();
        let session = Session::new(sim);
        let doc_node = session.resolve(doc);
        let ctx = session.caret_context(&doc_node).unwrap();
        assert_eq!(ctx.node.handle(), a);
        assert_eq!(ctx.offset, 0);
    }

    #[test]
    fn test_context_prefers_reported_caret() {
        let (sim, doc, _, b) = web_page();
        sim.add_state(b, StateSet::FOCUSED);
        sim.set_caret(b, 3);
        let session = Session::new(sim);
        let doc_node = session.resolve(doc);
        let ctx = session.caret_context(&doc_node).unwrap();
        assert_eq!(ctx.node.handle(), b);
        assert_eq!(ctx.offset, 3);
    }

    #[test]
    fn test_not_a_document() {
        let sim = Rc::new(SimTree::new());
        let win = sim.add_root(Role::Window);
        let session = Session::new(sim);
        let node = session.resolve(win);
        assert_eq!(session.caret_context(&node), Err(Error::NotADocument));
    }

    #[test]
    fn test_line_movement() {
        let (sim, doc, a, b) = web_page();
        let session = Session::new(sim);
        let doc_node = session.resolve(doc);

        let down = session.next_line(&doc_node).unwrap();
        assert_eq!(down.node.handle(), b);
        assert_eq!(down.offset, 0);

        let up = session.previous_line(&doc_node).unwrap();
        assert_eq!(up.node.handle(), a);
        assert_eq!(up.offset, 0);
    }

    #[test]
    fn test_word_movement() {
        let (sim, doc, a, _) = web_page();
        let session = Session::new(sim);
        let doc_node = session.resolve(doc);

        let w1 = session.next_word(&doc_node).unwrap();
        assert_eq!(w1.node.handle(), a);
        assert_eq!(w1.offset, 6); // "beta"

        let w0 = session.previous_word(&doc_node).unwrap();
        assert_eq!(w0.offset, 0); // back to "alpha"
    }

    #[test]
    fn test_defunct_context_recovers() {
        let (sim, doc, a, b) = web_page();
        let session = Session::new(Rc::clone(&sim) as Rc<dyn AccessibleSource>);
        let doc_node = session.resolve(doc);
        let ctx = session.caret_context(&doc_node).unwrap();
        assert_eq!(ctx.node.handle(), a);

        // The paragraph is torn out of the page.
        sim.remove_node(a);
        for n in sim.take_notifications() {
            session.handle_notification(&n);
        }
        let recovered = session.caret_context(&doc_node).unwrap();
        assert_eq!(recovered.node.handle(), b);
    }

    #[test]
    fn test_caret_moved_commits_context() {
        let (sim, doc, _, b) = web_page();
        let session = Session::new(sim);
        let doc_node = session.resolve(doc);
        session.handle_notification(&Notification::CaretMoved(b, 2));
        let ctx = session.caret_context(&doc_node).unwrap();
        assert_eq!(ctx.node.handle(), b);
        assert_eq!(ctx.offset, 2);
    }

    #[test]
    fn test_text_change_drops_line_cache() {
        let (sim, doc, a, _) = web_page();
        let session = Session::new(Rc::clone(&sim) as Rc<dyn AccessibleSource>);
        let doc_node = session.resolve(doc);
        let a_node = session.resolve(a);
        let before = session.line_contents_at(&a_node, 0);
        assert_eq!(before[0].text, "alpha beta");

        sim.set_text(a, "alpha beta gamma");
        session.handle_notification(&Notification::TextChanged(
            a,
            TextChange::Inserted {
                offset: 10,
                text: " gamma".into(),
            },
        ));
        let after = session.line_contents_at(&a_node, 0);
        assert_eq!(after[0].text, "alpha beta gamma");
        let _ = doc_node;
    }

    #[test]
    fn test_structural_navigation_by_role() {
        let sim = Rc::new(SimTree::new());
        let doc = sim.add_root(Role::DocumentFrame);
        let p = sim.add_child(doc, Role::Paragraph);
        sim.set_text(p, "intro");
        let h = sim.add_child(doc, Role::Heading);
        sim.set_text(h, "Title");
        sim.embed_children(doc);

        let session = Session::new(sim);
        let doc_node = session.resolve(doc);
        let start = session.caret_context(&doc_node).unwrap();
        let heading = session
            .find_next_of_role(&start, &[Role::Heading])
            .unwrap();
        assert_eq!(heading.node.handle(), h);
    }

    #[test]
    fn test_link_at_offset() {
        let sim = Rc::new(SimTree::new());
        let doc = sim.add_root(Role::DocumentFrame);
        let para = sim.add_child(doc, Role::Paragraph);
        let link = sim.add_child(para, Role::Link);
        sim.set_text(link, "here");
        sim.set_text(para, &format!("go {} now", crate::source::EMBEDDED_OBJECT_CHAR));

        let session = Session::new(sim);
        let para_node = session.resolve(para);
        let span = session.link_at_offset(&para_node, 3).unwrap();
        assert_eq!(span.target, Some(link));
        assert!(session.link_at_offset(&para_node, 0).is_none());
    }

    #[test]
    fn test_table_cell_coordinates() {
        let sim = Rc::new(SimTree::new());
        let doc = sim.add_root(Role::DocumentFrame);
        let table = sim.add_child(doc, Role::Table);
        sim.set_table_size(table, 2, 3);
        let mut cells = Vec::new();
        for _ in 0..6 {
            cells.push(sim.add_child(table, Role::TableCell));
        }
        let session = Session::new(sim);
        let cell = session.resolve(cells[4]);
        assert_eq!(session.cell_coordinates_of(&cell), Some((1, 1)));
    }
}
