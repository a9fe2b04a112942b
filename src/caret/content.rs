//! Word, line and sentence content extraction.
//!
//! A "line" (or word, or sentence) is materialized as an ordered,
//! non-overlapping sequence of [`Content`] tuples whose concatenated
//! text is exactly what a sighted user perceives as that unit,
//! including inline widgets represented by their accessible name
//! standing in for the embedded-object character.

use std::collections::HashSet;

use crate::cache::{Node, NodeCache, NodeRef};
use crate::event::{LogLevel, emit_log};
use crate::geometry::Rect;
use crate::source::{EMBEDDED_OBJECT_CHAR, NodeHandle, TextBoundary};

use super::walk::Walker;
use super::{CaretContext, TraversalPolicy};

/// A materialized, presentable slice of the document.
///
/// `end` is exclusive. A tuple with `start == end` stands for a
/// non-text object (image, button) whose `text` is its accessible
/// name or description.
#[derive(Clone, Debug)]
pub struct Content {
    pub node: NodeRef,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Content {
    /// Check whether this tuple stands for a non-text object.
    #[must_use]
    pub fn is_object(&self) -> bool {
        self.start == self.end
    }

    /// Check whether a caret position falls inside this tuple.
    #[must_use]
    pub fn covers(&self, node: &NodeRef, offset: i32) -> bool {
        if !Node::same(&self.node, node) {
            return false;
        }
        if self.is_object() {
            return offset <= 0;
        }
        offset >= 0 && (offset as usize) >= self.start && (offset as usize) < self.end
    }
}

impl PartialEq for Content {
    fn eq(&self, other: &Self) -> bool {
        Node::same(&self.node, &other.node)
            && self.start == other.start
            && self.end == other.end
            && self.text == other.text
    }
}

/// The most recently extracted line, kept to short-circuit repeated
/// queries landing inside it.
#[derive(Clone, Debug, Default)]
pub struct LineSnapshot {
    pub contents: Vec<Content>,
}

impl LineSnapshot {
    /// Check whether a position falls inside the cached line.
    #[must_use]
    pub fn covers(&self, node: &NodeRef, offset: i32) -> bool {
        self.contents.iter().any(|c| c.covers(node, offset))
    }
}

/// One segment of a presentation unit before materialization.
enum Segment {
    Text(NodeRef, usize, usize),
    Object(NodeRef),
}

/// Content extraction engine.
///
/// Borrows the walker's cache and policy; all external reads go through
/// the same memoizing layer as traversal.
pub(crate) struct Extractor<'a> {
    cache: &'a NodeCache,
    walker: Walker<'a>,
    same_line_threshold: f32,
}

impl<'a> Extractor<'a> {
    pub fn new(cache: &'a NodeCache, policy: &'a TraversalPolicy, same_line_threshold: f32) -> Self {
        Self {
            cache,
            walker: Walker::new(cache, policy),
            same_line_threshold,
        }
    }

    /// Presentation text of a non-text object: name, else image
    /// description, else description.
    fn object_content(node: &NodeRef) -> Content {
        let text = node
            .name()
            .filter(|s| !s.is_empty())
            .or_else(|| node.image_description().filter(|s| !s.is_empty()))
            .or_else(|| node.description().filter(|s| !s.is_empty()))
            .unwrap_or_default();
        Content {
            node: NodeRef::clone(node),
            start: 0,
            end: 0,
            text,
        }
    }

    /// Screen extents of a single caret position.
    fn position_rect(&self, ctx: &CaretContext) -> Option<Rect> {
        if ctx.offset >= 0 && self.walker.usable_text_len(&ctx.node).is_some() {
            let off = ctx.offset as usize;
            return ctx.node.range_extents(off, off + 1);
        }
        ctx.node.extents()
    }

    fn on_same_line(&self, anchor: &Rect, other: &Rect) -> bool {
        anchor.vertical_overlap_ratio(other) > self.same_line_threshold
    }

    /// The boundary-delimited span of the node's own text around an
    /// offset.
    fn span_at(&self, node: &NodeRef, offset: i32, boundary: TextBoundary) -> Option<(usize, usize)> {
        let chunk = node.text_at_offset(offset.max(0) as usize, boundary)?;
        Some((chunk.start, chunk.end))
    }

    /// Climb from a position to the node that hosts its visual line.
    ///
    /// A child entered through an embedded-object character belongs to
    /// the parent's line only when an adjacent character in the
    /// parent's line span shares the child's vertical band; a sentinel
    /// with no same-band neighbor is a block-level child and hosts its
    /// own lines.
    fn line_host(&self, ctx: CaretContext) -> CaretContext {
        let mut seen: HashSet<NodeHandle> = HashSet::new();
        let mut current = ctx;
        seen.insert(current.node.handle());
        loop {
            let Some(parent) = self.cache.parent_of(&current.node) else {
                return current;
            };
            if self.walker.usable_text_len(&parent).is_none() {
                return current;
            }
            let Some(k) = self
                .walker
                .embedded_offset_in_parent(&parent, &current.node)
            else {
                return current;
            };
            let k = k as usize;
            let Some((start, end)) = self.span_at(&parent, k as i32, TextBoundary::Line) else {
                return current;
            };
            if !self.sentinel_is_inline(&parent, k, start, end) {
                return current;
            }
            if !seen.insert(parent.handle()) {
                emit_log(LogLevel::Warn, "ancestor cycle while finding line host");
                return current;
            }
            current = CaretContext::new(parent, k as i32);
        }
    }

    /// Check whether the sentinel at `k` flows inline with a neighbor
    /// character inside its parent's line span `[start, end)`.
    fn sentinel_is_inline(&self, parent: &NodeRef, k: usize, start: usize, end: usize) -> bool {
        let Some(band) = parent.range_extents(k, k + 1) else {
            return false;
        };
        let mut neighbors = Vec::new();
        if k > start {
            neighbors.push(k - 1);
        }
        if k + 1 < end {
            neighbors.push(k + 1);
        }
        neighbors.into_iter().any(|c| {
            parent
                .range_extents(c, c + 1)
                .is_some_and(|r| band.vertical_overlap_ratio(&r) > self.same_line_threshold)
        })
    }

    /// Expand a text span into content tuples, descending through
    /// embedded-object characters with an explicit frame stack.
    fn materialize_span(&self, node: &NodeRef, start: usize, end: usize, out: &mut Vec<Content>) {
        struct Frame {
            node: NodeRef,
            chars: Vec<char>,
            base: usize,
            idx: usize,
            run_start: usize,
        }

        let frame = |node: &NodeRef, start: usize, end: usize| -> Option<Frame> {
            let text = node.text_slice(start, end)?;
            Some(Frame {
                node: NodeRef::clone(node),
                chars: text.chars().collect(),
                base: start,
                idx: 0,
                run_start: 0,
            })
        };

        let mut on_stack: HashSet<NodeHandle> = HashSet::new();
        on_stack.insert(node.handle());
        let mut stack: Vec<Frame> = match frame(node, start, end) {
            Some(f) => vec![f],
            None => return,
        };

        while let Some(top) = stack.last_mut() {
            if top.idx >= top.chars.len() {
                if top.run_start < top.idx {
                    let text: String = top.chars[top.run_start..top.idx].iter().collect();
                    out.push(Content {
                        node: NodeRef::clone(&top.node),
                        start: top.base + top.run_start,
                        end: top.base + top.idx,
                        text,
                    });
                }
                let finished = stack.pop().expect("frame stack non-empty");
                on_stack.remove(&finished.node.handle());
                continue;
            }
            if top.chars[top.idx] == EMBEDDED_OBJECT_CHAR {
                if top.run_start < top.idx {
                    let text: String = top.chars[top.run_start..top.idx].iter().collect();
                    out.push(Content {
                        node: NodeRef::clone(&top.node),
                        start: top.base + top.run_start,
                        end: top.base + top.idx,
                        text,
                    });
                }
                let abs = top.base + top.idx;
                top.idx += 1;
                top.run_start = top.idx;
                let host = NodeRef::clone(&top.node);
                match self.walker.child_for_offset(&host, abs as i32) {
                    Some(child) if !on_stack.contains(&child.handle()) => {
                        if let Some(len) = self.walker.usable_text_len(&child) {
                            if let Some(f) = frame(&child, 0, len as usize) {
                                on_stack.insert(child.handle());
                                stack.push(f);
                            }
                        } else {
                            out.push(Self::object_content(&child));
                        }
                    }
                    Some(_) => {
                        emit_log(LogLevel::Warn, "embedded object cycle while extracting");
                    }
                    None => {}
                }
                continue;
            }
            top.idx += 1;
        }
    }

    /// Merge adjacent tuples of the same node with contiguous offsets.
    fn merge(contents: Vec<Content>) -> Vec<Content> {
        let mut merged: Vec<Content> = Vec::with_capacity(contents.len());
        for c in contents {
            if let Some(last) = merged.last_mut() {
                if !last.is_object()
                    && !c.is_object()
                    && Node::same(&last.node, &c.node)
                    && last.end == c.start
                {
                    last.end = c.end;
                    last.text.push_str(&c.text);
                    continue;
                }
            }
            merged.push(c);
        }
        merged
    }

    fn materialize_segments(&self, segments: Vec<Segment>) -> Vec<Content> {
        let mut out = Vec::new();
        for seg in segments {
            match seg {
                Segment::Text(node, start, end) => {
                    self.materialize_span(&node, start, end, &mut out);
                }
                Segment::Object(node) => out.push(Self::object_content(&node)),
            }
        }
        Self::merge(out)
    }

    /// Contents of the visual line containing a position.
    pub fn line_contents(&self, node: &NodeRef, offset: i32) -> Vec<Content> {
        let ctx = self.walker.normalize(node, offset);
        let host = self.line_host(ctx);

        if self.walker.usable_text_len(&host.node).is_none() {
            return self.object_run(&host.node);
        }

        let len = self.walker.usable_text_len(&host.node).unwrap_or(0) as usize;
        let (start, end) = self
            .span_at(&host.node, host.offset, TextBoundary::Line)
            .unwrap_or((0, len));
        let anchor = host
            .node
            .range_extents(start, end.max(start + 1))
            .or_else(|| host.node.extents())
            .unwrap_or_default();

        let mut segments: Vec<Segment> = vec![Segment::Text(NodeRef::clone(&host.node), start, end)];
        let mut hosts_seen: HashSet<NodeHandle> = HashSet::new();
        hosts_seen.insert(host.node.handle());

        // Extend backward across hosts sharing the visual line.
        let mut left = CaretContext::new(NodeRef::clone(&host.node), start as i32);
        loop {
            let Some(prev) = self.walker.previous(&left.node, left.offset) else {
                break;
            };
            if prev.offset >= 0 && prev.node.char_at(prev.offset) == Some('\n') {
                // A line terminator ends the visual line outright.
                break;
            }
            let Some(rect) = self.position_rect(&prev) else {
                break;
            };
            if !self.on_same_line(&anchor, &rect) {
                break;
            }
            let phost = self.line_host(prev);
            if !hosts_seen.insert(phost.node.handle()) {
                break;
            }
            if self.walker.usable_text_len(&phost.node).is_some() {
                let Some((s, e)) = self.span_at(&phost.node, phost.offset, TextBoundary::Line)
                else {
                    break;
                };
                segments.insert(0, Segment::Text(NodeRef::clone(&phost.node), s, e));
                left = CaretContext::new(phost.node, s as i32);
            } else {
                segments.insert(0, Segment::Object(NodeRef::clone(&phost.node)));
                left = CaretContext::new(phost.node, 0);
            }
        }

        // Extend forward symmetrically.
        let mut right = CaretContext::new(NodeRef::clone(&host.node), end.max(start + 1) as i32 - 1);
        loop {
            let Some(next) = self.walker.next(&right.node, right.offset) else {
                break;
            };
            if next.offset >= 0 && next.node.char_at(next.offset) == Some('\n') {
                break;
            }
            let Some(rect) = self.position_rect(&next) else {
                break;
            };
            if !self.on_same_line(&anchor, &rect) {
                break;
            }
            let nhost = self.line_host(next);
            if !hosts_seen.insert(nhost.node.handle()) {
                break;
            }
            if self.walker.usable_text_len(&nhost.node).is_some() {
                let Some((s, e)) = self.span_at(&nhost.node, nhost.offset, TextBoundary::Line)
                else {
                    break;
                };
                segments.push(Segment::Text(NodeRef::clone(&nhost.node), s, e));
                right = CaretContext::new(nhost.node, e.max(s + 1) as i32 - 1);
            } else {
                segments.push(Segment::Object(NodeRef::clone(&nhost.node)));
                right = CaretContext::new(nhost.node, 0);
            }
        }

        let out = self.materialize_segments(segments);
        if out.is_empty() {
            // A blank line is still a position the user can visit.
            return vec![Content {
                node: NodeRef::clone(&host.node),
                start,
                end: start,
                text: String::new(),
            }];
        }
        out
    }

    /// The contiguous run of non-text siblings around an object
    /// position, in document order.
    fn object_run(&self, node: &NodeRef) -> Vec<Content> {
        let anchor = node.extents().unwrap_or_default();
        let parent = self.cache.parent_of(node);
        let mut run = vec![Segment::Object(NodeRef::clone(node))];
        let mut seen: HashSet<NodeHandle> = HashSet::new();
        seen.insert(node.handle());

        let same_run = |candidate: &NodeRef, rect: &Rect| -> bool {
            self.walker.usable_text_len(candidate).is_none()
                && match (&parent, self.cache.parent_of(candidate)) {
                    (Some(p), Some(cp)) => Node::same(p, &cp),
                    _ => false,
                }
                && self.on_same_line(&anchor, rect)
        };

        let mut left = NodeRef::clone(node);
        while let Some(prev) = self.walker.previous(&left, 0) {
            let Some(rect) = self.position_rect(&prev) else {
                break;
            };
            if !seen.insert(prev.node.handle()) || !same_run(&prev.node, &rect) {
                break;
            }
            run.insert(0, Segment::Object(NodeRef::clone(&prev.node)));
            left = prev.node;
        }
        let mut right = NodeRef::clone(node);
        while let Some(next) = self.walker.next(&right, 0) {
            let Some(rect) = self.position_rect(&next) else {
                break;
            };
            if !seen.insert(next.node.handle()) || !same_run(&next.node, &rect) {
                break;
            }
            run.push(Segment::Object(NodeRef::clone(&next.node)));
            right = next.node;
        }

        self.materialize_segments(run)
    }

    /// Contents of the word containing a position.
    pub fn word_contents(&self, node: &NodeRef, offset: i32) -> Vec<Content> {
        self.boundary_contents(node, offset, TextBoundary::Word, |edge: char| {
            !edge.is_whitespace()
        })
    }

    /// Contents of the sentence containing a position.
    pub fn sentence_contents(&self, node: &NodeRef, offset: i32) -> Vec<Content> {
        self.boundary_contents(node, offset, TextBoundary::Sentence, |edge: char| {
            !matches!(edge, '.' | '!' | '?' | '\n')
        })
    }

    /// Shared shape of word and sentence extraction: the boundary span
    /// in the anchor node, extended across node edges while the
    /// `continues` predicate holds for the characters at the seam.
    fn boundary_contents(
        &self,
        node: &NodeRef,
        offset: i32,
        boundary: TextBoundary,
        continues: impl Fn(char) -> bool,
    ) -> Vec<Content> {
        let ctx = self.walker.normalize(node, offset);
        let Some(len) = self.walker.usable_text_len(&ctx.node) else {
            return vec![Self::object_content(&ctx.node)];
        };
        let len = len as usize;
        let Some((start, end)) = self.span_at(&ctx.node, ctx.offset, boundary) else {
            return Vec::new();
        };

        let mut segments = vec![Segment::Text(NodeRef::clone(&ctx.node), start, end)];
        let mut seen: HashSet<NodeHandle> = HashSet::new();
        seen.insert(ctx.node.handle());

        // Backward across the node edge.
        let mut left = CaretContext::new(NodeRef::clone(&ctx.node), start as i32);
        while left.offset == 0 {
            let edge = left.node.char_at(0);
            if edge.is_none() || !continues(edge.unwrap_or(' ')) {
                break;
            }
            let Some(prev) = self.walker.previous(&left.node, 0) else {
                break;
            };
            if prev.offset < 0
                || self.walker.usable_text_len(&prev.node).is_none()
                || !seen.insert(prev.node.handle())
            {
                break;
            }
            let Some(pch) = prev.node.char_at(prev.offset) else {
                break;
            };
            if !continues(pch) {
                break;
            }
            let Some((s, e)) = self.span_at(&prev.node, prev.offset, boundary) else {
                break;
            };
            segments.insert(0, Segment::Text(NodeRef::clone(&prev.node), s, e));
            left = CaretContext::new(prev.node, s as i32);
        }

        // Forward across the node edge.
        let mut right = CaretContext::new(NodeRef::clone(&ctx.node), end as i32);
        let mut right_len = len;
        while right.offset as usize >= right_len {
            let Some(last) = right.node.char_at(right_len as i32 - 1) else {
                break;
            };
            if !continues(last) {
                break;
            }
            let Some(next) = self.walker.next(&right.node, right_len as i32 - 1) else {
                break;
            };
            if next.offset != 0
                || self.walker.usable_text_len(&next.node).is_none()
                || !seen.insert(next.node.handle())
            {
                break;
            }
            let Some(nch) = next.node.char_at(0) else {
                break;
            };
            if !continues(nch) {
                break;
            }
            let Some((s, e)) = self.span_at(&next.node, 0, boundary) else {
                break;
            };
            let nlen = self.walker.usable_text_len(&next.node).unwrap_or(0) as usize;
            segments.push(Segment::Text(NodeRef::clone(&next.node), s, e));
            right = CaretContext::new(next.node, e as i32);
            right_len = nlen;
        }

        self.materialize_segments(segments)
    }
}
