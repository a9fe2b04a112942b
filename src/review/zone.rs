//! Zone harvesting: from the accessibility tree to on-screen content
//! rectangles.

use std::cell::OnceCell;

use unicode_segmentation::UnicodeSegmentation;

use crate::cache::NodeRef;
use crate::geometry::Rect;
use crate::role::Role;
use crate::session::Session;
use crate::source::{Capabilities, EMBEDDED_OBJECT_CHAR, TextBoundary};
use crate::state::StateSet;

use super::ReviewOptions;

/// What kind of content a zone carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoneKind {
    /// A run of accessible text (one visual line or part of one).
    Text,
    /// An image represented by its description.
    Image,
    /// Anything else, represented by its name or description.
    Plain,
}

/// A screen rectangle worth of reviewable content.
#[derive(Clone, Debug)]
pub struct Zone {
    pub node: NodeRef,
    pub rect: Rect,
    pub text: String,
    /// Character offset of `text` within the owning node's text
    /// (0 for non-text zones).
    pub start_offset: usize,
    pub kind: ZoneKind,
    words: OnceCell<Vec<Word>>,
}

/// One word within a zone, with lazily computed character boxes.
#[derive(Clone, Debug)]
pub struct Word {
    pub text: String,
    /// Character offset within the owning node's text.
    pub start: usize,
    pub rect: Rect,
    chars: OnceCell<Vec<CharBox>>,
}

/// One character with its screen extents.
#[derive(Clone, Debug)]
pub struct CharBox {
    pub ch: char,
    pub rect: Rect,
}

impl Zone {
    /// Create a zone.
    #[must_use]
    pub fn new(node: NodeRef, rect: Rect, text: String, start_offset: usize, kind: ZoneKind) -> Self {
        Self {
            node,
            rect,
            text,
            start_offset,
            kind,
            words: OnceCell::new(),
        }
    }

    /// Check whether the zone's text is empty or whitespace.
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    /// The zone's words, split on first access.
    ///
    /// Each word's extents cost one round trip to the Text capability;
    /// they are computed once and kept for the life of the review.
    pub fn words(&self) -> &[Word] {
        self.words.get_or_init(|| self.split_words())
    }

    fn split_words(&self) -> Vec<Word> {
        let mut words = Vec::new();
        if self.kind == ZoneKind::Text {
            let mut char_pos = 0usize;
            for (_, piece) in self.text.split_word_bound_indices() {
                let piece_chars = piece.chars().count();
                let start = self.start_offset + char_pos;
                let rect = self
                    .node
                    .range_extents(start, start + piece_chars)
                    .unwrap_or_else(|| self.carve(char_pos, piece_chars));
                words.push(Word {
                    text: piece.to_string(),
                    start,
                    rect,
                    chars: OnceCell::new(),
                });
                char_pos += piece_chars;
            }
        }
        if words.is_empty() {
            // Non-text zones (and blank lines) review as a single word.
            words.push(Word {
                text: self.text.clone(),
                start: self.start_offset,
                rect: self.rect,
                chars: OnceCell::new(),
            });
        }
        words
    }

    /// Proportional slice of the zone rect, for sources that cannot
    /// report per-range extents.
    fn carve(&self, char_pos: usize, char_len: usize) -> Rect {
        let total = self.text.chars().count().max(1);
        let step = f64::from(self.rect.width) / total as f64;
        let x = self.rect.x + (step * char_pos as f64) as i32;
        let width = (step * char_len as f64).ceil() as u32;
        Rect::new(x, self.rect.y, width, self.rect.height)
    }
}

impl Word {
    /// Check whether this word is whitespace only.
    #[must_use]
    pub fn is_whitespace(&self) -> bool {
        self.text.chars().all(char::is_whitespace)
    }

    /// The word's characters, measured on first access.
    pub fn chars(&self, zone: &Zone) -> &[CharBox] {
        self.chars.get_or_init(|| {
            let node = &zone.node;
            let count = self.text.chars().count().max(1);
            let step = f64::from(self.rect.width) / count as f64;
            self.text
                .chars()
                .enumerate()
                .map(|(i, ch)| {
                    let rect = if zone.kind == ZoneKind::Text {
                        node.range_extents(self.start + i, self.start + i + 1)
                    } else {
                        None
                    }
                    .unwrap_or_else(|| {
                        Rect::new(
                            self.rect.x + (step * i as f64) as i32,
                            self.rect.y,
                            step.ceil() as u32,
                            self.rect.height,
                        )
                    });
                    CharBox { ch, rect }
                })
                .collect()
        })
    }
}

fn review_leaf(node: &NodeRef, states: StateSet, opts: &ReviewOptions, session: &Session) -> bool {
    if states.contains(StateSet::MANAGES_DESCENDANTS) {
        return true;
    }
    let role = node.role().unwrap_or(Role::Unknown);
    if opts.atomic_roles.contains(&role) {
        return true;
    }
    // Menus hanging off a menu bar review as single items.
    if role == Role::Menu {
        let parent_role = session
            .cache()
            .parent_of(node)
            .and_then(|p| p.role());
        if parent_role == Some(Role::MenuBar) {
            return true;
        }
    }
    node.child_count().unwrap_or(0) == 0
}

/// Collect the zones of every showing node under `root` intersecting
/// the clip rectangle, in document order.
///
/// The descent is an explicit stack; subtrees whose extents miss the
/// clip are pruned without visiting their children.
pub fn showing_zones(session: &Session, root: &NodeRef, opts: &ReviewOptions) -> Vec<Zone> {
    let clip = opts
        .clip
        .or_else(|| root.extents())
        .unwrap_or_else(|| Rect::new(i32::MIN / 2, i32::MIN / 2, u32::MAX, u32::MAX));

    let mut zones = Vec::new();
    let mut stack: Vec<NodeRef> = vec![NodeRef::clone(root)];
    while let Some(node) = stack.pop() {
        let states = node.states().unwrap_or_default();
        if !states.is_showing() {
            continue;
        }
        if let Some(extents) = node.extents() {
            if !extents.intersects_inclusive(&clip) {
                continue;
            }
        }
        if review_leaf(&node, states, opts, session) {
            zones_from_node(&node, &clip, &mut zones);
            continue;
        }
        if node.has(Capabilities::TEXT) {
            // Text hosts contribute their own runs; embedded children
            // are represented by their own zones below.
            zones_from_text(&node, &clip, &mut zones);
        }
        let count = node.child_count().unwrap_or(0);
        for i in (0..count).rev() {
            if let Some(child) = session.cache().child_of(&node, i) {
                stack.push(child);
            }
        }
    }
    zones
}

/// Zones for a single leaf node: text lines, else image description,
/// else one zone covering the component extents.
fn zones_from_node(node: &NodeRef, clip: &Rect, out: &mut Vec<Zone>) {
    if node.has(Capabilities::TEXT) && node.character_count().unwrap_or(0) > 0 {
        zones_from_text(node, clip, out);
        return;
    }
    let Some(extents) = node.extents() else {
        return;
    };
    let Some(rect) = extents.clip(clip) else {
        return;
    };
    if let Some(desc) = node.image_description().filter(|d| !d.is_empty()) {
        out.push(Zone::new(NodeRef::clone(node), rect, desc, 0, ZoneKind::Image));
        return;
    }
    let label = node
        .name()
        .filter(|s| !s.is_empty())
        .or_else(|| node.description().filter(|s| !s.is_empty()))
        .unwrap_or_default();
    if label.is_empty() && node.role().unwrap_or(Role::Unknown).is_layout_container() {
        // An unlabeled layout container has nothing to review.
        return;
    }
    out.push(Zone::new(NodeRef::clone(node), rect, label, 0, ZoneKind::Plain));
}

/// One zone per visual text line (split around embedded objects),
/// clipped to the clip rectangle.
fn zones_from_text(node: &NodeRef, clip: &Rect, out: &mut Vec<Zone>) {
    let Some(total) = node.character_count() else {
        return;
    };
    if total == 0 {
        return;
    }
    let mut offset = 0usize;
    while offset < total {
        let Some(chunk) = node.text_at_offset(offset, TextBoundary::Line) else {
            break;
        };
        push_line_runs(node, &chunk.text, chunk.start, clip, out);
        // Step past the line and its terminator.
        offset = (chunk.end + 1).max(offset + 1);
    }
}

/// Split one line's text at embedded-object characters and emit a zone
/// per plain run. A fully empty line still yields a zone so empty
/// paragraphs stay reviewable.
fn push_line_runs(node: &NodeRef, text: &str, line_start: usize, clip: &Rect, out: &mut Vec<Zone>) {
    let chars: Vec<char> = text.chars().collect();
    let mut run_start = 0usize;
    let mut emitted = false;
    let mut idx = 0usize;
    loop {
        let at_end = idx >= chars.len();
        if at_end || chars[idx] == EMBEDDED_OBJECT_CHAR {
            if run_start < idx {
                let abs = line_start + run_start;
                let run: String = chars[run_start..idx].iter().collect();
                if let Some(extents) = node.range_extents(abs, line_start + idx) {
                    if let Some(rect) = extents.clip(clip) {
                        out.push(Zone::new(
                            NodeRef::clone(node),
                            rect,
                            run,
                            abs,
                            ZoneKind::Text,
                        ));
                        emitted = true;
                    }
                }
            }
            if at_end {
                break;
            }
            run_start = idx + 1;
        }
        idx += 1;
    }
    if !emitted && chars.iter().all(|&c| c != EMBEDDED_OBJECT_CHAR) {
        // Blank line: keep a (possibly zero-width) marker zone.
        if let Some(extents) = node.range_extents(line_start, line_start + 1) {
            if let Some(rect) = extents.clip(clip) {
                out.push(Zone::new(
                    NodeRef::clone(node),
                    rect,
                    String::new(),
                    line_start,
                    ZoneKind::Text,
                ));
            }
        }
    }
}
