//! The capability facade over the external accessibility bus.
//!
//! Every node of the desktop's accessibility tree lives in another
//! process; this crate only ever sees it through [`AccessibleSource`].
//! Each method is a synchronous round trip that may fail at any time
//! (the element can vanish between discovery and use), so every read
//! returns `Option`: `None` means "don't know", never a crash.
//!
//! Optional per-node capabilities (Text, Component, Table, Hypertext,
//! Image, Action) are advertised up front through [`Capabilities`] and
//! queried with an explicit membership check, never by speculative
//! calls.

use bitflags::bitflags;
use std::fmt;

use crate::geometry::Rect;
use crate::role::Role;
use crate::state::StateSet;

/// Sentinel character standing in, within a text run, for a child
/// widget that itself may contain further content.
///
/// Invariant: the j-th occurrence of this character in a node's text
/// (scanning left to right, 0-indexed) corresponds to `child(j)` of
/// that node. The traversal engine re-derives this mapping from live
/// text on every use and degrades gracefully when a toolkit breaks it.
pub const EMBEDDED_OBJECT_CHAR: char = '\u{FFFC}';

/// Opaque identity of an external accessible element.
///
/// Handle equality is bus identity; the [cache](crate::cache) layers
/// wrapper identity on top of it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Optional interfaces a node may implement.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct Capabilities: u32 {
        /// Character-addressable text with boundary queries.
        const TEXT      = 0x01;
        /// On-screen extents.
        const COMPONENT = 0x02;
        /// Row/column cell addressing.
        const TABLE     = 0x04;
        /// Ordered link spans within text.
        const HYPERTEXT = 0x08;
        /// Image with an optional description.
        const IMAGE     = 0x10;
        /// Invokable actions.
        const ACTION    = 0x20;
    }
}

/// Text boundary kinds for [`AccessibleSource::text_at_offset`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextBoundary {
    /// The single character at the offset.
    Char,
    /// The word containing the offset.
    Word,
    /// The visual line containing the offset.
    Line,
    /// The sentence containing the offset.
    Sentence,
}

/// A boundary-delimited slice of a node's text.
///
/// Offsets are character offsets into the owning node's text; `end` is
/// exclusive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChunk {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// One hyperlink span within a node's text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkSpan {
    /// First character offset covered by the link.
    pub start: usize,
    /// One past the last covered character offset.
    pub end: usize,
    /// The link's target node, when it resolves to one.
    pub target: Option<NodeHandle>,
}

/// Read-only, possibly-stale view of the external accessibility tree.
///
/// Implementations wrap the live bus; [`SimTree`](crate::sim::SimTree)
/// provides an in-memory one for tests, benches and examples.
pub trait AccessibleSource {
    // --- identity and structure ---------------------------------------

    fn role(&self, h: NodeHandle) -> Option<Role>;
    fn name(&self, h: NodeHandle) -> Option<String>;
    fn description(&self, h: NodeHandle) -> Option<String>;
    fn states(&self, h: NodeHandle) -> Option<StateSet>;
    /// Parent handle; `None` at the tree root (or when the element is gone).
    fn parent(&self, h: NodeHandle) -> Option<NodeHandle>;
    fn child_count(&self, h: NodeHandle) -> Option<usize>;
    fn child_at(&self, h: NodeHandle, index: usize) -> Option<NodeHandle>;
    fn index_in_parent(&self, h: NodeHandle) -> Option<usize>;
    /// Which optional interfaces the node implements. Empty when unknown.
    fn capabilities(&self, h: NodeHandle) -> Capabilities;

    // --- Text capability ----------------------------------------------

    fn character_count(&self, h: NodeHandle) -> Option<usize>;
    fn caret_offset(&self, h: NodeHandle) -> Option<i32>;
    fn set_caret_offset(&self, h: NodeHandle, offset: i32) -> bool;
    /// Substring by character offsets, `end` exclusive and clamped.
    fn text_slice(&self, h: NodeHandle, start: usize, end: usize) -> Option<String>;
    fn text_at_offset(
        &self,
        h: NodeHandle,
        offset: usize,
        boundary: TextBoundary,
    ) -> Option<TextChunk>;
    /// Screen extents of a character range.
    fn range_extents(&self, h: NodeHandle, start: usize, end: usize) -> Option<Rect>;
    /// Attribute run covering `offset`: `(attrs, run_start, run_end)`.
    fn text_attributes_at(
        &self,
        h: NodeHandle,
        offset: usize,
    ) -> Option<(Vec<(String, String)>, usize, usize)>;

    // --- Component capability -----------------------------------------

    fn extents(&self, h: NodeHandle) -> Option<Rect>;

    // --- Table capability ---------------------------------------------

    /// `(rows, columns)`.
    fn table_size(&self, h: NodeHandle) -> Option<(usize, usize)>;
    /// Row/column of the cell at a linear child index.
    fn cell_coordinates(&self, h: NodeHandle, index: usize) -> Option<(usize, usize)>;
    fn cell_at(&self, h: NodeHandle, row: usize, column: usize) -> Option<NodeHandle>;

    // --- Hypertext capability -----------------------------------------

    fn link_count(&self, h: NodeHandle) -> Option<usize>;
    fn link_at(&self, h: NodeHandle, index: usize) -> Option<LinkSpan>;

    // --- Image capability ---------------------------------------------

    fn image_description(&self, h: NodeHandle) -> Option<String>;

    // --- Action capability --------------------------------------------

    fn action_count(&self, h: NodeHandle) -> Option<usize>;
    fn do_action(&self, h: NodeHandle, index: usize) -> bool;

    // --- external reference counting ----------------------------------

    /// Take an external reference on the handle. Called once when a
    /// wrapper is constructed.
    fn ref_handle(&self, h: NodeHandle);
    /// Release the external reference. Called exactly once when the
    /// wrapper is dropped.
    fn unref_handle(&self, h: NodeHandle);
}
