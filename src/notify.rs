//! Push notifications from the accessibility bus.
//!
//! The bus delivers these one at a time to a single dispatch point;
//! [`Session::handle_notification`](crate::session::Session::handle_notification)
//! routes each to the cache invalidation and context bookkeeping it
//! implies.

use crate::source::NodeHandle;
use crate::state::StateSet;

/// A structural child mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildChange {
    Added(NodeHandle),
    Removed(NodeHandle),
}

/// A text content mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextChange {
    Inserted { offset: usize, text: String },
    Deleted { offset: usize, text: String },
}

/// One asynchronous notification about an external node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    NameChanged(NodeHandle),
    DescriptionChanged(NodeHandle),
    ParentChanged(NodeHandle),
    /// A state flag flipped to the given value.
    StateChanged(NodeHandle, StateSet, bool),
    ChildrenChanged(NodeHandle, ChildChange),
    TextChanged(NodeHandle, TextChange),
    /// The caret inside the node moved to a new character offset.
    CaretMoved(NodeHandle, i32),
    /// The element no longer exists.
    Defunct(NodeHandle),
}

impl Notification {
    /// The node the notification is about.
    #[must_use]
    pub fn node(&self) -> NodeHandle {
        match self {
            Self::NameChanged(h)
            | Self::DescriptionChanged(h)
            | Self::ParentChanged(h)
            | Self::StateChanged(h, _, _)
            | Self::ChildrenChanged(h, _)
            | Self::TextChanged(h, _)
            | Self::CaretMoved(h, _)
            | Self::Defunct(h) => *h,
        }
    }

    /// Check if this notification invalidates cached document content.
    #[must_use]
    pub fn touches_content(&self) -> bool {
        matches!(
            self,
            Self::TextChanged(_, _) | Self::ChildrenChanged(_, _) | Self::Defunct(_)
        )
    }

    /// Get the caret offset if this is a caret move.
    #[must_use]
    pub fn caret_offset(&self) -> Option<i32> {
        match self {
            Self::CaretMoved(_, offset) => Some(*offset),
            _ => None,
        }
    }
}
