//! Logical document traversal: caret contexts, in-order walking,
//! content extraction and say-all streaming.
//!
//! The document's native text model encodes child widgets as single
//! embedded-object characters; this module reconstructs a logical
//! reading position (node + character offset) over that flattened
//! address space and moves it forward and backward by character, word
//! and line.

pub(crate) mod content;
mod say_all;
mod walk;

pub use content::{Content, LineSnapshot};
pub use say_all::SayAll;
pub use walk::Walker;

use crate::cache::{Node, NodeRef};
use crate::role::Role;
use crate::state::StateSet;

/// The logical reading position: a node and a character offset into it.
///
/// Offset `-1` is the "just before the first character" anchor used for
/// nodes with no text of their own.
#[derive(Clone, Debug)]
pub struct CaretContext {
    pub node: NodeRef,
    pub offset: i32,
}

impl CaretContext {
    /// Create a caret context.
    #[must_use]
    pub fn new(node: NodeRef, offset: i32) -> Self {
        Self { node, offset }
    }
}

impl PartialEq for CaretContext {
    fn eq(&self, other: &Self) -> bool {
        Node::same(&self.node, &other.node) && self.offset == other.offset
    }
}

/// Policy knobs for the in-order walk.
#[derive(Clone, Debug)]
pub struct TraversalPolicy {
    /// Trim a single trailing space from a text run before offset
    /// arithmetic, so the caret never stops on an invisible position.
    pub trim_trailing_space: bool,
    /// Treat focusable tool bars as atomic controls.
    pub atomic_focusable_toolbars: bool,
    /// Additional roles to treat as atomic controls.
    pub extra_atomic_roles: Vec<Role>,
}

impl TraversalPolicy {
    /// Policy with the defaults the presentation layer expects.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trim_trailing_space: true,
            atomic_focusable_toolbars: true,
            extra_atomic_roles: Vec::new(),
        }
    }

    /// Builder: keep trailing spaces addressable.
    #[must_use]
    pub fn with_trailing_space(mut self, keep: bool) -> Self {
        self.trim_trailing_space = !keep;
        self
    }

    /// Builder: add a role to the atomic set.
    #[must_use]
    pub fn with_atomic_role(mut self, role: Role) -> Self {
        self.extra_atomic_roles.push(role);
        self
    }

    /// Check whether a node of this role/state pair is an atomic
    /// control the walk must not descend into.
    #[must_use]
    pub fn is_atomic(&self, role: Role, states: StateSet) -> bool {
        if role.is_atomic_control() {
            return true;
        }
        if self.atomic_focusable_toolbars
            && role == Role::ToolBar
            && states.contains(StateSet::FOCUSABLE)
        {
            return true;
        }
        self.extra_atomic_roles.contains(&role)
    }
}

impl Default for TraversalPolicy {
    fn default() -> Self {
        Self::new()
    }
}
