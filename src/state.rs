//! Accessible state flags.

use bitflags::bitflags;

bitflags! {
    /// Boolean state flags of an accessible node.
    ///
    /// A node's state set is a snapshot: the bus pushes `state-changed`
    /// notifications when individual flags flip, and the cached copy is
    /// invalidated then.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
    pub struct StateSet: u32 {
        /// Rendered on screen (possibly scrolled out of the viewport).
        const SHOWING             = 0x0001;
        /// Not explicitly hidden.
        const VISIBLE             = 0x0002;
        /// Can receive keyboard focus.
        const FOCUSABLE           = 0x0004;
        /// Currently has keyboard focus.
        const FOCUSED             = 0x0008;
        /// Content can be edited by the user.
        const EDITABLE            = 0x0010;
        /// Children are virtual and materialized on demand; structural
        /// walks must not enumerate them.
        const MANAGES_DESCENDANTS = 0x0020;
        /// Selected within its container.
        const SELECTED            = 0x0040;
        /// Checked (check boxes, toggle buttons).
        const CHECKED             = 0x0080;
        /// Expanded (tree items, combo boxes).
        const EXPANDED            = 0x0100;
        /// Can be expanded or collapsed.
        const EXPANDABLE          = 0x0200;
        /// The element no longer exists on the bus.
        const DEFUNCT             = 0x0400;
    }
}

impl StateSet {
    /// Check whether the node is actually presentable on screen.
    #[must_use]
    pub const fn is_showing(self) -> bool {
        self.contains(Self::SHOWING.union(Self::VISIBLE))
    }
}
