//! Flat review: 2-D, screen-geometry-driven navigation.
//!
//! Orthogonal to the logical caret engine: the visible screen is
//! harvested into rectangular content [`Zone`]s, clustered into visual
//! [`Line`]s by vertical overlap, and navigated with a
//! [`ReviewContext`] cursor that moves by line, zone, word and
//! character.

mod cluster;
mod context;
mod zone;

pub use cluster::{Line, cluster_zones_by_line};
pub use context::{BrailleRegion, Granularity, ReviewContext, Wrap};
pub use zone::{CharBox, Word, Zone, ZoneKind, showing_zones};

use crate::geometry::Rect;
use crate::role::Role;

/// Configuration for building a review session.
#[derive(Clone, Debug)]
pub struct ReviewOptions {
    /// Clip rectangle; defaults to the review root's own extents.
    pub clip: Option<Rect>,
    /// Minimum vertical overlap (fraction of the shorter zone's
    /// height) for two zones to share a line.
    pub same_line_threshold: f32,
    /// Roles treated as atomic leaves during zone harvesting.
    pub atomic_roles: Vec<Role>,
}

impl ReviewOptions {
    /// Options with the defaults the presentation layer expects.
    #[must_use]
    pub fn new() -> Self {
        Self {
            clip: None,
            same_line_threshold: 0.25,
            atomic_roles: vec![Role::ComboBox, Role::PageTab],
        }
    }

    /// Builder: clip zone harvesting to a rectangle.
    #[must_use]
    pub fn with_clip(mut self, clip: Rect) -> Self {
        self.clip = Some(clip);
        self
    }

    /// Builder: adjust the same-line overlap threshold.
    #[must_use]
    pub fn with_same_line_threshold(mut self, threshold: f32) -> Self {
        self.same_line_threshold = threshold;
        self
    }

    /// Builder: add a role treated as an atomic review leaf.
    #[must_use]
    pub fn with_atomic_role(mut self, role: Role) -> Self {
        self.atomic_roles.push(role);
        self
    }
}

impl Default for ReviewOptions {
    fn default() -> Self {
        Self::new()
    }
}
