//! `lector` - screen-reader navigation core
//!
//! A caret-context traversal engine over an externally-owned
//! accessibility tree, plus a flat-review spatial engine that clusters
//! on-screen zones into visual lines. Speech and braille rendering are
//! out of scope: presentation layers consume content tuples and review
//! positions from here and do their own output.

// Crate-level lint configuration
#![warn(unsafe_code)]
#![allow(dead_code)] // Public API functions not yet used internally
#![allow(clippy::cast_possible_truncation)] // Intentional offset casts
#![allow(clippy::cast_sign_loss)] // Intentional coordinate conversions
#![allow(clippy::cast_precision_loss)] // Intentional for overlap math
#![allow(clippy::cast_possible_wrap)] // Intentional coordinate conversions
#![allow(clippy::module_name_repetitions)] // Allow ReviewContext etc
#![allow(clippy::missing_errors_doc)] // Docs WIP
#![allow(clippy::missing_panics_doc)] // Docs WIP
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::use_self)] // Allow explicit type names in impl blocks
#![allow(clippy::needless_pass_by_value)] // Allow pass by value for small Copy types
#![allow(clippy::branches_sharing_code)] // Code clarity over DRY in branching
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::cast_lossless)] // as casts are fine for primitive widening
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::redundant_clone)] // Clones in tests for clarity are fine
#![allow(clippy::semicolon_if_nothing_returned)] // Style preference
#![allow(clippy::float_cmp)] // Exact ratios in tests are intentional

pub mod cache;
pub mod caret;
pub mod error;
pub mod event;
pub mod geometry;
pub mod notify;
pub mod review;
pub mod role;
pub mod session;
pub mod sim;
pub mod source;
pub mod state;

// Re-export core types at crate root
pub use cache::{Invalidation, Node, NodeCache, NodeRef};
pub use caret::{CaretContext, Content, SayAll, TraversalPolicy, Walker};
pub use error::{Error, Result};
pub use event::{LogLevel, emit_event, emit_log, set_event_callback, set_log_callback};
pub use geometry::Rect;
pub use notify::{ChildChange, Notification, TextChange};
pub use review::{
    BrailleRegion, Granularity, Line, ReviewContext, ReviewOptions, Wrap, Zone, ZoneKind,
};
pub use role::Role;
pub use session::Session;
pub use sim::SimTree;
pub use source::{
    AccessibleSource, Capabilities, EMBEDDED_OBJECT_CHAR, LinkSpan, NodeHandle, TextBoundary,
    TextChunk,
};
pub use state::StateSet;
