//! Error types for lector.

use std::fmt;

use crate::source::NodeHandle;

/// Result type alias for lector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for lector operations.
///
/// Most "failures" in this crate are expected and modelled as `Option`
/// (a stale node, an absent capability). `Error` is reserved for the
/// conditions a presentation layer must surface to the user explicitly,
/// so the user is never left wondering whether the system has hung.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The given node is not inside a document.
    NotADocument,
    /// No valid reading position could be derived at all.
    NoPosition,
    /// The referenced node no longer exists on the accessibility bus.
    Defunct(NodeHandle),
    /// The flat-review screen contains nothing to review.
    NothingToReview,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotADocument => write!(f, "not in a document"),
            Self::NoPosition => write!(f, "no position could be derived"),
            Self::Defunct(h) => write!(f, "node {h} is defunct"),
            Self::NothingToReview => write!(f, "nothing on screen to review"),
        }
    }
}

impl std::error::Error for Error {}
