use std::collections::TryReserveError;
use thiserror::Error;

/// Error returned by the fallible operations of [`OrderedMap`](crate::OrderedMap),
/// [`OrderedMultiSet`](crate::OrderedMultiSet) and [`RbTree`](crate::rb::RbTree).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A strict accessor such as [`OrderedMap::at`](crate::OrderedMap::at) was given a key that is not present.
    #[error("key not found")]
    KeyNotFound,

    /// Growing the node arena failed.
    #[error("node allocation failed: {0}")]
    AllocFailed(#[from] TryReserveError),
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
