//! Error types for collection operations.
//!
//! Every fallible operation in this crate reports failure through
//! [`CollectionError`]. Absence of a key is never an error: lookups return
//! `Option` instead.

use thiserror::Error;

/// Errors raised by collection operations.
///
/// # Examples
///
/// ```rust
/// use strata::persistent::{CollectionError, PersistentVector};
///
/// let vector: PersistentVector<i32> = (0..3).collect();
/// let error = vector.nth(7).unwrap_err();
/// assert_eq!(error, CollectionError::IndexOutOfBounds { index: 7, count: 3 });
/// assert_eq!(error.to_string(), "index 7 out of bounds for collection of count 3");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    /// A positional access or update fell outside `0..=count`.
    #[error("index {index} out of bounds for collection of count {count}")]
    IndexOutOfBounds {
        /// The requested index.
        index: usize,
        /// The number of elements at the time of the request.
        count: usize,
    },

    /// `pop` or `peek` on a collection with no elements.
    #[error("can't {operation} an empty collection")]
    EmptyCollection {
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// An add-if-absent construction met a key that was already present.
    #[error("duplicate key in {operation}")]
    DuplicateKey {
        /// The operation that detected the duplicate.
        operation: &'static str,
    },

    /// A structural invariant was found broken.
    ///
    /// This indicates a bug in the collection implementation, never a
    /// misuse by the caller.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

/// Result alias for collection operations.
pub type Result<T> = std::result::Result<T, CollectionError>;
