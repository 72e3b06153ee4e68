//! Traits for transient (single-owner, mutable) builders.
//!
//! A transient is obtained from a persistent collection in O(1), mutated in
//! place, and sealed back into a persistent collection in O(1). Sealing
//! consumes the transient, so it cannot be used afterwards:
//!
//! ```compile_fail
//! use strata::prelude::*;
//!
//! let mut transient = PersistentVector::<i32>::new().transient();
//! transient.conj(1);
//! let vector = transient.persistent();
//! transient.conj(2);
//! ```

use crate::persistent::Result;

/// Persistent collections that have a transient form.
pub trait Editable {
    /// The transient builder type.
    type Transient: TransientCollection<Persistent = Self>;

    /// Starts a transient sharing this collection's structure.
    fn as_transient(&self) -> Self::Transient;
}

/// Operations every transient supports.
pub trait TransientCollection {
    /// What `conj` accepts.
    type Item;
    /// The persistent type produced by sealing.
    type Persistent;

    /// Adds `item` in place.
    fn conj(&mut self, item: Self::Item);

    /// Seals the transient into a persistent collection.
    fn persistent(self) -> Self::Persistent;
}

/// In-place association.
pub trait TransientAssociative: TransientCollection {
    /// Key type.
    type Key;
    /// Value type.
    type Value;

    /// Maps `key` to `value` in place.
    ///
    /// # Errors
    ///
    /// Transient vectors fail with
    /// [`CollectionError::IndexOutOfBounds`](crate::CollectionError::IndexOutOfBounds)
    /// when the index is past the end. Maps never fail.
    fn assoc(&mut self, key: Self::Key, value: Self::Value) -> Result<()>;
}

/// In-place removal of keys.
pub trait TransientMap: TransientAssociative {
    /// Removes `key` in place, returning its value if present.
    fn dissoc(&mut self, key: &Self::Key) -> Option<Self::Value>;
}

/// In-place removal of set members.
pub trait TransientSet: TransientCollection {
    /// Removes `item` in place, returning whether it was present.
    fn disjoin(&mut self, item: &Self::Item) -> bool;
}

/// In-place removal from the end.
pub trait TransientStack: TransientCollection {
    /// Element type.
    type Element;

    /// Removes and returns the last element.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`](crate::CollectionError::EmptyCollection)
    /// when there are no elements.
    fn pop(&mut self) -> Result<Self::Element>;
}
