//! Capability traits shared by the persistent collections.
//!
//! Each trait names one capability (counting, positional access, keyed
//! lookup, stack access) so that generic code can ask for exactly what it
//! needs.

use crate::persistent::Result;

/// Collections that know their element count in O(1).
pub trait Counted {
    /// Number of elements.
    fn count(&self) -> usize;
}

/// Positional access.
pub trait Indexed: Counted {
    /// Element type.
    type Item;

    /// The element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`](crate::CollectionError::IndexOutOfBounds)
    /// when `index >= count`.
    fn nth(&self, index: usize) -> Result<&Self::Item>;

    /// The element at `index`, or `default` when out of range.
    fn nth_or<'a>(&'a self, index: usize, default: &'a Self::Item) -> &'a Self::Item {
        self.nth(index).unwrap_or(default)
    }
}

/// Keyed lookup.
///
/// # Examples
///
/// ```rust
/// use strata::prelude::*;
///
/// let map = PersistentHashMap::new().insert("a", 1);
/// assert_eq!(map.lookup(&"a"), Some(&1));
/// assert_eq!(map.lookup_or(&"z", &0), &0);
/// ```
pub trait Lookup {
    /// Key type.
    type Key;
    /// Value type.
    type Value;

    /// The value for `key`, if present.
    fn lookup(&self, key: &Self::Key) -> Option<&Self::Value>;

    /// The value for `key`, or `default` when absent.
    fn lookup_or<'a>(&'a self, key: &Self::Key, default: &'a Self::Value) -> &'a Self::Value {
        self.lookup(key).unwrap_or(default)
    }
}

/// Collections that can associate a key with a value.
pub trait Associative: Lookup + Sized {
    /// Whether `key` is present.
    fn contains_key(&self, key: &Self::Key) -> bool;

    /// A new collection with `key` mapped to `value`.
    ///
    /// # Errors
    ///
    /// Maps never fail. Vectors fail with
    /// [`CollectionError::IndexOutOfBounds`](crate::CollectionError::IndexOutOfBounds)
    /// when the index is past the end.
    fn assoc(&self, key: Self::Key, value: Self::Value) -> Result<Self>;
}

/// Associative collections that can also remove keys.
pub trait PersistentMap: Associative {
    /// A new map without `key`. Removing an absent key yields an equal map.
    #[must_use]
    fn dissoc(&self, key: &Self::Key) -> Self;
}

/// Sets.
pub trait PersistentSet: Sized {
    /// Element type.
    type Item;

    /// Whether `item` is a member.
    fn contains(&self, item: &Self::Item) -> bool;

    /// A new set without `item`.
    #[must_use]
    fn disjoin(&self, item: &Self::Item) -> Self;
}

/// Last-in, first-out access at the collection's natural end.
pub trait Stack: Sized {
    /// Element type.
    type Item;

    /// The element that `pop` would remove.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`](crate::CollectionError::EmptyCollection)
    /// when there are no elements.
    fn peek(&self) -> Result<&Self::Item>;

    /// A new collection without the element `peek` returns.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`](crate::CollectionError::EmptyCollection)
    /// when there are no elements.
    fn pop(&self) -> Result<Self>;
}

/// Collections that can grow by one element and produce an empty version of
/// themselves.
pub trait Collection: Sized {
    /// What `conj` accepts: elements for vectors and sets, entries for maps.
    type Item;

    /// Adds `item` at the collection's natural position.
    #[must_use]
    fn conj(&self, item: Self::Item) -> Self;

    /// An empty collection of the same kind, keeping any comparator.
    #[must_use]
    fn empty(&self) -> Self;
}
