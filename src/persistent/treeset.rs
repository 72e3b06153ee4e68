//! Persistent (immutable) sorted set based on a Red-Black Tree.
//!
//! This module provides [`PersistentTreeSet`], a thin wrapper around
//! `PersistentTreeMap<T, ()>` that keeps its elements ordered by a
//! [`Comparator`].
//!
//! # Examples
//!
//! ```rust
//! use strata::persistent::PersistentTreeSet;
//!
//! let set: PersistentTreeSet<i32> = [5, 1, 3].into_iter().collect();
//! assert_eq!(set.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5]);
//! assert_eq!(set.first(), Some(&1));
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::ops::RangeBounds;

use super::comparator::{Comparator, NaturalOrder};
use super::entry::MapEntry;
use super::error::{CollectionError, Result};
use super::treemap::{PersistentTreeMap, PersistentTreeMapIterator, TreeMapSeq};
use crate::protocol::{
    Collection, Counted, Lookup, PersistentSet, Reducible, Seqable, Sequential, Step, conj_all,
};

// =============================================================================
// PersistentTreeSet Definition
// =============================================================================

/// A persistent (immutable) sorted set.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `contains`     | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `first`/`last` | O(log N)          |
/// | `len`          | O(1)              |
pub struct PersistentTreeSet<T, C = NaturalOrder> {
    inner: PersistentTreeMap<T, (), C>,
}

impl<T, C: Clone> Clone for PersistentTreeSet<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PersistentTreeSet<T> {
    /// Creates a new empty set ordered by `T`'s [`Ord`] implementation.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: PersistentTreeMap::new(),
        }
    }
}

impl<T, C> PersistentTreeSet<T, C> {
    /// Creates a new empty set ordered by `comparator`.
    #[must_use]
    pub const fn with_comparator(comparator: C) -> Self {
        Self {
            inner: PersistentTreeMap::with_comparator(comparator),
        }
    }

    /// Returns the number of elements in the set.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the smallest element.
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.inner.first_entry().map(MapEntry::key)
    }

    /// Returns the largest element.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.inner.last_entry().map(MapEntry::key)
    }

    /// Returns an iterator over the elements in ascending order.
    #[must_use]
    pub fn iter(&self) -> PersistentTreeSetIterator<'_, T> {
        PersistentTreeSetIterator {
            inner: self.inner.iter(),
        }
    }
}

impl<T, C: Comparator<T>> PersistentTreeSet<T, C> {
    /// Returns `true` if the set contains `element`.
    #[must_use]
    pub fn contains(&self, element: &T) -> bool {
        self.inner.contains_key(element)
    }

    /// Returns the stored element equal to `element`.
    #[must_use]
    pub fn get(&self, element: &T) -> Option<&T> {
        self.inner.get_entry(element).map(MapEntry::key)
    }

    /// Returns an iterator over the elements within `range`.
    pub fn range<R>(&self, range: R) -> impl Iterator<Item = &T>
    where
        R: RangeBounds<T>,
        T: Clone,
    {
        self.inner.range(range).map(|(element, _)| element)
    }
}

impl<T: Clone, C: Comparator<T> + Clone> PersistentTreeSet<T, C> {
    /// Adds an element. Adding a present element keeps the stored one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentTreeSet;
    ///
    /// let set = PersistentTreeSet::new().insert(2).insert(1);
    /// let grown = set.insert(3);
    /// assert_eq!(set.len(), 2);
    /// assert_eq!(grown.len(), 3);
    /// ```
    #[must_use]
    pub fn insert(&self, element: T) -> Self {
        if self.contains(&element) {
            return self.clone();
        }
        Self {
            inner: self.inner.insert(element, ()),
        }
    }

    /// Adds an element that must not already be present.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] when the element is present.
    pub fn try_insert(&self, element: T) -> Result<Self> {
        if self.contains(&element) {
            return Err(CollectionError::DuplicateKey {
                operation: "try_insert",
            });
        }
        Ok(self.insert(element))
    }

    /// Removes an element.
    #[must_use]
    pub fn remove(&self, element: &T) -> Self {
        Self {
            inner: self.inner.remove(element),
        }
    }

    /// Returns the union of two sets, ordered by `self`'s comparator.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        conj_all(self, other)
    }

    /// Returns the elements present in both sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        self.iter()
            .filter(|element| other.contains(element))
            .fold(Collection::empty(self), |set, element| {
                set.insert(element.clone())
            })
    }

    /// Returns the elements of `self` absent from `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        other.iter().fold(self.clone(), |set, element| set.remove(element))
    }

    /// Returns an ascending sequence, or `None` when empty.
    #[must_use]
    pub fn seq(&self) -> Option<TreeSetSeq<T, C>> {
        self.inner.seq().map(|inner| TreeSetSeq { inner })
    }

    /// Returns a descending sequence, or `None` when empty.
    #[must_use]
    pub fn rseq(&self) -> Option<TreeSetSeq<T, C>> {
        self.inner.rseq().map(|inner| TreeSetSeq { inner })
    }

    /// Returns a sequence starting at `element`, or the nearest element
    /// beyond it, in the given direction.
    #[must_use]
    pub fn seq_from(&self, element: &T, ascending: bool) -> Option<TreeSetSeq<T, C>> {
        self.inner
            .seq_from(element, ascending)
            .map(|inner| TreeSetSeq { inner })
    }

    /// Returns an ascending sequence over the elements within `range`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let set: PersistentTreeSet<i32> = (0..10).collect();
    /// let middle: Vec<i32> = set.subseq(3..6).unwrap().iter().collect();
    /// assert_eq!(middle, vec![3, 4, 5]);
    /// ```
    #[must_use]
    pub fn subseq<R: RangeBounds<T>>(&self, range: R) -> Option<TreeSetSeq<T, C>> {
        self.inner.subseq(range).map(|inner| TreeSetSeq { inner })
    }

    /// Returns a descending sequence over the elements within `range`.
    #[must_use]
    pub fn rsubseq<R: RangeBounds<T>>(&self, range: R) -> Option<TreeSetSeq<T, C>> {
        self.inner.rsubseq(range).map(|inner| TreeSetSeq { inner })
    }

    /// Verifies the underlying tree.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvariantViolation`] on a broken tree.
    pub fn check_invariants(&self) -> Result<()> {
        self.inner.check_invariants()
    }
}

// =============================================================================
// TreeSetSeq
// =============================================================================

/// A persistent in-order sequence over a [`PersistentTreeSet`].
pub struct TreeSetSeq<T, C = NaturalOrder> {
    inner: TreeMapSeq<T, (), C>,
}

impl<T: Clone, C: Clone> Clone for TreeSetSeq<T, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone, C: Comparator<T> + Clone> Sequential for TreeSetSeq<T, C> {
    type Item = T;

    fn first(&self) -> Option<&T> {
        self.inner.first().map(MapEntry::key)
    }

    fn rest(&self) -> Self {
        Self {
            inner: self.inner.rest(),
        }
    }
}

impl<T: Clone, C: Comparator<T> + Clone> Reducible for TreeSetSeq<T, C> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        self.inner
            .try_reduce(init, |accumulator, entry| function(accumulator, &entry.key))
    }
}

impl<T, C> fmt::Debug for TreeSetSeq<T, C>
where
    T: Clone + fmt::Debug,
    C: Comparator<T> + Clone,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over elements of a [`PersistentTreeSet`] in ascending order.
pub struct PersistentTreeSetIterator<'a, T> {
    inner: PersistentTreeMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for PersistentTreeSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, _)| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for PersistentTreeSetIterator<'_, T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentTreeSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Ord> FromIterator<T> for PersistentTreeSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |set, element| set.insert(element))
    }
}

impl<'a, T, C> IntoIterator for &'a PersistentTreeSet<T, C> {
    type Item = &'a T;
    type IntoIter = PersistentTreeSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, C: Comparator<T>> PartialEq for PersistentTreeSet<T, C> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T, C: Comparator<T>> Eq for PersistentTreeSet<T, C> {}

impl<T: Hash, C> Hash for PersistentTreeSet<T, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for element in self {
            element.hash(state);
        }
    }
}

impl<T: fmt::Debug, C> fmt::Debug for PersistentTreeSet<T, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display, C> fmt::Display for PersistentTreeSet<T, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{{")?;
        for (index, element) in self.iter().enumerate() {
            if index > 0 {
                write!(formatter, " ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Protocol Implementations
// =============================================================================

impl<T, C> Counted for PersistentTreeSet<T, C> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<T, C: Comparator<T>> Lookup for PersistentTreeSet<T, C> {
    type Key = T;
    type Value = T;

    fn lookup(&self, element: &T) -> Option<&T> {
        self.get(element)
    }
}

impl<T: Clone, C: Comparator<T> + Clone> PersistentSet for PersistentTreeSet<T, C> {
    type Item = T;

    fn contains(&self, element: &T) -> bool {
        Self::contains(self, element)
    }

    fn disjoin(&self, element: &T) -> Self {
        self.remove(element)
    }
}

impl<T: Clone, C: Comparator<T> + Clone> Collection for PersistentTreeSet<T, C> {
    type Item = T;

    fn conj(&self, element: T) -> Self {
        self.insert(element)
    }

    fn empty(&self) -> Self {
        Self::with_comparator(self.inner.comparator().clone())
    }
}

impl<T: Clone, C: Comparator<T> + Clone> Seqable for PersistentTreeSet<T, C> {
    type Item = T;
    type Seq = TreeSetSeq<T, C>;

    fn seq(&self) -> Option<TreeSetSeq<T, C>> {
        Self::seq(self)
    }
}

impl<T, C> Reducible for PersistentTreeSet<T, C> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        self.inner
            .try_reduce(init, |accumulator, entry| function(accumulator, &entry.key))
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize, C> serde::Serialize for PersistentTreeSet<T, C> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentTreeSet<T>
where
    T: serde::Deserialize<'de> + Clone + Ord,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let elements: Vec<T> = serde::Deserialize::deserialize(deserializer)?;
        Ok(elements.into_iter().collect())
    }
}

// =============================================================================
// Tests
// =============================================================================
