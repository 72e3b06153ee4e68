//! Persistent (immutable) hash set based on HAMT.
//!
//! This module provides [`PersistentHashSet`], an immutable hash set
//! that uses structural sharing for efficient operations.
//!
//! # Overview
//!
//! `PersistentHashSet` is implemented as a thin wrapper around
//! `PersistentHashMap<T, ()>`, so it inherits the flat array form for small
//! sets, the hash trie for large ones, and the transient builder.
//!
//! # Examples
//!
//! ```rust
//! use strata::persistent::PersistentHashSet;
//!
//! let set = PersistentHashSet::new()
//!     .insert(1)
//!     .insert(2)
//!     .insert(3);
//!
//! assert!(set.contains(&1));
//! assert_eq!(set.len(), 3);
//!
//! // Structural sharing: the original set is preserved
//! let updated = set.insert(4);
//! assert_eq!(set.len(), 3);      // Original unchanged
//! assert_eq!(updated.len(), 4);  // New version
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::iter::FromIterator;

use super::bits::hash_key;
use super::entry::MapEntry;
use super::error::Result;
use super::hashmap::{HashMapSeq, PersistentHashMap, PersistentHashMapIterator, TransientHashMap};
use crate::protocol::{
    Collection, Counted, Editable, Lookup, PersistentSet, Reducible, Seqable, Sequential, Step,
    TransientCollection, TransientSet, into,
};

// =============================================================================
// PersistentHashSet Definition
// =============================================================================

/// A persistent (immutable) hash set based on HAMT.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `contains`     | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `union`        | O(m log32 N)      |
///
/// # Examples
///
/// ```rust
/// use strata::persistent::PersistentHashSet;
///
/// let set: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
/// assert!(set.contains(&2));
/// assert!(!set.contains(&4));
/// ```
pub struct PersistentHashSet<T> {
    inner: PersistentHashMap<T, ()>,
}

impl<T> Clone for PersistentHashSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> PersistentHashSet<T> {
    /// Creates a new empty set.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: PersistentHashMap::new(),
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

    /// Returns an iterator over the elements of the set.
    #[must_use]
    pub fn iter(&self) -> PersistentHashSetIterator<'_, T> {
        PersistentHashSetIterator {
            inner: self.inner.iter(),
        }
    }

    /// Returns a sequence over the elements, or `None` for an empty set.
    #[must_use]
    pub fn seq(&self) -> Option<HashSetSeq<T>> {
        self.inner.seq().map(|inner| HashSetSeq { inner })
    }
}

impl<T: Clone + Hash + Eq> PersistentHashSet<T> {
    /// Creates a set containing a single element.
    #[inline]
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().insert(element)
    }

    /// Builds a set from elements, failing on the first repeated element.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`](crate::CollectionError::DuplicateKey)
    /// when an element occurs twice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashSet;
    ///
    /// assert!(PersistentHashSet::from_iter_checked([1, 2, 3]).is_ok());
    /// assert!(PersistentHashSet::from_iter_checked([1, 2, 1]).is_err());
    /// ```
    pub fn from_iter_checked<I>(elements: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
    {
        let inner = PersistentHashMap::from_entries_checked(
            elements.into_iter().map(|element| (element, ())),
        )?;
        Ok(Self { inner })
    }

    /// Returns `true` if the set contains the element.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    #[must_use]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(element)
    }

    /// Returns the stored element equal to `element`.
    #[must_use]
    pub fn get<Q>(&self, element: &Q) -> Option<&T>
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get_entry(element).map(MapEntry::key)
    }

    /// Inserts an element into the set.
    ///
    /// If the element already exists, returns an equal set.
    #[must_use]
    pub fn insert(&self, element: T) -> Self {
        Self {
            inner: self.inner.insert(element, ()),
        }
    }

    /// Inserts an element only if no equal element is present.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`](crate::CollectionError::DuplicateKey)
    /// when the element is already a member.
    pub fn try_insert(&self, element: T) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_insert(element, ())?,
        })
    }

    /// Removes an element from the set.
    #[must_use]
    pub fn remove<Q>(&self, element: &Q) -> Self
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        Self {
            inner: self.inner.remove(element),
        }
    }

    /// Returns the union of two sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3].into_iter().collect();
    ///
    /// let union = set_a.union(&set_b);
    ///
    /// assert_eq!(union.len(), 3);
    /// assert!(union.contains(&1));
    /// assert!(union.contains(&3));
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let (larger, smaller) = if self.len() >= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        into(larger, smaller)
    }

    /// Returns the intersection of two sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let intersection = set_a.intersection(&set_b);
    ///
    /// assert_eq!(intersection.len(), 2);
    /// assert!(intersection.contains(&2));
    /// assert!(intersection.contains(&3));
    /// ```
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        let transient = smaller.fold(TransientHashSet::new(), |mut transient, element| {
            if larger.contains(element) {
                transient.insert(element.clone());
            }
            transient
        });
        transient.persistent()
    }

    /// Returns the elements of `self` that are not in `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashSet;
    ///
    /// let set_a: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    /// let set_b: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
    ///
    /// let difference = set_a.difference(&set_b);
    ///
    /// assert_eq!(difference.len(), 1);
    /// assert!(difference.contains(&1));
    /// ```
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let transient = other.fold(self.transient(), |mut transient, element| {
            transient.remove(element);
            transient
        });
        transient.persistent()
    }

    /// Returns the elements in exactly one of the two sets.
    #[must_use]
    pub fn symmetric_difference(&self, other: &Self) -> Self {
        self.difference(other).union(&other.difference(self))
    }

    /// Returns `true` if every element of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|element| other.contains(element))
    }

    /// Returns `true` if every element of `other` is in `self`.
    #[must_use]
    pub fn is_superset(&self, other: &Self) -> bool {
        other.is_subset(self)
    }

    /// Returns `true` if the sets share no element.
    #[must_use]
    pub fn is_disjoint(&self, other: &Self) -> bool {
        let (smaller, larger) = if self.len() <= other.len() {
            (self, other)
        } else {
            (other, self)
        };
        !smaller.iter().any(|element| larger.contains(element))
    }

    /// Returns a transient set sharing this set's structure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashSet;
    ///
    /// let persistent: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
    ///
    /// let mut transient = persistent.transient();
    /// transient.insert(4);
    /// transient.remove(&1);
    ///
    /// let updated = transient.persistent();
    /// assert_eq!(updated.len(), 3);
    /// assert!(!updated.contains(&1));
    /// assert!(persistent.contains(&1));
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientHashSet<T> {
        TransientHashSet {
            inner: self.inner.transient(),
        }
    }

    /// Verifies the underlying trie's invariants.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvariantViolation`](crate::CollectionError::InvariantViolation)
    /// describing the first broken invariant.
    pub fn check_invariants(&self) -> Result<()> {
        self.inner.check_invariants()
    }
}

// =============================================================================
// TransientHashSet Definition
// =============================================================================

/// A mutable builder for [`PersistentHashSet`].
///
/// Like [`TransientHashMap`], it is neither `Send` nor `Sync` and is consumed
/// by [`persistent`](Self::persistent).
pub struct TransientHashSet<T> {
    inner: TransientHashMap<T, ()>,
}

static_assertions::assert_not_impl_any!(TransientHashSet<i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientHashSet<String>: Send, Sync);

impl<T> TransientHashSet<T> {
    /// Creates an empty transient set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: TransientHashMap::new(),
        }
    }

    /// Returns the number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Seals the transient into a persistent set in O(1).
    #[must_use]
    pub fn persistent(self) -> PersistentHashSet<T> {
        PersistentHashSet {
            inner: self.inner.persistent(),
        }
    }
}

impl<T: Clone + Hash + Eq> TransientHashSet<T> {
    /// Returns `true` if the set contains the element.
    #[must_use]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains_key(element)
    }

    /// Inserts an element, returning `true` if it was not already present.
    pub fn insert(&mut self, element: T) -> bool {
        self.inner.insert(element, ()).is_none()
    }

    /// Removes an element, returning `true` if it was present.
    pub fn remove<Q>(&mut self, element: &Q) -> bool
    where
        T: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.remove(element).is_some()
    }
}

impl<T> Default for TransientHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Hash + Eq> Extend<T> for TransientHashSet<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.insert(element);
        }
    }
}

// =============================================================================
// HashSetSeq
// =============================================================================

/// A persistent sequence over the elements of a [`PersistentHashSet`].
pub struct HashSetSeq<T> {
    inner: HashMapSeq<T, ()>,
}

impl<T> Clone for HashSetSeq<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Sequential for HashSetSeq<T> {
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

impl<T> Counted for HashSetSeq<T> {
    fn count(&self) -> usize {
        self.inner.count()
    }
}

impl<T: Clone> Reducible for HashSetSeq<T> {
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
// Iterator Implementation
// =============================================================================

/// An iterator over elements of a [`PersistentHashSet`].
pub struct PersistentHashSetIterator<'a, T> {
    inner: PersistentHashMapIterator<'a, T, ()>,
}

impl<'a, T> Iterator for PersistentHashSetIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(element, _)| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for PersistentHashSetIterator<'_, T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentHashSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Hash + Eq> FromIterator<T> for PersistentHashSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut transient = TransientHashSet::new();
        transient.extend(iter);
        transient.persistent()
    }
}

impl<'a, T> IntoIterator for &'a PersistentHashSet<T> {
    type Item = &'a T;
    type IntoIter = PersistentHashSetIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Clone + Hash + Eq> PartialEq for PersistentHashSet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset(other)
    }
}

impl<T: Clone + Hash + Eq> Eq for PersistentHashSet<T> {}

impl<T: Clone + Hash + Eq> Hash for PersistentHashSet<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        self.iter()
            .fold(0u32, |sum, element| sum.wrapping_add(hash_key(element)))
            .hash(state);
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentHashSet<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentHashSet<T> {
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

impl<T> Counted for PersistentHashSet<T> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<T: Clone + Hash + Eq> Lookup for PersistentHashSet<T> {
    type Key = T;
    type Value = T;

    fn lookup(&self, element: &T) -> Option<&T> {
        self.get(element)
    }
}

impl<T: Clone + Hash + Eq> PersistentSet for PersistentHashSet<T> {
    type Item = T;

    fn contains(&self, element: &T) -> bool {
        Self::contains(self, element)
    }

    fn disjoin(&self, element: &T) -> Self {
        self.remove(element)
    }
}

impl<T: Clone + Hash + Eq> Collection for PersistentHashSet<T> {
    type Item = T;

    fn conj(&self, element: T) -> Self {
        self.insert(element)
    }

    fn empty(&self) -> Self {
        Self::new()
    }
}

impl<T: Clone> Seqable for PersistentHashSet<T> {
    type Item = T;
    type Seq = HashSetSeq<T>;

    fn seq(&self) -> Option<HashSetSeq<T>> {
        Self::seq(self)
    }
}

impl<T> Reducible for PersistentHashSet<T> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        self.inner
            .try_reduce(init, |accumulator, entry| function(accumulator, &entry.key))
    }
}

impl<T: Clone + Hash + Eq> Editable for PersistentHashSet<T> {
    type Transient = TransientHashSet<T>;

    fn as_transient(&self) -> TransientHashSet<T> {
        self.transient()
    }
}

impl<T> Counted for TransientHashSet<T> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<T: Clone + Hash + Eq> TransientCollection for TransientHashSet<T> {
    type Item = T;
    type Persistent = PersistentHashSet<T>;

    fn conj(&mut self, element: T) {
        self.insert(element);
    }

    fn persistent(self) -> PersistentHashSet<T> {
        Self::persistent(self)
    }
}

impl<T: Clone + Hash + Eq> TransientSet for TransientHashSet<T> {
    fn disjoin(&mut self, element: &T) -> bool {
        self.remove(element)
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentHashSet<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(feature = "serde")]
struct PersistentHashSetVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentHashSetVisitor<T>
where
    T: serde::Deserialize<'de> + Clone + Hash + Eq,
{
    type Value = PersistentHashSet<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut transient = TransientHashSet::new();
        while let Some(element) = seq.next_element()? {
            transient.insert(element);
        }
        Ok(transient.persistent())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentHashSet<T>
where
    T: serde::Deserialize<'de> + Clone + Hash + Eq,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentHashSetVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn set_of(elements: &[i32]) -> PersistentHashSet<i32> {
        elements.iter().copied().collect()
    }

    #[rstest]
    fn test_insert_existing_keeps_len() {
        let set = set_of(&[1, 2, 3]);
        assert_eq!(set.insert(2).len(), 3);
    }

    #[rstest]
    #[case(&[1, 2, 3], &[2, 3, 4], &[1, 2, 3, 4])]
    #[case(&[], &[5], &[5])]
    fn test_union(#[case] left: &[i32], #[case] right: &[i32], #[case] expected: &[i32]) {
        assert_eq!(set_of(left).union(&set_of(right)), set_of(expected));
    }

    #[rstest]
    fn test_difference_and_symmetric_difference() {
        let left = set_of(&[1, 2, 3]);
        let right = set_of(&[2, 3, 4]);
        assert_eq!(left.difference(&right), set_of(&[1]));
        assert_eq!(left.symmetric_difference(&right), set_of(&[1, 4]));
    }

    #[rstest]
    fn test_subset_superset_disjoint() {
        let small = set_of(&[1, 2]);
        let large = set_of(&[1, 2, 3]);
        assert!(small.is_subset(&large));
        assert!(large.is_superset(&small));
        assert!(!large.is_subset(&small));
        assert!(small.is_disjoint(&set_of(&[7, 8])));
    }

    #[rstest]
    fn test_large_set_round_trips_through_trie() {
        let set: PersistentHashSet<i32> = (0..5000).collect();
        assert_eq!(set.len(), 5000);
        assert_eq!(set.check_invariants(), Ok(()));
        let evens = (0..5000).step_by(2).fold(set, |set, element| set.remove(&element));
        assert_eq!(evens.len(), 2500);
        assert!(evens.contains(&1));
        assert!(!evens.contains(&2));
    }

    #[rstest]
    fn test_seq_yields_members() {
        let set = set_of(&[4, 5, 6]);
        let mut members: Vec<i32> = set.seq().unwrap().iter().collect();
        members.sort_unstable();
        assert_eq!(members, vec![4, 5, 6]);
    }

    #[rstest]
    fn test_display_uses_set_literal() {
        assert_eq!(format!("{}", set_of(&[9])), "#{9}");
    }
}
