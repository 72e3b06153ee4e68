//! Persistent (immutable) hash map based on HAMT.
//!
//! This module provides [`PersistentHashMap`], an immutable hash map
//! that uses structural sharing for efficient operations, and
//! [`TransientHashMap`], its single-owner builder.
//!
//! # Overview
//!
//! A map starts out as a flat array of entries searched linearly by key
//! equality. Once it would exceed [`ARRAY_MAP_THRESHOLD`] entries it is
//! promoted, once, to a Hash Array Mapped Trie: a 32-way branching trie
//! where successive five-bit fragments of the key's hash select the path.
//!
//! - O(log32 N) get (effectively O(1) for practical sizes)
//! - O(log32 N) insert
//! - O(log32 N) remove
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use strata::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2)
//!     .insert("three".to_string(), 3);
//!
//! assert_eq!(map.get("one"), Some(&1));
//! assert_eq!(map.get("two"), Some(&2));
//! assert_eq!(map.get("three"), Some(&3));
//!
//! // Structural sharing: the original map is preserved
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::iter::FromIterator;
use std::marker::PhantomData;
use std::mem;
use std::rc::Rc;

use smallvec::{SmallVec, smallvec};

use super::ReferenceCounter;
use super::bits::hash_key;
use super::entry::MapEntry;
use super::error::{CollectionError, Result};
use super::hamt::{Node, NodeRef, Slot};
use crate::protocol::{
    Associative, Collection, Counted, Editable, Lookup, PersistentMap, Reducible, Seqable,
    Sequential, Step, TransientAssociative, TransientCollection, TransientMap, array_reduce,
    into, seq_reduce,
};

// =============================================================================
// Constants
// =============================================================================

/// Largest number of entries a map holds in its flat array form.
///
/// Inserting a new key into a flat map that already holds this many entries
/// promotes it to the hash trie.
pub const ARRAY_MAP_THRESHOLD: usize = 16;

// =============================================================================
// Shared Representation
// =============================================================================

enum Repr<K, V> {
    Flat(ReferenceCounter<Vec<MapEntry<K, V>>>),
    Trie(NodeRef<K, V>),
}

impl<K, V> Clone for Repr<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Flat(entries) => Self::Flat(entries.clone()),
            Self::Trie(root) => Self::Trie(root.clone()),
        }
    }
}

/// State shared by the persistent map and its transient.
///
/// Every write goes through `make_mut`, so writing to a clone of a
/// persistent map copies exactly the touched path, and writing through a
/// transient copies each shared node at most once.
struct MapCore<K, V> {
    repr: Repr<K, V>,
    length: usize,
}

impl<K, V> Clone for MapCore<K, V> {
    fn clone(&self) -> Self {
        Self {
            repr: self.repr.clone(),
            length: self.length,
        }
    }
}

impl<K, V> MapCore<K, V> {
    fn new() -> Self {
        Self {
            repr: Repr::Flat(ReferenceCounter::new(Vec::new())),
            length: 0,
        }
    }

    fn get_entry<Q>(&self, key: &Q) -> Option<&MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match &self.repr {
            Repr::Flat(entries) => entries.iter().find(|entry| entry.key.borrow() == key),
            Repr::Trie(root) => root.find(0, hash_key(key), key),
        }
    }

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        match &self.repr {
            Repr::Flat(entries) => array_reduce(entries, init, function),
            Repr::Trie(root) => root.try_reduce(init, &mut function),
        }
    }

    const fn is_flat(&self) -> bool {
        matches!(self.repr, Repr::Flat(_))
    }
}

impl<K: Clone + Hash + Eq, V: Clone> MapCore<K, V> {
    fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Repr::Flat(entries) = &mut self.repr {
            if let Some(position) = entries.iter().position(|entry| entry.key == key) {
                let entries = ReferenceCounter::make_mut(entries);
                return Some(mem::replace(&mut entries[position].value, value));
            }
            if entries.len() < ARRAY_MAP_THRESHOLD {
                ReferenceCounter::make_mut(entries).push(MapEntry::new(key, value));
                self.length += 1;
                return None;
            }
            self.promote();
        }
        let Repr::Trie(root) = &mut self.repr else {
            return None;
        };
        let previous = Node::assoc(root, 0, hash_key(&key), key, value);
        if previous.is_none() {
            self.length += 1;
        }
        previous
    }

    fn remove<Q>(&mut self, key: &Q) -> Option<MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let removed = match &mut self.repr {
            Repr::Flat(entries) => {
                let position = entries.iter().position(|entry| entry.key.borrow() == key)?;
                ReferenceCounter::make_mut(entries).remove(position)
            }
            Repr::Trie(root) => {
                let hash = hash_key(key);
                root.find(0, hash, key)?;
                Node::without(root, 0, hash, key)?
            }
        };
        self.length -= 1;
        Some(removed)
    }

    /// Replaces the flat array with a hash trie holding the same entries.
    fn promote(&mut self) {
        let previous = mem::replace(
            &mut self.repr,
            Repr::Trie(ReferenceCounter::new(Node::empty())),
        );
        if let (Repr::Flat(entries), Repr::Trie(root)) = (previous, &mut self.repr) {
            let count = entries.len();
            for entry in ReferenceCounter::unwrap_or_clone(entries) {
                Node::assoc(root, 0, hash_key(&entry.key), entry.key, entry.value);
            }
            tracing::debug!(entries = count, "array map promoted to hash trie");
        }
    }
}

// =============================================================================
// PersistentHashMap Definition
// =============================================================================

/// A persistent (immutable) hash map based on HAMT.
///
/// `PersistentHashMap` is an immutable data structure that uses structural
/// sharing to efficiently support functional programming patterns. Small
/// maps are stored as a flat array of entries; see [`is_flat`](Self::is_flat).
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log32 N)        |
/// | `insert`       | O(log32 N)        |
/// | `remove`       | O(log32 N)        |
/// | `contains_key` | O(log32 N)        |
/// | `len`          | O(1)              |
/// | `transient`    | O(1)              |
///
/// # Examples
///
/// ```rust
/// use strata::persistent::PersistentHashMap;
///
/// let map = PersistentHashMap::singleton("key".to_string(), 42);
/// assert_eq!(map.get("key"), Some(&42));
/// ```
pub struct PersistentHashMap<K, V> {
    core: MapCore<K, V>,
}

impl<K, V> Clone for PersistentHashMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<K, V> PersistentHashMap<K, V> {
    /// Creates a new empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let map: PersistentHashMap<String, i32> = PersistentHashMap::new();
    /// assert!(map.is_empty());
    /// assert!(map.is_flat());
    /// ```
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: MapCore::new(),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.core.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.core.length == 0
    }

    /// Returns `true` while the map is still in its flat array form.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::{ARRAY_MAP_THRESHOLD, PersistentHashMap};
    ///
    /// let small: PersistentHashMap<usize, usize> =
    ///     (0..ARRAY_MAP_THRESHOLD).map(|key| (key, key)).collect();
    /// assert!(small.is_flat());
    ///
    /// let large = small.insert(ARRAY_MAP_THRESHOLD, 0);
    /// assert!(!large.is_flat());
    /// ```
    #[inline]
    #[must_use]
    pub const fn is_flat(&self) -> bool {
        self.core.is_flat()
    }

    /// Returns an iterator over borrowed key-value pairs.
    ///
    /// The order is unspecified but stable for a given map value.
    #[must_use]
    pub fn iter(&self) -> PersistentHashMapIterator<'_, K, V> {
        PersistentHashMapIterator::new(&self.core)
    }

    /// Returns an iterator over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values.
    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, value)| value)
    }

    /// Returns a sequence over the entries, or `None` for an empty map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let map = PersistentHashMap::new().insert("a", 1);
    /// let seq = map.seq().unwrap();
    /// assert_eq!(seq.first().map(|entry| *entry.value()), Some(1));
    /// assert!(seq.next().is_none());
    /// ```
    #[must_use]
    pub fn seq(&self) -> Option<HashMapSeq<K, V>> {
        HashMapSeq::new(&self.core)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> PersistentHashMap<K, V> {
    /// Creates a map containing a single key-value pair.
    #[inline]
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self {
        Self::new().insert(key, value)
    }

    /// Builds a map by pairing `keys` with `values` positionally.
    ///
    /// Pairing stops at the end of the shorter input. Later duplicates of a
    /// key overwrite earlier ones.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::from_keys_values(["a", "b"], [1, 2]);
    /// assert_eq!(map.get("b"), Some(&2));
    /// ```
    #[must_use]
    pub fn from_keys_values<KI, VI>(keys: KI, values: VI) -> Self
    where
        KI: IntoIterator<Item = K>,
        VI: IntoIterator<Item = V>,
    {
        let mut transient = TransientHashMap::new();
        for (key, value) in keys.into_iter().zip(values) {
            transient.insert(key, value);
        }
        transient.persistent()
    }

    /// Builds a map from entries, failing on the first repeated key.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] when a key occurs twice.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::{CollectionError, PersistentHashMap};
    ///
    /// let result = PersistentHashMap::from_entries_checked([("a", 1), ("a", 2)]);
    /// assert!(matches!(result, Err(CollectionError::DuplicateKey { .. })));
    /// ```
    pub fn from_entries_checked<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut transient = TransientHashMap::new();
        for (key, value) in entries {
            transient.try_insert(key, value)?;
        }
        Ok(transient.persistent())
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but `Hash` and
    /// `Eq` on the borrowed form must match those for the key type.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new()
    ///     .insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.get_entry(key).map(|entry| &entry.value)
    }

    /// Returns the value for `key`, or `default` when absent.
    #[must_use]
    pub fn get_or<'a, Q>(&'a self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key).unwrap_or(default)
    }

    /// Returns the stored entry for `key`.
    #[must_use]
    pub fn get_entry<Q>(&self, key: &Q) -> Option<&MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.get_entry(key)
    }

    /// Returns `true` if the map contains a value for the specified key.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.get_entry(key).is_some()
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map already contains the key, the value is replaced.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let map1 = PersistentHashMap::new().insert("key".to_string(), 1);
    /// let map2 = map1.insert("key".to_string(), 2);
    ///
    /// assert_eq!(map1.get("key"), Some(&1)); // Original unchanged
    /// assert_eq!(map2.get("key"), Some(&2)); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let mut core = self.core.clone();
        core.insert(key, value);
        Self { core }
    }

    /// Inserts a key-value pair only if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] when the key is present.
    pub fn try_insert(&self, key: K, value: V) -> Result<Self> {
        if self.contains_key(&key) {
            return Err(CollectionError::DuplicateKey {
                operation: "try_insert",
            });
        }
        Ok(self.insert(key, value))
    }

    /// Removes a key from the map.
    ///
    /// Removing an absent key returns a map equal to this one without
    /// copying any nodes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert("a", 1).insert("b", 2);
    /// let removed = map.remove("a");
    /// assert_eq!(removed.len(), 1);
    /// assert_eq!(map.len(), 2);
    /// assert_eq!(removed.remove("zzz"), removed);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.contains_key(key) {
            return self.clone();
        }
        let mut core = self.core.clone();
        core.remove(key);
        Self { core }
    }

    /// Replaces the value for `key` with `function` applied to the current
    /// value, or to `None` when absent.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let counts = PersistentHashMap::new().insert("a", 1);
    /// let counts = counts
    ///     .update_with("a", |count| count.map_or(1, |count| count + 1))
    ///     .update_with("b", |count| count.map_or(1, |count| count + 1));
    /// assert_eq!(counts.get("a"), Some(&2));
    /// assert_eq!(counts.get("b"), Some(&1));
    /// ```
    #[must_use]
    pub fn update_with<F>(&self, key: K, function: F) -> Self
    where
        F: FnOnce(Option<&V>) -> V,
    {
        let value = function(self.get(&key));
        self.insert(key, value)
    }

    /// Returns a map holding the entries of both maps; `other` wins on
    /// conflicting keys.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        if self.is_empty() {
            return other.clone();
        }
        into(self, other)
    }

    /// Returns a map holding the entries of both maps, combining the values
    /// of keys present in both with `function(self_value, other_value)`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let left = PersistentHashMap::new().insert("a", 1).insert("b", 2);
    /// let right = PersistentHashMap::new().insert("b", 10).insert("c", 3);
    /// let merged = left.merge_with(&right, |x, y| x + y);
    /// assert_eq!(merged.get("b"), Some(&12));
    /// assert_eq!(merged.len(), 3);
    /// ```
    #[must_use]
    pub fn merge_with<F>(&self, other: &Self, mut function: F) -> Self
    where
        F: FnMut(&V, &V) -> V,
    {
        let transient = other.fold(self.transient(), |mut transient, entry| {
            let value = match transient.get(&entry.key) {
                Some(existing) => function(existing, &entry.value),
                None => entry.value.clone(),
            };
            transient.insert(entry.key.clone(), value);
            transient
        });
        transient.persistent()
    }

    /// Returns a transient map sharing this map's structure.
    ///
    /// # Complexity
    ///
    /// O(1)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentHashMap;
    ///
    /// let map = PersistentHashMap::new().insert(0, "zero");
    /// let mut transient = map.transient();
    /// for key in 1..100 {
    ///     transient.insert(key, "many");
    /// }
    /// let built = transient.persistent();
    /// assert_eq!(built.len(), 100);
    /// assert_eq!(map.len(), 1);
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientHashMap<K, V> {
        TransientHashMap {
            core: self.core.clone(),
            _marker: PhantomData,
        }
    }

    /// Verifies the trie's structural invariants and the cached count.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvariantViolation`] describing the first
    /// broken invariant.
    pub fn check_invariants(&self) -> Result<()> {
        let counted = match &self.core.repr {
            Repr::Flat(entries) => {
                if entries.len() > ARRAY_MAP_THRESHOLD {
                    return Err(CollectionError::InvariantViolation(format!(
                        "flat map holds {} entries",
                        entries.len()
                    )));
                }
                entries.len()
            }
            Repr::Trie(root) => root.check_invariants(0, 0)?,
        };
        if counted == self.core.length {
            Ok(())
        } else {
            Err(CollectionError::InvariantViolation(format!(
                "map records {} entries but holds {counted}",
                self.core.length
            )))
        }
    }
}

// =============================================================================
// TransientHashMap Definition
// =============================================================================

/// A mutable builder for [`PersistentHashMap`].
///
/// The transient shares structure with the map it came from and copies each
/// shared node at most once, on first write. [`persistent`](Self::persistent)
/// consumes the transient, so it cannot be used after sealing. Transients are
/// neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```rust
/// use strata::persistent::TransientHashMap;
///
/// let mut transient = TransientHashMap::new();
/// transient.insert("a", 1);
/// transient.insert("b", 2);
/// assert_eq!(transient.remove("a"), Some(1));
/// let map = transient.persistent();
/// assert_eq!(map.len(), 1);
/// ```
pub struct TransientHashMap<K, V> {
    core: MapCore<K, V>,
    /// Marker to ensure `!Send` and `!Sync`.
    _marker: PhantomData<Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientHashMap<i32, i32>: Send, Sync);
static_assertions::assert_not_impl_any!(TransientHashMap<String, String>: Send, Sync);

impl<K, V> TransientHashMap<K, V> {
    /// Creates an empty transient map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            core: MapCore::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.core.length
    }

    /// Returns `true` if there are no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.core.length == 0
    }

    /// Seals the transient into a persistent map in O(1).
    #[must_use]
    pub fn persistent(self) -> PersistentHashMap<K, V> {
        tracing::trace!(entries = self.core.length, "transient hash map sealed");
        PersistentHashMap { core: self.core }
    }
}

impl<K: Clone + Hash + Eq, V: Clone> TransientHashMap<K, V> {
    /// Returns the value for `key`.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.get_entry(key).map(|entry| &entry.value)
    }

    /// Returns `true` if `key` is present.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.get_entry(key).is_some()
    }

    /// Inserts in place, returning the previous value for `key`.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        self.core.insert(key, value)
    }

    /// Inserts in place only if `key` is absent.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::DuplicateKey`] when the key is present.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<()> {
        if self.contains_key(&key) {
            return Err(CollectionError::DuplicateKey {
                operation: "try_insert",
            });
        }
        self.core.insert(key, value);
        Ok(())
    }

    /// Removes `key` in place, returning its value.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.core.remove(key).map(|entry| entry.value)
    }
}

impl<K, V> Default for TransientHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// HashMapSeq
// =============================================================================

enum SeqFrame<K, V> {
    Flat(ReferenceCounter<Vec<MapEntry<K, V>>>, usize),
    Node(NodeRef<K, V>, usize),
}

impl<K, V> Clone for SeqFrame<K, V> {
    fn clone(&self) -> Self {
        match self {
            Self::Flat(entries, position) => Self::Flat(entries.clone(), *position),
            Self::Node(node, position) => Self::Node(node.clone(), *position),
        }
    }
}

/// A persistent sequence over the entries of a [`PersistentHashMap`].
///
/// The sequence holds a stack of trie positions, so `rest` is O(1)
/// amortized and never copies entries. Flat maps and collision nodes are
/// exposed as chunks.
pub struct HashMapSeq<K, V> {
    frames: SmallVec<[SeqFrame<K, V>; 8]>,
    remaining: usize,
}

impl<K, V> Clone for HashMapSeq<K, V> {
    fn clone(&self) -> Self {
        Self {
            frames: self.frames.clone(),
            remaining: self.remaining,
        }
    }
}

impl<K, V> HashMapSeq<K, V> {
    fn new(core: &MapCore<K, V>) -> Option<Self> {
        if core.length == 0 {
            return None;
        }
        let frame = match &core.repr {
            Repr::Flat(entries) => SeqFrame::Flat(entries.clone(), 0),
            Repr::Trie(root) => SeqFrame::Node(root.clone(), 0),
        };
        let mut seq = Self {
            frames: smallvec![frame],
            remaining: core.length,
        };
        seq.settle();
        Some(seq)
    }

    /// Moves the top frame onto the next entry, descending into children
    /// and discarding exhausted frames.
    fn settle(&mut self) {
        loop {
            let Some(top) = self.frames.last_mut() else {
                return;
            };
            let descend = match top {
                SeqFrame::Flat(entries, position) => {
                    if *position < entries.len() {
                        return;
                    }
                    None
                }
                SeqFrame::Node(node, position) => match node.as_ref() {
                    Node::Bitmap(bitmap_node) => match bitmap_node.slots.get(*position) {
                        Some(Slot::Entry(_)) => return,
                        Some(Slot::Child(child)) => {
                            let child = child.clone();
                            *position += 1;
                            Some(child)
                        }
                        None => None,
                    },
                    Node::Array(array_node) => match array_node.children.get(*position) {
                        Some(slot) => {
                            let slot = slot.clone();
                            *position += 1;
                            match slot {
                                Some(child) => Some(child),
                                None => continue,
                            }
                        }
                        None => None,
                    },
                    Node::Collision(collision_node) => {
                        if *position < collision_node.entries.len() {
                            return;
                        }
                        None
                    }
                },
            };
            match descend {
                Some(child) => self.frames.push(SeqFrame::Node(child, 0)),
                None => {
                    self.frames.pop();
                }
            }
        }
    }

    fn advanced_by(&self, steps: usize) -> Self {
        let mut next = self.clone();
        if let Some(SeqFrame::Flat(_, position) | SeqFrame::Node(_, position)) =
            next.frames.last_mut()
        {
            *position += steps;
        }
        next.remaining = next.remaining.saturating_sub(steps);
        next.settle();
        next
    }
}

impl<K: Clone, V: Clone> Sequential for HashMapSeq<K, V> {
    type Item = MapEntry<K, V>;

    fn first(&self) -> Option<&MapEntry<K, V>> {
        match self.frames.last()? {
            SeqFrame::Flat(entries, position) => entries.get(*position),
            SeqFrame::Node(node, position) => match node.as_ref() {
                Node::Bitmap(bitmap_node) => match bitmap_node.slots.get(*position)? {
                    Slot::Entry(entry) => Some(entry),
                    Slot::Child(_) => None,
                },
                Node::Collision(collision_node) => collision_node.entries.get(*position),
                Node::Array(_) => None,
            },
        }
    }

    fn rest(&self) -> Self {
        if self.frames.is_empty() {
            return self.clone();
        }
        self.advanced_by(1)
    }

    fn chunked_first(&self) -> Option<&[MapEntry<K, V>]> {
        match self.frames.last()? {
            SeqFrame::Flat(entries, position) => entries.get(*position..),
            SeqFrame::Node(node, position) => match node.as_ref() {
                Node::Collision(collision_node) => collision_node.entries.get(*position..),
                Node::Bitmap(_) | Node::Array(_) => None,
            },
        }
    }

    fn chunked_rest(&self) -> Self {
        match self.chunked_first() {
            Some(chunk) => self.advanced_by(chunk.len()),
            None => self.rest(),
        }
    }
}

impl<K, V> Counted for HashMapSeq<K, V> {
    fn count(&self) -> usize {
        self.remaining
    }
}

impl<K: Clone, V: Clone> Reducible for HashMapSeq<K, V> {
    type Item = MapEntry<K, V>;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        seq_reduce(Some(self.clone()), init, function)
    }
}

impl<K: fmt::Debug + Clone, V: fmt::Debug + Clone> fmt::Debug for HashMapSeq<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentHashMap`].
pub struct PersistentHashMapIterator<'a, K, V> {
    flat: std::slice::Iter<'a, MapEntry<K, V>>,
    stack: SmallVec<[(&'a Node<K, V>, usize); 8]>,
    remaining: usize,
}

impl<'a, K, V> PersistentHashMapIterator<'a, K, V> {
    fn new(core: &'a MapCore<K, V>) -> Self {
        match &core.repr {
            Repr::Flat(entries) => Self {
                flat: entries.iter(),
                stack: SmallVec::new(),
                remaining: core.length,
            },
            Repr::Trie(root) => Self {
                flat: Default::default(),
                stack: smallvec![(root.as_ref(), 0)],
                remaining: core.length,
            },
        }
    }

    fn yielding(&mut self, entry: &'a MapEntry<K, V>) -> Option<(&'a K, &'a V)> {
        self.remaining = self.remaining.saturating_sub(1);
        Some(entry.as_pair())
    }
}

impl<'a, K, V> Iterator for PersistentHashMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.flat.next() {
            return self.yielding(entry);
        }
        loop {
            let (node, position) = self.stack.last_mut()?;
            let node: &'a Node<K, V> = *node;
            let current = *position;
            *position += 1;
            match node {
                Node::Bitmap(bitmap_node) => match bitmap_node.slots.get(current) {
                    Some(Slot::Entry(entry)) => return self.yielding(entry),
                    Some(Slot::Child(child)) => self.stack.push((child.as_ref(), 0)),
                    None => {
                        self.stack.pop();
                    }
                },
                Node::Array(array_node) => match array_node.children.get(current) {
                    Some(Some(child)) => self.stack.push((child.as_ref(), 0)),
                    Some(None) => {}
                    None => {
                        self.stack.pop();
                    }
                },
                Node::Collision(collision_node) => match collision_node.entries.get(current) {
                    Some(entry) => return self.yielding(entry),
                    None => {
                        self.stack.pop();
                    }
                },
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentHashMapIterator<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

/// An owning iterator over key-value pairs of a [`PersistentHashMap`].
pub struct PersistentHashMapIntoIterator<K, V> {
    seq: Option<HashMapSeq<K, V>>,
}

impl<K: Clone, V: Clone> Iterator for PersistentHashMapIntoIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let seq = self.seq.take()?;
        let pair = seq.first()?.clone().into_pair();
        self.seq = seq.next();
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.seq.as_ref().map_or(0, Counted::count);
        (remaining, Some(remaining))
    }
}

impl<K: Clone, V: Clone> ExactSizeIterator for PersistentHashMapIntoIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentHashMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> FromIterator<(K, V)> for PersistentHashMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut transient = TransientHashMap::new();
        for (key, value) in iter {
            transient.insert(key, value);
        }
        transient.persistent()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Extend<(K, V)> for TransientHashMap<K, V> {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K: Clone, V: Clone> IntoIterator for PersistentHashMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentHashMapIntoIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        PersistentHashMapIntoIterator { seq: self.seq() }
    }
}

impl<'a, K, V> IntoIterator for &'a PersistentHashMap<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentHashMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Clone + Hash + Eq, V: Clone + PartialEq> PartialEq for PersistentHashMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.iter()
            .all(|(key, value)| other.get(key).is_some_and(|other_value| other_value == value))
    }
}

impl<K: Clone + Hash + Eq, V: Clone + Eq> Eq for PersistentHashMap<K, V> {}

/// Entry hashes are summed, so the result ignores trie layout.
impl<K: Clone + Hash + Eq, V: Clone + Hash + Eq> Hash for PersistentHashMap<K, V> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        self.iter()
            .fold(0u32, |sum, entry| sum.wrapping_add(hash_key(&entry)))
            .hash(state);
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for PersistentHashMap<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Protocol Implementations
// =============================================================================

impl<K, V> Counted for PersistentHashMap<K, V> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Lookup for PersistentHashMap<K, V> {
    type Key = K;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Associative for PersistentHashMap<K, V> {
    fn contains_key(&self, key: &K) -> bool {
        self.core.get_entry(key).is_some()
    }

    fn assoc(&self, key: K, value: V) -> Result<Self> {
        Ok(self.insert(key, value))
    }
}

impl<K: Clone + Hash + Eq, V: Clone> PersistentMap for PersistentHashMap<K, V> {
    fn dissoc(&self, key: &K) -> Self {
        self.remove(key)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Collection for PersistentHashMap<K, V> {
    type Item = MapEntry<K, V>;

    fn conj(&self, entry: MapEntry<K, V>) -> Self {
        self.insert(entry.key, entry.value)
    }

    fn empty(&self) -> Self {
        Self::new()
    }
}

impl<K: Clone, V: Clone> Seqable for PersistentHashMap<K, V> {
    type Item = MapEntry<K, V>;
    type Seq = HashMapSeq<K, V>;

    fn seq(&self) -> Option<HashMapSeq<K, V>> {
        Self::seq(self)
    }
}

impl<K, V> Reducible for PersistentHashMap<K, V> {
    type Item = MapEntry<K, V>;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        self.core.try_reduce(init, function)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Editable for PersistentHashMap<K, V> {
    type Transient = TransientHashMap<K, V>;

    fn as_transient(&self) -> TransientHashMap<K, V> {
        self.transient()
    }
}

impl<K, V> Counted for TransientHashMap<K, V> {
    fn count(&self) -> usize {
        self.len()
    }
}

impl<K: Clone + Hash + Eq, V: Clone> Lookup for TransientHashMap<K, V> {
    type Key = K;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }
}

impl<K, V> Reducible for TransientHashMap<K, V> {
    type Item = MapEntry<K, V>;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        self.core.try_reduce(init, function)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> TransientCollection for TransientHashMap<K, V> {
    type Item = MapEntry<K, V>;
    type Persistent = PersistentHashMap<K, V>;

    fn conj(&mut self, entry: MapEntry<K, V>) {
        self.insert(entry.key, entry.value);
    }

    fn persistent(self) -> PersistentHashMap<K, V> {
        Self::persistent(self)
    }
}

impl<K: Clone + Hash + Eq, V: Clone> TransientAssociative for TransientHashMap<K, V> {
    type Key = K;
    type Value = V;

    fn assoc(&mut self, key: K, value: V) -> Result<()> {
        self.insert(key, value);
        Ok(())
    }
}

impl<K: Clone + Hash + Eq, V: Clone> TransientMap for TransientHashMap<K, V> {
    fn dissoc(&mut self, key: &K) -> Option<V> {
        self.remove(key)
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentHashMap<K, V>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_map(self.iter())
    }
}

#[cfg(feature = "serde")]
struct PersistentHashMapVisitor<K, V> {
    marker: PhantomData<(K, V)>,
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentHashMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentHashMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut transient = TransientHashMap::new();
        while let Some((key, value)) = access.next_entry()? {
            transient.insert(key, value);
        }
        Ok(transient.persistent())
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentHashMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Hash + Eq,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentHashMapVisitor {
            marker: PhantomData,
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
    use std::ops::ControlFlow;

    fn map_of(range: std::ops::Range<i32>) -> PersistentHashMap<i32, i32> {
        range.map(|key| (key, key * 10)).collect()
    }

    #[rstest]
    fn test_new_creates_empty_flat_map() {
        let map: PersistentHashMap<i32, i32> = PersistentHashMap::new();
        assert!(map.is_empty());
        assert!(map.is_flat());
        assert!(map.seq().is_none());
    }

    #[rstest]
    fn test_flat_map_promotes_once_past_threshold() {
        let flat = map_of(0..16);
        assert!(flat.is_flat());
        let promoted = flat.insert(16, 160);
        assert!(!promoted.is_flat());
        assert!(flat.is_flat());
        for key in 0..17 {
            assert_eq!(promoted.get(&key), Some(&(key * 10)));
        }
        assert_eq!(promoted.check_invariants(), Ok(()));
    }

    #[rstest]
    fn test_replacing_in_full_flat_map_does_not_promote() {
        let flat = map_of(0..16);
        let replaced = flat.insert(3, 333);
        assert!(replaced.is_flat());
        assert_eq!(replaced.get(&3), Some(&333));
        assert_eq!(replaced.len(), 16);
    }

    #[rstest]
    fn test_removal_keeps_trie_form() {
        let map = map_of(0..40);
        let shrunk = (0..39).fold(map, |map, key| map.remove(&key));
        assert_eq!(shrunk.len(), 1);
        assert!(!shrunk.is_flat());
        assert_eq!(shrunk.get(&39), Some(&390));
        assert_eq!(shrunk.check_invariants(), Ok(()));
    }

    #[rstest]
    fn test_remove_absent_key_shares_structure() {
        let map = map_of(0..100);
        let same = map.remove(&1000);
        assert_eq!(same, map);
        if let (Repr::Trie(left), Repr::Trie(right)) = (&map.core.repr, &same.core.repr) {
            assert!(ReferenceCounter::ptr_eq(left, right));
        }
    }

    #[rstest]
    fn test_try_insert_rejects_present_key() {
        let map = PersistentHashMap::new().insert("a", 1);
        assert!(matches!(
            map.try_insert("a", 2),
            Err(CollectionError::DuplicateKey { .. })
        ));
        assert_eq!(map.try_insert("b", 2).map(|map| map.len()), Ok(2));
    }

    #[rstest]
    fn test_transient_does_not_disturb_source() {
        let source = map_of(0..100);
        let mut transient = source.transient();
        for key in 0..100 {
            transient.insert(key, -key);
        }
        transient.remove(&0);
        let built = transient.persistent();
        assert_eq!(source.get(&5), Some(&50));
        assert_eq!(built.get(&5), Some(&-5));
        assert_eq!(built.len(), 99);
        assert_eq!(source.check_invariants(), Ok(()));
        assert_eq!(built.check_invariants(), Ok(()));
    }

    #[rstest]
    fn test_seq_visits_every_entry_once() {
        let map = map_of(0..1000);
        let seq = map.seq().unwrap();
        assert_eq!(seq.count(), 1000);
        let mut keys: Vec<i32> = seq.iter().map(|entry| entry.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, (0..1000).collect::<Vec<_>>());
    }

    #[rstest]
    fn test_flat_seq_exposes_chunk() {
        let map = map_of(0..5);
        let seq = map.seq().unwrap();
        assert_eq!(seq.chunked_first().map(<[_]>::len), Some(5));
        assert!(seq.chunked_rest().is_empty());
    }

    #[rstest]
    fn test_iter_matches_len() {
        let map = map_of(0..500);
        assert_eq!(map.iter().len(), 500);
        assert_eq!(map.iter().count(), 500);
        let sum: i32 = map.values().sum();
        assert_eq!(sum, (0..500).map(|key| key * 10).sum());
    }

    #[rstest]
    fn test_into_iter_yields_owned_pairs() {
        let map = map_of(0..20);
        let mut pairs: Vec<(i32, i32)> = map.into_iter().collect();
        pairs.sort_unstable();
        assert_eq!(pairs[19], (19, 190));
    }

    #[rstest]
    fn test_kv_reduce_short_circuits() {
        use crate::protocol::{KvReducible, reduced};
        let map = map_of(0..200);
        let mut visited = 0;
        let found = map.kv_reduce(None, |found, key, _| {
            visited += 1;
            if *key == 7 { reduced(Some(*key)) } else { ControlFlow::Continue(found) }
        });
        assert_eq!(found, Some(7));
        assert!(visited <= 200);
    }

    #[rstest]
    fn test_merge_prefers_other() {
        let left = map_of(0..10);
        let right: PersistentHashMap<i32, i32> = (5..15).map(|key| (key, -1)).collect();
        let merged = left.merge(&right);
        assert_eq!(merged.len(), 15);
        assert_eq!(merged.get(&2), Some(&20));
        assert_eq!(merged.get(&7), Some(&-1));
    }

    #[rstest]
    fn test_debug_format() {
        let map = PersistentHashMap::singleton(1, "one");
        assert_eq!(format!("{map:?}"), "{1: \"one\"}");
    }
}
