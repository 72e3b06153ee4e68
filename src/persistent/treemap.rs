//! Persistent (immutable) sorted map based on a Red-Black Tree.
//!
//! This module provides [`PersistentTreeMap`], an immutable ordered map
//! that uses structural sharing for efficient operations, ordered by a
//! pluggable [`Comparator`].
//!
//! # Overview
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(log N) first/last entry
//! - O(log N + k) range queries where k is the number of results
//! - O(1) len and `is_empty`
//!
//! # Examples
//!
//! ```rust
//! use strata::persistent::PersistentTreeMap;
//!
//! let map = PersistentTreeMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in sorted order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//!
//! // Range queries
//! let range: Vec<(&i32, &&str)> = map.range(1..3).collect();
//! assert_eq!(range.len(), 2); // 1 and 2
//! ```
//!
//! # Internal Structure
//!
//! The Red-Black Tree maintains the following invariants:
//! 1. Every node is either red or black
//! 2. The root is black
//! 3. Red nodes have only black children
//! 4. Every path from root to leaf has the same number of black nodes
//!
//! Insertion rebalances on the way back up from the new leaf. Removal
//! joins the two subtrees of the removed node and restores the black
//! height with `balance_left_del` / `balance_right_del`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::ops::{Bound, ControlFlow, RangeBounds};

use smallvec::SmallVec;

use super::ReferenceCounter;
use super::comparator::{Comparator, NaturalOrder};
use super::entry::MapEntry;
use super::error::{CollectionError, Result};
use crate::protocol::{
    Associative, Collection, Counted, Lookup, PersistentMap, Reducible, Seqable, Sequential, Step,
    conj_all,
};

// =============================================================================
// Node Definition
// =============================================================================

/// The color of a Red-Black Tree node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

type NodeRef<K, V> = ReferenceCounter<Node<K, V>>;
type Link<K, V> = Option<NodeRef<K, V>>;

/// Internal node structure for the Red-Black Tree.
struct Node<K, V> {
    entry: MapEntry<K, V>,
    color: Color,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    fn is_red(&self) -> bool {
        self.color == Color::Red
    }
}

fn is_red<K, V>(link: Option<&NodeRef<K, V>>) -> bool {
    link.is_some_and(|node| node.is_red())
}

/// An absent child is neither red nor black.
fn is_black<K, V>(link: Option<&NodeRef<K, V>>) -> bool {
    link.is_some_and(|node| !node.is_red())
}

fn violation(message: &str) -> CollectionError {
    CollectionError::InvariantViolation(format!("red-black tree: {message}"))
}

impl<K: Clone, V: Clone> Node<K, V> {
    fn red(entry: MapEntry<K, V>, left: Link<K, V>, right: Link<K, V>) -> NodeRef<K, V> {
        ReferenceCounter::new(Self {
            entry,
            color: Color::Red,
            left,
            right,
        })
    }

    fn black(entry: MapEntry<K, V>, left: Link<K, V>, right: Link<K, V>) -> NodeRef<K, V> {
        ReferenceCounter::new(Self {
            entry,
            color: Color::Black,
            left,
            right,
        })
    }

    fn blacken(this: &NodeRef<K, V>) -> NodeRef<K, V> {
        if this.is_red() {
            Self::black(this.entry.clone(), this.left.clone(), this.right.clone())
        } else {
            this.clone()
        }
    }

    fn redden(this: &NodeRef<K, V>) -> Result<NodeRef<K, V>> {
        if this.is_red() {
            Err(violation("cannot redden a red node"))
        } else {
            Ok(Self::red(
                this.entry.clone(),
                this.left.clone(),
                this.right.clone(),
            ))
        }
    }

    /// Black node over `inserted` and `right`, fixing a red-red pair
    /// below `inserted`.
    fn balance_left(
        entry: MapEntry<K, V>,
        inserted: NodeRef<K, V>,
        right: Link<K, V>,
    ) -> NodeRef<K, V> {
        if inserted.is_red() {
            if let Some(outer) = inserted.left.as_ref().filter(|node| node.is_red()) {
                return Self::red(
                    inserted.entry.clone(),
                    Some(Self::blacken(outer)),
                    Some(Self::black(entry, inserted.right.clone(), right)),
                );
            }
            if let Some(inner) = inserted.right.as_ref().filter(|node| node.is_red()) {
                return Self::red(
                    inner.entry.clone(),
                    Some(Self::black(
                        inserted.entry.clone(),
                        inserted.left.clone(),
                        inner.left.clone(),
                    )),
                    Some(Self::black(entry, inner.right.clone(), right)),
                );
            }
        }
        Self::black(entry, Some(inserted), right)
    }

    /// Mirror image of [`balance_left`](Self::balance_left).
    fn balance_right(
        entry: MapEntry<K, V>,
        left: Link<K, V>,
        inserted: NodeRef<K, V>,
    ) -> NodeRef<K, V> {
        if inserted.is_red() {
            if let Some(outer) = inserted.right.as_ref().filter(|node| node.is_red()) {
                return Self::red(
                    inserted.entry.clone(),
                    Some(Self::black(entry, left, inserted.left.clone())),
                    Some(Self::blacken(outer)),
                );
            }
            if let Some(inner) = inserted.left.as_ref().filter(|node| node.is_red()) {
                return Self::red(
                    inner.entry.clone(),
                    Some(Self::black(entry, left, inner.left.clone())),
                    Some(Self::black(
                        inserted.entry.clone(),
                        inner.right.clone(),
                        inserted.right.clone(),
                    )),
                );
            }
        }
        Self::black(entry, left, Some(inserted))
    }

    /// Rebuilds a node whose left subtree lost one black level.
    fn balance_left_del(
        entry: MapEntry<K, V>,
        deleted: Link<K, V>,
        right: Link<K, V>,
    ) -> Result<NodeRef<K, V>> {
        if let Some(shortened) = deleted.as_ref().filter(|node| node.is_red()) {
            return Ok(Self::red(entry, Some(Self::blacken(shortened)), right));
        }
        match right {
            Some(sibling) if !sibling.is_red() => Ok(Self::balance_right(
                entry,
                deleted,
                Self::redden(&sibling)?,
            )),
            Some(sibling) if is_black(sibling.left.as_ref()) => {
                let (Some(nephew), Some(far)) = (sibling.left.as_ref(), sibling.right.as_ref())
                else {
                    return Err(violation("red sibling without two children"));
                };
                Ok(Self::red(
                    nephew.entry.clone(),
                    Some(Self::black(entry, deleted, nephew.left.clone())),
                    Some(Self::balance_right(
                        sibling.entry.clone(),
                        nephew.right.clone(),
                        Self::redden(far)?,
                    )),
                ))
            }
            _ => Err(violation("unbalanced after left deletion")),
        }
    }

    /// Rebuilds a node whose right subtree lost one black level.
    fn balance_right_del(
        entry: MapEntry<K, V>,
        left: Link<K, V>,
        deleted: Link<K, V>,
    ) -> Result<NodeRef<K, V>> {
        if let Some(shortened) = deleted.as_ref().filter(|node| node.is_red()) {
            return Ok(Self::red(entry, left, Some(Self::blacken(shortened))));
        }
        match left {
            Some(sibling) if !sibling.is_red() => Ok(Self::balance_left(
                entry,
                Self::redden(&sibling)?,
                deleted,
            )),
            Some(sibling) if is_black(sibling.right.as_ref()) => {
                let (Some(far), Some(nephew)) = (sibling.left.as_ref(), sibling.right.as_ref())
                else {
                    return Err(violation("red sibling without two children"));
                };
                Ok(Self::red(
                    nephew.entry.clone(),
                    Some(Self::balance_left(
                        sibling.entry.clone(),
                        Self::redden(far)?,
                        nephew.left.clone(),
                    )),
                    Some(Self::black(entry, nephew.right.clone(), deleted)),
                ))
            }
            _ => Err(violation("unbalanced after right deletion")),
        }
    }

    /// Joins the two subtrees of a removed node.
    fn append(left: Link<K, V>, right: Link<K, V>) -> Result<Link<K, V>> {
        let (left, right) = match (left, right) {
            (None, right) => return Ok(right),
            (left, None) => return Ok(left),
            (Some(left), Some(right)) => (left, right),
        };
        match (left.is_red(), right.is_red()) {
            (true, true) => {
                let middle = Self::append(left.right.clone(), right.left.clone())?;
                match middle {
                    Some(middle) if middle.is_red() => Ok(Some(Self::red(
                        middle.entry.clone(),
                        Some(Self::red(
                            left.entry.clone(),
                            left.left.clone(),
                            middle.left.clone(),
                        )),
                        Some(Self::red(
                            right.entry.clone(),
                            middle.right.clone(),
                            right.right.clone(),
                        )),
                    ))),
                    middle => Ok(Some(Self::red(
                        left.entry.clone(),
                        left.left.clone(),
                        Some(Self::red(right.entry.clone(), middle, right.right.clone())),
                    ))),
                }
            }
            (true, false) => Ok(Some(Self::red(
                left.entry.clone(),
                left.left.clone(),
                Self::append(left.right.clone(), Some(right))?,
            ))),
            (false, true) => Ok(Some(Self::red(
                right.entry.clone(),
                Self::append(Some(left), right.left.clone())?,
                right.right.clone(),
            ))),
            (false, false) => {
                let middle = Self::append(left.right.clone(), right.left.clone())?;
                match middle {
                    Some(middle) if middle.is_red() => Ok(Some(Self::red(
                        middle.entry.clone(),
                        Some(Self::black(
                            left.entry.clone(),
                            left.left.clone(),
                            middle.left.clone(),
                        )),
                        Some(Self::black(
                            right.entry.clone(),
                            middle.right.clone(),
                            right.right.clone(),
                        )),
                    ))),
                    middle => Ok(Some(Self::balance_left_del(
                        left.entry.clone(),
                        left.left.clone(),
                        Some(Self::black(right.entry.clone(), middle, right.right.clone())),
                    )?)),
                }
            }
        }
    }
}

// =============================================================================
// PersistentTreeMap Definition
// =============================================================================

/// A persistent (immutable) sorted map based on a Red-Black Tree.
///
/// Keys are ordered by the comparator `C`, which defaults to the keys'
/// natural [`Ord`] order. Lookups compare through the same comparator, so
/// two keys the comparator calls equal are the same key.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `first_entry`  | O(log N)          |
/// | `range`        | O(log N + k)      |
/// | `len`          | O(1)              |
///
/// # Examples
///
/// ```rust
/// use strata::persistent::{PersistentTreeMap, ReverseOrder};
///
/// let descending = PersistentTreeMap::with_comparator(ReverseOrder)
///     .insert(1, "one")
///     .insert(3, "three")
///     .insert(2, "two");
///
/// let keys: Vec<&i32> = descending.keys().collect();
/// assert_eq!(keys, vec![&3, &2, &1]);
/// ```
pub struct PersistentTreeMap<K, V, C = NaturalOrder> {
    root: Link<K, V>,
    length: usize,
    comparator: C,
}

impl<K, V, C: Clone> Clone for PersistentTreeMap<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            length: self.length,
            comparator: self.comparator.clone(),
        }
    }
}

impl<K, V> PersistentTreeMap<K, V> {
    /// Creates a new empty map ordered by `K`'s [`Ord`] implementation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, String> = PersistentTreeMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
            comparator: NaturalOrder,
        }
    }
}

impl<K, V, C> PersistentTreeMap<K, V, C> {
    /// Creates a new empty map ordered by `comparator`.
    #[must_use]
    pub const fn with_comparator(comparator: C) -> Self {
        Self {
            root: None,
            length: 0,
            comparator,
        }
    }

    /// Returns the number of entries in the map.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the comparator ordering this map.
    #[must_use]
    pub const fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Returns the entry with the smallest key.
    #[must_use]
    pub fn first_entry(&self) -> Option<&MapEntry<K, V>> {
        let mut node = self.root.as_ref()?;
        while let Some(left) = &node.left {
            node = left;
        }
        Some(&node.entry)
    }

    /// Returns the entry with the largest key.
    #[must_use]
    pub fn last_entry(&self) -> Option<&MapEntry<K, V>> {
        let mut node = self.root.as_ref()?;
        while let Some(right) = &node.right {
            node = right;
        }
        Some(&node.entry)
    }

    /// Returns an iterator over entries in ascending key order.
    #[must_use]
    pub fn iter(&self) -> PersistentTreeMapIterator<'_, K, V> {
        let mut iterator = PersistentTreeMapIterator {
            stack: SmallVec::new(),
            remaining: self.length,
        };
        iterator.push_left_spine(self.root.as_deref());
        iterator
    }

    /// Returns an iterator over the keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over the values in ascending key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }
}

impl<K, V, C: Comparator<K>> PersistentTreeMap<K, V, C> {
    fn find(&self, key: &K) -> Option<&Node<K, V>> {
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            link = match self.comparator.compare(key, &node.entry.key) {
                Ordering::Less => node.left.as_deref(),
                Ordering::Greater => node.right.as_deref(),
                Ordering::Equal => return Some(node),
            };
        }
        None
    }

    /// Returns a reference to the value for `key`.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find(key).map(|node| &node.entry.value)
    }

    /// Returns the value for `key`, or `default` when absent.
    #[must_use]
    pub fn get_or<'a>(&'a self, key: &K, default: &'a V) -> &'a V {
        self.get(key).unwrap_or(default)
    }

    /// Returns the stored entry for `key`.
    #[must_use]
    pub fn get_entry(&self, key: &K) -> Option<&MapEntry<K, V>> {
        self.find(key).map(|node| &node.entry)
    }

    /// Returns `true` if the map contains `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.find(key).is_some()
    }

    /// Returns an iterator over the entries whose keys fall in `range`,
    /// in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentTreeMap;
    ///
    /// let map: PersistentTreeMap<i32, i32> = (1..=5).map(|n| (n, n * 10)).collect();
    /// let range: Vec<(&i32, &i32)> = map.range(2..=4).collect();
    /// assert_eq!(range, vec![(&2, &20), (&3, &30), (&4, &40)]);
    /// ```
    pub fn range<R>(&self, range: R) -> PersistentTreeMapRangeIterator<'_, K, V, C>
    where
        R: RangeBounds<K>,
        K: Clone,
    {
        let mut stack = SmallVec::new();
        let mut link = self.root.as_deref();
        while let Some(node) = link {
            let admitted = match range.start_bound() {
                Bound::Included(start) => {
                    self.comparator.compare(&node.entry.key, start) != Ordering::Less
                }
                Bound::Excluded(start) => {
                    self.comparator.compare(&node.entry.key, start) == Ordering::Greater
                }
                Bound::Unbounded => true,
            };
            if admitted {
                stack.push(node);
                link = node.left.as_deref();
            } else {
                link = node.right.as_deref();
            }
        }
        PersistentTreeMapRangeIterator {
            stack,
            comparator: &self.comparator,
            end: range.end_bound().cloned(),
        }
    }

    /// Verifies ordering and the red-black rules.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvariantViolation`] describing the first
    /// broken invariant.
    pub fn check_invariants(&self) -> Result<()> {
        if is_red(self.root.as_ref()) {
            return Err(violation("root is red"));
        }
        let mut count = 0;
        self.check_node(self.root.as_ref(), None, None, &mut count)?;
        if count == self.length {
            Ok(())
        } else {
            Err(violation(&format!(
                "holds {count} nodes but records {}",
                self.length
            )))
        }
    }

    /// Returns the black height of the subtree.
    fn check_node(
        &self,
        link: Option<&NodeRef<K, V>>,
        lower: Option<&K>,
        upper: Option<&K>,
        count: &mut usize,
    ) -> Result<usize> {
        let Some(node) = link else {
            return Ok(1);
        };
        *count += 1;
        let key = &node.entry.key;
        if lower.is_some_and(|lower| self.comparator.compare(lower, key) != Ordering::Less)
            || upper.is_some_and(|upper| self.comparator.compare(key, upper) != Ordering::Less)
        {
            return Err(violation("keys out of order"));
        }
        if node.is_red() && (is_red(node.left.as_ref()) || is_red(node.right.as_ref())) {
            return Err(violation("red node with a red child"));
        }
        let left = self.check_node(node.left.as_ref(), lower, Some(key), count)?;
        let right = self.check_node(node.right.as_ref(), Some(key), upper, count)?;
        if left != right {
            return Err(violation("unequal black heights"));
        }
        Ok(left + usize::from(!node.is_red()))
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> PersistentTreeMap<K, V, C> {
    fn add(&self, link: Option<&NodeRef<K, V>>, key: K, value: V) -> (NodeRef<K, V>, bool) {
        let Some(node) = link else {
            return (Node::red(MapEntry::new(key, value), None, None), true);
        };
        match self.comparator.compare(&key, &node.entry.key) {
            Ordering::Equal => (
                ReferenceCounter::new(Node {
                    entry: MapEntry::new(node.entry.key.clone(), value),
                    color: node.color,
                    left: node.left.clone(),
                    right: node.right.clone(),
                }),
                false,
            ),
            Ordering::Less => {
                let (inserted, added) = self.add(node.left.as_ref(), key, value);
                let rebuilt = if node.is_red() {
                    Node::red(node.entry.clone(), Some(inserted), node.right.clone())
                } else {
                    Node::balance_left(node.entry.clone(), inserted, node.right.clone())
                };
                (rebuilt, added)
            }
            Ordering::Greater => {
                let (inserted, added) = self.add(node.right.as_ref(), key, value);
                let rebuilt = if node.is_red() {
                    Node::red(node.entry.clone(), node.left.clone(), Some(inserted))
                } else {
                    Node::balance_right(node.entry.clone(), node.left.clone(), inserted)
                };
                (rebuilt, added)
            }
        }
    }

    fn delete(&self, node: &NodeRef<K, V>, key: &K) -> Result<Link<K, V>> {
        match self.comparator.compare(key, &node.entry.key) {
            Ordering::Equal => Node::append(node.left.clone(), node.right.clone()),
            Ordering::Less => {
                let Some(left) = &node.left else {
                    return Ok(Some(node.clone()));
                };
                let deleted = self.delete(left, key)?;
                if left.is_red() {
                    Ok(Some(Node::red(node.entry.clone(), deleted, node.right.clone())))
                } else {
                    Node::balance_left_del(node.entry.clone(), deleted, node.right.clone())
                        .map(Some)
                }
            }
            Ordering::Greater => {
                let Some(right) = &node.right else {
                    return Ok(Some(node.clone()));
                };
                let deleted = self.delete(right, key)?;
                if right.is_red() {
                    Ok(Some(Node::red(node.entry.clone(), node.left.clone(), deleted)))
                } else {
                    Node::balance_right_del(node.entry.clone(), node.left.clone(), deleted)
                        .map(Some)
                }
            }
        }
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the key already exists, its value is replaced and the stored key
    /// is kept.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentTreeMap;
    ///
    /// let map1 = PersistentTreeMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let (root, added) = self.add(self.root.as_ref(), key, value);
        Self {
            root: Some(Node::blacken(&root)),
            length: self.length + usize::from(added),
            comparator: self.comparator.clone(),
        }
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
    /// Removing an absent key returns an equal map sharing the whole tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentTreeMap;
    ///
    /// let map = PersistentTreeMap::new()
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&1), None);
    /// ```
    #[must_use]
    pub fn remove(&self, key: &K) -> Self {
        match self.try_remove(key) {
            Ok(map) => map,
            Err(error) => unreachable!("{error}"),
        }
    }

    fn try_remove(&self, key: &K) -> Result<Self> {
        let Some(root) = self.root.as_ref().filter(|_| self.contains_key(key)) else {
            return Ok(self.clone());
        };
        let root = self.delete(root, key)?;
        Ok(Self {
            root: root.as_ref().map(Node::blacken),
            length: self.length - 1,
            comparator: self.comparator.clone(),
        })
    }

    /// Builds a map by pairing `keys` with `values` positionally.
    ///
    /// Extra keys or values are ignored; a repeated key keeps its last
    /// value.
    #[must_use]
    pub fn from_keys_values<KI, VI>(comparator: C, keys: KI, values: VI) -> Self
    where
        KI: IntoIterator<Item = K>,
        VI: IntoIterator<Item = V>,
    {
        keys.into_iter()
            .zip(values)
            .fold(Self::with_comparator(comparator), |map, (key, value)| {
                map.insert(key, value)
            })
    }

    /// Returns a map holding the entries of both maps; on equal keys the
    /// value from `other` wins.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        conj_all(self, other)
    }

    /// Returns an ascending sequence over all entries, or `None` when empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let map = PersistentTreeMap::new().insert(2, 'b').insert(1, 'a');
    /// let keys: Vec<i32> = map.seq().unwrap().iter().map(|entry| *entry.key()).collect();
    /// assert_eq!(keys, vec![1, 2]);
    /// ```
    #[must_use]
    pub fn seq(&self) -> Option<TreeMapSeq<K, V, C>> {
        TreeMapSeq::spine(self, true, Bound::Unbounded)
    }

    /// Returns a descending sequence over all entries, or `None` when empty.
    #[must_use]
    pub fn rseq(&self) -> Option<TreeMapSeq<K, V, C>> {
        TreeMapSeq::spine(self, false, Bound::Unbounded)
    }

    /// Returns a sequence starting at the first key at or beyond `key` in
    /// the given direction.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let map: PersistentTreeMap<i32, ()> = [1, 3, 5, 7].into_iter().map(|n| (n, ())).collect();
    /// let up: Vec<i32> = map.seq_from(&4, true).unwrap().iter().map(|e| *e.key()).collect();
    /// let down: Vec<i32> = map.seq_from(&4, false).unwrap().iter().map(|e| *e.key()).collect();
    /// assert_eq!(up, vec![5, 7]);
    /// assert_eq!(down, vec![3, 1]);
    /// ```
    #[must_use]
    pub fn seq_from(&self, key: &K, ascending: bool) -> Option<TreeMapSeq<K, V, C>> {
        TreeMapSeq::seek(self, key, ascending, Bound::Unbounded)
    }

    /// Returns an ascending sequence over the entries whose keys fall in
    /// `range`.
    #[must_use]
    pub fn subseq<R: RangeBounds<K>>(&self, range: R) -> Option<TreeMapSeq<K, V, C>> {
        let stop = range.end_bound().cloned();
        let seq = match range.start_bound() {
            Bound::Unbounded => TreeMapSeq::spine(self, true, stop),
            Bound::Included(start) => TreeMapSeq::seek(self, start, true, stop),
            Bound::Excluded(start) => TreeMapSeq::seek(self, start, true, stop)
                .map(|seq| seq.skip_key(start)),
        }?;
        (!seq.is_empty()).then_some(seq)
    }

    /// Returns a descending sequence over the entries whose keys fall in
    /// `range`.
    #[must_use]
    pub fn rsubseq<R: RangeBounds<K>>(&self, range: R) -> Option<TreeMapSeq<K, V, C>> {
        let stop = range.start_bound().cloned();
        let seq = match range.end_bound() {
            Bound::Unbounded => TreeMapSeq::spine(self, false, stop),
            Bound::Included(end) => TreeMapSeq::seek(self, end, false, stop),
            Bound::Excluded(end) => {
                TreeMapSeq::seek(self, end, false, stop).map(|seq| seq.skip_key(end))
            }
        }?;
        (!seq.is_empty()).then_some(seq)
    }
}

// =============================================================================
// TreeMapSeq
// =============================================================================

/// One node of the persistent traversal stack.
struct Frame<K, V> {
    node: NodeRef<K, V>,
    below: Option<ReferenceCounter<Frame<K, V>>>,
}

type Stack<K, V> = Option<ReferenceCounter<Frame<K, V>>>;

fn push<K, V>(stack: Stack<K, V>, node: NodeRef<K, V>) -> Stack<K, V> {
    Some(ReferenceCounter::new(Frame { node, below: stack }))
}

/// A restartable in-order sequence over a [`PersistentTreeMap`].
///
/// The traversal stack is itself persistent, so `rest` is O(1) amortized
/// and every intermediate sequence stays valid. A bounded sequence (from
/// [`subseq`](PersistentTreeMap::subseq)) ends at the first key past its
/// bound.
pub struct TreeMapSeq<K, V, C = NaturalOrder> {
    stack: Stack<K, V>,
    ascending: bool,
    stop: Bound<K>,
    comparator: C,
}

impl<K: Clone, V, C: Clone> Clone for TreeMapSeq<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
            ascending: self.ascending,
            stop: self.stop.clone(),
            comparator: self.comparator.clone(),
        }
    }
}

impl<K: Clone, V, C: Comparator<K> + Clone> TreeMapSeq<K, V, C> {
    /// Pushes `link` and its nearest-first spine onto `stack`.
    fn descend(
        mut stack: Stack<K, V>,
        mut link: Option<&NodeRef<K, V>>,
        ascending: bool,
    ) -> Stack<K, V> {
        while let Some(node) = link {
            stack = push(stack, node.clone());
            link = if ascending {
                node.left.as_ref()
            } else {
                node.right.as_ref()
            };
        }
        stack
    }

    fn from_stack(
        map: &PersistentTreeMap<K, V, C>,
        stack: Stack<K, V>,
        ascending: bool,
        stop: Bound<K>,
    ) -> Option<Self> {
        let seq = Self {
            stack,
            ascending,
            stop,
            comparator: map.comparator.clone(),
        };
        (!seq.is_empty()).then_some(seq)
    }

    /// The whole map in one direction.
    fn spine(map: &PersistentTreeMap<K, V, C>, ascending: bool, stop: Bound<K>) -> Option<Self> {
        let stack = Self::descend(None, map.root.as_ref(), ascending);
        Self::from_stack(map, stack, ascending, stop)
    }

    /// Starts at `key`, or at the nearest key beyond it in the direction
    /// of travel.
    fn seek(
        map: &PersistentTreeMap<K, V, C>,
        key: &K,
        ascending: bool,
        stop: Bound<K>,
    ) -> Option<Self> {
        let mut stack = None;
        let mut link = map.root.as_ref();
        while let Some(node) = link {
            let order = map.comparator.compare(key, &node.entry.key);
            if order == Ordering::Equal {
                stack = push(stack, node.clone());
                break;
            }
            let toward_start = (order == Ordering::Less) == ascending;
            if toward_start {
                stack = push(stack, node.clone());
            }
            link = if order == Ordering::Less {
                node.left.as_ref()
            } else {
                node.right.as_ref()
            };
        }
        Self::from_stack(map, stack, ascending, stop)
    }

    /// Skips the first entry if its key equals `key`.
    fn skip_key(self, key: &K) -> Self {
        let matches = Sequential::first(&self)
            .is_some_and(|entry| self.comparator.compare(&entry.key, key) == Ordering::Equal);
        if matches { Sequential::rest(&self) } else { self }
    }

    fn within_stop(&self, key: &K) -> bool {
        let order = match &self.stop {
            Bound::Unbounded => return true,
            Bound::Included(stop) | Bound::Excluded(stop) => self.comparator.compare(key, stop),
        };
        let order = if self.ascending { order } else { order.reverse() };
        match self.stop {
            Bound::Included(_) => order != Ordering::Greater,
            Bound::Excluded(_) => order == Ordering::Less,
            Bound::Unbounded => true,
        }
    }
}

impl<K: Clone, V, C: Comparator<K> + Clone> Sequential for TreeMapSeq<K, V, C> {
    type Item = MapEntry<K, V>;

    fn first(&self) -> Option<&MapEntry<K, V>> {
        let frame = self.stack.as_ref()?;
        let entry = &frame.node.entry;
        self.within_stop(&entry.key).then_some(entry)
    }

    fn rest(&self) -> Self {
        let stack = match &self.stack {
            None => None,
            Some(frame) => {
                let next = if self.ascending {
                    frame.node.right.as_ref()
                } else {
                    frame.node.left.as_ref()
                };
                Self::descend(frame.below.clone(), next, self.ascending)
            }
        };
        Self {
            stack,
            ascending: self.ascending,
            stop: self.stop.clone(),
            comparator: self.comparator.clone(),
        }
    }
}

impl<K: Clone, V, C: Comparator<K> + Clone> Reducible for TreeMapSeq<K, V, C> {
    type Item = MapEntry<K, V>;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        crate::protocol::seq_reduce(Some(self.clone()), init, function)
    }
}

impl<K, V, C> fmt::Debug for TreeMapSeq<K, V, C>
where
    K: Clone + fmt::Debug,
    V: fmt::Debug,
    C: Comparator<K> + Clone,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = formatter.debug_list();
        let mut current = self.clone();
        while let Some(entry) = current.first() {
            list.entry(entry);
            current = current.rest();
        }
        list.finish()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An iterator over key-value pairs of a [`PersistentTreeMap`] in
/// ascending key order.
pub struct PersistentTreeMapIterator<'a, K, V> {
    stack: SmallVec<[&'a Node<K, V>; 16]>,
    remaining: usize,
}

impl<'a, K, V> PersistentTreeMapIterator<'a, K, V> {
    fn push_left_spine(&mut self, mut link: Option<&'a Node<K, V>>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = node.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for PersistentTreeMapIterator<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left_spine(node.right.as_deref());
        self.remaining -= 1;
        Some(node.entry.as_pair())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for PersistentTreeMapIterator<'_, K, V> {}

/// An iterator over the entries of a [`PersistentTreeMap`] within a key
/// range, in ascending order.
pub struct PersistentTreeMapRangeIterator<'a, K, V, C = NaturalOrder> {
    stack: SmallVec<[&'a Node<K, V>; 16]>,
    comparator: &'a C,
    end: Bound<K>,
}

impl<'a, K, V, C: Comparator<K>> Iterator for PersistentTreeMapRangeIterator<'a, K, V, C> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let order = match &self.end {
            Bound::Included(end) | Bound::Excluded(end) => {
                self.comparator.compare(&node.entry.key, end)
            }
            Bound::Unbounded => Ordering::Less,
        };
        let inside = match self.end {
            Bound::Included(_) => order != Ordering::Greater,
            Bound::Excluded(_) | Bound::Unbounded => order == Ordering::Less,
        };
        if !inside {
            self.stack.clear();
            return None;
        }
        let mut link = node.right.as_deref();
        while let Some(child) = link {
            self.stack.push(child);
            link = child.left.as_deref();
        }
        Some(node.entry.as_pair())
    }
}

/// An owning iterator over a [`PersistentTreeMap`], yielding cloned pairs
/// in ascending key order.
pub struct PersistentTreeMapIntoIterator<K, V, C = NaturalOrder> {
    seq: Option<TreeMapSeq<K, V, C>>,
    remaining: usize,
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> Iterator for PersistentTreeMapIntoIterator<K, V, C> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        let seq = self.seq.take()?;
        let pair = seq.first()?.clone().into_pair();
        self.seq = seq.next();
        self.remaining -= 1;
        Some(pair)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> ExactSizeIterator
    for PersistentTreeMapIntoIterator<K, V, C>
{
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentTreeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Ord, V: Clone> FromIterator<(K, V)> for PersistentTreeMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (key, value)| map.insert(key, value))
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> IntoIterator for PersistentTreeMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = PersistentTreeMapIntoIterator<K, V, C>;

    fn into_iter(self) -> Self::IntoIter {
        PersistentTreeMapIntoIterator {
            seq: self.seq(),
            remaining: self.length,
        }
    }
}

impl<'a, K, V, C> IntoIterator for &'a PersistentTreeMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = PersistentTreeMapIterator<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V: PartialEq, C: Comparator<K>> PartialEq for PersistentTreeMap<K, V, C> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<K, V: Eq, C: Comparator<K>> Eq for PersistentTreeMap<K, V, C> {}

/// Hashes the length followed by every entry in key order, so equal maps
/// with the same comparator hash equally.
impl<K: Hash, V: Hash, C> Hash for PersistentTreeMap<K, V, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for (key, value) in self {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for PersistentTreeMap<K, V, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, C> fmt::Display for PersistentTreeMap<K, V, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Protocol Implementations
// =============================================================================

impl<K, V, C> Counted for PersistentTreeMap<K, V, C> {
    fn count(&self) -> usize {
        self.length
    }
}

impl<K, V, C: Comparator<K>> Lookup for PersistentTreeMap<K, V, C> {
    type Key = K;
    type Value = V;

    fn lookup(&self, key: &K) -> Option<&V> {
        self.get(key)
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> Associative for PersistentTreeMap<K, V, C> {
    fn contains_key(&self, key: &K) -> bool {
        Self::contains_key(self, key)
    }

    fn assoc(&self, key: K, value: V) -> Result<Self> {
        Ok(self.insert(key, value))
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> PersistentMap for PersistentTreeMap<K, V, C> {
    fn dissoc(&self, key: &K) -> Self {
        self.remove(key)
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> Collection for PersistentTreeMap<K, V, C> {
    type Item = MapEntry<K, V>;

    fn conj(&self, entry: MapEntry<K, V>) -> Self {
        let (key, value) = entry.into_pair();
        self.insert(key, value)
    }

    fn empty(&self) -> Self {
        Self::with_comparator(self.comparator.clone())
    }
}

impl<K: Clone, V: Clone, C: Comparator<K> + Clone> Seqable for PersistentTreeMap<K, V, C> {
    type Item = MapEntry<K, V>;
    type Seq = TreeMapSeq<K, V, C>;

    fn seq(&self) -> Option<TreeMapSeq<K, V, C>> {
        Self::seq(self)
    }
}

fn reduce_node<K, V, A, F>(link: Option<&NodeRef<K, V>>, init: A, function: &mut F) -> Step<A>
where
    F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
{
    let Some(node) = link else {
        return ControlFlow::Continue(init);
    };
    let accumulator = reduce_node(node.left.as_ref(), init, function)?;
    let accumulator = function(accumulator, &node.entry)?;
    reduce_node(node.right.as_ref(), accumulator, function)
}

impl<K, V, C> Reducible for PersistentTreeMap<K, V, C> {
    type Item = MapEntry<K, V>;

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        reduce_node(self.root.as_ref(), init, &mut function)
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, C> serde::Serialize for PersistentTreeMap<K, V, C>
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
struct PersistentTreeMapVisitor<K, V> {
    marker: std::marker::PhantomData<(K, V)>,
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentTreeMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentTreeMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = PersistentTreeMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentTreeMap<K, V>
where
    K: serde::Deserialize<'de> + Clone + Ord,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentTreeMapVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
