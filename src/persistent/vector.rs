//! Persistent (immutable) vector based on a 32-way trie with a tail.
//!
//! This module provides [`PersistentVector`], an immutable indexed
//! collection that uses structural sharing for efficient operations, and
//! [`TransientVector`], its single-owner builder.
//!
//! # Overview
//!
//! The vector stores all but its last (up to 32) elements in a trie of
//! 32-wide nodes; the last elements live in a separate tail buffer. It
//! provides:
//!
//! - O(log32 N) random access (effectively O(1) for practical sizes)
//! - O(1) amortized `conj` (elements land in the tail until it fills)
//! - O(log32 N) `assoc_n` and `pop`
//! - O(1) `len` and `is_empty`
//!
//! # Internal Structure
//!
//! - Every leaf in the trie holds exactly 32 elements.
//! - Indices below the tail offset resolve through the trie, the rest
//!   through the tail.
//! - The trie grows a level when the root is full and shrinks a level when
//!   the root is left with a single child.
//!
//! # Examples
//!
//! ```rust
//! use strata::persistent::PersistentVector;
//!
//! let vector = PersistentVector::new()
//!     .conj(1)
//!     .conj(2)
//!     .conj(3);
//!
//! assert_eq!(vector.get(0), Some(&1));
//! assert_eq!(vector.get(2), Some(&3));
//!
//! // Structural sharing: the original vector is preserved
//! let extended = vector.conj(4);
//! assert_eq!(vector.len(), 3);     // Original unchanged
//! assert_eq!(extended.len(), 4);   // New vector
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FromIterator;
use std::marker::PhantomData;

use arrayvec::ArrayVec;

use super::ReferenceCounter;
use super::bits::{BITS_PER_LEVEL, BRANCHING_FACTOR, MASK};
use super::error::{CollectionError, Result};
use crate::protocol::{
    Associative, Collection, Counted, Editable, Indexed, Lookup, Reducible, Seqable, Sequential,
    Stack, Step, TransientAssociative, TransientCollection, TransientStack, array_reduce,
    ci_reduce,
};
use crate::seq::ChunkedSeq;

// =============================================================================
// Trie
// =============================================================================

/// A 32-element leaf, shared between the trie, the tail and chunked seqs.
pub(crate) type Leaf<T> = ReferenceCounter<Vec<T>>;

type NodeRef<T> = ReferenceCounter<Node<T>>;

/// Internal node structure for the trie.
enum Node<T> {
    /// Interior node holding up to 32 children, packed to the left.
    Branch(Vec<NodeRef<T>>),
    /// Full leaf of 32 elements.
    Leaf(Leaf<T>),
}

impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Self::Branch(children) => Self::Branch(children.clone()),
            Self::Leaf(elements) => Self::Leaf(elements.clone()),
        }
    }
}

/// Index of the first element stored in the tail.
#[inline]
const fn tail_offset(length: usize) -> usize {
    if length < BRANCHING_FACTOR {
        0
    } else {
        ((length - 1) >> BITS_PER_LEVEL) << BITS_PER_LEVEL
    }
}

/// The trie part of a vector: everything below the tail offset.
struct Trie<T> {
    root: NodeRef<T>,
    /// `(depth - 1) * BITS_PER_LEVEL`; never less than one level.
    shift: usize,
}

impl<T> Clone for Trie<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            shift: self.shift,
        }
    }
}

impl<T> Trie<T> {
    fn new() -> Self {
        Self {
            root: ReferenceCounter::new(Node::Branch(Vec::new())),
            shift: BITS_PER_LEVEL,
        }
    }

    /// The leaf holding `index`, which must be below the tail offset.
    fn leaf(&self, index: usize) -> Option<&Leaf<T>> {
        let mut node = &self.root;
        let mut level = self.shift;
        loop {
            match node.as_ref() {
                Node::Branch(children) => {
                    node = children.get((index >> level) & MASK)?;
                    level = level.checked_sub(BITS_PER_LEVEL)?;
                }
                Node::Leaf(elements) => return Some(elements),
            }
        }
    }

    /// Counts elements and checks shape; returns the number of leaves.
    fn check_node(node: &Node<T>, level: usize, is_root: bool) -> Result<usize> {
        match node {
            Node::Leaf(elements) => {
                if level != 0 {
                    return Err(CollectionError::InvariantViolation(format!(
                        "leaf found at level {level}"
                    )));
                }
                if elements.len() != BRANCHING_FACTOR {
                    return Err(CollectionError::InvariantViolation(format!(
                        "trie leaf holds {} elements",
                        elements.len()
                    )));
                }
                Ok(1)
            }
            Node::Branch(children) => {
                if level == 0 {
                    return Err(CollectionError::InvariantViolation(
                        "branch found at leaf level".to_string(),
                    ));
                }
                if children.len() > BRANCHING_FACTOR || (children.is_empty() && !is_root) {
                    return Err(CollectionError::InvariantViolation(format!(
                        "branch holds {} children",
                        children.len()
                    )));
                }
                children.iter().try_fold(0, |leaves, child| {
                    Ok(leaves + Self::check_node(child, level - BITS_PER_LEVEL, false)?)
                })
            }
        }
    }
}

impl<T: Clone> Trie<T> {
    /// Appends a full leaf whose first element has index `offset`.
    fn push_leaf(&mut self, offset: usize, elements: Leaf<T>) {
        let leaf = ReferenceCounter::new(Node::Leaf(elements));
        let leaves = (offset >> BITS_PER_LEVEL) + 1;
        if leaves > 1 << self.shift {
            let old_root = std::mem::replace(
                &mut self.root,
                ReferenceCounter::new(Node::Branch(Vec::new())),
            );
            let path = Self::new_path(self.shift, leaf);
            self.root = ReferenceCounter::new(Node::Branch(vec![old_root, path]));
            self.shift += BITS_PER_LEVEL;
            tracing::trace!(shift = self.shift, "vector trie grew a level");
        } else {
            Self::push_tail(&mut self.root, self.shift, offset + BRANCHING_FACTOR - 1, leaf);
        }
    }

    fn push_tail(node: &mut NodeRef<T>, level: usize, last_index: usize, leaf: NodeRef<T>) {
        let Node::Branch(children) = ReferenceCounter::make_mut(node) else {
            return;
        };
        if level == BITS_PER_LEVEL {
            children.push(leaf);
            return;
        }
        let slot = (last_index >> level) & MASK;
        match children.get_mut(slot) {
            Some(child) => Self::push_tail(child, level - BITS_PER_LEVEL, last_index, leaf),
            None => children.push(Self::new_path(level - BITS_PER_LEVEL, leaf)),
        }
    }

    fn new_path(level: usize, leaf: NodeRef<T>) -> NodeRef<T> {
        if level == 0 {
            leaf
        } else {
            ReferenceCounter::new(Node::Branch(vec![Self::new_path(
                level - BITS_PER_LEVEL,
                leaf,
            )]))
        }
    }

    /// Detaches the last leaf, shrinking the trie when the root is left
    /// with a single child.
    fn pop_leaf(&mut self) -> Option<Leaf<T>> {
        let leaf = Self::pop_last(&mut self.root, self.shift)?;
        if self.shift > BITS_PER_LEVEL
            && let Node::Branch(children) = self.root.as_ref()
            && children.len() == 1
        {
            let child = children[0].clone();
            self.root = child;
            self.shift -= BITS_PER_LEVEL;
            tracing::trace!(shift = self.shift, "vector trie shrank a level");
        }
        Some(leaf)
    }

    fn pop_last(node: &mut NodeRef<T>, level: usize) -> Option<Leaf<T>> {
        let Node::Branch(children) = ReferenceCounter::make_mut(node) else {
            return None;
        };
        if level > BITS_PER_LEVEL {
            let child = children.last_mut()?;
            let leaf = Self::pop_last(child, level - BITS_PER_LEVEL)?;
            let emptied = matches!(child.as_ref(), Node::Branch(grandchildren) if grandchildren.is_empty());
            if emptied {
                children.pop();
            }
            Some(leaf)
        } else {
            match children.pop()?.as_ref() {
                Node::Leaf(elements) => Some(elements.clone()),
                Node::Branch(_) => None,
            }
        }
    }

    /// Replaces the element at `index`, copying only the shared nodes on
    /// its path.
    fn assoc(&mut self, index: usize, value: T) {
        Self::assoc_in(&mut self.root, self.shift, index, value);
    }

    fn assoc_in(node: &mut NodeRef<T>, level: usize, index: usize, value: T) {
        match ReferenceCounter::make_mut(node) {
            Node::Leaf(elements) => {
                if let Some(slot) = ReferenceCounter::make_mut(elements).get_mut(index & MASK) {
                    *slot = value;
                }
            }
            Node::Branch(children) => {
                if let Some(child) = children.get_mut((index >> level) & MASK) {
                    Self::assoc_in(child, level.saturating_sub(BITS_PER_LEVEL), index, value);
                }
            }
        }
    }
}

// =============================================================================
// PersistentVector Definition
// =============================================================================

/// A persistent (immutable) vector.
///
/// # Time Complexity
///
/// | Operation    | Complexity                    |
/// |--------------|-------------------------------|
/// | `new`        | O(1)                          |
/// | `nth`/`get`  | O(log32 N)                    |
/// | `conj`       | O(log32 N) amortized O(1)     |
/// | `pop`        | O(log32 N)                    |
/// | `assoc_n`    | O(log32 N)                    |
/// | `len`        | O(1)                          |
/// | `iter`       | O(1) to create, O(N) to iterate |
///
/// # Examples
///
/// ```rust
/// use strata::persistent::PersistentVector;
///
/// let vector: PersistentVector<i32> = (0..100).collect();
/// assert_eq!(vector.len(), 100);
/// assert_eq!(vector.get(50), Some(&50));
/// ```
pub struct PersistentVector<T> {
    /// Total number of elements
    length: usize,
    trie: Trie<T>,
    /// Elements at and after the tail offset (up to 32)
    tail: Leaf<T>,
}

impl<T> Clone for PersistentVector<T> {
    fn clone(&self) -> Self {
        Self {
            length: self.length,
            trie: self.trie.clone(),
            tail: self.tail.clone(),
        }
    }
}

impl<T> PersistentVector<T> {
    /// Creates a new empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = PersistentVector::new();
    /// assert!(vector.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self {
            length: 0,
            trie: Trie::new(),
            tail: ReferenceCounter::new(Vec::new()),
        }
    }

    /// Returns the number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the vector contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// The shared leaf (or tail) that holds `index`.
    pub(crate) fn leaf_for(&self, index: usize) -> Option<&Leaf<T>> {
        if index >= self.length {
            None
        } else if index >= tail_offset(self.length) {
            Some(&self.tail)
        } else {
            self.trie.leaf(index)
        }
    }

    /// Returns a reference to the element at `index`, or `None` when out of
    /// range.
    ///
    /// # Complexity
    ///
    /// O(log32 N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (1..=5).collect();
    /// assert_eq!(vector.get(0), Some(&1));
    /// assert_eq!(vector.get(4), Some(&5));
    /// assert_eq!(vector.get(10), None);
    /// ```
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.leaf_for(index)
            .and_then(|elements| elements.get(index & MASK))
    }

    /// Returns the element at `index`, or `default` when out of range.
    #[must_use]
    pub fn get_or<'a>(&'a self, index: usize, default: &'a T) -> &'a T {
        self.get(index).unwrap_or(default)
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] when `index >= len()`.
    pub fn nth(&self, index: usize) -> Result<&T> {
        self.get(index).ok_or(CollectionError::IndexOutOfBounds {
            index,
            count: self.length,
        })
    }

    /// Returns the element at `index`, or `default` when out of range.
    #[must_use]
    pub fn nth_or<'a>(&'a self, index: usize, default: &'a T) -> &'a T {
        self.get_or(index, default)
    }

    /// Returns a reference to the first element.
    #[inline]
    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    /// Returns a reference to the last element.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.tail.last()
    }

    /// Returns the last element, the one `pop` would remove.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`] for an empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentVector;
    ///
    /// let vector = PersistentVector::new().conj(1).conj(2);
    /// assert_eq!(vector.peek(), Ok(&2));
    /// assert!(PersistentVector::<i32>::new().peek().is_err());
    /// ```
    pub fn peek(&self) -> Result<&T> {
        self.last()
            .ok_or(CollectionError::EmptyCollection { operation: "peek" })
    }

    /// Returns a double-ended iterator over the elements.
    #[must_use]
    pub fn iter(&self) -> PersistentVectorIterator<'_, T> {
        PersistentVectorIterator {
            vector: self,
            front: 0,
            back: self.length,
            front_leaf: &[],
            front_base: 0,
            back_leaf: &[],
            back_base: 0,
        }
    }

    /// Returns a chunked sequence over the elements, or `None` when empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let vector: PersistentVector<i32> = (0..40).collect();
    /// let seq = vector.seq().unwrap();
    /// assert_eq!(seq.chunked_first().map(<[i32]>::len), Some(32));
    /// assert_eq!(seq.chunked_rest().first(), Some(&32));
    /// ```
    #[must_use]
    pub fn seq(&self) -> Option<ChunkedSeq<T>> {
        ChunkedSeq::from_vector(self.clone(), 0)
    }

    /// Returns a sequence over the elements from last to first.
    #[must_use]
    pub fn rseq(&self) -> Option<VectorRSeq<T>> {
        if self.is_empty() {
            None
        } else {
            Some(VectorRSeq {
                vector: self.clone(),
                remaining: self.length,
            })
        }
    }

    /// Verifies the trie's shape against the element count.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::InvariantViolation`] describing the first
    /// broken invariant.
    pub fn check_invariants(&self) -> Result<()> {
        let offset = tail_offset(self.length);
        if self.tail.len() != self.length - offset {
            return Err(CollectionError::InvariantViolation(format!(
                "tail holds {} elements, expected {}",
                self.tail.len(),
                self.length - offset
            )));
        }
        if self.length > 0 && self.tail.is_empty() {
            return Err(CollectionError::InvariantViolation(
                "non-empty vector with an empty tail".to_string(),
            ));
        }
        if self.trie.shift > BITS_PER_LEVEL
            && matches!(self.trie.root.as_ref(), Node::Branch(children) if children.len() < 2)
        {
            return Err(CollectionError::InvariantViolation(
                "trie root has a single child above the first level".to_string(),
            ));
        }
        let leaves = Trie::check_node(&self.trie.root, self.trie.shift, true)?;
        if leaves << BITS_PER_LEVEL == offset {
            Ok(())
        } else {
            Err(CollectionError::InvariantViolation(format!(
                "trie holds {leaves} leaves below tail offset {offset}"
            )))
        }
    }
}

impl<T: Clone> PersistentVector<T> {
    /// Creates a vector containing a single element.
    #[must_use]
    pub fn singleton(element: T) -> Self {
        Self::new().conj(element)
    }

    /// Creates a vector from a slice.
    #[must_use]
    pub fn from_slice(slice: &[T]) -> Self {
        slice.iter().cloned().collect()
    }

    /// Appends an element to the end.
    ///
    /// # Complexity
    ///
    /// O(log32 N) worst case, O(1) amortized
    #[must_use]
    pub fn conj(&self, element: T) -> Self {
        let mut vector = self.clone();
        vector.conj_mut(element);
        vector
    }

    fn conj_mut(&mut self, element: T) {
        if self.tail.len() < BRANCHING_FACTOR {
            ReferenceCounter::make_mut(&mut self.tail).push(element);
        } else {
            let mut fresh = Vec::with_capacity(BRANCHING_FACTOR);
            fresh.push(element);
            let full = std::mem::replace(&mut self.tail, ReferenceCounter::new(fresh));
            self.trie.push_leaf(tail_offset(self.length), full);
        }
        self.length += 1;
    }

    /// Returns a vector without its last element.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`] for an empty vector.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..33).collect();
    /// let popped = vector.pop().unwrap();
    /// assert_eq!(popped.len(), 32);
    /// assert_eq!(popped.last(), Some(&31));
    /// ```
    pub fn pop(&self) -> Result<Self> {
        let mut vector = self.clone();
        vector
            .pop_mut()
            .ok_or(CollectionError::EmptyCollection { operation: "pop" })?;
        Ok(vector)
    }

    fn pop_mut(&mut self) -> Option<T> {
        if self.length == 0 {
            return None;
        }
        if self.tail.len() > 1 || self.length == 1 {
            let element = ReferenceCounter::make_mut(&mut self.tail).pop()?;
            self.length -= 1;
            return Some(element);
        }
        let element = ReferenceCounter::make_mut(&mut self.tail).pop()?;
        self.tail = self.trie.pop_leaf()?;
        self.length -= 1;
        Some(element)
    }

    /// Returns a vector with the element at `index` replaced.
    ///
    /// `index == len()` appends, like [`conj`](Self::conj).
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] when `index > len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentVector;
    ///
    /// let vector: PersistentVector<i32> = (0..3).collect();
    /// assert_eq!(vector.assoc_n(1, 9).unwrap().get(1), Some(&9));
    /// assert_eq!(vector.assoc_n(3, 3).unwrap().len(), 4);
    /// assert!(vector.assoc_n(4, 4).is_err());
    /// ```
    pub fn assoc_n(&self, index: usize, element: T) -> Result<Self> {
        let mut vector = self.clone();
        vector.assoc_mut(index, element)?;
        Ok(vector)
    }

    fn assoc_mut(&mut self, index: usize, element: T) -> Result<()> {
        if index == self.length {
            self.conj_mut(element);
        } else if index > self.length {
            return Err(CollectionError::IndexOutOfBounds {
                index,
                count: self.length,
            });
        } else if index >= tail_offset(self.length) {
            if let Some(slot) = ReferenceCounter::make_mut(&mut self.tail).get_mut(index & MASK) {
                *slot = element;
            }
        } else {
            self.trie.assoc(index, element);
        }
        Ok(())
    }

    /// Returns a new vector holding the elements in `start..end`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] when `end > len()` or
    /// `start > end`.
    pub fn subvec(&self, start: usize, end: usize) -> Result<Self> {
        if end > self.length || start > end {
            return Err(CollectionError::IndexOutOfBounds {
                index: if end > self.length { end } else { start },
                count: self.length,
            });
        }
        let mut transient = TransientVector::new();
        for element in self.iter().skip(start).take(end - start) {
            transient.conj(element.clone());
        }
        Ok(transient.persistent())
    }

    /// Returns a transient vector sharing this vector's structure.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::persistent::PersistentVector;
    ///
    /// let base: PersistentVector<i32> = (0..3).collect();
    /// let mut transient = base.transient();
    /// transient.conj(3);
    /// transient.assoc_n(0, 10).unwrap();
    /// let built = transient.persistent();
    ///
    /// assert_eq!(built.iter().copied().collect::<Vec<_>>(), vec![10, 1, 2, 3]);
    /// assert_eq!(base.get(0), Some(&0));
    /// ```
    #[must_use]
    pub fn transient(&self) -> TransientVector<T> {
        TransientVector {
            length: self.length,
            trie: self.trie.clone(),
            tail: self.tail.iter().cloned().collect(),
            _marker: PhantomData,
        }
    }
}

// =============================================================================
// TransientVector Definition
// =============================================================================

/// A mutable builder for [`PersistentVector`].
///
/// The transient owns its tail outright and shares trie nodes with the
/// vector it came from until it first writes to them. It is neither `Send`
/// nor `Sync`, and [`persistent`](Self::persistent) consumes it.
pub struct TransientVector<T> {
    length: usize,
    trie: Trie<T>,
    tail: ArrayVec<T, BRANCHING_FACTOR>,
    _marker: PhantomData<std::rc::Rc<()>>,
}

static_assertions::assert_not_impl_any!(TransientVector<i32>: Send, Sync, Clone);
static_assertions::assert_not_impl_any!(TransientVector<String>: Send, Sync, Clone);

impl<T> TransientVector<T> {
    /// Creates an empty transient vector.
    #[must_use]
    pub fn new() -> Self {
        Self {
            length: 0,
            trie: Trie::new(),
            tail: ArrayVec::new(),
            _marker: PhantomData,
        }
    }

    /// Returns the number of elements.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if there are no elements.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns a reference to the element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.length {
            None
        } else if index >= tail_offset(self.length) {
            self.tail.get(index & MASK)
        } else {
            self.trie
                .leaf(index)
                .and_then(|elements| elements.get(index & MASK))
        }
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] when `index >= len()`.
    pub fn nth(&self, index: usize) -> Result<&T> {
        self.get(index).ok_or(CollectionError::IndexOutOfBounds {
            index,
            count: self.length,
        })
    }

    /// Seals the transient into a persistent vector.
    #[must_use]
    pub fn persistent(self) -> PersistentVector<T> {
        tracing::trace!(count = self.length, "transient vector sealed");
        PersistentVector {
            length: self.length,
            trie: self.trie,
            tail: ReferenceCounter::new(self.tail.into_iter().collect()),
        }
    }
}

impl<T: Clone> TransientVector<T> {
    /// Appends an element in place.
    pub fn conj(&mut self, element: T) {
        if self.tail.is_full() {
            let full: Vec<T> = self.tail.drain(..).collect();
            self.trie
                .push_leaf(tail_offset(self.length), ReferenceCounter::new(full));
        }
        self.tail.push(element);
        self.length += 1;
    }

    /// Replaces the element at `index` in place; `index == len()` appends.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::IndexOutOfBounds`] when `index > len()`.
    pub fn assoc_n(&mut self, index: usize, element: T) -> Result<()> {
        if index == self.length {
            self.conj(element);
        } else if index > self.length {
            return Err(CollectionError::IndexOutOfBounds {
                index,
                count: self.length,
            });
        } else if index >= tail_offset(self.length) {
            if let Some(slot) = self.tail.get_mut(index & MASK) {
                *slot = element;
            }
        } else {
            self.trie.assoc(index, element);
        }
        Ok(())
    }

    /// Removes and returns the last element in place.
    ///
    /// # Errors
    ///
    /// Returns [`CollectionError::EmptyCollection`] when empty.
    pub fn pop(&mut self) -> Result<T> {
        let element = self
            .tail
            .pop()
            .ok_or(CollectionError::EmptyCollection { operation: "pop" })?;
        self.length -= 1;
        if self.tail.is_empty() && self.length > 0 {
            let leaf = self.trie.pop_leaf().ok_or_else(|| {
                CollectionError::InvariantViolation("trie has no leaf to refill the tail".to_string())
            })?;
            self.tail = leaf.iter().cloned().collect();
        }
        Ok(element)
    }
}

impl<T> Default for TransientVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Extend<T> for TransientVector<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for element in iter {
            self.conj(element);
        }
    }
}

// =============================================================================
// Reverse sequence
// =============================================================================

/// A sequence over a vector's elements from last to first.
pub struct VectorRSeq<T> {
    vector: PersistentVector<T>,
    remaining: usize,
}

impl<T> Clone for VectorRSeq<T> {
    fn clone(&self) -> Self {
        Self {
            vector: self.vector.clone(),
            remaining: self.remaining,
        }
    }
}

impl<T> Sequential for VectorRSeq<T> {
    type Item = T;

    fn first(&self) -> Option<&T> {
        self.remaining
            .checked_sub(1)
            .and_then(|index| self.vector.get(index))
    }

    fn rest(&self) -> Self {
        Self {
            vector: self.vector.clone(),
            remaining: self.remaining.saturating_sub(1),
        }
    }
}

impl<T> Counted for VectorRSeq<T> {
    fn count(&self) -> usize {
        self.remaining
    }
}

impl<T: fmt::Debug> fmt::Debug for VectorRSeq<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_list()
            .entries((0..self.remaining).rev().filter_map(|index| self.vector.get(index)))
            .finish()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// A borrowing, double-ended iterator over a [`PersistentVector`].
///
/// Walks one leaf at a time from either end.
pub struct PersistentVectorIterator<'a, T> {
    vector: &'a PersistentVector<T>,
    front: usize,
    back: usize,
    front_leaf: &'a [T],
    front_base: usize,
    back_leaf: &'a [T],
    back_base: usize,
}

impl<'a, T> Iterator for PersistentVectorIterator<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        if self.front < self.front_base || self.front - self.front_base >= self.front_leaf.len() {
            let vector: &'a PersistentVector<T> = self.vector;
            self.front_leaf = vector.leaf_for(self.front)?.as_slice();
            self.front_base = self.front & !MASK;
        }
        let element = self.front_leaf.get(self.front - self.front_base);
        self.front += 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T> DoubleEndedIterator for PersistentVectorIterator<'_, T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let index = self.back - 1;
        if index < self.back_base || index - self.back_base >= self.back_leaf.len() {
            let vector = self.vector;
            self.back_leaf = vector.leaf_for(index)?.as_slice();
            self.back_base = index & !MASK;
        }
        self.back = index;
        self.back_leaf.get(index - self.back_base)
    }
}

impl<T> ExactSizeIterator for PersistentVectorIterator<'_, T> {}

/// An owning iterator over a [`PersistentVector`], yielding clones.
pub struct PersistentVectorIntoIterator<T> {
    vector: PersistentVector<T>,
    front: usize,
    back: usize,
}

impl<T: Clone> Iterator for PersistentVectorIntoIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let element = self.vector.get(self.front).cloned();
        self.front += 1;
        element
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<T: Clone> DoubleEndedIterator for PersistentVectorIntoIterator<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.vector.get(self.back).cloned()
    }
}

impl<T: Clone> ExactSizeIterator for PersistentVectorIntoIterator<T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentVector<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for PersistentVector<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut transient = TransientVector::new();
        transient.extend(iter);
        transient.persistent()
    }
}

impl<T: Clone> IntoIterator for PersistentVector<T> {
    type Item = T;
    type IntoIter = PersistentVectorIntoIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        let back = self.length;
        PersistentVectorIntoIterator {
            vector: self,
            front: 0,
            back,
        }
    }
}

impl<'a, T> IntoIterator for &'a PersistentVector<T> {
    type Item = &'a T;
    type IntoIter = PersistentVectorIterator<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for PersistentVector<T> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.iter().eq(other.iter())
    }
}

impl<T: Eq> Eq for PersistentVector<T> {}

/// Hashes the length followed by every element in order, so equal vectors
/// hash equally.
///
/// # Examples
///
/// ```rust
/// use strata::persistent::PersistentVector;
/// use std::collections::HashMap;
///
/// let mut map: HashMap<PersistentVector<i32>, &str> = HashMap::new();
/// let key: PersistentVector<i32> = (1..=3).collect();
/// map.insert(key.clone(), "value");
/// assert_eq!(map.get(&key), Some(&"value"));
/// ```
impl<T: Hash> Hash for PersistentVector<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for element in self {
            element.hash(state);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for PersistentVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        let mut first = true;
        for element in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
}

impl<T: fmt::Debug> fmt::Debug for TransientVector<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("TransientVector")
            .field("len", &self.length)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Protocol Implementations
// =============================================================================

impl<T> Counted for PersistentVector<T> {
    fn count(&self) -> usize {
        self.length
    }
}

impl<T> Indexed for PersistentVector<T> {
    type Item = T;

    fn nth(&self, index: usize) -> Result<&T> {
        Self::nth(self, index)
    }
}

impl<T> Lookup for PersistentVector<T> {
    type Key = usize;
    type Value = T;

    fn lookup(&self, index: &usize) -> Option<&T> {
        self.get(*index)
    }
}

impl<T: Clone> Associative for PersistentVector<T> {
    fn contains_key(&self, index: &usize) -> bool {
        *index < self.length
    }

    fn assoc(&self, index: usize, element: T) -> Result<Self> {
        self.assoc_n(index, element)
    }
}

impl<T: Clone> Stack for PersistentVector<T> {
    type Item = T;

    fn peek(&self) -> Result<&T> {
        Self::peek(self)
    }

    fn pop(&self) -> Result<Self> {
        Self::pop(self)
    }
}

impl<T: Clone> Collection for PersistentVector<T> {
    type Item = T;

    fn conj(&self, element: T) -> Self {
        Self::conj(self, element)
    }

    fn empty(&self) -> Self {
        Self::new()
    }
}

impl<T> Seqable for PersistentVector<T> {
    type Item = T;
    type Seq = ChunkedSeq<T>;

    fn seq(&self) -> Option<ChunkedSeq<T>> {
        Self::seq(self)
    }
}

impl<T> Reducible for PersistentVector<T> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        let mut accumulator = init;
        for start in (0..self.length).step_by(BRANCHING_FACTOR) {
            if let Some(elements) = self.leaf_for(start) {
                accumulator = array_reduce(elements.as_slice(), accumulator, &mut function)?;
            }
        }
        Step::Continue(accumulator)
    }
}

impl<T: Clone> Editable for PersistentVector<T> {
    type Transient = TransientVector<T>;

    fn as_transient(&self) -> TransientVector<T> {
        self.transient()
    }
}

impl<T> Counted for TransientVector<T> {
    fn count(&self) -> usize {
        self.length
    }
}

impl<T> Indexed for TransientVector<T> {
    type Item = T;

    fn nth(&self, index: usize) -> Result<&T> {
        Self::nth(self, index)
    }
}

impl<T> Reducible for TransientVector<T> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        ci_reduce(self, init, function)
    }
}

impl<T: Clone> TransientCollection for TransientVector<T> {
    type Item = T;
    type Persistent = PersistentVector<T>;

    fn conj(&mut self, element: T) {
        Self::conj(self, element);
    }

    fn persistent(self) -> PersistentVector<T> {
        Self::persistent(self)
    }
}

impl<T: Clone> TransientAssociative for TransientVector<T> {
    type Key = usize;
    type Value = T;

    fn assoc(&mut self, index: usize, element: T) -> Result<()> {
        self.assoc_n(index, element)
    }
}

impl<T: Clone> TransientStack for TransientVector<T> {
    type Element = T;

    fn pop(&mut self) -> Result<T> {
        Self::pop(self)
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for PersistentVector<T> {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            seq.serialize_element(element)?;
        }
        seq.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentVectorVisitor<T> {
    marker: PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentVectorVisitor<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentVector<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut transient = TransientVector::new();
        while let Some(element) = seq.next_element()? {
            transient.conj(element);
        }
        Ok(transient.persistent())
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentVector<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentVectorVisitor {
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

    fn vector_of(count: usize) -> PersistentVector<usize> {
        (0..count).collect()
    }

    #[rstest]
    fn test_display_multiple_elements_vector() {
        let vector: PersistentVector<i32> = (1..=3).collect();
        assert_eq!(format!("{vector}"), "[1, 2, 3]");
        assert_eq!(format!("{}", PersistentVector::<i32>::new()), "[]");
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(32)]
    #[case(33)]
    #[case(1024)]
    #[case(1056)]
    #[case(1057)]
    #[case(32 * 32 * 32 + 33)]
    fn test_every_index_resolves(#[case] count: usize) {
        let vector = vector_of(count);
        assert_eq!(vector.len(), count);
        assert_eq!(vector.check_invariants(), Ok(()));
        for index in 0..count {
            assert_eq!(vector.get(index), Some(&index));
        }
        assert_eq!(vector.get(count), None);
    }

    #[rstest]
    fn test_nth_out_of_bounds() {
        let vector = vector_of(3);
        assert_eq!(
            vector.nth(3),
            Err(CollectionError::IndexOutOfBounds { index: 3, count: 3 })
        );
        assert_eq!(vector.nth_or(3, &99), &99);
    }

    #[rstest]
    fn test_pop_back_to_empty_keeps_invariants() {
        let mut vector = vector_of(32 * 32 + 70);
        while !vector.is_empty() {
            let expected_last = vector.len() - 1;
            assert_eq!(vector.peek(), Ok(&expected_last));
            vector = vector.pop().unwrap();
            assert_eq!(vector.check_invariants(), Ok(()));
        }
        assert_eq!(
            vector.pop(),
            Err(CollectionError::EmptyCollection { operation: "pop" })
        );
    }

    #[rstest]
    fn test_trie_shrinks_after_pop_below_level_capacity() {
        let vector = vector_of(32 * 32 + 33);
        assert_eq!(vector.trie.shift, 10);
        let popped = vector.pop().unwrap();
        assert_eq!(popped.trie.shift, 5);
        assert_eq!(popped.check_invariants(), Ok(()));
    }

    #[rstest]
    fn test_assoc_n_does_not_disturb_source() {
        let vector = vector_of(100);
        let updated = vector.assoc_n(10, 1000).unwrap();
        let tail_updated = vector.assoc_n(99, 9900).unwrap();
        assert_eq!(vector.get(10), Some(&10));
        assert_eq!(updated.get(10), Some(&1000));
        assert_eq!(tail_updated.get(99), Some(&9900));
        assert_eq!(vector.get(99), Some(&99));
    }

    #[rstest]
    fn test_assoc_n_past_end_fails() {
        let vector = vector_of(5);
        assert_eq!(
            vector.assoc_n(6, 0),
            Err(CollectionError::IndexOutOfBounds { index: 6, count: 5 })
        );
    }

    #[rstest]
    fn test_transient_pop_refills_tail() {
        let mut transient = vector_of(65).transient();
        assert_eq!(transient.pop(), Ok(64));
        assert_eq!(transient.pop(), Ok(63));
        assert_eq!(transient.get(31), Some(&31));
        let vector = transient.persistent();
        assert_eq!(vector.len(), 63);
        assert_eq!(vector.check_invariants(), Ok(()));
    }

    #[rstest]
    fn test_transient_leaves_source_untouched() {
        let source = vector_of(2000);
        let mut transient = source.transient();
        for index in 0..2000 {
            transient.assoc_n(index, 0).unwrap();
        }
        transient.conj(1);
        let built = transient.persistent();
        assert_eq!(source.get(1500), Some(&1500));
        assert_eq!(built.get(1500), Some(&0));
        assert_eq!(built.len(), 2001);
    }

    #[rstest]
    fn test_iter_is_double_ended() {
        let vector = vector_of(70);
        let reversed: Vec<usize> = vector.iter().rev().copied().collect();
        assert_eq!(reversed, (0..70).rev().collect::<Vec<_>>());

        let mut iter = vector.iter();
        assert_eq!(iter.next(), Some(&0));
        assert_eq!(iter.next_back(), Some(&69));
        assert_eq!(iter.len(), 68);
    }

    #[rstest]
    fn test_rseq_walks_backwards() {
        let vector = vector_of(3);
        let items: Vec<usize> = vector.rseq().unwrap().iter().collect();
        assert_eq!(items, vec![2, 1, 0]);
    }

    #[rstest]
    fn test_subvec_copies_range() {
        let vector = vector_of(100);
        let slice = vector.subvec(30, 70).unwrap();
        assert_eq!(slice.len(), 40);
        assert_eq!(slice.first(), Some(&30));
        assert_eq!(slice.last(), Some(&69));
        assert!(vector.subvec(50, 101).is_err());
    }

    #[rstest]
    fn test_reduce_visits_leaves_in_order() {
        let vector = vector_of(100);
        let collected = vector.fold(Vec::new(), |mut acc, value| {
            acc.push(*value);
            acc
        });
        assert_eq!(collected, (0..100).collect::<Vec<_>>());
    }
}
