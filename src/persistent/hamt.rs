//! Hash array mapped trie nodes.
//!
//! The trie has three node kinds:
//!
//! - [`BitmapIndexedNode`]: a sparse node. A 32-bit bitmap records which of
//!   the 32 hash fragments are populated, and a dense vector holds one slot
//!   per set bit. A slot is either an inline entry or a child node.
//! - [`ArrayNode`]: a dense node with 32 optional children, used once a
//!   bitmap node grows past [`ARRAY_NODE_PROMOTION`] slots.
//! - [`HashCollisionNode`]: a flat list of entries whose keys share the same
//!   full 32-bit hash.
//!
//! All mutation goes through `ReferenceCounter::make_mut`. A node reachable
//! from more than one map is copied before it is changed, so calling the
//! mutating operations on a freshly cloned root performs path copying, while
//! calling them from a transient that already owns its nodes updates them in
//! place.

use std::borrow::Borrow;
use std::hash::Hash;
use std::mem;
use std::ops::ControlFlow;

use super::ReferenceCounter;
use super::bits::{BITS_PER_LEVEL, BRANCHING_FACTOR, bit_position, dense_index, fragment, hash_key};
use super::entry::MapEntry;
use super::error::{CollectionError, Result};
use crate::protocol::Step;

// =============================================================================
// Constants
// =============================================================================

/// A bitmap node already holding this many slots becomes an array node on
/// its next insertion.
pub const ARRAY_NODE_PROMOTION: usize = 16;

/// An array node whose live child count drops to this value is packed back
/// into a bitmap node.
pub const ARRAY_NODE_PACK: usize = 8;

// =============================================================================
// Node Definitions
// =============================================================================

pub(crate) type NodeRef<K, V> = ReferenceCounter<Node<K, V>>;

#[derive(Clone)]
pub(crate) enum Node<K, V> {
    Bitmap(BitmapIndexedNode<K, V>),
    Array(ArrayNode<K, V>),
    Collision(HashCollisionNode<K, V>),
}

/// One populated position of a bitmap node.
#[derive(Clone)]
pub(crate) enum Slot<K, V> {
    Entry(MapEntry<K, V>),
    Child(NodeRef<K, V>),
}

#[derive(Clone)]
pub(crate) struct BitmapIndexedNode<K, V> {
    pub(crate) bitmap: u32,
    pub(crate) slots: Vec<Slot<K, V>>,
}

#[derive(Clone)]
pub(crate) struct ArrayNode<K, V> {
    pub(crate) live: usize,
    pub(crate) children: Vec<Option<NodeRef<K, V>>>,
}

#[derive(Clone)]
pub(crate) struct HashCollisionNode<K, V> {
    pub(crate) hash: u32,
    pub(crate) entries: Vec<MapEntry<K, V>>,
}

// =============================================================================
// Read Operations
// =============================================================================

impl<K, V> Node<K, V> {
    pub(crate) const fn empty() -> Self {
        Self::Bitmap(BitmapIndexedNode {
            bitmap: 0,
            slots: Vec::new(),
        })
    }

    pub(crate) fn is_empty(&self) -> bool {
        match self {
            Self::Bitmap(node) => node.slots.is_empty(),
            Self::Array(node) => node.live == 0,
            Self::Collision(node) => node.entries.is_empty(),
        }
    }

    /// The node's only entry, when it holds exactly one inline entry and
    /// nothing else.
    fn single_entry(&self) -> Option<&MapEntry<K, V>> {
        match self {
            Self::Bitmap(node) => match node.slots.as_slice() {
                [Slot::Entry(entry)] => Some(entry),
                _ => None,
            },
            Self::Collision(node) => match node.entries.as_slice() {
                [entry] => Some(entry),
                _ => None,
            },
            Self::Array(_) => None,
        }
    }

    /// Finds the entry for `key`, whose hash is `hash`.
    pub(crate) fn find<Q>(&self, shift: usize, hash: u32, key: &Q) -> Option<&MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut node = self;
        let mut shift = shift;
        loop {
            match node {
                Self::Bitmap(bitmap_node) => {
                    let bit = bit_position(hash, shift);
                    if bitmap_node.bitmap & bit == 0 {
                        return None;
                    }
                    match bitmap_node
                        .slots
                        .get(dense_index(bitmap_node.bitmap, bit))?
                    {
                        Slot::Entry(entry) => {
                            return (entry.key.borrow() == key).then_some(entry);
                        }
                        Slot::Child(child) => node = child.as_ref(),
                    }
                }
                Self::Array(array_node) => {
                    node = array_node.children.get(fragment(hash, shift))?.as_deref()?;
                }
                Self::Collision(collision_node) => {
                    return collision_node
                        .entries
                        .iter()
                        .find(|entry| entry.key.borrow() == key);
                }
            }
            shift += BITS_PER_LEVEL;
        }
    }

    /// Folds every entry below this node.
    pub(crate) fn try_reduce<A, F>(&self, init: A, function: &mut F) -> Step<A>
    where
        F: FnMut(A, &MapEntry<K, V>) -> Step<A>,
    {
        let mut accumulator = init;
        match self {
            Self::Bitmap(node) => {
                for slot in &node.slots {
                    accumulator = match slot {
                        Slot::Entry(entry) => function(accumulator, entry)?,
                        Slot::Child(child) => child.try_reduce(accumulator, function)?,
                    };
                }
            }
            Self::Array(node) => {
                for child in node.children.iter().flatten() {
                    accumulator = child.try_reduce(accumulator, function)?;
                }
            }
            Self::Collision(node) => {
                for entry in &node.entries {
                    accumulator = function(accumulator, entry)?;
                }
            }
        }
        ControlFlow::Continue(accumulator)
    }
}

// =============================================================================
// Write Operations
// =============================================================================

impl<K: Clone + Hash + Eq, V: Clone> Node<K, V> {
    /// Associates `key` with `value` below `this`.
    ///
    /// Returns the previous value when the key was already present.
    pub(crate) fn assoc(
        this: &mut NodeRef<K, V>,
        shift: usize,
        hash: u32,
        key: K,
        value: V,
    ) -> Option<V> {
        let node = ReferenceCounter::make_mut(this);
        match node {
            Self::Bitmap(bitmap_node) => {
                let bit = bit_position(hash, shift);
                let index = dense_index(bitmap_node.bitmap, bit);
                if bitmap_node.bitmap & bit != 0 {
                    let existing = match &mut bitmap_node.slots[index] {
                        Slot::Child(child) => {
                            return Self::assoc(child, shift + BITS_PER_LEVEL, hash, key, value);
                        }
                        Slot::Entry(entry) if entry.key == key => {
                            return Some(mem::replace(&mut entry.value, value));
                        }
                        Slot::Entry(entry) => entry.clone(),
                    };
                    bitmap_node.slots[index] = Slot::Child(Self::create_node(
                        shift + BITS_PER_LEVEL,
                        existing,
                        hash,
                        key,
                        value,
                    ));
                    return None;
                }
                if bitmap_node.slots.len() >= ARRAY_NODE_PROMOTION {
                    let mut array_node = bitmap_node.promote(shift);
                    array_node.assoc(shift, hash, key, value);
                    *node = Self::Array(array_node);
                    return None;
                }
                bitmap_node
                    .slots
                    .insert(index, Slot::Entry(MapEntry::new(key, value)));
                bitmap_node.bitmap |= bit;
                None
            }
            Self::Array(array_node) => array_node.assoc(shift, hash, key, value),
            Self::Collision(collision_node) => {
                if collision_node.hash == hash {
                    if let Some(entry) = collision_node
                        .entries
                        .iter_mut()
                        .find(|entry| entry.key == key)
                    {
                        return Some(mem::replace(&mut entry.value, value));
                    }
                    collision_node.entries.push(MapEntry::new(key, value));
                    return None;
                }
                let nested = HashCollisionNode {
                    hash: collision_node.hash,
                    entries: mem::take(&mut collision_node.entries),
                };
                *node = Self::Bitmap(BitmapIndexedNode {
                    bitmap: bit_position(nested.hash, shift),
                    slots: vec![Slot::Child(ReferenceCounter::new(Self::Collision(nested)))],
                });
                Self::assoc(this, shift, hash, key, value)
            }
        }
    }

    /// Builds the subtree holding `existing` and the new entry, which
    /// collided on the fragment one level up.
    fn create_node(
        shift: usize,
        existing: MapEntry<K, V>,
        hash: u32,
        key: K,
        value: V,
    ) -> NodeRef<K, V> {
        let existing_hash = hash_key(&existing.key);
        if existing_hash == hash {
            return ReferenceCounter::new(Self::Collision(HashCollisionNode {
                hash,
                entries: vec![existing, MapEntry::new(key, value)],
            }));
        }
        let mut node = ReferenceCounter::new(Self::empty());
        Self::assoc(&mut node, shift, existing_hash, existing.key, existing.value);
        Self::assoc(&mut node, shift, hash, key, value);
        node
    }

    /// Removes `key` below `this`, returning the removed entry.
    ///
    /// Callers check that the key is present first, so that an absent key
    /// never forces a copy of shared nodes.
    pub(crate) fn without<Q>(
        this: &mut NodeRef<K, V>,
        shift: usize,
        hash: u32,
        key: &Q,
    ) -> Option<MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let node = ReferenceCounter::make_mut(this);
        let mut packed = None;
        let removed = match node {
            Self::Bitmap(bitmap_node) => bitmap_node.without(shift, hash, key),
            Self::Array(array_node) => {
                let removed = array_node.without(shift, hash, key);
                if removed.is_some() && array_node.live <= ARRAY_NODE_PACK {
                    packed = Some(array_node.pack(shift));
                }
                removed
            }
            Self::Collision(collision_node) => {
                let position = collision_node
                    .entries
                    .iter()
                    .position(|entry| entry.key.borrow() == key)?;
                Some(collision_node.entries.remove(position))
            }
        };
        if let Some(bitmap_node) = packed {
            *node = Self::Bitmap(bitmap_node);
        }
        removed
    }

    /// Verifies bitmap population, array live counts, collision hashes and
    /// entry placement, returning the number of entries below this node.
    pub(crate) fn check_invariants(&self, shift: usize, prefix: u32) -> Result<usize> {
        let placed = |hash: u32| -> bool {
            let prefix_mask = if shift == 0 { 0 } else { u32::MAX >> (32 - shift.min(32)) };
            hash & prefix_mask == prefix & prefix_mask
        };
        match self {
            Self::Bitmap(node) => {
                if node.bitmap.count_ones() as usize != node.slots.len() {
                    return Err(CollectionError::InvariantViolation(format!(
                        "bitmap population {} does not match {} slots",
                        node.bitmap.count_ones(),
                        node.slots.len()
                    )));
                }
                let mut count = 0;
                let mut slots = node.slots.iter();
                for position in 0..BRANCHING_FACTOR {
                    if node.bitmap & (1 << position) == 0 {
                        continue;
                    }
                    let child_prefix = prefix | ((position as u32) << shift);
                    match slots.next() {
                        Some(Slot::Entry(entry)) => {
                            let hash = hash_key(&entry.key);
                            if !placed(hash) || fragment(hash, shift) != position {
                                return Err(CollectionError::InvariantViolation(
                                    "inline entry stored under the wrong hash fragment".to_string(),
                                ));
                            }
                            count += 1;
                        }
                        Some(Slot::Child(child)) => {
                            count += child.check_invariants(shift + BITS_PER_LEVEL, child_prefix)?;
                        }
                        None => {}
                    }
                }
                Ok(count)
            }
            Self::Array(node) => {
                let live = node.children.iter().flatten().count();
                if live != node.live || node.children.len() != BRANCHING_FACTOR {
                    return Err(CollectionError::InvariantViolation(format!(
                        "array node records {} live children but holds {live}",
                        node.live
                    )));
                }
                let mut count = 0;
                for (position, child) in node.children.iter().enumerate() {
                    if let Some(child) = child {
                        let child_prefix = prefix | ((position as u32) << shift);
                        count += child.check_invariants(shift + BITS_PER_LEVEL, child_prefix)?;
                    }
                }
                Ok(count)
            }
            Self::Collision(node) => {
                let consistent = !node.entries.is_empty()
                    && node.entries.iter().all(|entry| hash_key(&entry.key) == node.hash);
                if !consistent || !placed(node.hash) {
                    return Err(CollectionError::InvariantViolation(
                        "collision node holds keys with differing hashes".to_string(),
                    ));
                }
                Ok(node.entries.len())
            }
        }
    }
}

impl<K: Clone + Hash + Eq, V: Clone> BitmapIndexedNode<K, V> {
    fn without<Q>(&mut self, shift: usize, hash: u32, key: &Q) -> Option<MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let bit = bit_position(hash, shift);
        if self.bitmap & bit == 0 {
            return None;
        }
        let index = dense_index(self.bitmap, bit);
        match self.slots.get_mut(index)? {
            Slot::Entry(entry) if entry.key.borrow() == key => {}
            Slot::Entry(_) => return None,
            Slot::Child(child) => {
                let removed = Node::without(child, shift + BITS_PER_LEVEL, hash, key)?;
                if child.is_empty() {
                    self.remove_slot(index, bit);
                } else if let Some(single) = child.single_entry() {
                    let single = single.clone();
                    self.slots[index] = Slot::Entry(single);
                }
                return Some(removed);
            }
        }
        match self.remove_slot(index, bit) {
            Slot::Entry(entry) => Some(entry),
            Slot::Child(_) => None,
        }
    }

    fn remove_slot(&mut self, index: usize, bit: u32) -> Slot<K, V> {
        self.bitmap ^= bit;
        self.slots.remove(index)
    }

    /// Spreads the slots over a dense array node. Inline entries move one
    /// level down into their own bitmap nodes.
    fn promote(&mut self, shift: usize) -> ArrayNode<K, V> {
        let mut children = vec![None; BRANCHING_FACTOR];
        let mut slots = mem::take(&mut self.slots).into_iter();
        for (position, child) in children.iter_mut().enumerate() {
            if self.bitmap & (1 << position) == 0 {
                continue;
            }
            *child = slots.next().map(|slot| match slot {
                Slot::Child(node) => node,
                Slot::Entry(entry) => {
                    let mut node = ReferenceCounter::new(Node::empty());
                    Node::assoc(
                        &mut node,
                        shift + BITS_PER_LEVEL,
                        hash_key(&entry.key),
                        entry.key,
                        entry.value,
                    );
                    node
                }
            });
        }
        let live = children.iter().flatten().count();
        tracing::trace!(shift, live, "bitmap node promoted to array node");
        ArrayNode { live, children }
    }
}

impl<K: Clone + Hash + Eq, V: Clone> ArrayNode<K, V> {
    fn assoc(&mut self, shift: usize, hash: u32, key: K, value: V) -> Option<V> {
        let index = fragment(hash, shift);
        if let Some(child) = self.children[index].as_mut() {
            return Node::assoc(child, shift + BITS_PER_LEVEL, hash, key, value);
        }
        let mut child = ReferenceCounter::new(Node::empty());
        Node::assoc(&mut child, shift + BITS_PER_LEVEL, hash, key, value);
        self.children[index] = Some(child);
        self.live += 1;
        None
    }

    fn without<Q>(&mut self, shift: usize, hash: u32, key: &Q) -> Option<MapEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let index = fragment(hash, shift);
        let child = self.children.get_mut(index)?.as_mut()?;
        let removed = Node::without(child, shift + BITS_PER_LEVEL, hash, key)?;
        if child.is_empty() {
            self.children[index] = None;
            self.live -= 1;
        }
        Some(removed)
    }

    fn pack(&mut self, shift: usize) -> BitmapIndexedNode<K, V> {
        let mut bitmap = 0;
        let mut slots = Vec::with_capacity(self.live);
        for (position, child) in self.children.iter_mut().enumerate() {
            if let Some(child) = child.take() {
                bitmap |= 1 << position;
                slots.push(Slot::Child(child));
            }
        }
        tracing::trace!(shift, live = slots.len(), "array node packed into bitmap node");
        BitmapIndexedNode { bitmap, slots }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn root_of(entries: impl IntoIterator<Item = (i32, i32)>) -> NodeRef<i32, i32> {
        let mut root = ReferenceCounter::new(Node::empty());
        for (key, value) in entries {
            Node::assoc(&mut root, 0, hash_key(&key), key, value);
        }
        root
    }

    #[rstest]
    fn test_assoc_and_find() {
        let root = root_of((0..100).map(|key| (key, key * 2)));
        for key in 0..100 {
            let entry = root.find(0, hash_key(&key), &key);
            assert_eq!(entry.map(|entry| entry.value), Some(key * 2));
        }
        assert!(root.find(0, hash_key(&1000), &1000).is_none());
        assert_eq!(root.check_invariants(0, 0), Ok(100));
    }

    #[rstest]
    fn test_assoc_returns_previous_value() {
        let mut root = root_of([(1, 10)]);
        assert_eq!(Node::assoc(&mut root, 0, hash_key(&1), 1, 11), Some(10));
        assert_eq!(Node::assoc(&mut root, 0, hash_key(&2), 2, 20), None);
    }

    #[rstest]
    fn test_root_promotes_to_array_node_and_packs_back() {
        let mut root = root_of((0..2000).map(|key| (key, key)));
        assert!(matches!(root.as_ref(), Node::Array(_)));
        for key in 0..2000 {
            assert!(Node::without(&mut root, 0, hash_key(&key), &key).is_some());
            assert_eq!(root.check_invariants(0, 0), Ok(1999 - key as usize));
        }
        assert!(root.is_empty());
        assert!(matches!(root.as_ref(), Node::Bitmap(_)));
    }

    #[rstest]
    fn test_shared_root_is_copied_on_write() {
        let original = root_of((0..50).map(|key| (key, key)));
        let mut copy = original.clone();
        Node::assoc(&mut copy, 0, hash_key(&7), 7, 700);
        assert_eq!(original.find(0, hash_key(&7), &7).map(|entry| entry.value), Some(7));
        assert_eq!(copy.find(0, hash_key(&7), &7).map(|entry| entry.value), Some(700));
    }

    #[rstest]
    fn test_try_reduce_visits_every_entry() {
        let root = root_of((0..300).map(|key| (key, 1)));
        let total = root.try_reduce(0, &mut |sum, entry: &MapEntry<i32, i32>| {
            ControlFlow::Continue(sum + entry.value)
        });
        assert_eq!(total, ControlFlow::Continue(300));
    }
}
