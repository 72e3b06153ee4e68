//! Persistent (immutable) collections.
//!
//! Every update returns a new collection that shares most of its structure
//! with the old one, which stays valid and unchanged:
//!
//! - [`PersistentVector`]: Indexed vector (32-way trie with a tail)
//! - [`PersistentHashMap`]: Hash map (flat array form, then HAMT)
//! - [`PersistentHashSet`]: Hash set (based on [`PersistentHashMap`])
//! - [`PersistentTreeMap`]: Sorted map (Red-Black Tree with a [`Comparator`])
//! - [`PersistentTreeSet`]: Sorted set (based on [`PersistentTreeMap`])
//!
//! The vector, hash map and hash set also have a transient form for
//! batches of updates, see [`PersistentVector::transient`].
//!
//! # Examples
//!
//! ## `PersistentVector`
//!
//! ```rust
//! use strata::persistent::PersistentVector;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! assert_eq!(vector.get(50), Some(&50));
//!
//! // Structural sharing: the original vector is preserved
//! let updated = vector.assoc_n(50, 999).unwrap();
//! assert_eq!(vector.get(50), Some(&50));     // Original unchanged
//! assert_eq!(updated.get(50), Some(&999));   // New version
//! ```
//!
//! ## `PersistentHashMap`
//!
//! ```rust
//! use strata::persistent::PersistentHashMap;
//!
//! let map = PersistentHashMap::new()
//!     .insert("one".to_string(), 1)
//!     .insert("two".to_string(), 2);
//! assert_eq!(map.get("one"), Some(&1));
//!
//! let updated = map.insert("one".to_string(), 100);
//! assert_eq!(map.get("one"), Some(&1));       // Original unchanged
//! assert_eq!(updated.get("one"), Some(&100)); // New version
//! ```
//!
//! ## `PersistentHashSet`
//!
//! ```rust
//! use strata::persistent::PersistentHashSet;
//!
//! let set: PersistentHashSet<i32> = [1, 2, 3].into_iter().collect();
//! let other: PersistentHashSet<i32> = [2, 3, 4].into_iter().collect();
//!
//! assert_eq!(set.union(&other).len(), 4);        // {1, 2, 3, 4}
//! assert_eq!(set.intersection(&other).len(), 2); // {2, 3}
//! ```
//!
//! ## `PersistentTreeMap`
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
//! let range: Vec<(&i32, &&str)> = map.range(1..=2).collect();
//! assert_eq!(range.len(), 2); // 1 and 2
//! ```

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

pub(crate) mod bits;
mod comparator;
mod entry;
mod error;
mod hamt;
mod hashmap;
mod hashset;
mod treemap;
mod treeset;
pub(crate) mod vector;

pub use bits::BRANCHING_FACTOR;
pub use comparator::{Comparator, NaturalOrder, ReverseOrder};
pub use entry::MapEntry;
pub use error::{CollectionError, Result};
pub use hamt::{ARRAY_NODE_PACK, ARRAY_NODE_PROMOTION};
pub use hashmap::ARRAY_MAP_THRESHOLD;
pub use hashmap::HashMapSeq;
pub use hashmap::PersistentHashMap;
pub use hashmap::PersistentHashMapIntoIterator;
pub use hashmap::PersistentHashMapIterator;
pub use hashmap::TransientHashMap;
pub use hashset::HashSetSeq;
pub use hashset::PersistentHashSet;
pub use hashset::PersistentHashSetIterator;
pub use hashset::TransientHashSet;
pub use treemap::PersistentTreeMap;
pub use treemap::PersistentTreeMapIntoIterator;
pub use treemap::PersistentTreeMapIterator;
pub use treemap::PersistentTreeMapRangeIterator;
pub use treemap::TreeMapSeq;
pub use treeset::PersistentTreeSet;
pub use treeset::PersistentTreeSetIterator;
pub use treeset::TreeSetSeq;
pub use vector::PersistentVector;
pub use vector::PersistentVectorIntoIterator;
pub use vector::PersistentVectorIterator;
pub use vector::TransientVector;
pub use vector::VectorRSeq;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_clone() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(*reference_counter, *reference_counter_clone);
    }

    #[rstest]
    fn test_reference_counter_strong_count() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 2);
        drop(reference_counter_clone);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
    }
}
