//! Property-based tests for `PersistentTreeMap` laws.

use std::collections::BTreeMap;

use proptest::prelude::*;
use strata::prelude::*;

#[derive(Debug, Clone)]
enum Operation {
    Insert(i16, u8),
    Remove(i16),
}

fn operation() -> impl Strategy<Value = Operation> {
    prop_oneof![
        2 => (-200..200_i16, any::<u8>()).prop_map(|(key, value)| Operation::Insert(key, value)),
        1 => (-200..200_i16).prop_map(Operation::Remove),
    ]
}

proptest! {
    /// Ordering Law: after any operations, traversal is strictly increasing
    /// and the red-black rules hold after every step
    #[test]
    fn prop_ordering_and_balance_law(operations in prop::collection::vec(operation(), 0..300)) {
        let mut model = BTreeMap::new();
        let mut map = PersistentTreeMap::new();
        for operation in operations {
            match operation {
                Operation::Insert(key, value) => {
                    model.insert(key, value);
                    map = map.insert(key, value);
                }
                Operation::Remove(key) => {
                    model.remove(&key);
                    map = map.remove(&key);
                }
            }
            prop_assert!(map.check_invariants().is_ok());
        }
        let keys: Vec<i16> = map.keys().copied().collect();
        prop_assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
        let pairs: Vec<(i16, u8)> = map.iter().map(|(key, value)| (*key, *value)).collect();
        let expected: Vec<(i16, u8)> = model.into_iter().collect();
        prop_assert_eq!(pairs, expected);
    }

    /// Get-Assoc Law
    #[test]
    fn prop_get_after_assoc(
        entries in prop::collection::vec((any::<i32>(), any::<i32>()), 0..200),
        key: i32,
        value: i32
    ) {
        let map: PersistentTreeMap<i32, i32> = entries.into_iter().collect();
        let inserted = map.insert(key, value);
        prop_assert_eq!(inserted.get(&key), Some(&value));
    }

    /// Immutability Law: removing leaves the source map intact
    #[test]
    fn prop_remove_does_not_touch_source(
        keys in prop::collection::btree_set(any::<i32>(), 1..200),
        seed: usize
    ) {
        let map: PersistentTreeMap<i32, ()> = keys.iter().map(|key| (*key, ())).collect();
        let victim = *keys.iter().nth(seed % keys.len()).unwrap();
        let removed = map.remove(&victim);
        prop_assert_eq!(map.len(), keys.len());
        prop_assert!(map.contains_key(&victim));
        prop_assert!(!removed.contains_key(&victim));
    }

    /// Subseq Law: a bounded sequence agrees with the borrowing range iterator
    #[test]
    fn prop_subseq_matches_range(
        keys in prop::collection::btree_set(-100..100_i32, 0..100),
        low in -120..120_i32,
        span in 0..80_i32
    ) {
        let map: PersistentTreeMap<i32, ()> = keys.iter().map(|key| (*key, ())).collect();
        let high = low + span;
        let through_seq: Vec<i32> = map
            .subseq(low..high)
            .map(|seq| seq.iter().map(|entry| *entry.key()).collect())
            .unwrap_or_default();
        let through_range: Vec<i32> = map.range(low..high).map(|(key, _)| *key).collect();
        let mut reversed: Vec<i32> = map
            .rsubseq(low..high)
            .map(|seq| seq.iter().map(|entry| *entry.key()).collect())
            .unwrap_or_default();
        reversed.reverse();
        prop_assert_eq!(&through_seq, &through_range);
        prop_assert_eq!(through_seq, reversed);
    }
}
