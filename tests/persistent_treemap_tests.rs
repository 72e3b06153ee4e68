//! Scenario tests for `PersistentTreeMap` and `PersistentTreeSet`.

use std::cmp::Ordering;

use rstest::rstest;
use strata::prelude::*;

fn keys<V: Clone, C: Comparator<i32> + Clone>(map: &PersistentTreeMap<i32, V, C>) -> Vec<i32> {
    map.seq()
        .map(|seq| seq.iter().map(|entry| *entry.key()).collect())
        .unwrap_or_default()
}

#[rstest]
fn test_insert_traverse_remove_traverse() {
    let map = [5, 3, 8, 1, 4, 7, 9, 2, 6]
        .into_iter()
        .fold(PersistentTreeMap::new(), |map, key| map.insert(key, key * 10));
    assert_eq!(keys(&map), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);

    let without_five = map.remove(&5);
    assert_eq!(keys(&without_five), vec![1, 2, 3, 4, 6, 7, 8, 9]);
    assert!(without_five.check_invariants().is_ok());
    assert_eq!(keys(&map).len(), 9);
}

#[rstest]
fn test_closure_comparator_orders_by_length_then_text() {
    let by_length = |left: &String, right: &String| {
        left.len().cmp(&right.len()).then_with(|| left.cmp(right))
    };
    let map = ["ccc", "a", "bb", "aa"]
        .into_iter()
        .fold(PersistentTreeMap::with_comparator(by_length), |map, word| {
            map.insert(word.to_string(), word.len())
        });
    let ordered: Vec<&str> = map.keys().map(String::as_str).collect();
    assert_eq!(ordered, vec!["a", "aa", "bb", "ccc"]);
}

#[rstest]
fn test_reverse_order_rseq_is_ascending() {
    let map: PersistentTreeMap<i32, (), ReverseOrder> = (0..50)
        .fold(PersistentTreeMap::with_comparator(ReverseOrder), |map, key| map.insert(key, ()));
    assert_eq!(keys(&map), (0..50).rev().collect::<Vec<_>>());
    let ascending: Vec<i32> = map.rseq().unwrap().iter().map(|entry| *entry.key()).collect();
    assert_eq!(ascending, (0..50).collect::<Vec<_>>());
}

#[rstest]
fn test_protocol_map_operations() {
    let map: PersistentTreeMap<i32, &str> = PersistentTreeMap::new();
    let map = Associative::assoc(&map, 2, "two").unwrap();
    let map = Collection::conj(&map, MapEntry::new(1, "one"));
    assert_eq!(Lookup::lookup(&map, &1), Some(&"one"));
    assert_eq!(Lookup::lookup_or(&map, &9, &"none"), &"none");
    assert!(Associative::contains_key(&map, &2));
    assert_eq!(Counted::count(&PersistentMap::dissoc(&map, &2)), 1);
}

#[rstest]
fn test_equal_maps_hash_equally() {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let digest = |map: &PersistentTreeMap<i32, i32>| {
        let mut hasher = DefaultHasher::new();
        map.hash(&mut hasher);
        hasher.finish()
    };
    let forward: PersistentTreeMap<i32, i32> = (0..100).map(|key| (key, key)).collect();
    let backward: PersistentTreeMap<i32, i32> = (0..100).rev().map(|key| (key, key)).collect();
    assert_eq!(forward, backward);
    assert_eq!(digest(&forward), digest(&backward));
}

#[rstest]
fn test_merge_overrides_and_keeps_order() {
    let left: PersistentTreeMap<i32, char> = [(1, 'a'), (3, 'c')].into_iter().collect();
    let right: PersistentTreeMap<i32, char> = [(2, 'b'), (3, 'C')].into_iter().collect();
    let merged = left.merge(&right);
    assert_eq!(
        merged.iter().map(|(key, value)| (*key, *value)).collect::<Vec<_>>(),
        vec![(1, 'a'), (2, 'b'), (3, 'C')]
    );
}

#[rstest]
fn test_from_keys_values_with_comparator() {
    let descending = |left: &i32, right: &i32| right.cmp(left);
    let map = PersistentTreeMap::from_keys_values(descending, [1, 2, 3], ["one", "two", "three"]);
    assert_eq!(map.first_entry().map(|entry| *entry.key()), Some(3));
    assert_eq!(map.comparator()(&1, &2), Ordering::Greater);
}

#[rstest]
fn test_tree_set_subseq_matches_range() {
    let set: PersistentTreeSet<i32> = (0..100).map(|value| value * 2).collect();
    let from_seq: Vec<i32> = set.subseq(10..=20).unwrap().iter().collect();
    let from_range: Vec<i32> = set.range(10..=20).copied().collect();
    assert_eq!(from_seq, vec![10, 12, 14, 16, 18, 20]);
    assert_eq!(from_seq, from_range);
}
