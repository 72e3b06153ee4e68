//! Scenario tests for sequences and the reduce protocol across every
//! collection.

use std::cell::Cell;
use std::ops::ControlFlow;

use rstest::rstest;
use strata::prelude::*;

/// Reduces `collection`, stopping after `limit` elements, and reports how
/// many elements the reducing function saw.
fn visits_before_stop<R: Reducible>(collection: &R, limit: usize) -> usize {
    let visited = Cell::new(0);
    let _ = collection.reduce(0_usize, |seen, _| {
        visited.set(visited.get() + 1);
        if seen + 1 == limit { reduced(seen + 1) } else { ControlFlow::Continue(seen + 1) }
    });
    visited.get()
}

// =============================================================================
// Reduce short-circuit
// =============================================================================

#[rstest]
#[case(1)]
#[case(31)]
#[case(33)]
#[case(1000)]
fn test_reduce_visits_exactly_limit(#[case] limit: usize) {
    let vector: PersistentVector<u32> = (0..100_000).collect();
    let map: PersistentHashMap<u32, u32> = (0..5000).map(|key| (key, key)).collect();
    let set: PersistentHashSet<u32> = (0..5000).collect();
    let tree: PersistentTreeMap<u32, u32> = (0..5000).map(|key| (key, key)).collect();
    let chunked: Seq<u32> = (0..100_000).collect();

    assert_eq!(visits_before_stop(&vector, limit), limit);
    assert_eq!(visits_before_stop(&vector.seq().unwrap(), limit), limit);
    assert_eq!(visits_before_stop(&map, limit), limit);
    assert_eq!(visits_before_stop(&map.seq().unwrap(), limit), limit);
    assert_eq!(visits_before_stop(&set, limit), limit);
    assert_eq!(visits_before_stop(&tree, limit), limit);
    assert_eq!(visits_before_stop(&tree.seq().unwrap(), limit), limit);
    assert_eq!(visits_before_stop(&chunked, limit), limit);
    assert_eq!(visits_before_stop(&range(1_000_000), limit), limit);
}

#[rstest]
fn test_reduce_over_infinite_sequence_terminates() {
    let naturals = Seq::iterate(0_u64, |n| n + 1);
    let sum = naturals.reduce(0, |sum, value| {
        if *value == 100 { reduced(sum) } else { ControlFlow::Continue(sum + value) }
    });
    assert_eq!(sum, 4950);
}

#[rstest]
fn test_unreduced_and_is_reduced() {
    let step: Step<i32> = reduced(3);
    assert!(is_reduced(&step));
    assert_eq!(unreduced(step), 3);
    assert!(!is_reduced(&ControlFlow::<i32, i32>::Continue(1)));
}

// =============================================================================
// Seq behavior
// =============================================================================

#[rstest]
fn test_lazy_pipeline_over_vector() {
    let vector: PersistentVector<i64> = (0..10_000).collect();
    let pipeline = Seq::from_seqable(&vector)
        .filter(|n| n % 7 == 0)
        .map(|n| n * n)
        .drop(2)
        .take(3);
    assert_eq!(pipeline.iter().collect::<Vec<_>>(), vec![196, 441, 784]);
}

#[rstest]
fn test_from_seq_keeps_sorted_map_order() {
    let tree: PersistentTreeMap<i32, char> = [(3, 'c'), (1, 'a'), (2, 'b')].into_iter().collect();
    let values = Seq::from_seq(tree.seq().unwrap()).map(|entry| *entry.value());
    assert_eq!(values.iter().collect::<String>(), "abc");
}

#[rstest]
fn test_lazy_seq_runs_thunk_once() {
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let counter = std::sync::Arc::clone(&calls);
    let seq: Seq<i32> = Seq::lazy(move || {
        counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Seq::cons(1, Seq::cons(2, Seq::empty()))
    });
    assert_eq!(seq.count(), 2);
    assert_eq!(seq.first(), Some(&1));
    assert_eq!(seq.rest().first(), Some(&2));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[rstest]
fn test_concat_of_range_and_vector() {
    let numbers = Seq::from_seq(Range::new(0, 3, 1));
    let vector: PersistentVector<i64> = (10..13).collect();
    let joined = numbers.concat(&Seq::from_seqable(&vector));
    assert_eq!(joined.iter().collect::<Vec<_>>(), vec![0, 1, 2, 10, 11, 12]);
}

#[rstest]
fn test_count_seq_walks_uncounted_sequences() {
    let seq: Seq<u8> = (0..=255).collect();
    assert_eq!(count_seq(&seq), 256);
    assert_eq!(count_seq(&seq.filter(|n| n % 2 == 0)), 128);
}

#[rstest]
fn test_into_copies_through_transient() {
    let vector: PersistentVector<u32> = (0..10).collect();
    let from_range = into(&vector, &Range::new(10, 20, 1).iter().map(|n| n as u32).collect::<Seq<u32>>());
    assert_eq!(from_range.len(), 20);
    assert_eq!(from_range.last(), Some(&19));
    assert_eq!(vector.len(), 10);
}
