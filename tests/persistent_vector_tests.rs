//! Scenario tests for `PersistentVector` and `TransientVector`.
//!
//! Sizes are chosen around the trie boundaries: 32 (tail only), 1056
//! (32 + 32 * 32, the last size with a one-level trie) and 33824
//! (two levels full plus a tail).

use rstest::rstest;
use strata::prelude::*;

// =============================================================================
// Construction and lookup
// =============================================================================

#[rstest]
fn test_conj_ten_thousand_then_nth() {
    let mut vector = PersistentVector::new();
    for value in 1..=10_000 {
        vector = vector.conj(value);
    }
    assert_eq!(vector.nth(4999), Ok(&5000));
    assert_eq!(vector.count(), 10_000);
    assert!(vector.check_invariants().is_ok());
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(32)]
#[case(33)]
#[case(1056)]
#[case(1057)]
#[case(33_824)]
#[case(33_825)]
fn test_every_index_reachable(#[case] size: usize) {
    let vector: PersistentVector<usize> = (0..size).collect();
    assert_eq!(vector.len(), size);
    assert!((0..size).all(|index| vector.get(index) == Some(&index)));
    assert_eq!(vector.get(size), None);
    assert!(vector.check_invariants().is_ok());
}

#[rstest]
fn test_nth_out_of_bounds_reports_index_and_count() {
    let vector: PersistentVector<i32> = (0..3).collect();
    assert_eq!(
        vector.nth(7),
        Err(CollectionError::IndexOutOfBounds { index: 7, count: 3 })
    );
    assert_eq!(vector.nth_or(7, &-1), &-1);
}

// =============================================================================
// Immutability
// =============================================================================

#[rstest]
fn test_updates_leave_original_untouched() {
    let original: PersistentVector<i32> = (0..2000).collect();
    let snapshot: Vec<i32> = original.iter().copied().collect();

    let conjed = original.conj(-1);
    let assoced = original.assoc_n(1500, -2).unwrap();
    let popped = original.pop().unwrap();

    assert_eq!(original.iter().copied().collect::<Vec<_>>(), snapshot);
    assert_eq!(conjed.len(), 2001);
    assert_eq!(assoced.get(1500), Some(&-2));
    assert_eq!(popped.len(), 1999);
}

// =============================================================================
// Stack behavior
// =============================================================================

#[rstest]
fn test_pop_across_trie_levels_down_to_empty() {
    let mut vector: PersistentVector<usize> = (0..1100).collect();
    for expected_length in (0..1100).rev() {
        assert_eq!(vector.peek(), Ok(&expected_length));
        vector = vector.pop().unwrap();
        assert_eq!(vector.len(), expected_length);
        if expected_length % 97 == 0 {
            assert!(vector.check_invariants().is_ok());
        }
    }
    assert!(vector.is_empty());
}

#[rstest]
fn test_pop_and_peek_on_empty_fail() {
    let vector: PersistentVector<u8> = PersistentVector::new();
    assert_eq!(
        vector.pop(),
        Err(CollectionError::EmptyCollection { operation: "pop" })
    );
    assert_eq!(
        vector.peek(),
        Err(CollectionError::EmptyCollection { operation: "peek" })
    );
}

#[rstest]
#[case(0)]
#[case(5)]
#[case(100)]
fn test_assoc_n_at_length_appends(#[case] size: usize) {
    let vector: PersistentVector<usize> = (0..size).collect();
    let grown = vector.assoc_n(size, 999).unwrap();
    assert_eq!(grown.len(), size + 1);
    assert_eq!(grown.last(), Some(&999));
    assert!(vector.assoc_n(size + 1, 0).is_err());
}

#[rstest]
fn test_subvec_copies_range() {
    let vector: PersistentVector<i32> = (0..100).collect();
    let slice = vector.subvec(30, 70).unwrap();
    assert_eq!(slice.len(), 40);
    assert_eq!(slice.first(), Some(&30));
    assert_eq!(slice.last(), Some(&69));
    assert!(vector.subvec(70, 30).is_err());
    assert!(vector.subvec(0, 101).is_err());
}

// =============================================================================
// Transients
// =============================================================================

#[rstest]
fn test_transient_round_trip_equals_original() {
    let vector: PersistentVector<i32> = (0..5000).collect();
    assert_eq!(vector.transient().persistent(), vector);
}

#[rstest]
fn test_transient_does_not_disturb_source() {
    let source: PersistentVector<i32> = (0..100).collect();
    let mut transient = source.transient();
    for index in 0..100 {
        transient.assoc_n(index, -1).unwrap();
    }
    transient.conj(7);
    let edited = transient.persistent();

    assert!(source.iter().copied().eq(0..100));
    assert!(edited.iter().take(100).all(|value| *value == -1));
    assert_eq!(edited.last(), Some(&7));
}

#[rstest]
fn test_transient_pop_refills_tail() {
    let mut transient: TransientVector<usize> = (0..70).collect::<PersistentVector<_>>().transient();
    for expected in (0..70).rev() {
        assert_eq!(transient.pop(), Ok(expected));
    }
    assert!(transient.pop().is_err());
    assert!(transient.persistent().is_empty());
}

// =============================================================================
// Sequences and iteration
// =============================================================================

#[rstest]
fn test_seq_and_rseq_agree_with_iter() {
    let vector: PersistentVector<u32> = (0..300).collect();
    let forward: Vec<u32> = vector.seq().unwrap().iter().collect();
    let backward: Vec<u32> = vector.rseq().unwrap().iter().collect();
    assert_eq!(forward, vector.iter().copied().collect::<Vec<_>>());
    assert_eq!(backward, vector.iter().rev().copied().collect::<Vec<_>>());
    assert!(PersistentVector::<u32>::new().seq().is_none());
}

#[rstest]
fn test_double_ended_iteration_meets_in_middle() {
    let vector: PersistentVector<i32> = (0..65).collect();
    let mut iterator = vector.iter();
    assert_eq!(iterator.next(), Some(&0));
    assert_eq!(iterator.next_back(), Some(&64));
    assert_eq!(iterator.len(), 63);
    assert_eq!(iterator.count(), 63);
}

#[rstest]
fn test_display_and_debug() {
    let vector: PersistentVector<i32> = (1..=3).collect();
    assert_eq!(format!("{vector}"), "[1, 2, 3]");
    assert_eq!(format!("{vector:?}"), "[1, 2, 3]");
}
