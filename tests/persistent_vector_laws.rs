//! Property-based tests for `PersistentVector` laws.

use proptest::prelude::*;
use strata::prelude::*;

proptest! {
    /// Peek-Conj Law: the last element conjoined is the one peeked
    #[test]
    fn prop_peek_conj_law(
        elements in prop::collection::vec(any::<i32>(), 0..200),
        element: i32
    ) {
        let vector: PersistentVector<i32> = elements.into_iter().collect();
        let conjoined = vector.conj(element);
        prop_assert_eq!(conjoined.peek(), Ok(&element));
    }

    /// Pop-Conj Law: popping undoes a conj
    #[test]
    fn prop_pop_conj_law(
        elements in prop::collection::vec(any::<i32>(), 0..1200),
        element: i32
    ) {
        let vector: PersistentVector<i32> = elements.into_iter().collect();
        let restored = vector.conj(element).pop().unwrap();
        prop_assert!(restored.check_invariants().is_ok());
        prop_assert_eq!(restored, vector);
    }

    /// Get-Assoc Law: an assoc'd index reads back, other indices keep theirs
    #[test]
    fn prop_get_assoc_law(
        elements in prop::collection::vec(any::<i32>(), 1..1200),
        seed: usize,
        element: i32
    ) {
        let vector: PersistentVector<i32> = elements.iter().copied().collect();
        let index = seed % vector.len();
        let updated = vector.assoc_n(index, element).unwrap();
        prop_assert_eq!(updated.get(index), Some(&element));
        for (position, original) in elements.iter().enumerate() {
            if position != index {
                prop_assert_eq!(updated.get(position), Some(original));
            }
        }
        prop_assert_eq!(vector.get(index), Some(&elements[index]));
    }

    /// Round-Trip Law: sealing a fresh transient gives back an equal vector
    #[test]
    fn prop_transient_round_trip_law(
        elements in prop::collection::vec(any::<i64>(), 0..2000)
    ) {
        let vector: PersistentVector<i64> = elements.into_iter().collect();
        prop_assert_eq!(vector.as_transient().persistent(), vector);
    }

    /// Transient and persistent conj build the same vector
    #[test]
    fn prop_transient_conj_matches_persistent(
        elements in prop::collection::vec(any::<u16>(), 0..1500)
    ) {
        let persistent = elements
            .iter()
            .fold(PersistentVector::new(), |vector, element| vector.conj(*element));
        let mut transient = TransientVector::new();
        for element in &elements {
            transient.conj(*element);
        }
        let sealed = transient.persistent();
        prop_assert!(sealed.check_invariants().is_ok());
        prop_assert_eq!(sealed, persistent);
    }

    /// Seq Law: the chunked sequence visits exactly the iterator's elements
    #[test]
    fn prop_seq_matches_iter(
        elements in prop::collection::vec(any::<u8>(), 0..500)
    ) {
        let vector: PersistentVector<u8> = elements.iter().copied().collect();
        let through_seq: Vec<u8> = vector.seq().map(|seq| seq.iter().collect()).unwrap_or_default();
        prop_assert_eq!(through_seq, elements);
    }
}
