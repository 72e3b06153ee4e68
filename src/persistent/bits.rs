//! Bit-level helpers shared by the vector trie and the hash array mapped trie.
//!
//! Both tries consume keys five bits at a time, giving nodes with up to
//! thirty-two children.

use std::hash::{Hash, Hasher};

/// Number of bits consumed per trie level.
pub(crate) const BITS_PER_LEVEL: usize = 5;

/// Maximum number of children per trie node.
pub const BRANCHING_FACTOR: usize = 1 << BITS_PER_LEVEL;

/// Mask selecting one level's worth of bits.
pub(crate) const MASK: usize = BRANCHING_FACTOR - 1;

/// Largest shift at which a 32-bit hash still has unconsumed bits.
pub(crate) const MAX_HASH_SHIFT: usize = 30;

/// The five-bit fragment of `hash` at the given `shift`.
#[inline]
pub(crate) const fn fragment(hash: u32, shift: usize) -> usize {
    debug_assert!(shift <= MAX_HASH_SHIFT);
    ((hash >> shift) as usize) & MASK
}

/// The single bit representing `hash`'s fragment at `shift` in a bitmap.
#[inline]
pub(crate) const fn bit_position(hash: u32, shift: usize) -> u32 {
    1 << fragment(hash, shift)
}

/// Dense index of `bit` within a node whose population is `bitmap`.
#[inline]
pub(crate) const fn dense_index(bitmap: u32, bit: u32) -> usize {
    (bitmap & (bit - 1)).count_ones() as usize
}

#[cfg(feature = "fxhash")]
type KeyHasher = rustc_hash::FxHasher;

#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
type KeyHasher = ahash::AHasher;

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
type KeyHasher = std::collections::hash_map::DefaultHasher;

/// Hashes a key to the 32-bit value consumed by the hash trie.
///
/// The hasher is constructed with fixed keys, so a key hashes to the same
/// value for the lifetime of the process. The 64-bit digest is folded so
/// that both halves contribute to the trie path.
#[inline]
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn hash_key<Q: Hash + ?Sized>(key: &Q) -> u32 {
    let mut hasher = KeyHasher::default();
    key.hash(&mut hasher);
    let digest = hasher.finish();
    (digest ^ (digest >> 32)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0b11111_00000, 0, 0)]
    #[case(0b11111_00000, 5, 31)]
    #[case(0xC000_0000, 30, 3)]
    fn test_fragment(#[case] hash: u32, #[case] shift: usize, #[case] expected: usize) {
        assert_eq!(fragment(hash, shift), expected);
    }

    #[rstest]
    fn test_dense_index_counts_lower_bits() {
        let bitmap = 0b1011_0010;
        assert_eq!(dense_index(bitmap, 0b10), 0);
        assert_eq!(dense_index(bitmap, 0b1_0000), 1);
        assert_eq!(dense_index(bitmap, 0b1000_0000), 3);
    }

    #[rstest]
    fn test_hash_key_is_stable() {
        assert_eq!(hash_key("strata"), hash_key(&"strata".to_string()));
        assert_eq!(hash_key(&42_i64), hash_key(&42_i64));
    }
}
