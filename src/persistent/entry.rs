//! Key/value pairs yielded by map sequences and reductions.

use std::fmt;

/// A key/value pair stored in a map.
///
/// Map sequences, iterators over sorted maps and map reductions all hand out
/// entries by reference.
///
/// # Examples
///
/// ```rust
/// use strata::persistent::MapEntry;
///
/// let entry = MapEntry::new("a", 1);
/// assert_eq!(entry.key(), &"a");
/// assert_eq!(entry.value(), &1);
/// assert_eq!(entry.into_pair(), ("a", 1));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapEntry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
}

impl<K, V> MapEntry<K, V> {
    /// Creates an entry.
    #[inline]
    #[must_use]
    pub const fn new(key: K, value: V) -> Self {
        Self { key, value }
    }

    /// The entry's key.
    #[inline]
    #[must_use]
    pub const fn key(&self) -> &K {
        &self.key
    }

    /// The entry's value.
    #[inline]
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Borrows the entry as a `(key, value)` pair.
    #[inline]
    #[must_use]
    pub const fn as_pair(&self) -> (&K, &V) {
        (&self.key, &self.value)
    }

    /// Consumes the entry, returning its key and value.
    #[inline]
    #[must_use]
    pub fn into_pair(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V> From<(K, V)> for MapEntry<K, V> {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

impl<K, V> From<MapEntry<K, V>> for (K, V) {
    fn from(entry: MapEntry<K, V>) -> Self {
        entry.into_pair()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for MapEntry<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[{:?} {:?}]", self.key, self.value)
    }
}

impl<K: fmt::Display, V: fmt::Display> fmt::Display for MapEntry<K, V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.key, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_tuple_conversions() {
        let entry: MapEntry<&str, i32> = ("k", 7).into();
        assert_eq!(entry.as_pair(), (&"k", &7));
        let pair: (&str, i32) = entry.into();
        assert_eq!(pair, ("k", 7));
    }

    #[rstest]
    fn test_formatting() {
        let entry = MapEntry::new(1, "one");
        assert_eq!(format!("{entry:?}"), "[1 \"one\"]");
        assert_eq!(format!("{entry}"), "1: one");
    }
}
