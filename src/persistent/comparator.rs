//! Orderings used by the sorted collections.

use std::cmp::Ordering;

/// A total order over `T` used to arrange sorted maps and sets.
///
/// Any `Fn(&T, &T) -> Ordering` closure is a comparator, so custom orders
/// need no wrapper type. The comparator must be consistent for the lifetime
/// of the collection that holds it.
///
/// # Examples
///
/// ```rust
/// use strata::persistent::{Comparator, NaturalOrder, PersistentTreeMap, ReverseOrder};
/// use std::cmp::Ordering;
///
/// assert_eq!(NaturalOrder.compare(&1, &2), Ordering::Less);
/// assert_eq!(ReverseOrder.compare(&1, &2), Ordering::Greater);
///
/// let by_length = |left: &&str, right: &&str| left.len().cmp(&right.len());
/// let map = PersistentTreeMap::with_comparator(by_length)
///     .insert("ccc", 3)
///     .insert("a", 1);
/// assert_eq!(map.first_entry().map(|entry| *entry.key()), Some("a"));
/// ```
pub trait Comparator<T: ?Sized> {
    /// Compares two keys.
    fn compare(&self, left: &T, right: &T) -> Ordering;
}

/// The ordering given by `T`'s [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NaturalOrder;

impl<T: Ord + ?Sized> Comparator<T> for NaturalOrder {
    #[inline]
    fn compare(&self, left: &T, right: &T) -> Ordering {
        left.cmp(right)
    }
}

/// The reverse of `T`'s [`Ord`] implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ReverseOrder;

impl<T: Ord + ?Sized> Comparator<T> for ReverseOrder {
    #[inline]
    fn compare(&self, left: &T, right: &T) -> Ordering {
        right.cmp(left)
    }
}

impl<T: ?Sized, F> Comparator<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, left: &T, right: &T) -> Ordering {
        self(left, right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(1, 2, Ordering::Less)]
    #[case(2, 2, Ordering::Equal)]
    #[case(3, 2, Ordering::Greater)]
    fn test_natural_and_reverse(#[case] left: i32, #[case] right: i32, #[case] natural: Ordering) {
        assert_eq!(NaturalOrder.compare(&left, &right), natural);
        assert_eq!(ReverseOrder.compare(&left, &right), natural.reverse());
    }

    #[rstest]
    fn test_closure_comparator() {
        let modulo = |left: &i32, right: &i32| (left % 10).cmp(&(right % 10));
        assert_eq!(modulo.compare(&19, &21), Ordering::Greater);
    }
}
