//! The general-purpose persistent sequence: cons cells, chunks and lazy
//! tails.

use std::fmt;
use std::iter::FromIterator;

use super::lazy::{LazySeq, MaybeSend, MaybeSync};
use crate::persistent::ReferenceCounter;
use crate::persistent::bits::BRANCHING_FACTOR;
use crate::protocol::{Reducible, SeqIter, Seqable, Sequential, Step, count_seq, seq_reduce};

enum SeqNode<T> {
    Cons {
        first: T,
        rest: Seq<T>,
    },
    /// `offset` is always below `chunk.len()`.
    Chunked {
        chunk: ReferenceCounter<Vec<T>>,
        offset: usize,
        rest: Seq<T>,
    },
    Lazy(LazySeq<T>),
}

/// An immutable, possibly lazy, singly linked sequence.
///
/// A `Seq` is built from three kinds of cells: a cons cell holding one
/// element, a chunk cell holding a shared slice of elements, and a lazy
/// cell whose contents are produced on first access. Cloning is O(1), and
/// every clone observes the same realized values.
///
/// # Examples
///
/// ```rust
/// use strata::prelude::*;
///
/// let numbers = Seq::iterate(1_u64, |n| n * 2);
/// let powers: Vec<u64> = numbers.take(5).iter().collect();
/// assert_eq!(powers, vec![1, 2, 4, 8, 16]);
/// ```
pub struct Seq<T> {
    node: Option<ReferenceCounter<SeqNode<T>>>,
}

impl<T> Clone for Seq<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

impl<T> Seq<T> {
    /// The empty sequence.
    #[must_use]
    pub const fn empty() -> Self {
        Self { node: None }
    }

    /// Prepends `first` to `rest`.
    #[must_use]
    pub fn cons(first: T, rest: Self) -> Self {
        Self {
            node: Some(ReferenceCounter::new(SeqNode::Cons { first, rest })),
        }
    }

    /// Prepends a whole chunk of elements to `rest`.
    ///
    /// An empty chunk yields `rest` itself.
    #[must_use]
    pub fn chunked_cons(chunk: Vec<T>, rest: Self) -> Self {
        Self::chunk_cell(ReferenceCounter::new(chunk), 0, rest)
    }

    pub(crate) fn chunk_cell(
        chunk: ReferenceCounter<Vec<T>>,
        offset: usize,
        rest: Self,
    ) -> Self {
        if offset >= chunk.len() {
            return rest;
        }
        Self {
            node: Some(ReferenceCounter::new(SeqNode::Chunked {
                chunk,
                offset,
                rest,
            })),
        }
    }

    /// A sequence produced by `thunk` on first access.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// fn countdown(from: u32) -> Seq<u32> {
    ///     Seq::lazy(move || {
    ///         if from == 0 { Seq::empty() } else { Seq::cons(from, countdown(from - 1)) }
    ///     })
    /// }
    ///
    /// assert_eq!(countdown(3).iter().collect::<Vec<_>>(), vec![3, 2, 1]);
    /// ```
    #[must_use]
    pub fn lazy<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Self + MaybeSend + 'static,
    {
        LazySeq::new(thunk).into()
    }

    /// Follows lazy cells until reaching a realized cell or the end.
    fn resolved(&self) -> Option<&SeqNode<T>> {
        let mut node = self.node.as_deref()?;
        loop {
            match node {
                SeqNode::Lazy(lazy) => node = lazy.realized().node.as_deref()?,
                realized => return Some(realized),
            }
        }
    }

    /// Counts the elements by walking the sequence, a chunk at a time where
    /// possible.
    #[must_use]
    pub fn count(&self) -> usize {
        count_seq(self)
    }
}

impl<T> From<LazySeq<T>> for Seq<T> {
    fn from(lazy: LazySeq<T>) -> Self {
        Self {
            node: Some(ReferenceCounter::new(SeqNode::Lazy(lazy))),
        }
    }
}

impl<T> Sequential for Seq<T> {
    type Item = T;

    fn first(&self) -> Option<&T> {
        match self.resolved()? {
            SeqNode::Cons { first, .. } => Some(first),
            SeqNode::Chunked { chunk, offset, .. } => chunk.get(*offset),
            SeqNode::Lazy(_) => None,
        }
    }

    fn rest(&self) -> Self {
        match self.resolved() {
            Some(SeqNode::Cons { rest, .. }) => rest.clone(),
            Some(SeqNode::Chunked {
                chunk,
                offset,
                rest,
            }) => Self::chunk_cell(chunk.clone(), offset + 1, rest.clone()),
            Some(SeqNode::Lazy(_)) | None => Self::empty(),
        }
    }

    fn chunked_first(&self) -> Option<&[T]> {
        match self.resolved()? {
            SeqNode::Chunked { chunk, offset, .. } => chunk.get(*offset..),
            SeqNode::Cons { .. } | SeqNode::Lazy(_) => None,
        }
    }

    fn chunked_rest(&self) -> Self {
        match self.resolved() {
            Some(SeqNode::Chunked { rest, .. }) => rest.clone(),
            _ => self.rest(),
        }
    }
}

impl<T: Clone + MaybeSend + MaybeSync + 'static> Seq<T> {
    /// A lazy copy of any sequence, taking whole chunks where the source
    /// offers them.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let vector: PersistentVector<i32> = (0..100).collect();
    /// let seq = Seq::from_seq(vector.seq().unwrap());
    /// assert_eq!(seq.count(), 100);
    /// assert_eq!(seq.chunked_first().map(<[i32]>::len), Some(32));
    /// ```
    #[must_use]
    pub fn from_seq<S>(source: S) -> Self
    where
        S: Sequential<Item = T> + MaybeSend + MaybeSync + 'static,
    {
        Self::lazy(move || {
            if let Some(chunk) = source.chunked_first() {
                let chunk = chunk.to_vec();
                Self::chunked_cons(chunk, Self::from_seq(source.chunked_rest()))
            } else if let Some(first) = source.first() {
                let first = first.clone();
                Self::cons(first, Self::from_seq(source.rest()))
            } else {
                Self::empty()
            }
        })
    }

    /// A lazy sequence over any [`Seqable`] collection.
    #[must_use]
    pub fn from_seqable<C>(collection: &C) -> Self
    where
        C: Seqable<Item = T>,
        C::Seq: MaybeSend + MaybeSync + 'static,
    {
        collection.seq().map_or_else(Self::empty, Self::from_seq)
    }
}

impl<T> Seqable for Seq<T> {
    type Item = T;
    type Seq = Self;

    fn seq(&self) -> Option<Self> {
        if self.is_empty() {
            None
        } else {
            Some(self.clone())
        }
    }
}

impl<T> Reducible for Seq<T> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        seq_reduce(Some(self.clone()), init, function)
    }
}

impl<T> Drop for Seq<T> {
    fn drop(&mut self) {
        let mut next = self.node.take();
        while let Some(node) = next {
            next = match ReferenceCounter::try_unwrap(node) {
                Ok(SeqNode::Cons { mut rest, .. } | SeqNode::Chunked { mut rest, .. }) => {
                    rest.node.take()
                }
                Ok(SeqNode::Lazy(lazy)) => lazy
                    .into_realized()
                    .and_then(|mut realized| realized.node.take()),
                Err(_) => None,
            };
        }
    }
}

impl<T> Default for Seq<T> {
    fn default() -> Self {
        Self::empty()
    }
}

/// Builds an eager sequence of 32-element chunks.
impl<T> FromIterator<T> for Seq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut elements: Vec<T> = iter.into_iter().collect();
        let mut seq = Self::empty();
        while !elements.is_empty() {
            let start = (elements.len() - 1) / BRANCHING_FACTOR * BRANCHING_FACTOR;
            let chunk = elements.split_off(start);
            seq = Self::chunked_cons(chunk, seq);
        }
        seq
    }
}

impl<T: Clone> IntoIterator for Seq<T> {
    type Item = T;
    type IntoIter = SeqIter<Self>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for Seq<T> {
    fn eq(&self, other: &Self) -> bool {
        let mut left = self.clone();
        let mut right = other.clone();
        loop {
            match (left.first(), right.first()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a == b => {}
                _ => return false,
            }
            left = left.rest();
            right = right.rest();
        }
    }
}

impl<T: Eq> Eq for Seq<T> {}

impl<T: fmt::Debug> fmt::Debug for Seq<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = formatter.debug_list();
        let mut current = self.clone();
        while let Some(element) = current.first() {
            list.entry(element);
            current = current.rest();
        }
        list.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_cons_and_rest() {
        let seq = Seq::cons(1, Seq::cons(2, Seq::empty()));
        assert_eq!(seq.first(), Some(&1));
        assert_eq!(seq.rest().first(), Some(&2));
        assert!(seq.rest().next().is_none());
        assert!(seq.rest().rest().is_empty());
    }

    #[rstest]
    fn test_empty_chunk_is_skipped() {
        let seq = Seq::chunked_cons(Vec::new(), Seq::cons(5, Seq::empty()));
        assert_eq!(seq.first(), Some(&5));
    }

    #[rstest]
    fn test_chunk_cells_walk_element_wise() {
        let seq = Seq::chunked_cons(vec![1, 2, 3], Seq::cons(4, Seq::empty()));
        assert_eq!(seq.chunked_first(), Some(&[1, 2, 3][..]));
        assert_eq!(seq.rest().chunked_first(), Some(&[2, 3][..]));
        assert_eq!(seq.chunked_rest().first(), Some(&4));
        assert_eq!(seq.iter().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[rstest]
    fn test_from_iter_chunks_from_the_front() {
        let seq: Seq<usize> = (0..70).collect();
        assert_eq!(seq.chunked_first().map(<[usize]>::len), Some(32));
        assert_eq!(seq.count(), 70);
    }

    #[rstest]
    fn test_nested_lazy_cells_resolve() {
        let seq = Seq::lazy(|| Seq::lazy(|| Seq::lazy(|| Seq::cons(9, Seq::empty()))));
        assert_eq!(seq.first(), Some(&9));
        assert_eq!(seq.count(), 1);
    }

    #[rstest]
    fn test_long_sequence_drops_without_overflow() {
        let mut seq = Seq::empty();
        for value in 0..200_000 {
            seq = Seq::cons(value, seq);
        }
        assert_eq!(seq.first(), Some(&199_999));
        drop(seq);
    }

    #[rstest]
    fn test_equality_is_element_wise() {
        let chunked: Seq<i32> = vec![1, 2, 3].into_iter().collect();
        let consed = Seq::cons(1, Seq::cons(2, Seq::cons(3, Seq::empty())));
        assert_eq!(chunked, consed);
        assert_ne!(chunked, consed.rest());
    }

    #[rstest]
    fn test_debug_lists_elements() {
        let seq = Seq::cons("a", Seq::cons("b", Seq::empty()));
        assert_eq!(format!("{seq:?}"), r#"["a", "b"]"#);
    }
}
