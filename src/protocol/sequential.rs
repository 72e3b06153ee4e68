//! Sequence access: `first`, `rest`, `next` and chunked traversal.

/// A possibly-empty, immutable sequence view.
///
/// A sequential value is a cursor: `first` reads the current element and
/// `rest` yields a new cursor one element further on. Sequences backed by
/// contiguous storage also expose their current chunk so bulk consumers can
/// process a slice at a time.
///
/// # Examples
///
/// ```rust
/// use strata::prelude::*;
///
/// let range = Range::new(0, 3, 1);
/// assert_eq!(range.first(), Some(&0));
/// assert_eq!(range.rest().first(), Some(&1));
/// assert!(range.rest().rest().rest().is_empty());
/// assert!(range.rest().rest().next().is_none());
/// ```
pub trait Sequential: Clone {
    /// Element type.
    type Item;

    /// The current element, or `None` when the sequence is empty.
    fn first(&self) -> Option<&Self::Item>;

    /// Everything after the first element; empty when nothing remains.
    #[must_use]
    fn rest(&self) -> Self;

    /// Like [`rest`](Self::rest), but `None` when nothing remains.
    ///
    /// Unlike `rest`, this must determine whether another element exists,
    /// so it realizes one step of a lazy sequence.
    fn next(&self) -> Option<Self> {
        let rest = self.rest();
        if rest.is_empty() { None } else { Some(rest) }
    }

    /// Whether the sequence has no elements.
    fn is_empty(&self) -> bool {
        self.first().is_none()
    }

    /// The remainder of the current chunk, for chunk-aware consumers.
    ///
    /// Sequences without contiguous storage return `None`.
    fn chunked_first(&self) -> Option<&[Self::Item]> {
        None
    }

    /// The sequence after the current chunk.
    ///
    /// Defaults to [`rest`](Self::rest) for sequences without chunks.
    #[must_use]
    fn chunked_rest(&self) -> Self {
        self.rest()
    }

    /// Iterates the sequence, cloning each element.
    fn iter(&self) -> SeqIter<Self> {
        SeqIter {
            current: self.clone(),
        }
    }
}

/// Anything that can produce a [`Sequential`] view of its elements.
pub trait Seqable {
    /// Element type of the produced sequence.
    type Item;
    /// The sequence type.
    type Seq: Sequential<Item = Self::Item>;

    /// A sequence over the elements, or `None` when there are none.
    fn seq(&self) -> Option<Self::Seq>;
}

/// Iterator over a [`Sequential`], yielding cloned elements.
#[derive(Clone)]
pub struct SeqIter<S> {
    current: S,
}

impl<S> Iterator for SeqIter<S>
where
    S: Sequential,
    S::Item: Clone,
{
    type Item = S::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.current.first()?.clone();
        self.current = self.current.rest();
        Some(item)
    }
}

/// Counts a sequence by walking it.
///
/// Sequences that know their length implement
/// [`Counted`](crate::protocol::Counted) instead.
pub fn count_seq<S: Sequential>(sequence: &S) -> usize {
    let mut count = 0;
    let mut current = sequence.clone();
    loop {
        if let Some(chunk_length) = current.chunked_first().map(<[S::Item]>::len) {
            count += chunk_length;
            current = current.chunked_rest();
        } else if current.is_empty() {
            return count;
        } else {
            count += 1;
            current = current.rest();
        }
    }
}
