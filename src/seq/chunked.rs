//! Vector-backed sequences that hand out one leaf at a time.

use std::fmt;

use crate::persistent::PersistentVector;
use crate::persistent::bits::MASK;
use crate::persistent::vector::Leaf;
use crate::protocol::{Counted, Reducible, Sequential, Step, seq_reduce};

/// A sequence over a [`PersistentVector`], positioned inside one of its
/// 32-element leaves.
///
/// `rest` moves within the current leaf and `chunked_rest` skips to the
/// next one, so bulk consumers such as `reduce` see whole slices without
/// allocating per element.
pub struct ChunkedSeq<T> {
    vector: PersistentVector<T>,
    chunk: Leaf<T>,
    /// Index in `vector` of `chunk[0]`.
    base: usize,
    offset: usize,
}

impl<T> Clone for ChunkedSeq<T> {
    fn clone(&self) -> Self {
        Self {
            vector: self.vector.clone(),
            chunk: self.chunk.clone(),
            base: self.base,
            offset: self.offset,
        }
    }
}

impl<T> ChunkedSeq<T> {
    /// A sequence starting at `index`, or `None` past the end.
    pub(crate) fn from_vector(vector: PersistentVector<T>, index: usize) -> Option<Self> {
        let chunk = vector.leaf_for(index)?.clone();
        Some(Self {
            vector,
            chunk,
            base: index & !MASK,
            offset: index & MASK,
        })
    }

    /// The sequence positioned just past the last element.
    fn exhausted(&self) -> Self {
        Self {
            vector: self.vector.clone(),
            chunk: self.chunk.clone(),
            base: self.base,
            offset: self.chunk.len(),
        }
    }
}

impl<T> Sequential for ChunkedSeq<T> {
    type Item = T;

    fn first(&self) -> Option<&T> {
        self.chunk.get(self.offset)
    }

    fn rest(&self) -> Self {
        if self.offset + 1 < self.chunk.len() {
            Self {
                offset: self.offset + 1,
                ..self.clone()
            }
        } else {
            self.chunked_rest()
        }
    }

    fn chunked_first(&self) -> Option<&[T]> {
        self.chunk
            .get(self.offset..)
            .filter(|remaining| !remaining.is_empty())
    }

    fn chunked_rest(&self) -> Self {
        Self::from_vector(self.vector.clone(), self.base + self.chunk.len())
            .unwrap_or_else(|| self.exhausted())
    }
}

impl<T> Counted for ChunkedSeq<T> {
    fn count(&self) -> usize {
        self.vector.len().saturating_sub(self.base + self.offset)
    }
}

impl<T> Reducible for ChunkedSeq<T> {
    type Item = T;

    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &T) -> Step<A>,
    {
        seq_reduce(Some(self.clone()), init, function)
    }
}

impl<T: fmt::Debug> fmt::Debug for ChunkedSeq<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = self.base + self.offset;
        formatter
            .debug_list()
            .entries(self.vector.iter().skip(start))
            .finish()
    }
}
