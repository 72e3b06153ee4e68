//! Sequence entities.
//!
//! Every collection exposes its elements as a [`Sequential`] value through
//! [`Seqable::seq`]. This module holds the sequence types that are not tied
//! to a single collection:
//!
//! | Type          | Description                                              |
//! |---------------|----------------------------------------------------------|
//! | [`Seq`]       | Cons cells, shared chunks and lazy tails                 |
//! | [`LazySeq`]   | A sequence produced by a thunk on first access           |
//! | [`ChunkedSeq`]| A vector-backed sequence walking one leaf at a time      |
//! | [`Range`]     | An arithmetic progression of `i64`                       |
//!
//! [`Sequential`]: crate::protocol::Sequential
//! [`Seqable::seq`]: crate::protocol::Seqable::seq
//!
//! # Examples
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let vector: PersistentVector<i64> = (0..1000).collect();
//! let evens = Seq::from_seqable(&vector).filter(|n| n % 2 == 0);
//! assert_eq!(evens.take(3).iter().collect::<Vec<_>>(), vec![0, 2, 4]);
//! ```

mod chunked;
mod cons;
mod lazy;
mod ops;
mod range;

pub use chunked::ChunkedSeq;
pub use cons::Seq;
pub use lazy::{LazySeq, MaybeSend, MaybeSync};
pub use range::{Range, range};
