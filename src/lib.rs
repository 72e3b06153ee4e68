//! # strata
//!
//! Persistent immutable collections with structural sharing.
//!
//! ## Overview
//!
//! Every collection in this crate is a value: "modifying" operations return a
//! new collection and leave the receiver untouched, while the two versions
//! share most of their internal structure. The crate provides:
//!
//! - **Vectors**: [`PersistentVector`](persistent::PersistentVector), a 32-way
//!   trie with a detached tail
//! - **Hash maps and sets**: [`PersistentHashMap`](persistent::PersistentHashMap)
//!   and [`PersistentHashSet`](persistent::PersistentHashSet), hash array mapped
//!   tries that start life as a flat array map
//! - **Sorted maps and sets**: [`PersistentTreeMap`](persistent::PersistentTreeMap)
//!   and [`PersistentTreeSet`](persistent::PersistentTreeSet), red-black trees
//!   with a pluggable [`Comparator`](persistent::Comparator)
//! - **Sequences**: [`Seq`](seq::Seq), [`LazySeq`](seq::LazySeq),
//!   [`ChunkedSeq`](seq::ChunkedSeq) and [`Range`](seq::Range)
//! - **Transients**: single-owner mutable builders that convert back to a
//!   persistent value in O(1)
//! - **Protocols**: the [`protocol`] traits every collection implements, and the
//!   reduce protocol with early termination
//!
//! ## Feature Flags
//!
//! - `arc`: Use `Arc` instead of `Rc` so collections are `Send + Sync`
//! - `serde`: Serialize and deserialize collections
//! - `fxhash`: Hash keys with `rustc-hash`
//! - `ahash`: Hash keys with `ahash`
//!
//! ## Example
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let vector: PersistentVector<i32> = (0..100).collect();
//! let updated = vector.assoc_n(50, 999).unwrap();
//! assert_eq!(vector.get(50), Some(&50));
//! assert_eq!(updated.get(50), Some(&999));
//!
//! let total = vector.reduce(0, |sum, value| {
//!     if *value == 10 { reduced(sum) } else { std::ops::ControlFlow::Continue(sum + value) }
//! });
//! assert_eq!(total, 45);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_closure_for_method_calls)]

/// Prelude module for convenient imports.
///
/// Re-exports every collection, sequence and protocol trait.
///
/// # Usage
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
    pub use crate::protocol::*;
    pub use crate::seq::*;
}

pub mod persistent;
pub mod protocol;
pub mod seq;

pub use persistent::{CollectionError, Result};

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[test]
    fn prelude_exposes_collections_and_protocols() {
        let vector: PersistentVector<i32> = (0..3).collect();
        assert_eq!(Counted::count(&vector), 3);
    }
}
