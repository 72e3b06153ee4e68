//! Collection protocols.
//!
//! These traits describe what a collection can do independently of how it
//! is built. Every persistent collection, transient and sequence in the
//! crate implements the subset that applies to it:
//!
//! | Trait | Capability |
//! |-------|------------|
//! | [`Counted`] | O(1) element count |
//! | [`Indexed`] | positional access |
//! | [`Lookup`], [`Associative`], [`PersistentMap`] | keyed access and update |
//! | [`PersistentSet`] | membership |
//! | [`Stack`] | `peek`/`pop` at the natural end |
//! | [`Collection`] | `conj` and `empty` |
//! | [`Sequential`], [`Seqable`] | sequence views |
//! | [`Reducible`], [`KvReducible`] | folds with early termination |
//! | [`Editable`] and the transient traits | in-place bulk construction |

mod collection;
mod reduce;
mod sequential;
mod transient;

pub use collection::{
    Associative, Collection, Counted, Indexed, Lookup, PersistentMap, PersistentSet, Stack,
};
pub use reduce::{
    KvReducible, Reducible, Step, array_reduce, ci_reduce, conj_all, into, is_reduced, reduced,
    seq_reduce, unreduced,
};
pub use sequential::{SeqIter, Seqable, Sequential, count_seq};
pub use transient::{
    Editable, TransientAssociative, TransientCollection, TransientMap, TransientSet,
    TransientStack,
};
