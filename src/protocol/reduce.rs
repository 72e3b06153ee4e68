//! The reduce protocol.
//!
//! A reducing function receives the accumulator and one element and returns
//! a [`Step`]: `Continue(acc)` to keep going, or `Break(acc)` to stop. A
//! break is never observable to the caller of [`Reducible::reduce`]: the
//! wrapped accumulator is returned as the final result, and no further
//! elements are visited.
//!
//! # Examples
//!
//! ```rust
//! use strata::prelude::*;
//! use std::ops::ControlFlow;
//!
//! let vector: PersistentVector<i32> = (1..=100).collect();
//! let mut visited = 0;
//! let sum = vector.reduce(0, |sum, value| {
//!     visited += 1;
//!     if sum + value > 10 { reduced(sum) } else { ControlFlow::Continue(sum + value) }
//! });
//! assert_eq!(sum, 10);
//! assert_eq!(visited, 5);
//! ```

use std::ops::ControlFlow;

use crate::persistent::MapEntry;

use super::collection::{Collection, Indexed};
use super::sequential::Sequential;
use super::transient::{Editable, TransientCollection};

/// The result of one reduction step.
pub type Step<A> = ControlFlow<A, A>;

/// Wraps `value` so the reduction stops and returns it.
#[inline]
pub const fn reduced<A>(value: A) -> Step<A> {
    ControlFlow::Break(value)
}

/// Whether a step asked the reduction to stop.
#[inline]
pub fn is_reduced<A>(step: &Step<A>) -> bool {
    step.is_break()
}

/// Extracts the accumulator from a finished reduction.
#[inline]
pub fn unreduced<A>(step: Step<A>) -> A {
    match step {
        ControlFlow::Continue(value) | ControlFlow::Break(value) => value,
    }
}

/// Collections that can fold their elements directly.
pub trait Reducible {
    /// Element type handed to the reducing function.
    type Item;

    /// Folds the elements in order, stopping at the first `Break`.
    ///
    /// The returned step is `Break` exactly when the reduction stopped
    /// early, which lets nested reductions propagate termination.
    fn try_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &Self::Item) -> Step<A>;

    /// Folds the elements in order, honoring early termination.
    fn reduce<A, F>(&self, init: A, function: F) -> A
    where
        F: FnMut(A, &Self::Item) -> Step<A>,
    {
        unreduced(self.try_reduce(init, function))
    }

    /// Folds every element without early termination.
    fn fold<A, F>(&self, init: A, mut function: F) -> A
    where
        F: FnMut(A, &Self::Item) -> A,
    {
        self.reduce(init, |accumulator, item| {
            ControlFlow::Continue(function(accumulator, item))
        })
    }
}

/// Maps that can fold their entries as separate key and value arguments.
pub trait KvReducible {
    /// Key type.
    type Key;
    /// Value type.
    type Value;

    /// Folds the entries in order, stopping at the first `Break`.
    fn try_kv_reduce<A, F>(&self, init: A, function: F) -> Step<A>
    where
        F: FnMut(A, &Self::Key, &Self::Value) -> Step<A>;

    /// Folds the entries in order, honoring early termination.
    fn kv_reduce<A, F>(&self, init: A, function: F) -> A
    where
        F: FnMut(A, &Self::Key, &Self::Value) -> Step<A>,
    {
        unreduced(self.try_kv_reduce(init, function))
    }
}

impl<R, K, V> KvReducible for R
where
    R: Reducible<Item = MapEntry<K, V>>,
{
    type Key = K;
    type Value = V;

    fn try_kv_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &K, &V) -> Step<A>,
    {
        self.try_reduce(init, |accumulator, entry| {
            function(accumulator, &entry.key, &entry.value)
        })
    }
}

/// Reduces a slice.
pub fn array_reduce<T, A, F>(items: &[T], init: A, mut function: F) -> Step<A>
where
    F: FnMut(A, &T) -> Step<A>,
{
    let mut accumulator = init;
    for item in items {
        accumulator = function(accumulator, item)?;
    }
    ControlFlow::Continue(accumulator)
}

/// Reduces an indexed collection by position.
pub fn ci_reduce<C, A, F>(collection: &C, init: A, mut function: F) -> Step<A>
where
    C: Indexed + ?Sized,
    F: FnMut(A, &C::Item) -> Step<A>,
{
    let mut accumulator = init;
    for index in 0..collection.count() {
        if let Ok(item) = collection.nth(index) {
            accumulator = function(accumulator, item)?;
        }
    }
    ControlFlow::Continue(accumulator)
}

/// Reduces any sequence by walking it, taking whole chunks where offered.
pub fn seq_reduce<S, A, F>(sequence: Option<S>, init: A, mut function: F) -> Step<A>
where
    S: Sequential,
    F: FnMut(A, &S::Item) -> Step<A>,
{
    let mut accumulator = init;
    let Some(mut current) = sequence else {
        return ControlFlow::Continue(accumulator);
    };
    loop {
        if let Some(chunk) = current.chunked_first() {
            accumulator = array_reduce(chunk, accumulator, &mut function)?;
            current = current.chunked_rest();
        } else if let Some(item) = current.first() {
            accumulator = function(accumulator, item)?;
            current = current.rest();
        } else {
            return ControlFlow::Continue(accumulator);
        }
    }
}

/// Pours every element of `from` into `to` through a transient.
///
/// # Examples
///
/// ```rust
/// use strata::prelude::*;
///
/// let base: PersistentVector<i32> = (0..3).collect();
/// let more: PersistentVector<i32> = (3..6).collect();
/// let joined = into(&base, &more);
/// assert_eq!(joined.len(), 6);
/// assert_eq!(base.len(), 3);
/// ```
pub fn into<C, R>(to: &C, from: &R) -> C
where
    C: Editable,
    R: Reducible<Item = <C::Transient as TransientCollection>::Item> + ?Sized,
    R::Item: Clone,
{
    let transient = from.fold(to.as_transient(), |mut transient, item| {
        transient.conj(item.clone());
        transient
    });
    transient.persistent()
}

/// Pours every element of `from` into `to` one `conj` at a time.
///
/// Used for collections without a transient form, such as sorted maps.
pub fn conj_all<C, R>(to: &C, from: &R) -> C
where
    C: Collection + Clone,
    R: Reducible<Item = C::Item> + ?Sized,
    R::Item: Clone,
{
    from.fold(to.clone(), |collection, item| collection.conj(item.clone()))
}
