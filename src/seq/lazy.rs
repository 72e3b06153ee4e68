//! Deferred sequences realized at most once.

use std::fmt;

use super::Seq;

#[cfg(not(feature = "arc"))]
use std::cell::{OnceCell, RefCell};
#[cfg(feature = "arc")]
use std::sync::OnceLock;

/// `Send` when the `arc` feature is enabled, otherwise implemented by every
/// type.
///
/// Closures stored in lazy sequences carry this bound so that sequences are
/// shareable across threads exactly when the collections are.
#[cfg(feature = "arc")]
pub trait MaybeSend: Send {}
#[cfg(feature = "arc")]
impl<T: Send> MaybeSend for T {}

/// `Send` when the `arc` feature is enabled, otherwise implemented by every
/// type.
#[cfg(not(feature = "arc"))]
pub trait MaybeSend {}
#[cfg(not(feature = "arc"))]
impl<T> MaybeSend for T {}

/// `Sync` when the `arc` feature is enabled, otherwise implemented by every
/// type.
#[cfg(feature = "arc")]
pub trait MaybeSync: Sync {}
#[cfg(feature = "arc")]
impl<T: Sync> MaybeSync for T {}

/// `Sync` when the `arc` feature is enabled, otherwise implemented by every
/// type.
#[cfg(not(feature = "arc"))]
pub trait MaybeSync {}
#[cfg(not(feature = "arc"))]
impl<T> MaybeSync for T {}

#[cfg(not(feature = "arc"))]
type Thunk<T> = Box<dyn FnOnce() -> Seq<T>>;
#[cfg(feature = "arc")]
type Thunk<T> = Box<dyn FnOnce() -> Seq<T> + Send>;

/// A sequence whose contents are produced by a thunk on first access.
///
/// The thunk runs at most once. Later accesses, including accesses through
/// clones of the enclosing [`Seq`], reuse the cached result. With the `arc`
/// feature the pending thunk sits behind a `parking_lot::Mutex` and the
/// result in a `OnceLock`, so concurrent readers block until the single
/// realization finishes.
///
/// # Examples
///
/// ```rust
/// use strata::prelude::*;
///
/// let lazy = LazySeq::new(|| Seq::cons(1, Seq::empty()));
/// assert!(!lazy.is_realized());
/// assert_eq!(lazy.realized().first(), Some(&1));
/// assert!(lazy.is_realized());
/// ```
pub struct LazySeq<T> {
    #[cfg(not(feature = "arc"))]
    thunk: RefCell<Option<Thunk<T>>>,
    #[cfg(not(feature = "arc"))]
    value: OnceCell<Seq<T>>,
    #[cfg(feature = "arc")]
    thunk: parking_lot::Mutex<Option<Thunk<T>>>,
    #[cfg(feature = "arc")]
    value: OnceLock<Seq<T>>,
}

impl<T> LazySeq<T> {
    /// Creates a pending sequence.
    pub fn new<F>(thunk: F) -> Self
    where
        F: FnOnce() -> Seq<T> + MaybeSend + 'static,
    {
        let thunk: Thunk<T> = Box::new(thunk);
        Self {
            #[cfg(not(feature = "arc"))]
            thunk: RefCell::new(Some(thunk)),
            #[cfg(not(feature = "arc"))]
            value: OnceCell::new(),
            #[cfg(feature = "arc")]
            thunk: parking_lot::Mutex::new(Some(thunk)),
            #[cfg(feature = "arc")]
            value: OnceLock::new(),
        }
    }

    /// Whether the thunk has already run.
    #[must_use]
    pub fn is_realized(&self) -> bool {
        self.value.get().is_some()
    }

    /// Runs the thunk if needed and returns the cached sequence.
    ///
    /// # Panics
    ///
    /// Panics if the thunk tries to realize the sequence it is producing.
    pub fn realized(&self) -> &Seq<T> {
        self.value.get_or_init(|| {
            #[cfg(not(feature = "arc"))]
            let thunk = self.thunk.borrow_mut().take();
            #[cfg(feature = "arc")]
            let thunk = self.thunk.lock().take();
            thunk.map_or_else(Seq::empty, |thunk| thunk())
        })
    }

    /// Takes the realized sequence out, if the thunk has run.
    pub(crate) fn into_realized(self) -> Option<Seq<T>> {
        self.value.into_inner()
    }
}

impl<T: fmt::Debug> fmt::Debug for LazySeq<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value.get() {
            Some(seq) => fmt::Debug::fmt(seq, formatter),
            None => formatter.write_str("LazySeq(<pending>)"),
        }
    }
}
