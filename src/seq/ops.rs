//! Lazy transformations over [`Seq`].
//!
//! Each transformation returns immediately; work happens as elements are
//! requested. `map` and `filter` process a whole chunk per step when the
//! source offers chunks.

use super::Seq;
use super::lazy::{MaybeSend, MaybeSync};
use crate::persistent::ReferenceCounter;
use crate::protocol::Sequential;

impl<T: Clone + MaybeSend + MaybeSync + 'static> Seq<T> {
    /// Applies `function` to every element.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let squares = Seq::from_seq(range(5)).map(|n| n * n);
    /// assert_eq!(squares.iter().collect::<Vec<_>>(), vec![0, 1, 4, 9, 16]);
    /// ```
    #[must_use]
    pub fn map<U, F>(&self, function: F) -> Seq<U>
    where
        U: MaybeSend + MaybeSync + 'static,
        F: Fn(&T) -> U + MaybeSend + MaybeSync + 'static,
    {
        map_shared(self.clone(), ReferenceCounter::new(function))
    }

    /// Keeps the elements satisfying `predicate`.
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + MaybeSend + MaybeSync + 'static,
    {
        filter_shared(self.clone(), ReferenceCounter::new(predicate))
    }

    /// The first `count` elements.
    #[must_use]
    pub fn take(&self, count: usize) -> Self {
        take_from(self.clone(), count)
    }

    /// Everything after the first `count` elements.
    #[must_use]
    pub fn drop(&self, count: usize) -> Self {
        let source = self.clone();
        Self::lazy(move || {
            let mut current = source;
            let mut remaining = count;
            while remaining > 0 {
                let chunk_length = current.chunked_first().map_or(0, <[T]>::len);
                if chunk_length > 0 && chunk_length <= remaining {
                    remaining -= chunk_length;
                    current = current.chunked_rest();
                } else if current.is_empty() {
                    break;
                } else {
                    remaining -= 1;
                    current = current.rest();
                }
            }
            current
        })
    }

    /// The elements of `self` followed by those of `other`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use strata::prelude::*;
    ///
    /// let left: Seq<i32> = vec![1, 2].into_iter().collect();
    /// let right = Seq::cons(3, Seq::empty());
    /// assert_eq!(left.concat(&right).iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    /// ```
    #[must_use]
    pub fn concat(&self, other: &Self) -> Self {
        concat_from(self.clone(), other.clone())
    }

    /// The infinite sequence `seed, f(seed), f(f(seed)), ...`.
    #[must_use]
    pub fn iterate<F>(seed: T, function: F) -> Self
    where
        F: Fn(&T) -> T + MaybeSend + MaybeSync + 'static,
    {
        iterate_shared(seed, ReferenceCounter::new(function))
    }
}

fn map_shared<T, U, F>(source: Seq<T>, function: ReferenceCounter<F>) -> Seq<U>
where
    T: MaybeSend + MaybeSync + 'static,
    U: MaybeSend + MaybeSync + 'static,
    F: Fn(&T) -> U + MaybeSend + MaybeSync + 'static,
{
    Seq::lazy(move || {
        if let Some(chunk) = source.chunked_first() {
            let mapped: Vec<U> = chunk.iter().map(|element| (*function)(element)).collect();
            let rest = source.chunked_rest();
            Seq::chunked_cons(mapped, map_shared(rest, function))
        } else if let Some(first) = source.first() {
            let head = (*function)(first);
            let rest = source.rest();
            Seq::cons(head, map_shared(rest, function))
        } else {
            Seq::empty()
        }
    })
}

fn filter_shared<T, P>(source: Seq<T>, predicate: ReferenceCounter<P>) -> Seq<T>
where
    T: Clone + MaybeSend + MaybeSync + 'static,
    P: Fn(&T) -> bool + MaybeSend + MaybeSync + 'static,
{
    Seq::lazy(move || {
        let mut current = source;
        loop {
            if let Some(chunk) = current.chunked_first() {
                let kept: Vec<T> = chunk
                    .iter()
                    .filter(|element| (*predicate)(*element))
                    .cloned()
                    .collect();
                current = current.chunked_rest();
                if !kept.is_empty() {
                    return Seq::chunked_cons(kept, filter_shared(current, predicate));
                }
                continue;
            }
            let head = match current.first() {
                None => return Seq::empty(),
                Some(first) if (*predicate)(first) => Some(first.clone()),
                Some(_) => None,
            };
            current = current.rest();
            if let Some(head) = head {
                return Seq::cons(head, filter_shared(current, predicate));
            }
        }
    })
}

fn take_from<T>(source: Seq<T>, count: usize) -> Seq<T>
where
    T: Clone + MaybeSend + MaybeSync + 'static,
{
    Seq::lazy(move || {
        if count == 0 {
            return Seq::empty();
        }
        if let Some(chunk) = source.chunked_first()
            && chunk.len() <= count
        {
            let remaining = count - chunk.len();
            let chunk = chunk.to_vec();
            return Seq::chunked_cons(chunk, take_from(source.chunked_rest(), remaining));
        }
        match source.first() {
            Some(first) => Seq::cons(first.clone(), take_from(source.rest(), count - 1)),
            None => Seq::empty(),
        }
    })
}

fn concat_from<T>(left: Seq<T>, right: Seq<T>) -> Seq<T>
where
    T: Clone + MaybeSend + MaybeSync + 'static,
{
    Seq::lazy(move || {
        if let Some(chunk) = left.chunked_first() {
            let chunk = chunk.to_vec();
            Seq::chunked_cons(chunk, concat_from(left.chunked_rest(), right))
        } else if let Some(first) = left.first() {
            let first = first.clone();
            Seq::cons(first, concat_from(left.rest(), right))
        } else {
            right
        }
    })
}

fn iterate_shared<T, F>(seed: T, function: ReferenceCounter<F>) -> Seq<T>
where
    T: Clone + MaybeSend + MaybeSync + 'static,
    F: Fn(&T) -> T + MaybeSend + MaybeSync + 'static,
{
    let previous = seed.clone();
    Seq::cons(
        seed,
        Seq::lazy(move || {
            let next = (*function)(&previous);
            iterate_shared(next, function)
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn numbers(count: usize) -> Seq<usize> {
        (0..count).collect()
    }

    #[rstest]
    fn test_map_keeps_chunks() {
        let doubled = numbers(40).map(|n| n * 2);
        assert_eq!(doubled.chunked_first().map(<[usize]>::len), Some(32));
        assert_eq!(doubled.iter().nth(39), Some(78));
    }

    #[rstest]
    fn test_map_is_lazy() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mapped = Seq::iterate(0_usize, |n| n + 1).map(move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            n + 1
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(mapped.first(), Some(&1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[rstest]
    fn test_filter_skips_empty_chunks() {
        let large = numbers(200).filter(|n| *n >= 150 && n % 10 == 0);
        assert_eq!(large.iter().collect::<Vec<_>>(), vec![150, 160, 170, 180, 190]);
    }

    #[rstest]
    fn test_filter_over_infinite_sequence() {
        let odd = Seq::iterate(0_u32, |n| n + 1).filter(|n| n % 2 == 1);
        assert_eq!(odd.take(3).iter().collect::<Vec<_>>(), vec![1, 3, 5]);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(10, 10)]
    #[case(32, 32)]
    #[case(50, 50)]
    #[case(500, 100)]
    fn test_take_bounds(#[case] count: usize, #[case] expected: usize) {
        assert_eq!(numbers(100).take(count).count(), expected);
    }

    #[rstest]
    #[case(0, Some(0))]
    #[case(33, Some(33))]
    #[case(64, Some(64))]
    #[case(99, Some(99))]
    #[case(100, None)]
    #[case(1000, None)]
    fn test_drop_lands_on_element(#[case] count: usize, #[case] expected: Option<usize>) {
        assert_eq!(numbers(100).drop(count).first().copied(), expected);
    }

    #[rstest]
    fn test_concat_with_empty_sides() {
        let empty: Seq<usize> = Seq::empty();
        assert_eq!(empty.concat(&numbers(3)), numbers(3));
        assert_eq!(numbers(3).concat(&empty), numbers(3));
    }

    #[rstest]
    fn test_iterate_realizes_each_step_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let seq = Seq::iterate(1_u64, move |n| {
            counter.fetch_add(1, Ordering::SeqCst);
            n * 3
        });
        let first_pass: Vec<u64> = seq.take(4).iter().collect();
        let second_pass: Vec<u64> = seq.take(4).iter().collect();
        assert_eq!(first_pass, vec![1, 3, 9, 27]);
        assert_eq!(first_pass, second_pass);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
