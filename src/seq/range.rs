//! Arithmetic progressions as sequences.

use std::ops::ControlFlow;

use crate::protocol::{Counted, Reducible, Sequential, Step};

/// The integers from `start` (inclusive) towards `end` (exclusive) in
/// increments of `step`.
///
/// A zero step, or a step pointing away from `end`, gives an empty range.
///
/// # Examples
///
/// ```rust
/// use strata::prelude::*;
///
/// let evens = Range::new(0, 10, 2);
/// assert_eq!(evens.iter().collect::<Vec<_>>(), vec![0, 2, 4, 6, 8]);
/// assert_eq!(evens.count(), 5);
///
/// let down = Range::new(3, 0, -1);
/// assert_eq!(down.iter().collect::<Vec<_>>(), vec![3, 2, 1]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    start: i64,
    end: i64,
    step: i64,
}

/// The range `0..end` with step 1.
#[must_use]
pub const fn range(end: i64) -> Range {
    Range::new(0, end, 1)
}

impl Range {
    /// Creates a range.
    #[must_use]
    pub const fn new(start: i64, end: i64, step: i64) -> Self {
        Self { start, end, step }
    }

    /// Whether `value` still lies on the start side of `end`.
    const fn admits(&self, value: i64) -> bool {
        (self.step > 0 && value < self.end) || (self.step < 0 && value > self.end)
    }
}

impl Sequential for Range {
    type Item = i64;

    fn first(&self) -> Option<&i64> {
        self.admits(self.start).then_some(&self.start)
    }

    fn rest(&self) -> Self {
        if !self.admits(self.start) {
            return *self;
        }
        match self.start.checked_add(self.step) {
            Some(next) => Self::new(next, self.end, self.step),
            None => Self::new(self.end, self.end, self.step),
        }
    }
}

impl Counted for Range {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn count(&self) -> usize {
        if !self.admits(self.start) {
            return 0;
        }
        let span = i128::from(self.end) - i128::from(self.start);
        let step = i128::from(self.step);
        ((span + step - step.signum()) / step) as usize
    }
}

impl Reducible for Range {
    type Item = i64;

    fn try_reduce<A, F>(&self, init: A, mut function: F) -> Step<A>
    where
        F: FnMut(A, &i64) -> Step<A>,
    {
        let mut accumulator = init;
        let mut current = *self;
        while let Some(value) = current.first().copied() {
            accumulator = function(accumulator, &value)?;
            current = current.rest();
        }
        ControlFlow::Continue(accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Range::new(0, 10, 1), 10)]
    #[case(Range::new(0, 10, 3), 4)]
    #[case(Range::new(10, 0, -3), 4)]
    #[case(Range::new(0, 0, 1), 0)]
    #[case(Range::new(0, 10, 0), 0)]
    #[case(Range::new(0, 10, -1), 0)]
    fn test_count_matches_walk(#[case] range: Range, #[case] expected: usize) {
        assert_eq!(range.count(), expected);
        assert_eq!(range.iter().count(), expected);
    }

    #[rstest]
    fn test_rest_of_empty_range_is_empty() {
        let empty = Range::new(5, 5, 1);
        assert!(empty.rest().is_empty());
    }

    #[rstest]
    fn test_step_near_overflow_stops() {
        let range = Range::new(i64::MAX - 1, i64::MAX, 5);
        assert_eq!(range.iter().collect::<Vec<_>>(), vec![i64::MAX - 1]);
    }

    #[rstest]
    fn test_reduce_stops_early() {
        let mut visited = 0;
        let total = range(1_000_000).reduce(0, |sum, value| {
            visited += 1;
            if visited == 10 { crate::protocol::reduced(sum + value) } else { ControlFlow::Continue(sum + value) }
        });
        assert_eq!(total, 45);
        assert_eq!(visited, 10);
    }
}
