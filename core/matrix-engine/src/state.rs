//! FILENAME: core/matrix-engine/src/state.rs
//! Operator state - the opaque accumulators threaded through reductions and scans.
//!
//! Each operator family picks the variant it needs; the engine only moves
//! states between the operator's own lifecycle calls and never inspects them.

use std::any::Any;
use std::collections::VecDeque;

use model::{Content, Position};
use serde::{Deserialize, Serialize};

/// Per-operator accumulator.
#[derive(Debug)]
pub enum State {
    /// Mergeable summary statistics.
    Moments(Moments),
    /// A single running number.
    Number(f64),
    /// A content carried unchanged.
    Content(Content),
    /// A running number, once a numeric cell has been seen, plus the
    /// remainder it was last updated at.
    Tracked { value: Option<f64>, remainder: Position },
    /// The most recent values plus the remainder of the last one.
    Series { values: VecDeque<f64>, remainder: Position },
    /// One slot per composed operator; `None` where that operator had no input.
    Composite(Vec<Option<State>>),
    /// Escape hatch for operators defined outside this crate.
    Custom(Box<dyn Any + Send + Sync>),
}

// ============================================================================
// MOMENTS
// ============================================================================

/// Summary statistics of a stream of numbers. `merge` is associative and
/// commutative, so partial moments can be combined in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    /// Running mean (Welford).
    pub mean: f64,
    /// Sum of squared differences from the mean (Welford).
    pub m2: f64,
}

impl Default for Moments {
    fn default() -> Self {
        Moments {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            mean: 0.0,
            m2: 0.0,
        }
    }
}

impl Moments {
    pub fn of(value: f64) -> Self {
        Moments {
            count: 1,
            sum: value,
            min: value,
            max: value,
            mean: value,
            m2: 0.0,
        }
    }

    pub fn add(&mut self, value: f64) {
        self.merge(&Moments::of(value));
    }

    /// Parallel Welford merge.
    pub fn merge(&mut self, other: &Moments) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }

        let combined = self.count + other.count;
        let delta = other.mean - self.mean;
        self.mean += delta * (other.count as f64) / (combined as f64);
        self.m2 += other.m2
            + delta * delta * (self.count as f64) * (other.count as f64) / (combined as f64);
        self.count = combined;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Sample variance when `sample` is set, population variance otherwise.
    pub fn variance(&self, sample: bool) -> Option<f64> {
        let denominator = if sample { self.count.checked_sub(1)? } else { self.count };
        if denominator == 0 {
            None
        } else {
            Some(self.m2 / denominator as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn moments(values: &[f64]) -> Moments {
        let mut m = Moments::default();
        for v in values {
            m.add(*v);
        }
        m
    }

    #[test]
    fn test_basic_statistics() {
        let m = moments(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(m.count, 8);
        assert_eq!(m.sum, 40.0);
        assert_eq!(m.mean, 5.0);
        assert_eq!(m.min, 2.0);
        assert_eq!(m.max, 9.0);
        assert!((m.variance(false).unwrap() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let mut left = moments(&[1.0, 2.0, 3.0]);
        let right = moments(&[10.0, 20.0]);
        left.merge(&right);
        let all = moments(&[1.0, 2.0, 3.0, 10.0, 20.0]);
        assert_eq!(left.count, all.count);
        assert!((left.mean - all.mean).abs() < 1e-12);
        assert!((left.m2 - all.m2).abs() < 1e-9);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut empty = Moments::default();
        empty.merge(&Moments::of(3.0));
        assert_eq!(empty, Moments::of(3.0));
        assert_eq!(Moments::of(1.0).variance(true), None);
    }
}
