//! FILENAME: core/matrix-engine/src/aggregate.rs
//! Aggregation engine - map-reduce keyed by a slice's selected sub-position.
//!
//! Algorithm:
//! 1. `prepare` seeds a state per cell (in parallel, map side)
//! 2. `reduce` folds all seeds of one key (map-side combine, then per reduce partition)
//! 3. `present` turns each key's final state into zero or more cells

use model::{Cell, Content, Dimension, Position, Slice, Value};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::group::combine_by_key;
use crate::matrix::Matrix;
use crate::operators::Operators;
use crate::side::SideValue;
use crate::state::{Moments, State};
use crate::tuner::Tuner;

/// A prepare/reduce/present triple.
pub trait Aggregator: Send + Sync {
    /// Seed for one cell; `None` when the cell does not contribute.
    fn prepare(&self, cell: &Cell, side: &SideValue) -> Option<State>;

    /// Combines two states. Must be associative and commutative; it never
    /// sees the side value.
    fn reduce(&self, left: State, right: State) -> State;

    /// Final cells for one key. May be empty.
    fn present(&self, key: &Position, state: State, side: &SideValue) -> Vec<Cell>;

    fn boxed(self) -> Box<dyn Aggregator>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

// ============================================================================
// COMPOSITION
// ============================================================================

/// Runs several aggregators over the same key in lock-step. The state is one
/// slot per member; presented cells are concatenated in member order.
pub struct Aggregators {
    members: Vec<Box<dyn Aggregator>>,
}

impl Aggregators {
    pub fn new(members: Vec<Box<dyn Aggregator>>) -> Self {
        Aggregators { members }
    }
}

impl Aggregator for Aggregators {
    fn prepare(&self, cell: &Cell, side: &SideValue) -> Option<State> {
        let slots: Vec<Option<State>> = self.members.iter().map(|a| a.prepare(cell, side)).collect();
        if slots.iter().all(Option::is_none) {
            None
        } else {
            Some(State::Composite(slots))
        }
    }

    fn reduce(&self, left: State, right: State) -> State {
        match (left, right) {
            (State::Composite(left), State::Composite(right)) => State::Composite(
                self.members
                    .iter()
                    .zip(left.into_iter().zip(right))
                    .map(|(member, slots)| match slots {
                        (Some(l), Some(r)) => Some(member.reduce(l, r)),
                        (l, None) => l,
                        (None, r) => r,
                    })
                    .collect(),
            ),
            (left, _) => left,
        }
    }

    fn present(&self, key: &Position, state: State, side: &SideValue) -> Vec<Cell> {
        let State::Composite(slots) = state else {
            return Vec::new();
        };
        self.members
            .iter()
            .zip(slots)
            .filter_map(|(member, slot)| slot.map(|s| member.present(key, s, side)))
            .flatten()
            .collect()
    }
}

fn compose(mut aggregators: Vec<Box<dyn Aggregator>>) -> Box<dyn Aggregator> {
    if aggregators.len() == 1 {
        aggregators.remove(0)
    } else {
        Box::new(Aggregators::new(aggregators))
    }
}

/// Output position: the key, with `name` appended when given.
fn output_position(key: &Position, name: &Option<Value>) -> Position {
    match name {
        Some(name) => key.append(name.clone()),
        None => key.clone(),
    }
}

// ============================================================================
// BUILT-IN AGGREGATORS
// ============================================================================

/// Supported summary statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatisticKind {
    /// Number of cells, numeric or not.
    Count,
    Sum,
    Mean,
    Min,
    Max,
    Variance,
    StandardDeviation,
}

/// A summary statistic over the numeric cells of each group.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistic {
    kind: StatisticKind,
    name: Option<Value>,
    min_count: u64,
    sample: bool,
}

impl Statistic {
    pub fn new(kind: StatisticKind) -> Self {
        Statistic {
            kind,
            name: None,
            min_count: 0,
            sample: false,
        }
    }

    pub fn count() -> Self {
        Self::new(StatisticKind::Count)
    }

    pub fn sum() -> Self {
        Self::new(StatisticKind::Sum)
    }

    pub fn mean() -> Self {
        Self::new(StatisticKind::Mean)
    }

    pub fn min() -> Self {
        Self::new(StatisticKind::Min)
    }

    pub fn max() -> Self {
        Self::new(StatisticKind::Max)
    }

    pub fn variance() -> Self {
        Self::new(StatisticKind::Variance)
    }

    pub fn standard_deviation() -> Self {
        Self::new(StatisticKind::StandardDeviation)
    }

    /// Appends `name` to the key of every presented cell.
    pub fn named(mut self, name: impl Into<Value>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Presents nothing for keys with fewer than `min_count` contributing cells.
    pub fn min_count(mut self, min_count: u64) -> Self {
        self.min_count = min_count;
        self
    }

    /// Use the sample (n - 1) rather than the population denominator.
    pub fn sample(mut self) -> Self {
        self.sample = true;
        self
    }

    fn compute(&self, moments: &Moments) -> Option<f64> {
        match self.kind {
            StatisticKind::Count => Some(moments.count as f64),
            StatisticKind::Sum => Some(moments.sum),
            StatisticKind::Mean => Some(moments.mean),
            StatisticKind::Min => Some(moments.min),
            StatisticKind::Max => Some(moments.max),
            StatisticKind::Variance => moments.variance(self.sample),
            StatisticKind::StandardDeviation => moments.variance(self.sample).map(f64::sqrt),
        }
    }
}

impl Aggregator for Statistic {
    fn prepare(&self, cell: &Cell, _side: &SideValue) -> Option<State> {
        match (self.kind, cell.content.as_f64()) {
            (_, Some(value)) => Some(State::Moments(Moments::of(value))),
            // Count is the only statistic that sees non-numeric cells.
            (StatisticKind::Count, None) => Some(State::Moments(Moments::of(0.0))),
            (_, None) => None,
        }
    }

    fn reduce(&self, left: State, right: State) -> State {
        match (left, right) {
            (State::Moments(mut l), State::Moments(r)) => {
                l.merge(&r);
                State::Moments(l)
            }
            (left, _) => left,
        }
    }

    fn present(&self, key: &Position, state: State, _side: &SideValue) -> Vec<Cell> {
        let State::Moments(moments) = state else {
            return Vec::new();
        };
        if moments.count < self.min_count {
            return Vec::new();
        }
        let content = match (self.kind, self.compute(&moments)) {
            (StatisticKind::Count, _) => Content::discrete(moments.count as i64),
            (_, Some(value)) => Content::continuous(value),
            (_, None) => return Vec::new(),
        };
        vec![Cell::new(output_position(key, &self.name), content)]
    }
}

/// Sum of values weighted by a side-map lookup of one coordinate. Cells whose
/// coordinate has no weight are skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedSum {
    dimension: Dimension,
    name: Option<Value>,
}

impl WeightedSum {
    /// Weights are looked up at the 1-coordinate position of `dimension`.
    pub fn new(dimension: Dimension) -> Self {
        WeightedSum { dimension, name: None }
    }

    pub fn named(mut self, name: impl Into<Value>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Aggregator for WeightedSum {
    fn prepare(&self, cell: &Cell, side: &SideValue) -> Option<State> {
        let value = cell.content.as_f64()?;
        let coordinate = cell.position.get(self.dimension)?;
        let weight = side.lookup(&Position::new([coordinate.clone()]))?.as_f64()?;
        Some(State::Number(value * weight))
    }

    fn reduce(&self, left: State, right: State) -> State {
        match (left, right) {
            (State::Number(l), State::Number(r)) => State::Number(l + r),
            (left, _) => left,
        }
    }

    fn present(&self, key: &Position, state: State, _side: &SideValue) -> Vec<Cell> {
        match state {
            State::Number(sum) => vec![Cell::new(output_position(key, &self.name), Content::continuous(sum))],
            _ => Vec::new(),
        }
    }
}

// ============================================================================
// SUMMARISE
// ============================================================================

impl Matrix {
    /// Aggregates the cells of every selected sub-position. Several
    /// aggregators run in lock-step and their cells are concatenated.
    pub fn summarise(
        &self,
        slice: &Slice,
        aggregators: impl Into<Operators<Box<dyn Aggregator>>>,
        side: &SideValue,
        tuner: Tuner,
    ) -> Result<Matrix> {
        self.check_slice(slice)?;
        let aggregator = compose(aggregators.into().into_vec());

        let reduced = combine_by_key(
            self.cells(),
            tuner,
            self.config(),
            |cell| {
                aggregator
                    .prepare(cell, side)
                    .map(|state| (slice.selected(&cell.position), state))
            },
            |left, right| aggregator.reduce(left, right),
        );
        log::debug!("summarise: {} groups", reduced.len());

        let cells: Vec<Cell> = reduced
            .into_par_iter()
            .flat_map_iter(|(key, state)| aggregator.present(&key, state, side))
            .collect();
        self.derived(cells)
    }
}
