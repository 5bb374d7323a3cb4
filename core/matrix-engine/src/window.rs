//! FILENAME: core/matrix-engine/src/window.rs
//! Windowing engine - ordered, stateful scans over the cells of each group.
//!
//! Cells are grouped by the slice's selected sub-position and every group is
//! sorted by remainder (ties broken by content). The first cell of a group
//! seeds the state through `initialise`; each later cell passes through
//! `present`, which replaces the state and may emit cells. Groups are
//! independent and are scanned in parallel; within a group the scan is
//! strictly sequential.

use model::{Cell, Content, Position, Slice, Value};
use rayon::prelude::*;

use crate::error::Result;
use crate::group::for_each_group;
use crate::matrix::Matrix;
use crate::operators::Operators;
use crate::side::SideValue;
use crate::state::State;
use crate::tuner::Tuner;

/// An initialise/present pair scanning one group in remainder order.
pub trait Window: Send + Sync {
    /// State for the first cell of a group. Emits nothing.
    fn initialise(&self, key: &Position, remainder: &Position, cell: &Cell, side: &SideValue) -> State;

    /// Next state and output for every later cell.
    fn present(
        &self,
        key: &Position,
        remainder: &Position,
        cell: &Cell,
        state: State,
        side: &SideValue,
    ) -> (State, Vec<Cell>);

    fn boxed(self) -> Box<dyn Window>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Runs several windows over the same group in lock-step. The composite
/// state holds one slot per member.
pub struct Windows {
    members: Vec<Box<dyn Window>>,
}

impl Windows {
    pub fn new(members: Vec<Box<dyn Window>>) -> Self {
        Windows { members }
    }
}

impl Window for Windows {
    fn initialise(&self, key: &Position, remainder: &Position, cell: &Cell, side: &SideValue) -> State {
        State::Composite(
            self.members
                .iter()
                .map(|w| Some(w.initialise(key, remainder, cell, side)))
                .collect(),
        )
    }

    fn present(
        &self,
        key: &Position,
        remainder: &Position,
        cell: &Cell,
        state: State,
        side: &SideValue,
    ) -> (State, Vec<Cell>) {
        let slots = match state {
            State::Composite(slots) => slots,
            other => return (other, Vec::new()),
        };
        let mut output = Vec::new();
        let slots = self
            .members
            .iter()
            .zip(slots)
            .map(|(member, slot)| {
                slot.map(|s| {
                    let (next, cells) = member.present(key, remainder, cell, s, side);
                    output.extend(cells);
                    next
                })
            })
            .collect();
        (State::Composite(slots), output)
    }
}

fn compose(mut windows: Vec<Box<dyn Window>>) -> Box<dyn Window> {
    if windows.len() == 1 {
        windows.remove(0)
    } else {
        Box::new(Windows::new(windows))
    }
}

/// Scans one sorted group.
fn scan(window: &dyn Window, key: &Position, members: &[(Position, Cell)], side: &SideValue) -> Vec<Cell> {
    let mut members = members.iter();
    let Some((remainder, cell)) = members.next() else {
        return Vec::new();
    };
    let mut state = window.initialise(key, remainder, cell, side);
    let mut output = Vec::new();
    for (remainder, cell) in members {
        let (next, cells) = window.present(key, remainder, cell, state, side);
        state = next;
        output.extend(cells);
    }
    output
}

/// `"{previous}{sep}{current}"`, naming a cell derived from two neighbours.
fn transition_name(previous: &Position, current: &Position, separator: &str) -> Value {
    Value::from(format!(
        "{}{}{}",
        previous.to_short_string(separator),
        separator,
        current.to_short_string(separator)
    ))
}

// ============================================================================
// BUILT-IN WINDOWS
// ============================================================================

/// Running sum of the numeric cells of a group. Every step after the first
/// emits the sum so far at `key + "{previous}{sep}{current}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeSum {
    separator: String,
}

impl CumulativeSum {
    pub fn new(separator: impl Into<String>) -> Self {
        CumulativeSum { separator: separator.into() }
    }
}

impl Window for CumulativeSum {
    fn initialise(&self, _key: &Position, remainder: &Position, cell: &Cell, _side: &SideValue) -> State {
        State::Tracked {
            value: cell.content.as_f64(),
            remainder: remainder.clone(),
        }
    }

    fn present(
        &self,
        key: &Position,
        remainder: &Position,
        cell: &Cell,
        state: State,
        _side: &SideValue,
    ) -> (State, Vec<Cell>) {
        let (running, previous) = match state {
            State::Tracked { value: running, remainder: previous } => (running, previous),
            other => return (other, Vec::new()),
        };
        match (running, cell.content.as_f64()) {
            (Some(sum), Some(value)) => {
                let sum = sum + value;
                let name = transition_name(&previous, remainder, &self.separator);
                let output = vec![Cell::new(key.append(name), Content::continuous(sum))];
                (State::Tracked { value: Some(sum), remainder: remainder.clone() }, output)
            }
            (None, Some(value)) => (State::Tracked { value: Some(value), remainder: remainder.clone() }, Vec::new()),
            (running, None) => (State::Tracked { value: running, remainder: previous }, Vec::new()),
        }
    }
}

/// Difference between each numeric cell and the previous numeric cell of
/// its group, emitted at `key + "{previous}{sep}{current}"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Difference {
    separator: String,
}

impl Difference {
    pub fn new(separator: impl Into<String>) -> Self {
        Difference { separator: separator.into() }
    }
}

impl Window for Difference {
    fn initialise(&self, _key: &Position, remainder: &Position, cell: &Cell, _side: &SideValue) -> State {
        State::Tracked {
            value: cell.content.as_f64(),
            remainder: remainder.clone(),
        }
    }

    fn present(
        &self,
        key: &Position,
        remainder: &Position,
        cell: &Cell,
        state: State,
        _side: &SideValue,
    ) -> (State, Vec<Cell>) {
        let (last, previous) = match state {
            State::Tracked { value: last, remainder: previous } => (last, previous),
            other => return (other, Vec::new()),
        };
        match (last, cell.content.as_f64()) {
            (Some(last), Some(value)) => {
                let name = transition_name(&previous, remainder, &self.separator);
                let output = vec![Cell::new(key.append(name), Content::continuous(value - last))];
                (State::Tracked { value: Some(value), remainder: remainder.clone() }, output)
            }
            (None, Some(value)) => (State::Tracked { value: Some(value), remainder: remainder.clone() }, Vec::new()),
            (last, None) => (State::Tracked { value: last, remainder: previous }, Vec::new()),
        }
    }
}

/// Mean of the last `period` numeric cells, emitted at the current cell's
/// remainder once the window is full.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovingAverage {
    period: usize,
    separator: String,
}

impl MovingAverage {
    /// A zero period is treated as one.
    pub fn new(period: usize, separator: impl Into<String>) -> Self {
        MovingAverage {
            period: period.max(1),
            separator: separator.into(),
        }
    }

    fn label(&self, remainder: &Position) -> Value {
        match remainder.coordinates() {
            [single] => single.clone(),
            _ => Value::from(remainder.to_short_string(&self.separator)),
        }
    }
}

impl Window for MovingAverage {
    fn initialise(&self, _key: &Position, remainder: &Position, cell: &Cell, _side: &SideValue) -> State {
        State::Series {
            values: cell.content.as_f64().into_iter().collect(),
            remainder: remainder.clone(),
        }
    }

    fn present(
        &self,
        key: &Position,
        remainder: &Position,
        cell: &Cell,
        state: State,
        _side: &SideValue,
    ) -> (State, Vec<Cell>) {
        let (mut values, previous) = match state {
            State::Series { values, remainder: previous } => (values, previous),
            other => return (other, Vec::new()),
        };
        let Some(value) = cell.content.as_f64() else {
            return (State::Series { values, remainder: previous }, Vec::new());
        };
        values.push_back(value);
        if values.len() > self.period {
            values.pop_front();
        }
        let output = if values.len() == self.period {
            let mean = values.iter().sum::<f64>() / self.period as f64;
            vec![Cell::new(key.append(self.label(remainder)), Content::continuous(mean))]
        } else {
            Vec::new()
        };
        (State::Series { values, remainder: remainder.clone() }, output)
    }
}

// ============================================================================
// SLIDE
// ============================================================================

impl Matrix {
    /// Scans every group of `slice` with `windows`, in ascending (or
    /// descending) remainder order. Grouping uses hash partitions for every
    /// tuner; a sequential scan cannot be split across replicas.
    pub fn slide(
        &self,
        slice: &Slice,
        windows: impl Into<Operators<Box<dyn Window>>>,
        ascending: bool,
        side: &SideValue,
        tuner: Tuner,
    ) -> Result<Matrix> {
        self.check_slice(slice)?;
        let window = compose(windows.into().into_vec());

        let keyed: Vec<(Position, (Position, Cell))> = self
            .cells()
            .par_iter()
            .map(|cell| {
                let (selected, remainder) = slice.split(&cell.position);
                (selected, (remainder, cell.clone()))
            })
            .collect();

        let cells = for_each_group(keyed, tuner, |key, mut members| {
            members.sort_by(|(ra, ca), (rb, cb)| ra.cmp(rb).then_with(|| ca.content.cmp(&cb.content)));
            if !ascending {
                members.reverse();
            }
            scan(window.as_ref(), &key, &members, side)
        });
        self.derived(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{pos, Dimension};

    fn create_test_matrix() -> Matrix {
        Matrix::new(vec![
            Cell::new(pos![1, "B"], Content::discrete(20)),
            Cell::new(pos![1, "A"], Content::discrete(10)),
            Cell::new(pos![1, "C"], Content::discrete(5)),
            Cell::new(pos![2, "A"], Content::discrete(7)),
        ])
        .unwrap()
    }

    fn sorted(matrix: Matrix) -> Vec<Cell> {
        let mut cells = matrix.into_cells();
        cells.sort();
        cells
    }

    #[test]
    fn test_cumulative_sum() {
        let out = create_test_matrix()
            .slide(
                &Slice::over(Dimension::First),
                CumulativeSum::new(".").boxed(),
                true,
                &SideValue::Absent,
                Tuner::reducers(3).unwrap(),
            )
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos![1, "A.B"], Content::continuous(30.0)),
                Cell::new(pos![1, "B.C"], Content::continuous(35.0)),
            ]
        );
    }

    #[test]
    fn test_descending_difference() {
        let out = create_test_matrix()
            .slide(
                &Slice::over(Dimension::First),
                Difference::new("-").boxed(),
                false,
                &SideValue::Absent,
                Tuner::in_memory(),
            )
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos![1, "B-A"], Content::continuous(-10.0)),
                Cell::new(pos![1, "C-B"], Content::continuous(15.0)),
            ]
        );
    }

    #[test]
    fn test_moving_average_waits_for_full_window() {
        let out = create_test_matrix()
            .slide(
                &Slice::over(Dimension::First),
                MovingAverage::new(2, ".").boxed(),
                true,
                &SideValue::Absent,
                Tuner::in_memory(),
            )
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos![1, "B"], Content::continuous(15.0)),
                Cell::new(pos![1, "C"], Content::continuous(12.5)),
            ]
        );
    }

    #[test]
    fn test_non_numeric_cells_are_skipped() {
        let m = Matrix::new(vec![
            Cell::new(pos![1, "A"], Content::nominal("x")),
            Cell::new(pos![1, "B"], Content::discrete(3)),
            Cell::new(pos![1, "C"], Content::discrete(4)),
        ])
        .unwrap();
        let out = m
            .slide(&Slice::over(Dimension::First), CumulativeSum::new(".").boxed(), true, &SideValue::Absent, Tuner::in_memory())
            .unwrap();
        assert_eq!(sorted(out), vec![Cell::new(pos![1, "B.C"], Content::continuous(7.0))]);
    }

    #[test]
    fn test_composed_windows_concatenate_output() {
        let windows = vec![CumulativeSum::new(".").boxed(), Difference::new(":").boxed()];
        let out = create_test_matrix()
            .slide(&Slice::over(Dimension::First), windows, true, &SideValue::Absent, Tuner::unbalanced(2).unwrap())
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos![1, "A.B"], Content::continuous(30.0)),
                Cell::new(pos![1, "A:B"], Content::continuous(10.0)),
                Cell::new(pos![1, "B.C"], Content::continuous(35.0)),
                Cell::new(pos![1, "B:C"], Content::continuous(-15.0)),
            ]
        );
    }

    /// Emits step-to-step growth above a threshold read from a scalar side value.
    struct GrowthAbove;

    impl Window for GrowthAbove {
        fn initialise(&self, _key: &Position, _remainder: &Position, cell: &Cell, _side: &SideValue) -> State {
            State::Number(cell.content.as_f64().unwrap_or(0.0))
        }

        fn present(
            &self,
            key: &Position,
            remainder: &Position,
            cell: &Cell,
            state: State,
            side: &SideValue,
        ) -> (State, Vec<Cell>) {
            let (previous, current) = match (&state, cell.content.as_f64()) {
                (State::Number(previous), Some(current)) => (*previous, current),
                _ => return (state, Vec::new()),
            };
            let growth = current - previous;
            let output = match side.scalar().and_then(Content::as_f64) {
                Some(threshold) if growth > threshold => {
                    vec![Cell::new(key.append(remainder.to_short_string(".")), Content::continuous(growth))]
                }
                _ => Vec::new(),
            };
            (State::Number(current), output)
        }
    }

    #[test]
    fn test_window_reads_scalar_side_value() {
        let slide = |side: &SideValue| {
            sorted(
                create_test_matrix()
                    .slide(&Slice::over(Dimension::First), GrowthAbove.boxed(), true, side, Tuner::reducers(2).unwrap())
                    .unwrap(),
            )
        };
        assert_eq!(
            slide(&SideValue::Scalar(Content::discrete(0))),
            vec![Cell::new(pos![1, "B"], Content::continuous(10.0))]
        );
        assert!(slide(&SideValue::Scalar(Content::discrete(12))).is_empty());
        assert!(slide(&SideValue::Absent).is_empty());
    }
}
