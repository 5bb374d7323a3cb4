//! FILENAME: core/matrix-engine/src/reshape.rs
//! Operations that change the shape of a matrix: permute, fill, squash, melt.
//!
//! - `fill_*` densifies: every position of the domain missing from the
//!   matrix gets a cell. Existing cells are never overwritten.
//! - `squash` removes one dimension, folding the cells that collapse onto
//!   the same position through a `Squasher`.
//! - `melt` merges two dimensions into one string coordinate.

use log::debug;
use model::{validate_permutation, Cell, Content, Dimension, ModelError, Position, Slice, Value};
use rayon::prelude::*;

use crate::error::Result;
use crate::group::combine_by_key;
use crate::join::{filter_join, inner_join};
use crate::matrix::Matrix;
use crate::tuner::Tuner;

// ============================================================================
// SQUASHERS
// ============================================================================

/// Folds cells that differ only at the squashed dimension. `reduce` must be
/// associative and commutative.
pub trait Squasher: Send + Sync {
    /// Whether `cell` takes part in the fold at all.
    fn keep(&self, _dimension: Dimension, _cell: &Cell) -> bool {
        true
    }

    fn reduce(&self, dimension: Dimension, left: Cell, right: Cell) -> Cell;
}

/// Orders two cells by their coordinate at `dimension`, then by content.
fn by_coordinate(dimension: Dimension, left: &Cell, right: &Cell) -> std::cmp::Ordering {
    left.position
        .get(dimension)
        .cmp(&right.position.get(dimension))
        .then_with(|| left.content.cmp(&right.content))
}

/// Keeps the cell with the greatest coordinate at the squashed dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreservingMaximumPosition;

impl Squasher for PreservingMaximumPosition {
    fn reduce(&self, dimension: Dimension, left: Cell, right: Cell) -> Cell {
        std::cmp::max_by(left, right, |l, r| by_coordinate(dimension, l, r))
    }
}

/// Keeps the cell with the smallest coordinate at the squashed dimension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreservingMinimumPosition;

impl Squasher for PreservingMinimumPosition {
    fn reduce(&self, dimension: Dimension, left: Cell, right: Cell) -> Cell {
        std::cmp::min_by(left, right, |l, r| by_coordinate(dimension, l, r))
    }
}

/// Keeps only the cells whose coordinate at the squashed dimension equals
/// `coordinate`.
#[derive(Debug, Clone, PartialEq)]
pub struct KeepSlice {
    coordinate: Value,
}

impl KeepSlice {
    pub fn new(coordinate: impl Into<Value>) -> Self {
        KeepSlice { coordinate: coordinate.into() }
    }
}

impl Squasher for KeepSlice {
    fn keep(&self, dimension: Dimension, cell: &Cell) -> bool {
        cell.position.get(dimension) == Some(&self.coordinate)
    }

    fn reduce(&self, dimension: Dimension, left: Cell, right: Cell) -> Cell {
        // Only reached when a matrix holds duplicate positions.
        std::cmp::max_by(left, right, |l, r| by_coordinate(dimension, l, r))
    }
}

// ============================================================================
// OPERATIONS
// ============================================================================

impl Matrix {
    /// Reorders the dimensions of every position; `order[i]` names the source
    /// dimension of output dimension `i`.
    pub fn permute(&self, order: &[Dimension]) -> Result<Matrix> {
        if let Some(arity) = self.arity() {
            validate_permutation(order, arity)?;
        }
        let cells = self
            .cells()
            .par_iter()
            .map(|cell| -> Result<Cell> { Ok(Cell::new(cell.position.permute(order)?, cell.content.clone())) })
            .collect::<Result<Vec<Cell>>>()?;
        self.derived(cells)
    }

    /// Domain positions without a cell.
    fn missing_positions(&self, tuner: Tuner) -> Vec<Position> {
        let domain: Vec<(Position, Position)> = self.domain().into_iter().map(|p| (p.clone(), p)).collect();
        let present: Vec<Position> = self.cells().iter().map(|c| c.position.clone()).collect();
        let missing = filter_join(domain, present, false, tuner, self.config());
        debug!("fill: {} positions missing from the domain", missing.len());
        missing
    }

    /// Adds a cell holding `content` at every missing domain position.
    pub fn fill_homogeneous(&self, content: Content, tuner: Tuner) -> Result<Matrix> {
        let mut cells = self.cells().to_vec();
        cells.extend(
            self.missing_positions(tuner)
                .into_iter()
                .map(|position| Cell::new(position, content.clone())),
        );
        self.derived(cells)
    }

    /// Adds a cell at every missing domain position, taking its content from
    /// `values` at the position's selected sub-position. Missing positions
    /// whose sub-position has no value stay empty.
    pub fn fill_heterogeneous(&self, slice: &Slice, values: &Matrix, tuner: Tuner) -> Result<Matrix> {
        self.check_slice(slice)?;
        let missing: Vec<(Position, Position)> = self
            .missing_positions(tuner)
            .into_iter()
            .map(|position| (slice.selected(&position), position))
            .collect();
        let sources: Vec<(Position, Content)> = values
            .cells()
            .iter()
            .map(|c| (c.position.clone(), c.content.clone()))
            .collect();

        let mut cells = self.cells().to_vec();
        cells.extend(inner_join(missing, sources, tuner, self.config(), |_, position, content| {
            vec![Cell::new(position.clone(), content.clone())]
        }));
        self.derived(cells)
    }

    /// Removes `dimension`, folding cells that collapse onto the same
    /// position with `squasher`.
    pub fn squash<S: Squasher>(&self, dimension: Dimension, squasher: &S, tuner: Tuner) -> Result<Matrix> {
        self.check_dimension(dimension)?;
        if self.arity() == Some(1) {
            return Err(ModelError::InvalidArity(0).into());
        }
        let squashed = combine_by_key(
            self.cells(),
            tuner,
            self.config(),
            |cell| {
                if !squasher.keep(dimension, cell) {
                    return None;
                }
                let position = cell.position.remove(dimension).ok()?;
                Some((position, cell.clone()))
            },
            |left, right| squasher.reduce(dimension, left, right),
        );
        let cells = squashed
            .into_iter()
            .map(|(position, cell)| Cell::new(position, cell.content))
            .collect();
        self.derived(cells)
    }

    /// Folds `dimension` into `into`: the coordinate at `into` becomes
    /// `"{into}{separator}{dimension}"` and `dimension` is removed.
    pub fn melt(&self, dimension: Dimension, into: Dimension, separator: &str) -> Result<Matrix> {
        self.check_dimension(dimension)?;
        self.check_dimension(into)?;
        if dimension == into {
            return Err(ModelError::DuplicateDimension(dimension).into());
        }
        let cells = self
            .cells()
            .par_iter()
            .map(|cell| -> Result<Cell> {
                Ok(Cell::new(cell.position.melt(dimension, into, separator)?, cell.content.clone()))
            })
            .collect::<Result<Vec<Cell>>>()?;
        self.derived(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use model::pos;

    fn tuners() -> Vec<Tuner> {
        vec![Tuner::in_memory(), Tuner::reducers(2).unwrap(), Tuner::unbalanced(3).unwrap()]
    }

    fn create_test_matrix() -> Matrix {
        Matrix::new(vec![
            Cell::new(pos![1, "A"], Content::discrete(10)),
            Cell::new(pos![1, "B"], Content::discrete(20)),
            Cell::new(pos![2, "A"], Content::discrete(5)),
            Cell::new(pos![3, "A"], Content::discrete(1)),
            Cell::new(pos![3, "B"], Content::discrete(2)),
        ])
        .unwrap()
    }

    fn sorted(matrix: Matrix) -> Vec<Cell> {
        let mut cells = matrix.into_cells();
        cells.sort();
        cells
    }

    #[test]
    fn test_fill_homogeneous_inserts_missing_only() {
        for tuner in tuners() {
            let filled = create_test_matrix().fill_homogeneous(Content::discrete(0), tuner).unwrap();
            assert_eq!(filled.len(), 6);
            assert!(filled.cells().contains(&Cell::new(pos![2, "B"], Content::discrete(0))));
            assert!(filled.cells().contains(&Cell::new(pos![1, "A"], Content::discrete(10))));
        }
    }

    #[test]
    fn test_fill_heterogeneous() {
        let defaults = Matrix::new(vec![Cell::new(pos!["B"], Content::discrete(-1))]).unwrap();
        let extra = Matrix::new(vec![Cell::new(pos![4, "C"], Content::discrete(9))]).unwrap();
        let m = create_test_matrix().set(&extra, Tuner::in_memory()).unwrap();
        for tuner in tuners() {
            let filled = m.fill_heterogeneous(&Slice::over(Dimension::Second), &defaults, tuner).unwrap();
            let added: Vec<Cell> = sorted(filled).into_iter().filter(|c| c.content == Content::discrete(-1)).collect();
            assert_eq!(
                added,
                vec![
                    Cell::new(pos![2, "B"], Content::discrete(-1)),
                    Cell::new(pos![4, "B"], Content::discrete(-1)),
                ]
            );
        }
    }

    #[test]
    fn test_squash_preserving_maximum() {
        for tuner in tuners() {
            let squashed = create_test_matrix()
                .squash(Dimension::Second, &PreservingMaximumPosition, tuner)
                .unwrap();
            assert_eq!(
                sorted(squashed),
                vec![
                    Cell::new(pos![1], Content::discrete(20)),
                    Cell::new(pos![2], Content::discrete(5)),
                    Cell::new(pos![3], Content::discrete(2)),
                ]
            );
        }
    }

    #[test]
    fn test_squash_minimum_and_keep_slice() {
        let min = create_test_matrix()
            .squash(Dimension::First, &PreservingMinimumPosition, Tuner::in_memory())
            .unwrap();
        assert_eq!(
            sorted(min),
            vec![
                Cell::new(pos!["A"], Content::discrete(10)),
                Cell::new(pos!["B"], Content::discrete(20)),
            ]
        );

        let kept = create_test_matrix()
            .squash(Dimension::Second, &KeepSlice::new("B"), Tuner::in_memory())
            .unwrap();
        assert_eq!(
            sorted(kept),
            vec![
                Cell::new(pos![1], Content::discrete(20)),
                Cell::new(pos![3], Content::discrete(2)),
            ]
        );
    }

    #[test]
    fn test_squash_needs_two_dimensions() {
        let m = Matrix::new(vec![Cell::new(pos![1], Content::discrete(1))]).unwrap();
        assert!(m.squash(Dimension::First, &PreservingMaximumPosition, Tuner::in_memory()).is_err());
    }

    #[test]
    fn test_melt() {
        let melted = create_test_matrix().melt(Dimension::First, Dimension::Second, ".").unwrap();
        assert!(melted.cells().contains(&Cell::new(pos!["A.1"], Content::discrete(10))));
        assert_eq!(melted.arity(), Some(1));

        let err = create_test_matrix().melt(Dimension::First, Dimension::First, ".").unwrap_err();
        assert!(matches!(err, EngineError::Model(ModelError::DuplicateDimension(Dimension::First))));
    }

    #[test]
    fn test_permute() {
        let permuted = create_test_matrix().permute(&[Dimension::Second, Dimension::First]).unwrap();
        assert!(permuted.cells().contains(&Cell::new(pos!["B", 3], Content::discrete(2))));
        assert!(create_test_matrix().permute(&[Dimension::First, Dimension::First]).is_err());
    }
}
