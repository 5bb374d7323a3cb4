//! FILENAME: core/model/src/slice.rs
//! PURPOSE: Splits a position into a "selected" and a "remainder" sub-position.
//! CONTEXT: `Over` selects the named dimensions and leaves the rest as the
//! remainder; `Along` selects everything except the named dimensions. The two
//! sub-positions partition the original coordinates, so the original can
//! always be rebuilt with `reconstruct`.

use serde::Serialize;
use smallvec::SmallVec;

use crate::error::{ModelError, Result};
use crate::position::{Dimension, Position, MAX_DIMENSIONS};
use crate::value::Value;

/// Which side of the split the named dimensions land on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SliceKind {
    /// Named dimensions are selected.
    Over,
    /// Named dimensions are the remainder.
    Along,
}

/// A decomposition of positions along one or more distinct dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Slice {
    kind: SliceKind,
    /// Sorted, distinct.
    dimensions: SmallVec<[Dimension; 2]>,
}

impl Slice {
    pub fn over(dimension: Dimension) -> Self {
        Slice {
            kind: SliceKind::Over,
            dimensions: smallvec::smallvec![dimension],
        }
    }

    pub fn along(dimension: Dimension) -> Self {
        Slice {
            kind: SliceKind::Along,
            dimensions: smallvec::smallvec![dimension],
        }
    }

    /// Selects several dimensions at once. Repeating a dimension is an error.
    pub fn over_dimensions(dimensions: &[Dimension]) -> Result<Self> {
        Self::build(SliceKind::Over, dimensions)
    }

    /// Leaves several dimensions as the remainder. Repeating a dimension is an error.
    pub fn along_dimensions(dimensions: &[Dimension]) -> Result<Self> {
        Self::build(SliceKind::Along, dimensions)
    }

    fn build(kind: SliceKind, dimensions: &[Dimension]) -> Result<Self> {
        let mut sorted: SmallVec<[Dimension; 2]> = dimensions.iter().copied().collect();
        sorted.sort();
        if let Some(pair) = sorted.windows(2).find(|w| w[0] == w[1]) {
            return Err(ModelError::DuplicateDimension(pair[0]));
        }
        if sorted.is_empty() || sorted.len() > MAX_DIMENSIONS {
            return Err(ModelError::InvalidArity(sorted.len()));
        }
        Ok(Slice { kind, dimensions: sorted })
    }

    pub fn kind(&self) -> SliceKind {
        self.kind
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Fails if any named dimension does not exist at the given arity.
    pub fn validate(&self, arity: usize) -> Result<()> {
        self.dimensions.iter().try_for_each(|d| d.check(arity))
    }

    fn is_selected(&self, index: usize) -> bool {
        let named = self.dimensions.iter().any(|d| d.index() == index);
        match self.kind {
            SliceKind::Over => named,
            SliceKind::Along => !named,
        }
    }

    pub fn selected(&self, position: &Position) -> Position {
        self.pick(position, true)
    }

    pub fn remainder(&self, position: &Position) -> Position {
        self.pick(position, false)
    }

    /// `(selected, remainder)` in one pass.
    pub fn split(&self, position: &Position) -> (Position, Position) {
        let mut selected = Vec::new();
        let mut remainder = Vec::new();
        for (index, value) in position.coordinates().iter().enumerate() {
            if self.is_selected(index) {
                selected.push(value.clone());
            } else {
                remainder.push(value.clone());
            }
        }
        (selected.into_iter().collect(), remainder.into_iter().collect())
    }

    fn pick(&self, position: &Position, selected: bool) -> Position {
        position
            .coordinates()
            .iter()
            .enumerate()
            .filter(|(index, _)| self.is_selected(*index) == selected)
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Rebuilds the original position from its two halves.
    pub fn reconstruct(&self, selected: &Position, remainder: &Position) -> Result<Position> {
        let arity = selected.arity() + remainder.arity();
        self.validate(arity)?;
        let expected = (0..arity).filter(|i| self.is_selected(*i)).count();
        if expected != selected.arity() {
            return Err(ModelError::InvalidArity(selected.arity()));
        }

        let mut from_selected = selected.coordinates().iter();
        let mut from_remainder = remainder.coordinates().iter();
        let coordinates: Option<Vec<Value>> = (0..arity)
            .map(|i| {
                if self.is_selected(i) {
                    from_selected.next().cloned()
                } else {
                    from_remainder.next().cloned()
                }
            })
            .collect();
        coordinates
            .map(|c| c.into_iter().collect())
            .ok_or(ModelError::InvalidArity(arity))
    }
}
