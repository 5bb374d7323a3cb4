//! FILENAME: core/model/src/position.rs
//! PURPOSE: Coordinate tuples that address cells in a sparse matrix.
//! CONTEXT: A position holds 1 to 9 coordinates (0 for the empty sub-position a
//! slice may produce). Dimensions are addressed by index through `Dimension`
//! rather than per-arity accessors. Positions are immutable: every operation
//! returns a new position.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::{ModelError, Result};
use crate::value::Value;

/// Largest number of dimensions a matrix may have.
pub const MAX_DIMENSIONS: usize = 9;

/// Index of a coordinate within a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Seventh,
    Eighth,
    Ninth,
}

impl Dimension {
    pub const ALL: [Dimension; MAX_DIMENSIONS] = [
        Dimension::First,
        Dimension::Second,
        Dimension::Third,
        Dimension::Fourth,
        Dimension::Fifth,
        Dimension::Sixth,
        Dimension::Seventh,
        Dimension::Eighth,
        Dimension::Ninth,
    ];

    /// 0-based index of this dimension.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Dimension> {
        Self::ALL.get(index).copied()
    }

    /// Fails when this dimension does not exist in a position of `arity` coordinates.
    pub fn check(self, arity: usize) -> Result<()> {
        if self.index() < arity {
            Ok(())
        } else {
            Err(ModelError::DimensionOutOfRange { dimension: self, arity })
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dimension {}", self.index() + 1)
    }
}

/// Inline storage for the common low-arity case.
pub type Coordinates = SmallVec<[Value; 4]>;

/// An ordered tuple of coordinates. Equality is structural; ordering is
/// lexicographic over the coordinates' canonical ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    coordinates: Coordinates,
}

impl Position {
    pub fn new<I, V>(coordinates: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Position {
            coordinates: coordinates.into_iter().map(Into::into).collect(),
        }
    }

    /// The 0-arity position.
    pub fn empty() -> Self {
        Position::default()
    }

    pub fn arity(&self) -> usize {
        self.coordinates.len()
    }

    pub fn coordinates(&self) -> &[Value] {
        &self.coordinates
    }

    pub fn get(&self, dimension: Dimension) -> Option<&Value> {
        self.coordinates.get(dimension.index())
    }

    /// Like `get`, but out-of-range access is an error.
    pub fn coordinate(&self, dimension: Dimension) -> Result<&Value> {
        self.get(dimension).ok_or(ModelError::DimensionOutOfRange {
            dimension,
            arity: self.arity(),
        })
    }

    pub fn append(&self, value: impl Into<Value>) -> Position {
        let mut coordinates = self.coordinates.clone();
        coordinates.push(value.into());
        Position { coordinates }
    }

    pub fn prepend(&self, value: impl Into<Value>) -> Position {
        let mut coordinates = self.coordinates.clone();
        coordinates.insert(0, value.into());
        Position { coordinates }
    }

    /// Replaces the coordinate at `dimension`.
    pub fn update(&self, dimension: Dimension, value: impl Into<Value>) -> Result<Position> {
        dimension.check(self.arity())?;
        let mut coordinates = self.coordinates.clone();
        coordinates[dimension.index()] = value.into();
        Ok(Position { coordinates })
    }

    /// Drops the coordinate at `dimension`.
    pub fn remove(&self, dimension: Dimension) -> Result<Position> {
        dimension.check(self.arity())?;
        let mut coordinates = self.coordinates.clone();
        coordinates.remove(dimension.index());
        Ok(Position { coordinates })
    }

    /// Reorders coordinates so that coordinate `i` of the result is coordinate
    /// `order[i]` of this position. `order` must name every dimension exactly once.
    pub fn permute(&self, order: &[Dimension]) -> Result<Position> {
        validate_permutation(order, self.arity())?;
        Ok(Position {
            coordinates: order
                .iter()
                .map(|d| self.coordinates[d.index()].clone())
                .collect(),
        })
    }

    /// Merges the coordinate at `dimension` into the one at `into` as the string
    /// `"{into}{separator}{dimension}"`, then drops `dimension`.
    pub fn melt(&self, dimension: Dimension, into: Dimension, separator: &str) -> Result<Position> {
        if dimension == into {
            return Err(ModelError::DuplicateDimension(dimension));
        }
        let merged = format!(
            "{}{}{}",
            self.coordinate(into)?,
            separator,
            self.coordinate(dimension)?
        );
        self.update(into, merged)?.remove(dimension)
    }

    /// Coordinates rendered with `separator` between them.
    pub fn to_short_string(&self, separator: &str) -> String {
        self.coordinates
            .iter()
            .map(|c| c.canonical())
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Position({})", self.to_short_string(","))
    }
}

impl FromIterator<Value> for Position {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Position {
            coordinates: iter.into_iter().collect(),
        }
    }
}

/// Checks that `order` is a permutation of the dimensions of an `arity`-position.
pub fn validate_permutation(order: &[Dimension], arity: usize) -> Result<()> {
    let mut seen = [false; MAX_DIMENSIONS];
    for dimension in order {
        dimension.check(arity)?;
        if seen[dimension.index()] {
            return Err(ModelError::DuplicateDimension(*dimension));
        }
        seen[dimension.index()] = true;
    }
    if order.len() != arity {
        return Err(ModelError::InvalidArity(order.len()));
    }
    Ok(())
}

/// Builds a `Position` from a list of anything convertible into `Value`.
///
/// ```
/// use model::{pos, Value};
/// let p = pos![1, "A"];
/// assert_eq!(p.coordinates(), &[Value::Long(1), Value::from("A")]);
/// ```
#[macro_export]
macro_rules! pos {
    () => {
        $crate::Position::empty()
    };
    ($($coordinate:expr),+ $(,)?) => {
        $crate::Position::from_iter([$($crate::Value::from($coordinate)),+])
    };
}
