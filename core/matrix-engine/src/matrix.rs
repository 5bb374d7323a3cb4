//! FILENAME: core/matrix-engine/src/matrix.rs
//! Matrix - a flat collection of cells sharing one arity.
//!
//! This module holds construction and the simple query/selection operations
//! (names, domain, get, slice, set, change, which, unique, types, to_map).
//! The grouped engines live in `aggregate`, `window` and `pairwise`;
//! dimension-changing operations (fill, squash, melt, permute) live in
//! `reshape`.
//!
//! Operations never mutate a matrix; each returns a new one that carries the
//! same engine configuration.

use log::debug;
use model::{Cell, Content, Dimension, Position, Schema, Slice, ValueType, MAX_DIMENSIONS};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::group::combine_by_key;
use crate::join::filter_join;
use crate::side::SideValue;
use crate::tuner::Tuner;

#[derive(Debug, Clone, Default)]
pub struct Matrix {
    cells: Vec<Cell>,
    /// `None` only for an empty matrix.
    arity: Option<usize>,
    config: EngineConfig,
}

/// Common arity of `cells`, checked against the 1..=9 dimension limit.
fn arity_of(cells: &[Cell]) -> Result<Option<usize>> {
    let Some(first) = cells.first() else {
        return Ok(None);
    };
    let arity = first.position.arity();
    if arity == 0 || arity > MAX_DIMENSIONS {
        return Err(model::ModelError::InvalidArity(arity).into());
    }
    if let Some(other) = cells.iter().find(|c| c.position.arity() != arity) {
        return Err(EngineError::MixedArity {
            first: arity,
            second: other.position.arity(),
        });
    }
    Ok(Some(arity))
}

impl Matrix {
    /// Builds a matrix with the default engine configuration.
    pub fn new(cells: Vec<Cell>) -> Result<Self> {
        Self::with_config(cells, EngineConfig::default())
    }

    pub fn with_config(cells: Vec<Cell>, config: EngineConfig) -> Result<Self> {
        let arity = arity_of(&cells)?;
        Ok(Matrix { cells, arity, config })
    }

    /// A matrix of operation output, sharing this matrix's configuration.
    pub(crate) fn derived(&self, cells: Vec<Cell>) -> Result<Matrix> {
        Self::with_config(cells, self.config)
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn arity(&self) -> Option<usize> {
        self.arity
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Configuration errors are raised here, before any cell is touched.
    pub(crate) fn check_slice(&self, slice: &Slice) -> Result<()> {
        match self.arity {
            Some(arity) => Ok(slice.validate(arity)?),
            None => Ok(()),
        }
    }

    pub(crate) fn check_dimension(&self, dimension: Dimension) -> Result<()> {
        match self.arity {
            Some(arity) => Ok(dimension.check(arity)?),
            None => Ok(()),
        }
    }

    pub(crate) fn check_same_arity(&self, other: &Matrix) -> Result<()> {
        match (self.arity, other.arity) {
            (Some(expected), Some(found)) if expected != found => {
                Err(EngineError::ArityMismatch { expected, found })
            }
            _ => Ok(()),
        }
    }

    // ========================================================================
    // NAMES AND DOMAIN
    // ========================================================================

    /// Distinct selected sub-positions, sorted.
    pub fn names(&self, slice: &Slice) -> Result<Vec<Position>> {
        self.check_slice(slice)?;
        let names: FxHashSet<Position> = self.cells.par_iter().map(|c| slice.selected(&c.position)).collect();
        let mut names: Vec<Position> = names.into_iter().collect();
        names.sort();
        Ok(names)
    }

    /// Sorted distinct coordinates of each dimension.
    fn coordinates_per_dimension(&self) -> Vec<Vec<model::Value>> {
        let arity = self.arity.unwrap_or(0);
        (0..arity)
            .map(|index| {
                let distinct: FxHashSet<&model::Value> =
                    self.cells.iter().map(|c| &c.position.coordinates()[index]).collect();
                let mut values: Vec<model::Value> = distinct.into_iter().cloned().collect();
                values.sort();
                values
            })
            .collect()
    }

    /// Number of distinct coordinates in every dimension.
    pub fn shape(&self) -> Vec<usize> {
        self.coordinates_per_dimension().iter().map(Vec::len).collect()
    }

    /// Number of distinct coordinates in one dimension.
    pub fn size(&self, dimension: Dimension) -> Result<usize> {
        self.check_dimension(dimension)?;
        let distinct: FxHashSet<&model::Value> = self
            .cells
            .iter()
            .filter_map(|c| c.position.get(dimension))
            .collect();
        Ok(distinct.len())
    }

    /// The Cartesian product of all distinct coordinates per dimension, in
    /// lexicographic order.
    pub fn domain(&self) -> Vec<Position> {
        let axes = self.coordinates_per_dimension();
        if axes.is_empty() {
            return Vec::new();
        }
        let mut domain: Vec<Vec<model::Value>> = vec![Vec::new()];
        for axis in &axes {
            domain = domain
                .into_iter()
                .flat_map(|prefix| {
                    axis.iter().map(move |value| {
                        let mut next = prefix.clone();
                        next.push(value.clone());
                        next
                    })
                })
                .collect();
        }
        domain.into_iter().map(Position::from_iter).collect()
    }

    // ========================================================================
    // SELECTION
    // ========================================================================

    /// Cells at the given positions.
    pub fn get(&self, positions: &[Position], tuner: Tuner) -> Result<Matrix> {
        let keyed: Vec<(Position, Cell)> = self.cells.iter().map(|c| (c.position.clone(), c.clone())).collect();
        let cells = filter_join(keyed, positions.to_vec(), true, tuner, &self.config);
        self.derived(cells)
    }

    /// Keeps (`keep`) or removes (`!keep`) the cells whose selected
    /// sub-position is one of `keys`.
    pub fn slice(&self, slice: &Slice, keys: &[Position], keep: bool, tuner: Tuner) -> Result<Matrix> {
        self.check_slice(slice)?;
        let keyed = self.keyed_by(slice);
        let cells = filter_join(keyed, keys.to_vec(), keep, tuner, &self.config);
        self.derived(cells)
    }

    /// Re-validates the contents of matched cells under `schema`. A value
    /// that does not conform fails the whole call.
    pub fn change(&self, slice: &Slice, keys: &[Position], schema: Schema, tuner: Tuner) -> Result<Matrix> {
        self.check_slice(slice)?;
        let matched = filter_join(self.keyed_by(slice), keys.to_vec(), true, tuner, &self.config);
        let mut cells = filter_join(self.keyed_by(slice), keys.to_vec(), false, tuner, &self.config);
        let changed: Vec<Cell> = matched
            .into_par_iter()
            .map(|cell| -> Result<Cell> {
                let content = cell.content.with_schema(schema)?;
                Ok(Cell::new(cell.position, content))
            })
            .collect::<Result<Vec<Cell>>>()?;
        debug!("change: {} cells re-validated as {}", changed.len(), schema);
        cells.extend(changed);
        self.derived(cells)
    }

    /// Overwrites cells at the positions of `values`, inserting the ones that
    /// do not exist yet.
    pub fn set(&self, values: &Matrix, tuner: Tuner) -> Result<Matrix> {
        self.check_same_arity(values)?;
        let keyed: Vec<(Position, Cell)> = self.cells.iter().map(|c| (c.position.clone(), c.clone())).collect();
        let replaced: Vec<Position> = values.cells.iter().map(|c| c.position.clone()).collect();
        let mut cells = filter_join(keyed, replaced, false, tuner, &self.config);
        cells.extend(values.cells.iter().cloned());
        self.derived(cells)
    }

    /// Positions of the cells satisfying `predicate`.
    pub fn which<P>(&self, predicate: P) -> Vec<Position>
    where
        P: Fn(&Cell) -> bool + Sync,
    {
        self.cells
            .par_iter()
            .filter(|c| predicate(c))
            .map(|c| c.position.clone())
            .collect()
    }

    // ========================================================================
    // DISTINCT VALUES AND TYPES
    // ========================================================================

    /// Distinct contents, sorted.
    pub fn unique(&self) -> Vec<Content> {
        let distinct: FxHashSet<&Content> = self.cells.iter().map(|c| &c.content).collect();
        let mut contents: Vec<Content> = distinct.into_iter().cloned().collect();
        contents.sort();
        contents
    }

    /// Distinct (selected sub-position, content) pairs, sorted.
    pub fn unique_by(&self, slice: &Slice) -> Result<Vec<(Position, Content)>> {
        self.check_slice(slice)?;
        let distinct: FxHashSet<(Position, Content)> = self
            .cells
            .par_iter()
            .map(|c| (slice.selected(&c.position), c.content.clone()))
            .collect();
        let mut pairs: Vec<(Position, Content)> = distinct.into_iter().collect();
        pairs.sort();
        Ok(pairs)
    }

    /// Value type of every selected group: the specific type when `specific`
    /// is set, its general family otherwise.
    pub fn types(&self, slice: &Slice, specific: bool, tuner: Tuner) -> Result<Vec<(Position, ValueType)>> {
        self.check_slice(slice)?;
        let mut types = combine_by_key(
            &self.cells,
            tuner,
            &self.config,
            |c| Some((slice.selected(&c.position), c.content.schema().value_type())),
            ValueType::merge,
        );
        if !specific {
            for (_, value_type) in types.iter_mut() {
                *value_type = value_type.general();
            }
        }
        types.sort();
        Ok(types)
    }

    /// Nested lookup `selected -> remainder -> content`.
    pub fn to_map(&self, slice: &Slice) -> Result<FxHashMap<Position, FxHashMap<Position, Content>>> {
        self.check_slice(slice)?;
        let mut map: FxHashMap<Position, FxHashMap<Position, Content>> = FxHashMap::default();
        for cell in &self.cells {
            let (selected, remainder) = slice.split(&cell.position);
            map.entry(selected).or_default().insert(remainder, cell.content.clone());
        }
        Ok(map)
    }

    /// The cells as a position-keyed side value.
    pub fn to_side_map(&self) -> SideValue {
        self.cells
            .iter()
            .map(|c| (c.position.clone(), c.content.clone()))
            .collect()
    }

    pub(crate) fn keyed_by(&self, slice: &Slice) -> Vec<(Position, Cell)> {
        self.cells
            .iter()
            .map(|c| (slice.selected(&c.position), c.clone()))
            .collect()
    }
}
