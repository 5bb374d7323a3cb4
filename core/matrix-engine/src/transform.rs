//! FILENAME: core/matrix-engine/src/transform.rs
//! Cell-wise transformations.

use model::{Cell, Content, Dimension, Position, Value};
use rayon::prelude::*;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::operators::Operators;
use crate::side::SideValue;

/// Maps one cell to zero or more cells.
pub trait Transformer: Send + Sync {
    fn transform(&self, cell: &Cell, side: &SideValue) -> Vec<Cell>;

    fn boxed(self) -> Box<dyn Transformer>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Replaces every content with discrete `1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Indicator {
    name: Option<Value>,
}

impl Indicator {
    pub fn new() -> Self {
        Indicator::default()
    }

    /// Appends `name` to every output position.
    pub fn named(mut self, name: impl Into<Value>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl Transformer for Indicator {
    fn transform(&self, cell: &Cell, _side: &SideValue) -> Vec<Cell> {
        let position = match &self.name {
            Some(name) => cell.position.append(name.clone()),
            None => cell.position.clone(),
        };
        vec![Cell::new(position, Content::discrete(1))]
    }
}

/// `(x - mean) / deviation`, with both statistics looked up in a side map at
/// `(coordinate, mean_name)` and `(coordinate, deviation_name)`, where
/// `coordinate` is the cell's coordinate at `dimension`. This is the layout
/// `summarise` produces for named mean and standard deviation statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardise {
    dimension: Dimension,
    mean_name: Value,
    deviation_name: Value,
}

impl Standardise {
    pub fn new(dimension: Dimension) -> Self {
        Standardise {
            dimension,
            mean_name: Value::from("mean"),
            deviation_name: Value::from("sd"),
        }
    }

    pub fn with_names(mut self, mean: impl Into<Value>, deviation: impl Into<Value>) -> Self {
        self.mean_name = mean.into();
        self.deviation_name = deviation.into();
        self
    }

    fn statistic(&self, coordinate: &Value, name: &Value, side: &SideValue) -> Option<f64> {
        side.lookup(&Position::new([coordinate.clone(), name.clone()]))?
            .as_f64()
    }
}

impl Transformer for Standardise {
    fn transform(&self, cell: &Cell, side: &SideValue) -> Vec<Cell> {
        let standardised = || -> Option<f64> {
            let value = cell.content.as_f64()?;
            let coordinate = cell.position.get(self.dimension)?;
            let mean = self.statistic(coordinate, &self.mean_name, side)?;
            let deviation = self.statistic(coordinate, &self.deviation_name, side)?;
            (deviation != 0.0).then(|| (value - mean) / deviation)
        };
        match standardised() {
            Some(z) => vec![Cell::new(cell.position.clone(), Content::continuous(z))],
            None => Vec::new(),
        }
    }
}

impl Matrix {
    /// Passes every cell through each transformer and concatenates the output.
    pub fn transform(
        &self,
        transformers: impl Into<Operators<Box<dyn Transformer>>>,
        side: &SideValue,
    ) -> Result<Matrix> {
        let transformers = transformers.into().into_vec();
        let cells: Vec<Cell> = self
            .cells()
            .par_iter()
            .flat_map_iter(|cell| {
                transformers
                    .iter()
                    .flat_map(|t| t.transform(cell, side))
                    .collect::<Vec<Cell>>()
            })
            .collect();
        self.derived(cells)
    }
}
