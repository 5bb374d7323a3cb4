//! FILENAME: core/matrix-engine/src/lib.rs
//! Matrix engine for sparse, labeled N-dimensional data.
//!
//! A matrix is a flat collection of cells. Every grouped operation takes a
//! `Slice` that splits positions into a selected key and a remainder, and a
//! `Tuner` that picks the physical layout of the work without changing its
//! result.
//!
//! Layers:
//! - `matrix`: construction, queries and selection
//! - `aggregate`, `window`, `pairwise`: the grouped engines (summarise, slide,
//!   pairwise/pairwise_between)
//! - `transform`, `reshape`: cell-wise maps and shape changes
//! - `stream`: piping cells through an external program
//! - `tuner`, `config`: execution strategy and its tunable knobs

pub mod aggregate;
pub mod config;
pub mod error;
pub mod matrix;
pub mod operators;
pub mod pairwise;
pub mod reshape;
pub mod side;
pub mod state;
pub mod stream;
pub mod transform;
pub mod tuner;
pub mod window;

mod group;
mod join;
mod sketch;

pub use aggregate::{Aggregator, Aggregators, Statistic, StatisticKind, WeightedSum};
pub use config::{EngineConfig, DEFAULT_REDUCERS};
pub use error::{EngineError, Result};
pub use matrix::Matrix;
pub use operators::Operators;
pub use pairwise::{Arithmetic, ArithmeticOp, Comparer, Concatenate, PairwiseOperator, PairwiseOperators};
pub use reshape::{KeepSlice, PreservingMaximumPosition, PreservingMinimumPosition, Squasher};
pub use side::SideValue;
pub use state::{Moments, State};
pub use stream::StreamCommand;
pub use transform::{Indicator, Standardise, Transformer};
pub use tuner::Tuner;
pub use window::{CumulativeSum, Difference, MovingAverage, Window, Windows};
