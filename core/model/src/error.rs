//! FILENAME: core/model/src/error.rs

use thiserror::Error;

use crate::content::Schema;
use crate::position::{Dimension, MAX_DIMENSIONS};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Value '{value}' does not conform to schema {schema}")]
    SchemaMismatch { schema: Schema, value: String },

    #[error("Unable to parse '{input}' as {schema}")]
    Parse { schema: Schema, input: String },

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    #[error("{0} used more than once")]
    DuplicateDimension(Dimension),

    #[error("{dimension} is out of range for a position of arity {arity}")]
    DimensionOutOfRange { dimension: Dimension, arity: usize },

    #[error("Invalid arity {0}, expected 1..={max}", max = MAX_DIMENSIONS)]
    InvalidArity(usize),

    #[error("Malformed cell line: {0}")]
    MalformedLine(String),
}

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;
