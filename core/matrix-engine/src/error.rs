//! FILENAME: core/matrix-engine/src/error.rs
//! Error types for matrix operations

use thiserror::Error;

/// Matrix engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Error from the data model (schema, dimension or arity violations)
    #[error("Model error: {0}")]
    Model(#[from] model::ModelError),

    /// A tuner was configured with zero reduce partitions
    #[error("Invalid parallelism {0}, must be at least 1")]
    InvalidParallelism(usize),

    /// Two matrices (or a matrix and a cell) disagree on arity
    #[error("Arity mismatch: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// Cells of differing arity were produced for one matrix
    #[error("Cells of arity {first} and {second} cannot share a matrix")]
    MixedArity { first: usize, second: usize },

    /// Configuration could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External streaming program exited unsuccessfully
    #[error("Stream command '{program}' failed with exit code {code:?}")]
    StreamFailed { program: String, code: Option<i32> },
}

/// Result type for matrix operations
pub type Result<T> = std::result::Result<T, EngineError>;
