//! FILENAME: core/model/src/lib.rs
//! PURPOSE: Data model shared by the matrix engine.
//! CONTEXT: Re-exports positions, slices, contents and cells for use by other crates.

pub mod cell;
pub mod content;
pub mod error;
pub mod position;
pub mod slice;
pub mod value;

// Re-export commonly used types at the crate root
pub use cell::Cell;
pub use content::{Content, Schema, ValueType};
pub use error::{ModelError, Result};
pub use position::{validate_permutation, Coordinates, Dimension, Position, MAX_DIMENSIONS};
pub use slice::{Slice, SliceKind};
pub use value::{Value, DATE_FORMAT};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_creates_cells() {
        let cell = Cell::new(pos![1, "A"], Content::discrete(10));
        assert_eq!(cell.content.as_f64(), Some(10.0));
        assert_eq!(cell.position.arity(), 2);
    }

    #[test]
    fn it_splits_cells_by_slice() {
        let cell = Cell::new(pos![2, "B", "x"], Content::nominal("v"));
        let slice = Slice::along(Dimension::Third);
        let (selected, remainder) = slice.split(&cell.position);
        assert_eq!(selected, pos![2, "B"]);
        assert_eq!(remainder, pos!["x"]);
        assert_eq!(slice.reconstruct(&selected, &remainder), Ok(cell.position));
    }
}
