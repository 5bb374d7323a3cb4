//! FILENAME: core/model/src/cell.rs
//! PURPOSE: Defines the atomic unit of a sparse matrix.
//! CONTEXT: A cell pairs a position with a schema-validated content. Cells are
//! immutable and cheap to clone for low-arity positions. The short-string form
//! is the line format handed to external streaming collaborators.

use serde::{Deserialize, Serialize};

use crate::content::{Content, Schema};
use crate::error::{ModelError, Result};
use crate::position::Position;
use crate::value::Value;

/// A (position, content) pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub position: Position,
    pub content: Content,
}

impl Cell {
    pub fn new(position: Position, content: Content) -> Self {
        Cell { position, content }
    }

    /// Renders the cell as `coordinates..{sep}schema{sep}value`.
    pub fn to_short_string(&self, separator: &str) -> String {
        let mut parts: Vec<String> = self
            .position
            .coordinates()
            .iter()
            .map(|c| c.canonical().into_owned())
            .collect();
        parts.push(self.content.schema().name().to_string());
        parts.push(self.content.to_string());
        parts.join(separator)
    }

    /// Parses a line produced by `to_short_string` for a cell of `arity`
    /// coordinates. Integral coordinates come back as longs, everything else
    /// as strings.
    pub fn parse_short_string(line: &str, separator: &str, arity: usize) -> Result<Cell> {
        let parts: Vec<&str> = line.splitn(arity + 2, separator).collect();
        if parts.len() != arity + 2 {
            return Err(ModelError::MalformedLine(line.to_string()));
        }
        let position: Position = parts[..arity].iter().map(|p| Value::infer(p)).collect();
        let schema: Schema = parts[arity].parse()?;
        let content = schema.parse(parts[arity + 1])?;
        Ok(Cell::new(position, content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos;

    #[test]
    fn test_short_string() {
        let cell = Cell::new(pos![1, "A"], Content::continuous(2.5));
        assert_eq!(cell.to_short_string("|"), "1|A|continuous|2.5");
    }

    #[test]
    fn test_parse_short_string() {
        let cell = Cell::new(pos![1, "A"], Content::discrete(7));
        let line = cell.to_short_string("\t");
        assert_eq!(Cell::parse_short_string(&line, "\t", 2), Ok(cell));
    }

    #[test]
    fn test_parse_keeps_separator_in_value() {
        let parsed = Cell::parse_short_string("x|nominal|a|b", "|", 1).unwrap();
        assert_eq!(parsed.content, Content::nominal("a|b"));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            Cell::parse_short_string("1|A", "|", 2),
            Err(ModelError::MalformedLine(_))
        ));
        assert!(matches!(
            Cell::parse_short_string("1|A|weird|3", "|", 2),
            Err(ModelError::UnknownSchema(_))
        ));
        assert!(Cell::parse_short_string("1|A|discrete|x", "|", 2).is_err());
    }
}
