//! FILENAME: core/matrix-engine/src/side.rs
//! Side values - read-only external data threaded into operator callbacks.
//!
//! Every operation that calls user operators takes a `&SideValue`. Passing
//! `&SideValue::Absent` is the plain form of the call; there are no separate
//! "with value" variants.

use model::{Content, Position};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SideValue {
    #[default]
    Absent,
    /// A single broadcast scalar.
    Scalar(Content),
    /// A lookup table keyed by position.
    Map(FxHashMap<Position, Content>),
}

impl SideValue {
    pub fn scalar(&self) -> Option<&Content> {
        match self {
            SideValue::Scalar(content) => Some(content),
            _ => None,
        }
    }

    /// Looks `key` up in a map side value.
    pub fn lookup(&self, key: &Position) -> Option<&Content> {
        match self {
            SideValue::Map(map) => map.get(key),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SideValue::Absent)
    }
}

impl FromIterator<(Position, Content)> for SideValue {
    fn from_iter<T: IntoIterator<Item = (Position, Content)>>(iter: T) -> Self {
        SideValue::Map(iter.into_iter().collect())
    }
}
