//! FILENAME: core/matrix-engine/src/operators.rs
//! One-or-many operator arguments.
//!
//! Operations accept either a single operator or a list of them. Both forms
//! are normalized into a vector before dispatch.

/// A single operator or a list of operators of one family.
pub enum Operators<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> Operators<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Operators::One(op) => vec![op],
            Operators::Many(ops) => ops,
        }
    }
}

impl<T> From<T> for Operators<T> {
    fn from(op: T) -> Self {
        Operators::One(op)
    }
}

impl<T> From<Vec<T>> for Operators<T> {
    fn from(ops: Vec<T>) -> Self {
        Operators::Many(ops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(Operators::<i32>::from(1).into_vec(), vec![1]);
        assert_eq!(Operators::<i32>::from(vec![1, 2]).into_vec(), vec![1, 2]);
        assert!(Operators::<u8>::Many(Vec::new()).into_vec().is_empty());
    }
}
