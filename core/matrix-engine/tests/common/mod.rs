//! FILENAME: tests/common/mod.rs
//! Fixtures shared by the matrix engine integration tests.

#![allow(dead_code)]

use matrix_engine::{Matrix, Tuner};
use model::{pos, Cell, Content};

/// One tuner of every kind, with small partition counts so that several
/// keys share a partition.
pub fn all_tuners() -> Vec<Tuner> {
    vec![
        Tuner::in_memory(),
        Tuner::reducers(1).unwrap(),
        Tuner::reducers(5).unwrap(),
        Tuner::unbalanced(1).unwrap(),
        Tuner::unbalanced(7).unwrap(),
    ]
}

/// Output cells in a canonical order, for multiset comparison.
pub fn sorted(matrix: Matrix) -> Vec<Cell> {
    let mut cells = matrix.into_cells();
    cells.sort();
    cells
}

/// Sales by (region, quarter).
pub struct SalesFixture;

impl SalesFixture {
    pub fn data() -> Vec<(&'static str, &'static str, i64)> {
        vec![
            ("North", "Q1", 120),
            ("North", "Q2", 150),
            ("North", "Q3", 90),
            ("North", "Q4", 200),
            ("South", "Q1", 80),
            ("South", "Q2", 60),
            ("South", "Q4", 110),
            ("East", "Q1", 300),
            ("East", "Q3", 250),
            ("West", "Q2", 40),
        ]
    }

    pub fn matrix() -> Matrix {
        let cells = Self::data()
            .into_iter()
            .map(|(region, quarter, sales)| Cell::new(pos![region, quarter], Content::discrete(sales)))
            .collect();
        Matrix::new(cells).unwrap()
    }
}
