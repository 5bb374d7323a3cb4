//! FILENAME: core/matrix-engine/src/pairwise.rs
//! Pairwise engine - applies a binary operator to pairs of cells whose
//! selected sub-positions are related by a comparer.
//!
//! Algorithm:
//! 1. Key both sides by selected sub-position; collect the distinct keys
//! 2. Enumerate the key pairs `(l, r)` the comparer keeps
//! 3. Route every left cell to each pair it heads and every right cell to
//!    each pair it closes, then equi-join on the pair through the tuner
//! 4. Apply the operator to every joined (left, right) couple
//!
//! Steps 1-3 are the only part the tuner influences; the set of couples that
//! reaches step 4 is the same for every tuner. `InMemory` skips the routing
//! copies of step 3: it broadcasts the right side grouped by key and looks
//! each left cell's partners up in it.

use std::cmp::Ordering;

use log::debug;
use model::{Cell, Content, Position, Slice};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::join::inner_join;
use crate::matrix::Matrix;
use crate::operators::Operators;
use crate::side::SideValue;
use crate::tuner::Tuner;

// ============================================================================
// COMPARER
// ============================================================================

/// Which ordered pairs of selected sub-positions a pairwise call considers.
/// Positions are ordered by their coordinates' canonical strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparer {
    /// Every ordered pair, self-pairs included.
    All,
    /// Self-pairs only.
    Diagonal,
    /// `left < right`.
    Upper,
    /// `left > right`.
    Lower,
    /// `left <= right`.
    UpperDiagonal,
    /// `left >= right`.
    LowerDiagonal,
}

impl Comparer {
    pub fn keep(&self, left: &Position, right: &Position) -> bool {
        let ordering = left.cmp(right);
        match self {
            Comparer::All => true,
            Comparer::Diagonal => ordering == Ordering::Equal,
            Comparer::Upper => ordering == Ordering::Less,
            Comparer::Lower => ordering == Ordering::Greater,
            Comparer::UpperDiagonal => ordering != Ordering::Greater,
            Comparer::LowerDiagonal => ordering != Ordering::Less,
        }
    }
}

// ============================================================================
// OPERATORS
// ============================================================================

/// A binary operator over a (left, right) couple. `left` and `right` carry
/// their selected sub-positions; the remainders are passed alongside. An
/// operator may reject a couple by returning no cells.
pub trait PairwiseOperator: Send + Sync {
    fn compute(
        &self,
        left: &Cell,
        left_remainder: &Position,
        right: &Cell,
        right_remainder: &Position,
        side: &SideValue,
    ) -> Vec<Cell>;

    fn boxed(self) -> Box<dyn PairwiseOperator>
    where
        Self: Sized + 'static,
    {
        Box::new(self)
    }
}

/// Several operators over the same couples; outputs are concatenated.
pub struct PairwiseOperators {
    members: Vec<Box<dyn PairwiseOperator>>,
}

impl PairwiseOperators {
    pub fn new(members: Vec<Box<dyn PairwiseOperator>>) -> Self {
        PairwiseOperators { members }
    }
}

impl PairwiseOperator for PairwiseOperators {
    fn compute(
        &self,
        left: &Cell,
        left_remainder: &Position,
        right: &Cell,
        right_remainder: &Position,
        side: &SideValue,
    ) -> Vec<Cell> {
        self.members
            .iter()
            .flat_map(|op| op.compute(left, left_remainder, right, right_remainder, side))
            .collect()
    }
}

fn compose(mut operators: Vec<Box<dyn PairwiseOperator>>) -> Box<dyn PairwiseOperator> {
    if operators.len() == 1 {
        operators.remove(0)
    } else {
        Box::new(PairwiseOperators::new(operators))
    }
}

/// Expands a `{left}`/`{right}` name pattern with the rendered selected
/// sub-positions.
fn expand_pattern(pattern: &str, left: &str, right: &str) -> String {
    pattern.replace("{left}", left).replace("{right}", right)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArithmeticOp {
    Plus,
    Minus,
    Times,
    Divide,
}

impl ArithmeticOp {
    fn default_pattern(self) -> &'static str {
        match self {
            ArithmeticOp::Plus => "{left}+{right}",
            ArithmeticOp::Minus => "{left}-{right}",
            ArithmeticOp::Times => "{left}*{right}",
            ArithmeticOp::Divide => "{left}/{right}",
        }
    }

    fn apply(self, left: f64, right: f64) -> Option<f64> {
        match self {
            ArithmeticOp::Plus => Some(left + right),
            ArithmeticOp::Minus => Some(left - right),
            ArithmeticOp::Times => Some(left * right),
            ArithmeticOp::Divide if right == 0.0 => None,
            ArithmeticOp::Divide => Some(left / right),
        }
    }
}

/// Arithmetic between numeric cells with equal remainders. The result is
/// placed at `remainder` prefixed with the expanded name pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arithmetic {
    op: ArithmeticOp,
    pattern: String,
    separator: String,
}

impl Arithmetic {
    pub fn new(op: ArithmeticOp) -> Self {
        Arithmetic {
            op,
            pattern: op.default_pattern().to_string(),
            separator: ".".to_string(),
        }
    }

    pub fn plus() -> Self {
        Self::new(ArithmeticOp::Plus)
    }

    pub fn minus() -> Self {
        Self::new(ArithmeticOp::Minus)
    }

    pub fn times() -> Self {
        Self::new(ArithmeticOp::Times)
    }

    pub fn divide() -> Self {
        Self::new(ArithmeticOp::Divide)
    }

    /// Output name pattern; `{left}` and `{right}` are substituted.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Separator between the coordinates of a multi-dimensional selection.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl PairwiseOperator for Arithmetic {
    fn compute(
        &self,
        left: &Cell,
        left_remainder: &Position,
        right: &Cell,
        right_remainder: &Position,
        _side: &SideValue,
    ) -> Vec<Cell> {
        if left_remainder != right_remainder {
            return Vec::new();
        }
        let (Some(l), Some(r)) = (left.content.as_f64(), right.content.as_f64()) else {
            return Vec::new();
        };
        let Some(result) = self.op.apply(l, r) else {
            return Vec::new();
        };
        let name = expand_pattern(
            &self.pattern,
            &left.position.to_short_string(&self.separator),
            &right.position.to_short_string(&self.separator),
        );
        vec![Cell::new(left_remainder.prepend(name), Content::continuous(result))]
    }
}

/// Joins the rendered contents of two cells with equal remainders into a
/// nominal cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concatenate {
    name: String,
    value: String,
    separator: String,
}

impl Concatenate {
    /// `name` names the output position, `value` renders the output content;
    /// both take `{left}`/`{right}` placeholders.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Concatenate {
            name: name.into(),
            value: value.into(),
            separator: ".".to_string(),
        }
    }
}

impl Default for Concatenate {
    fn default() -> Self {
        Concatenate::new("{left},{right}", "{left},{right}")
    }
}

impl PairwiseOperator for Concatenate {
    fn compute(
        &self,
        left: &Cell,
        left_remainder: &Position,
        right: &Cell,
        right_remainder: &Position,
        _side: &SideValue,
    ) -> Vec<Cell> {
        if left_remainder != right_remainder {
            return Vec::new();
        }
        let name = expand_pattern(
            &self.name,
            &left.position.to_short_string(&self.separator),
            &right.position.to_short_string(&self.separator),
        );
        let value = expand_pattern(&self.value, &left.content.to_string(), &right.content.to_string());
        vec![Cell::new(left_remainder.prepend(name), Content::nominal(value))]
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// A cell reduced to its selected sub-position, with the remainder alongside.
type Keyed = (Position, (Position, Cell));

fn key_cells(matrix: &Matrix, slice: &Slice) -> Vec<Keyed> {
    matrix
        .cells()
        .par_iter()
        .map(|cell| {
            let (selected, remainder) = slice.split(&cell.position);
            let subcell = Cell::new(selected.clone(), cell.content.clone());
            (selected, (remainder, subcell))
        })
        .collect()
}

fn distinct_keys(keyed: &[Keyed]) -> Vec<Position> {
    let keys: FxHashSet<&Position> = keyed.iter().map(|(key, _)| key).collect();
    let mut keys: Vec<Position> = keys.into_iter().cloned().collect();
    keys.sort();
    keys
}

/// Members of one side grouped by selected sub-position.
fn group_by_key(keyed: Vec<Keyed>) -> FxHashMap<Position, Vec<(Position, Cell)>> {
    let mut table: FxHashMap<Position, Vec<(Position, Cell)>> = FxHashMap::default();
    for (key, member) in keyed {
        table.entry(key).or_default().push(member);
    }
    table
}

/// Copies every member once per kept partner key, keyed by the ordered pair.
fn route(
    keyed: Vec<Keyed>,
    partners: &FxHashMap<Position, Vec<Position>>,
    heads: bool,
) -> Vec<((Position, Position), (Position, Cell))> {
    keyed
        .into_par_iter()
        .flat_map_iter(|(key, member)| {
            partners
                .get(&key)
                .into_iter()
                .flatten()
                .map(|partner| {
                    let pair = if heads {
                        (key.clone(), partner.clone())
                    } else {
                        (partner.clone(), key.clone())
                    };
                    (pair, member.clone())
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

fn pair_cells(
    left: Vec<Keyed>,
    right: Vec<Keyed>,
    comparer: Comparer,
    operator: &dyn PairwiseOperator,
    side: &SideValue,
    tuner: Tuner,
    matrix: &Matrix,
) -> Result<Matrix> {
    let left_keys = distinct_keys(&left);
    let right_keys = distinct_keys(&right);

    let mut heads: FxHashMap<Position, Vec<Position>> = FxHashMap::default();
    for l in &left_keys {
        let partners: Vec<Position> = right_keys.iter().filter(|r| comparer.keep(l, r)).cloned().collect();
        if !partners.is_empty() {
            heads.insert(l.clone(), partners);
        }
    }
    debug!(
        "pairwise {:?}: {} x {} keys, {} pairs kept",
        comparer,
        left_keys.len(),
        right_keys.len(),
        heads.values().map(Vec::len).sum::<usize>()
    );

    let cells: Vec<Cell> = match tuner {
        // The right side is broadcast once, grouped by key; left cells look
        // their partners up without being copied.
        Tuner::InMemory => {
            let table = group_by_key(right);
            left.par_iter()
                .flat_map_iter(|(key, (left_remainder, left_cell))| {
                    heads
                        .get(key)
                        .into_iter()
                        .flatten()
                        .filter_map(|partner| table.get(partner))
                        .flatten()
                        .flat_map(|(right_remainder, right_cell)| {
                            operator.compute(left_cell, left_remainder, right_cell, right_remainder, side)
                        })
                        .collect::<Vec<Cell>>()
                })
                .collect()
        }
        Tuner::Reducers(_) | Tuner::Unbalanced(_) => {
            let mut tails: FxHashMap<Position, Vec<Position>> = FxHashMap::default();
            for (l, partners) in &heads {
                for r in partners {
                    tails.entry(r.clone()).or_default().push(l.clone());
                }
            }
            inner_join(
                route(left, &heads, true),
                route(right, &tails, false),
                tuner,
                matrix.config(),
                |_, (left_remainder, left), (right_remainder, right)| {
                    operator.compute(left, left_remainder, right, right_remainder, side)
                },
            )
        }
    };
    matrix.derived(cells)
}

impl Matrix {
    /// Applies `operators` to every couple of this matrix's cells whose
    /// selected sub-positions the comparer keeps.
    pub fn pairwise(
        &self,
        slice: &Slice,
        comparer: Comparer,
        operators: impl Into<Operators<Box<dyn PairwiseOperator>>>,
        side: &SideValue,
        tuner: Tuner,
    ) -> Result<Matrix> {
        self.check_slice(slice)?;
        let operator = compose(operators.into().into_vec());
        let keyed = key_cells(self, slice);
        pair_cells(keyed.clone(), keyed, comparer, operator.as_ref(), side, tuner, self)
    }

    /// Like `pairwise`, with right-hand cells drawn from `that`. Only the
    /// selected sub-positions of the two matrices need to line up.
    pub fn pairwise_between(
        &self,
        slice: &Slice,
        comparer: Comparer,
        that: &Matrix,
        operators: impl Into<Operators<Box<dyn PairwiseOperator>>>,
        side: &SideValue,
        tuner: Tuner,
    ) -> Result<Matrix> {
        self.check_slice(slice)?;
        that.check_slice(slice)?;
        let operator = compose(operators.into().into_vec());
        pair_cells(
            key_cells(self, slice),
            key_cells(that, slice),
            comparer,
            operator.as_ref(),
            side,
            tuner,
            self,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{pos, Dimension};

    fn create_test_matrix() -> Matrix {
        Matrix::new(vec![
            Cell::new(pos!["a", "x"], Content::discrete(1)),
            Cell::new(pos!["b", "x"], Content::discrete(2)),
            Cell::new(pos!["c", "x"], Content::discrete(4)),
            Cell::new(pos!["c", "y"], Content::discrete(8)),
        ])
        .unwrap()
    }

    fn sorted(matrix: Matrix) -> Vec<Cell> {
        let mut cells = matrix.into_cells();
        cells.sort();
        cells
    }

    #[test]
    fn test_comparers() {
        let (a, b) = (pos!["a"], pos!["b"]);
        assert!(Comparer::All.keep(&a, &a));
        assert!(Comparer::Diagonal.keep(&a, &a) && !Comparer::Diagonal.keep(&a, &b));
        assert!(Comparer::Upper.keep(&a, &b) && !Comparer::Upper.keep(&b, &a) && !Comparer::Upper.keep(&a, &a));
        assert!(Comparer::Lower.keep(&b, &a) && !Comparer::Lower.keep(&a, &b));
        assert!(Comparer::UpperDiagonal.keep(&a, &a) && Comparer::UpperDiagonal.keep(&a, &b));
        assert!(Comparer::LowerDiagonal.keep(&a, &a) && !Comparer::LowerDiagonal.keep(&a, &b));
    }

    #[test]
    fn test_upper_minus() {
        let out = create_test_matrix()
            .pairwise(
                &Slice::over(Dimension::First),
                Comparer::Upper,
                Arithmetic::minus().boxed(),
                &SideValue::Absent,
                Tuner::reducers(4).unwrap(),
            )
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos!["a-b", "x"], Content::continuous(-1.0)),
                Cell::new(pos!["a-c", "x"], Content::continuous(-3.0)),
                Cell::new(pos!["b-c", "x"], Content::continuous(-2.0)),
            ]
        );
    }

    #[test]
    fn test_divide_skips_zero() {
        let m = Matrix::new(vec![
            Cell::new(pos!["a", "x"], Content::discrete(1)),
            Cell::new(pos!["b", "x"], Content::discrete(0)),
        ])
        .unwrap();
        let out = m
            .pairwise(&Slice::over(Dimension::First), Comparer::All, Arithmetic::divide().boxed(), &SideValue::Absent, Tuner::in_memory())
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos!["a/a", "x"], Content::continuous(1.0)),
                Cell::new(pos!["b/a", "x"], Content::continuous(0.0)),
            ]
        );
    }

    #[test]
    fn test_pairwise_between_with_many_operators() {
        let that = Matrix::new(vec![Cell::new(pos!["c", "x"], Content::discrete(10))]).unwrap();
        let operators = vec![
            Arithmetic::plus().boxed(),
            Concatenate::new("{left}|{right}", "{left}&{right}").boxed(),
        ];
        let out = create_test_matrix()
            .pairwise_between(
                &Slice::over(Dimension::First),
                Comparer::Diagonal,
                &that,
                operators,
                &SideValue::Absent,
                Tuner::unbalanced(3).unwrap(),
            )
            .unwrap();
        assert_eq!(
            sorted(out),
            vec![
                Cell::new(pos!["c+c", "x"], Content::continuous(14.0)),
                Cell::new(pos!["c|c", "x"], Content::nominal("4&10")),
            ]
        );
    }

    #[test]
    fn test_only_equal_remainders_are_combined() {
        let out = create_test_matrix()
            .pairwise(
                &Slice::along(Dimension::First),
                Comparer::Upper,
                Arithmetic::plus().boxed(),
                &SideValue::Absent,
                Tuner::in_memory(),
            )
            .unwrap();
        assert_eq!(sorted(out), vec![Cell::new(pos!["x+y", "c"], Content::continuous(12.0))]);
    }

    /// `left * right * factor`, with `factor` read from a scalar side value.
    struct ScaledProduct;

    impl PairwiseOperator for ScaledProduct {
        fn compute(
            &self,
            left: &Cell,
            left_remainder: &Position,
            right: &Cell,
            right_remainder: &Position,
            side: &SideValue,
        ) -> Vec<Cell> {
            let factor = side.scalar().and_then(Content::as_f64);
            match (left.content.as_f64(), right.content.as_f64(), factor) {
                (Some(l), Some(r), Some(f)) if left_remainder == right_remainder => {
                    let name = format!("{}*{}", left.position.to_short_string("."), right.position.to_short_string("."));
                    vec![Cell::new(left_remainder.prepend(name), Content::continuous(l * r * f))]
                }
                _ => Vec::new(),
            }
        }
    }

    #[test]
    fn test_operator_reads_scalar_side_value() {
        let side = SideValue::Scalar(Content::discrete(10));
        for tuner in [Tuner::in_memory(), Tuner::reducers(2).unwrap(), Tuner::unbalanced(2).unwrap()] {
            let out = create_test_matrix()
                .pairwise(&Slice::over(Dimension::First), Comparer::Upper, ScaledProduct.boxed(), &side, tuner)
                .unwrap();
            assert_eq!(
                sorted(out),
                vec![
                    Cell::new(pos!["a*b", "x"], Content::continuous(20.0)),
                    Cell::new(pos!["a*c", "x"], Content::continuous(40.0)),
                    Cell::new(pos!["b*c", "x"], Content::continuous(80.0)),
                ]
            );
        }

        let absent = create_test_matrix()
            .pairwise(&Slice::over(Dimension::First), Comparer::Upper, ScaledProduct.boxed(), &SideValue::Absent, Tuner::in_memory())
            .unwrap();
        assert!(absent.is_empty());
    }

    #[test]
    fn test_broadcast_and_partitioned_layouts_agree() {
        let that = Matrix::new(vec![
            Cell::new(pos!["a", "x"], Content::discrete(3)),
            Cell::new(pos!["b", "x"], Content::discrete(5)),
            Cell::new(pos!["b", "y"], Content::discrete(7)),
            Cell::new(pos!["d", "y"], Content::discrete(9)),
        ])
        .unwrap();
        let run = |comparer: Comparer, tuner: Tuner| {
            sorted(
                create_test_matrix()
                    .pairwise_between(&Slice::over(Dimension::First), comparer, &that, Arithmetic::times().boxed(), &SideValue::Absent, tuner)
                    .unwrap(),
            )
        };
        for comparer in [Comparer::All, Comparer::Lower, Comparer::UpperDiagonal] {
            let expected = run(comparer, Tuner::in_memory());
            for tuner in [Tuner::reducers(1).unwrap(), Tuner::reducers(3).unwrap(), Tuner::unbalanced(4).unwrap()] {
                assert_eq!(run(comparer, tuner), expected, "{:?} under {:?}", comparer, tuner);
            }
        }
        // `c` pairs with `b` on the shared remainder `x` only.
        assert!(run(Comparer::Lower, Tuner::in_memory()).contains(&Cell::new(pos!["c*b", "x"], Content::continuous(20.0))));
    }
}
