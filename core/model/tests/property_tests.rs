//! Property-based tests for the position algebra and value ordering.

use proptest::prelude::*;

use model::{Dimension, Position, Slice, Value};

// ============================================================================
// Test Utilities
// ============================================================================

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[a-c]{0,2}".prop_map(Value::from),
        (-20i64..20).prop_map(Value::from),
        (-2.0f64..2.0).prop_map(Value::from),
    ]
}

fn position_strategy(max_arity: usize) -> impl Strategy<Value = Position> {
    prop::collection::vec(value_strategy(), 1..=max_arity).prop_map(|v: Vec<Value>| v.into_iter().collect::<Position>())
}

// ============================================================================
// Ordering
// ============================================================================

proptest! {
    /// Property: the order on values agrees with equality and is antisymmetric
    #[test]
    fn prop_value_order_is_total(a in value_strategy(), b in value_strategy()) {
        prop_assert_eq!(a.cmp(&b) == std::cmp::Ordering::Equal, a == b);
        prop_assert_eq!(a.cmp(&b), b.cmp(&a).reverse());
    }

    /// Property: values with different canonical strings order by those strings
    #[test]
    fn prop_canonical_string_orders_first(a in value_strategy(), b in value_strategy()) {
        if a.canonical() != b.canonical() {
            prop_assert_eq!(a.cmp(&b), a.canonical().cmp(&b.canonical()));
        }
    }
}

// ============================================================================
// Position algebra
// ============================================================================

proptest! {
    /// Property: multi-dimension slices partition without loss
    #[test]
    fn prop_multi_dimension_slice_partition(position in position_strategy(6), mask in 1u8..64, over in any::<bool>()) {
        let dimensions: Vec<Dimension> = (0..position.arity())
            .filter(|i| mask & (1 << i) != 0)
            .filter_map(Dimension::from_index)
            .collect();
        prop_assume!(!dimensions.is_empty());
        let slice = if over {
            Slice::over_dimensions(&dimensions).unwrap()
        } else {
            Slice::along_dimensions(&dimensions).unwrap()
        };
        let (selected, remainder) = slice.split(&position);
        prop_assert_eq!(slice.reconstruct(&selected, &remainder).unwrap(), position);
    }

    /// Property: permuting by an order and then by its inverse is the identity
    #[test]
    fn prop_permute_inverse(position in position_strategy(5), rotation in 0usize..5) {
        let arity = position.arity();
        let order: Vec<Dimension> = (0..arity)
            .filter_map(|i| Dimension::from_index((i + rotation) % arity))
            .collect();
        let mut inverse = vec![Dimension::First; arity];
        for (i, d) in order.iter().enumerate() {
            inverse[d.index()] = Dimension::from_index(i).unwrap();
        }
        let permuted = position.permute(&order).unwrap();
        prop_assert_eq!(permuted.permute(&inverse).unwrap(), position);
    }

    /// Property: melt lowers arity by one and keeps the other coordinates
    #[test]
    fn prop_melt_lowers_arity(position in position_strategy(4)) {
        prop_assume!(position.arity() >= 2);
        let melted = position.melt(Dimension::Second, Dimension::First, ":").unwrap();
        prop_assert_eq!(melted.arity(), position.arity() - 1);
        prop_assert_eq!(&melted.coordinates()[1..], &position.coordinates()[2..]);
    }
}
