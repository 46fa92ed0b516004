//! Property-based testing utilities for sieve-core.
//!
//! Strategies for generating arbitrary values, matchers and filter trees,
//! plus the structural properties the rest of the engine relies on.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::filter::{ColumnFilter, SliceFilter, ValueMatcher};
    use crate::types::{Slice, Value};

    // =========================================================================
    // Arbitrary Strategies
    // =========================================================================

    /// Strategy for generating arbitrary Value instances.
    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (0i64..8).prop_map(Value::Int64),
            "[a-c]{1,2}".prop_map(Value::String),
        ]
    }

    /// Strategy for generating arbitrary leaf matchers.
    fn arb_matcher() -> impl Strategy<Value = ValueMatcher> {
        let leaf = prop_oneof![
            arb_value().prop_map(ValueMatcher::equals),
            prop::collection::btree_set(arb_value(), 1..4)
                .prop_map(|set| ValueMatcher::in_set(set)),
            Just(ValueMatcher::Null),
            "[a-c%_]{1,4}".prop_map(ValueMatcher::Like),
        ];
        leaf.prop_flat_map(|m| {
            prop_oneof![Just(m.clone()), Just(m.negate())]
        })
    }

    /// Strategy for generating filter trees of bounded depth.
    fn arb_filter() -> impl Strategy<Value = SliceFilter> {
        let leaf = prop_oneof![
            Just(SliceFilter::MatchAll),
            Just(SliceFilter::MatchNone),
            ("[ab]", arb_matcher(), any::<bool>()).prop_map(|(c, m, null_if_absent)| {
                SliceFilter::column_filter(
                    ColumnFilter::new(c, m).with_null_if_absent(null_if_absent),
                )
            }),
        ];
        leaf.prop_recursive(3, 24, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 2..4).prop_map(SliceFilter::and_of),
                prop::collection::vec(inner.clone(), 2..4).prop_map(SliceFilter::or_of),
                inner.prop_map(SliceFilter::negated),
            ]
        })
    }

    /// Strategy for generating slices over the columns the filters use.
    fn arb_slice() -> impl Strategy<Value = Slice> {
        prop::collection::btree_map("[ab]", arb_value(), 0..3).prop_map(|columns| {
            let mut slice = Slice::new();
            for (column, value) in columns {
                slice.insert(column, value);
            }
            slice
        })
    }

    // =========================================================================
    // Property Tests
    // =========================================================================

    proptest! {
        /// Values roundtrip through JSON.
        #[test]
        fn value_serde_roundtrip(value in arb_value()) {
            let serialized = serde_json::to_string(&value).unwrap();
            let deserialized: Value = serde_json::from_str(&serialized).unwrap();
            prop_assert_eq!(value, deserialized);
        }

        /// Filter trees roundtrip through JSON.
        #[test]
        fn filter_serde_roundtrip(filter in arb_filter()) {
            let json = filter.to_json().unwrap();
            let back = SliceFilter::from_json(&json).unwrap();
            prop_assert_eq!(filter, back);
        }

        /// Trees built through the smart constructors validate cleanly.
        #[test]
        fn constructed_filter_validates(filter in arb_filter()) {
            prop_assert!(crate::filter::validate_filter(&filter).is_ok());
        }

        /// Matcher negation is a semantic involution.
        #[test]
        fn matcher_negate_involution(matcher in arb_matcher(), value in arb_value()) {
            let double = matcher.negate().negate();
            prop_assert_eq!(matcher.matches(&value), double.matches(&value));
        }

        /// Negation flips the match result for every value.
        #[test]
        fn matcher_negate_complements(matcher in arb_matcher(), value in arb_value()) {
            prop_assert_eq!(matcher.matches(&value), !matcher.negate().matches(&value));
        }

        /// Structural negation flips filter matching.
        #[test]
        fn filter_negated_complements(filter in arb_filter(), slice in arb_slice()) {
            let negated = filter.clone().negated();
            prop_assert_eq!(filter.matches(&slice), !negated.matches(&slice));
        }

        /// AND matches exactly when all operands match.
        #[test]
        fn and_of_is_conjunction(
            filters in prop::collection::vec(arb_filter(), 0..4),
            slice in arb_slice()
        ) {
            let expected = filters.iter().all(|f| f.matches(&slice));
            let conjunction = SliceFilter::and_of(filters);
            prop_assert_eq!(conjunction.matches(&slice), expected);
        }

        /// OR matches exactly when some operand matches.
        #[test]
        fn or_of_is_disjunction(
            filters in prop::collection::vec(arb_filter(), 0..4),
            slice in arb_slice()
        ) {
            let expected = filters.iter().any(|f| f.matches(&slice));
            let disjunction = SliceFilter::or_of(filters);
            prop_assert_eq!(disjunction.matches(&slice), expected);
        }
    }
}
