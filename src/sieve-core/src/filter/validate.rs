//! Structural validation for filter trees.
//!
//! Filters built through the smart constructors always satisfy the
//! structural invariants; trees deserialized from an external
//! representation may not. This pass rejects them before they reach the
//! optimizer.

use common_error::{ensure, SieveResult};

use super::{SliceFilter, ValueMatcher};

/// Validate the structural invariants of a filter tree:
///
/// - AND/OR operand sets carry at least two operands,
/// - column names are non-empty,
/// - `In` and `AnyOf` matcher sets are non-empty.
pub fn validate_filter(filter: &SliceFilter) -> SieveResult<()> {
    match filter {
        SliceFilter::MatchAll | SliceFilter::MatchNone => Ok(()),
        SliceFilter::Column(cf) => {
            ensure!(
                !cf.column.is_empty(),
                UnsupportedFilter: "column filter with empty column name"
            );
            validate_matcher(&cf.matcher)
        }
        SliceFilter::And(ops) | SliceFilter::Or(ops) => {
            ensure!(
                ops.len() >= 2,
                UnsupportedFilter: "AND/OR node with {} operand(s); operand sets must hold at least two",
                ops.len()
            );
            for op in ops {
                validate_filter(op)?;
            }
            Ok(())
        }
        SliceFilter::Not(inner) => validate_filter(inner),
    }
}

fn validate_matcher(matcher: &ValueMatcher) -> SieveResult<()> {
    match matcher {
        ValueMatcher::In(set) => {
            ensure!(!set.is_empty(), UnsupportedFilter: "In matcher with empty value set");
            Ok(())
        }
        ValueMatcher::AnyOf(set) => {
            ensure!(!set.is_empty(), UnsupportedFilter: "AnyOf matcher with empty set");
            for m in set {
                validate_matcher(m)?;
            }
            Ok(())
        }
        ValueMatcher::Not(inner) => validate_matcher(inner),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ColumnFilter;
    use std::collections::BTreeSet;

    #[test]
    fn test_valid_tree_passes() {
        let filter = SliceFilter::and_of([
            SliceFilter::equals("a", "a1"),
            SliceFilter::not_equals("b", 2i64),
        ]);
        assert!(validate_filter(&filter).is_ok());
    }

    #[test]
    fn test_singleton_and_rejected() {
        // Bypass the smart constructors, as a hostile JSON payload would.
        let mut ops = BTreeSet::new();
        ops.insert(SliceFilter::equals("a", "a1"));
        let filter = SliceFilter::And(ops);
        assert!(validate_filter(&filter).is_err());
    }

    #[test]
    fn test_empty_column_rejected() {
        let filter = SliceFilter::Column(ColumnFilter::new("", ValueMatcher::equals("x")));
        assert!(validate_filter(&filter).is_err());
    }

    #[test]
    fn test_empty_in_set_rejected() {
        let filter =
            SliceFilter::Column(ColumnFilter::new("a", ValueMatcher::In(BTreeSet::new())));
        assert!(validate_filter(&filter).is_err());
    }
}
