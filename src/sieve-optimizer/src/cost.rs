//! Structural cost model for filter trees.
//!
//! The cost function decides which of several logically-equivalent
//! rewritings the optimizer keeps. It is purely structural: no statistics,
//! no external state. Downstream plan induction reasons most easily about
//! AND-shaped filters, so OR carries a flat penalty and NOT doubles the
//! cost of its operand; a bare not-equals / not-in leaf reads cheaper than
//! a general negation.

use sieve_core::{SliceFilter, ValueMatcher};

/// Cost of a single leaf matcher.
const LEAF_COST: u64 = 3;
/// Cost of a negated equals/in leaf ("not-in" reads cheaper than a bare
/// negation).
const NEGATED_LEAF_COST: u64 = 5;
/// Added cost of a general matcher negation.
const MATCHER_NOT_PENALTY: u64 = 7;
/// Flat penalty for an OR node.
const OR_PENALTY: u64 = 5;

/// Cost of a value matcher.
pub fn matcher_cost(matcher: &ValueMatcher) -> u64 {
    match matcher {
        ValueMatcher::MatchAll | ValueMatcher::MatchNone => 1,
        ValueMatcher::Equals(_)
        | ValueMatcher::In(_)
        | ValueMatcher::Like(_)
        | ValueMatcher::Null
        | ValueMatcher::Same(_) => LEAF_COST,
        ValueMatcher::Not(inner) => match inner.as_ref() {
            ValueMatcher::Equals(_) | ValueMatcher::In(_) => NEGATED_LEAF_COST,
            other => MATCHER_NOT_PENALTY + matcher_cost(other),
        },
        ValueMatcher::AnyOf(set) => OR_PENALTY + set.iter().map(matcher_cost).sum::<u64>(),
    }
}

/// Cost of a filter tree.
pub fn filter_cost(filter: &SliceFilter) -> u64 {
    match filter {
        SliceFilter::MatchAll | SliceFilter::MatchNone => 1,
        SliceFilter::Column(cf) => matcher_cost(&cf.matcher),
        SliceFilter::And(ops) => ops.iter().map(filter_cost).sum(),
        SliceFilter::Or(ops) => OR_PENALTY + ops.iter().map(filter_cost).sum::<u64>(),
        SliceFilter::Not(inner) => 2 * filter_cost(inner),
    }
}
