//! Implication ordering and contextual residuals over filter trees.
//!
//! Everything here is *sound but incomplete*: `is_stricter_than` never
//! answers `true` unless every slice matching the first filter also
//! matches the second, and answers `false` whenever it cannot decide.
//! `strip_where` honors the contract
//! `and(where, strip_where(where, f)) ≡ and(where, f)`.

use std::collections::BTreeSet;

use sieve_core::{ColumnFilter, SliceFilter, Value, ValueMatcher};

/// Operand set of an AND node, or the filter itself as a singleton.
pub fn split_and(filter: &SliceFilter) -> BTreeSet<SliceFilter> {
    match filter {
        SliceFilter::And(ops) => ops.clone(),
        other => BTreeSet::from([other.clone()]),
    }
}

/// Branch set of an OR node, or the filter itself as a singleton.
///
/// Deliberately does *not* flatten `In` matchers into explicit OR
/// branches: `In(c, {a, b})` and `Eq(c, a) OR Eq(c, b)` stay distinct for
/// the generic redundancy passes.
pub fn split_or(filter: &SliceFilter) -> BTreeSet<SliceFilter> {
    match filter {
        SliceFilter::Or(ops) => ops.clone(),
        other => BTreeSet::from([other.clone()]),
    }
}

/// The exact, finite set of values a matcher accepts, when that set is
/// knowable. `Equals`/`In`/`Null` (and finite `AnyOf` unions) have finite
/// support; `Like` and negations do not.
fn matcher_support(matcher: &ValueMatcher) -> Option<BTreeSet<Value>> {
    match matcher {
        ValueMatcher::MatchNone => Some(BTreeSet::new()),
        ValueMatcher::Equals(v) | ValueMatcher::Same(v) => Some(BTreeSet::from([v.clone()])),
        ValueMatcher::In(set) => Some(set.clone()),
        ValueMatcher::Null => Some(BTreeSet::from([Value::Null])),
        ValueMatcher::AnyOf(set) => {
            let mut union = BTreeSet::new();
            for m in set {
                union.extend(matcher_support(m)?);
            }
            Some(union)
        }
        _ => None,
    }
}

/// The finite set of values a matcher *excludes*, for not-equals / not-in
/// matchers.
fn matcher_excluded(matcher: &ValueMatcher) -> Option<BTreeSet<Value>> {
    match matcher {
        ValueMatcher::Not(inner) => matcher_support(inner),
        _ => None,
    }
}

/// Sound implication test between matchers: every value accepted by `a`
/// is accepted by `b`. Exact when `a` has finite support.
pub fn matcher_implies(a: &ValueMatcher, b: &ValueMatcher) -> bool {
    if matches!(b, ValueMatcher::MatchAll) || matches!(a, ValueMatcher::MatchNone) || a == b {
        return true;
    }
    if let Some(support) = matcher_support(a) {
        return support.iter().all(|v| b.matches(v));
    }
    match (a, b) {
        (ValueMatcher::Not(x), ValueMatcher::Not(y)) => matcher_implies(y, x),
        (_, ValueMatcher::Not(x)) => matchers_disjoint(a, x),
        (ValueMatcher::AnyOf(set), _) => set.iter().all(|m| matcher_implies(m, b)),
        (_, ValueMatcher::AnyOf(set)) => set.iter().any(|m| matcher_implies(a, m)),
        _ => false,
    }
}

/// Sound disjointness test: no value is accepted by both matchers.
pub fn matchers_disjoint(a: &ValueMatcher, b: &ValueMatcher) -> bool {
    if matches!(a, ValueMatcher::MatchNone) || matches!(b, ValueMatcher::MatchNone) {
        return true;
    }
    if let Some(support) = matcher_support(a) {
        return support.iter().all(|v| !b.matches(v));
    }
    if let Some(support) = matcher_support(b) {
        return support.iter().all(|v| !a.matches(v));
    }
    match (a, b) {
        (ValueMatcher::Not(x), _) => matcher_implies(b, x),
        (_, ValueMatcher::Not(y)) => matcher_implies(a, y),
        (ValueMatcher::AnyOf(set), _) => set.iter().all(|m| matchers_disjoint(m, b)),
        (_, ValueMatcher::AnyOf(set)) => set.iter().all(|m| matchers_disjoint(a, m)),
        _ => false,
    }
}

/// Sound disjointness test between filters: no slice matches both.
pub fn filters_disjoint(a: &SliceFilter, b: &SliceFilter) -> bool {
    if matches!(a, SliceFilter::MatchNone) || matches!(b, SliceFilter::MatchNone) {
        return true;
    }
    match (a, b) {
        (SliceFilter::Column(ca), SliceFilter::Column(cb)) if ca.column == cb.column => {
            matchers_disjoint(&ca.matcher, &cb.matcher)
        }
        (SliceFilter::And(ops), _) => ops.iter().any(|op| filters_disjoint(op, b)),
        (_, SliceFilter::And(ops)) => ops.iter().any(|op| filters_disjoint(a, op)),
        (SliceFilter::Or(ops), _) => ops.iter().all(|op| filters_disjoint(op, b)),
        (_, SliceFilter::Or(ops)) => ops.iter().all(|op| filters_disjoint(a, op)),
        (SliceFilter::Not(x), _) => is_stricter_than(b, x),
        (_, SliceFilter::Not(y)) => is_stricter_than(a, y),
        _ => false,
    }
}

/// Sound implication ordering: `a` is stricter than `b` when every slice
/// matching `a` also matches `b`. Returns `false` when undecidable.
pub fn is_stricter_than(a: &SliceFilter, b: &SliceFilter) -> bool {
    if matches!(b, SliceFilter::MatchAll) || matches!(a, SliceFilter::MatchNone) || a == b {
        return true;
    }
    if matches!(a, SliceFilter::MatchAll) || matches!(b, SliceFilter::MatchNone) {
        return false;
    }
    // An OR is stricter than b only if every branch is.
    if let SliceFilter::Or(branches) = a {
        return branches.iter().all(|branch| is_stricter_than(branch, b));
    }
    // a is stricter than an OR if it is stricter than some branch.
    if let SliceFilter::Or(branches) = b {
        if branches.iter().any(|branch| is_stricter_than(a, branch)) {
            return true;
        }
    }
    // NOT is antitone.
    if let (SliceFilter::Not(na), SliceFilter::Not(nb)) = (a, b) {
        if is_stricter_than(nb, na) {
            return true;
        }
    }
    // a implies NOT x when a and x cannot both hold.
    if let SliceFilter::Not(x) = b {
        if filters_disjoint(a, x) {
            return true;
        }
    }
    if let (SliceFilter::Column(ca), SliceFilter::Column(cb)) = (a, b) {
        return ca.column == cb.column
            && ca.null_if_absent == cb.null_if_absent
            && matcher_implies(&ca.matcher, &cb.matcher);
    }
    // AND coverage: every operand of b must be implied by some operand of a.
    if matches!(a, SliceFilter::And(_)) || matches!(b, SliceFilter::And(_)) {
        let a_ops = split_and(a);
        let b_ops = split_and(b);
        return b_ops
            .iter()
            .all(|bo| a_ops.iter().any(|ao| is_stricter_than(ao, bo)));
    }
    false
}

/// `is_stricter_than` with the arguments swapped.
pub fn is_laxer_than(a: &SliceFilter, b: &SliceFilter) -> bool {
    is_stricter_than(b, a)
}

/// The residual of `f` once `where_` is assumed true.
///
/// Contract: `and(where_, strip_where(where_, f))` is equivalent to
/// `and(where_, f)`. Stripping distributes through AND operands and OR
/// branches, commutes with NOT (equivalence under an assumption is
/// preserved by negation), and narrows same-column value sets using the
/// assumption's column filters.
pub fn strip_where(where_: &SliceFilter, f: &SliceFilter) -> SliceFilter {
    if is_stricter_than(where_, f) {
        return SliceFilter::MatchAll;
    }
    if filters_disjoint(where_, f) {
        return SliceFilter::MatchNone;
    }
    match f {
        SliceFilter::And(ops) => {
            SliceFilter::and_of(ops.iter().map(|op| strip_where(where_, op)))
        }
        SliceFilter::Or(ops) => SliceFilter::or_of(ops.iter().map(|op| strip_where(where_, op))),
        SliceFilter::Not(inner) => {
            let stripped = strip_where(where_, inner);
            if stripped == **inner {
                f.clone()
            } else {
                stripped.negated()
            }
        }
        SliceFilter::Column(cf) => strip_column(where_, cf),
        SliceFilter::MatchAll | SliceFilter::MatchNone => f.clone(),
    }
}

/// Narrow a column filter under the assumption `where_`, using the
/// assumption's same-column filters.
fn strip_column(where_: &SliceFilter, cf: &ColumnFilter) -> SliceFilter {
    let mut current = cf.matcher.clone();
    for op in split_and(where_) {
        let SliceFilter::Column(wc) = op else {
            continue;
        };
        if wc.column != cf.column || wc.null_if_absent != cf.null_if_absent {
            continue;
        }
        if let Some(support) = matcher_support(&wc.matcher) {
            // The assumption pins the column's value into a finite set;
            // the residual only has to decide within it.
            let allowed: BTreeSet<Value> = support
                .iter()
                .filter(|v| current.matches(v))
                .cloned()
                .collect();
            if allowed.is_empty() {
                return SliceFilter::MatchNone;
            }
            if allowed.len() == support.len() {
                return SliceFilter::MatchAll;
            }
            // `in_set` cannot express a null member; leave the matcher
            // alone in that case.
            if !allowed.contains(&Value::Null) {
                current = ValueMatcher::in_set(allowed);
            }
        } else if let Some(excluded) = matcher_excluded(&wc.matcher) {
            if let Some(support) = matcher_support(&current) {
                let allowed: BTreeSet<Value> =
                    support.difference(&excluded).cloned().collect();
                if allowed.is_empty() {
                    return SliceFilter::MatchNone;
                }
                if allowed.len() < support.len() && !allowed.contains(&Value::Null) {
                    current = ValueMatcher::in_set(allowed);
                }
            }
        } else {
            if matcher_implies(&wc.matcher, &current) {
                return SliceFilter::MatchAll;
            }
            if matchers_disjoint(&wc.matcher, &current) {
                return SliceFilter::MatchNone;
            }
        }
    }
    if current == cf.matcher {
        SliceFilter::Column(cf.clone())
    } else {
        SliceFilter::column_filter(
            ColumnFilter::new(&cf.column, current).with_null_if_absent(cf.null_if_absent),
        )
    }
}
