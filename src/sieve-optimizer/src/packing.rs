//! Per-column packing of AND operands.
//!
//! Multiple column filters on one column combine into at most one value-set
//! filter plus any matchers that cannot be folded: Equals∩Equals,
//! Equals∩In and In∩In intersect, accumulated not-equals / not-in values
//! subtract from the allowed set, and the remaining matchers are tested
//! against the surviving values to shrink the set further. An empty
//! allowed set collapses the whole AND to `MatchNone`.

use std::collections::{BTreeMap, BTreeSet};

use sieve_core::{ColumnFilter, SliceFilter, Value, ValueMatcher};

/// Outcome of packing an operand set.
pub(crate) enum Packed {
    /// The packed operand set.
    Operands(BTreeSet<SliceFilter>),
    /// Some column's allowed set emptied; the whole AND is unsatisfiable.
    Unsatisfiable,
}

/// Pack same-column filters in an AND operand set.
pub(crate) fn pack_columns(operands: BTreeSet<SliceFilter>) -> Packed {
    let mut out: BTreeSet<SliceFilter> = BTreeSet::new();
    let mut groups: BTreeMap<(String, bool), Vec<ValueMatcher>> = BTreeMap::new();

    for op in operands {
        match op {
            SliceFilter::Column(cf) => {
                groups
                    .entry((cf.column, cf.null_if_absent))
                    .or_default()
                    .push(cf.matcher);
            }
            other => {
                out.insert(other);
            }
        }
    }

    for ((column, null_if_absent), matchers) in groups {
        match pack_group(matchers) {
            GroupResult::Unsatisfiable => return Packed::Unsatisfiable,
            GroupResult::Matchers(packed) => {
                for matcher in packed {
                    match SliceFilter::column_filter(
                        ColumnFilter::new(&column, matcher).with_null_if_absent(null_if_absent),
                    ) {
                        SliceFilter::MatchNone => return Packed::Unsatisfiable,
                        SliceFilter::MatchAll => {}
                        filter => {
                            out.insert(filter);
                        }
                    }
                }
            }
        }
    }

    Packed::Operands(out)
}

enum GroupResult {
    Matchers(Vec<ValueMatcher>),
    Unsatisfiable,
}

/// Combine the matchers of one column group.
fn pack_group(matchers: Vec<ValueMatcher>) -> GroupResult {
    // None = no positive value-set constraint seen yet.
    let mut allowed: Option<BTreeSet<Value>> = None;
    let mut excluded: BTreeSet<Value> = BTreeSet::new();
    let mut residual: Vec<ValueMatcher> = Vec::new();

    for matcher in matchers {
        match matcher {
            // Kept as residual: a strict leaf's MatchAll still asserts
            // column presence, and reassembly collapses the lax case.
            ValueMatcher::MatchAll => residual.push(ValueMatcher::MatchAll),
            ValueMatcher::MatchNone => return GroupResult::Unsatisfiable,
            ValueMatcher::Equals(v) | ValueMatcher::Same(v) if !v.is_null() => {
                intersect(&mut allowed, BTreeSet::from([v]));
            }
            ValueMatcher::In(set) => {
                intersect(&mut allowed, set);
            }
            ValueMatcher::Not(inner) => match *inner {
                ValueMatcher::Equals(v) => {
                    excluded.insert(v);
                }
                ValueMatcher::In(set) => {
                    excluded.extend(set);
                }
                other => residual.push(ValueMatcher::Not(Box::new(other))),
            },
            other => residual.push(other),
        }
    }

    match allowed {
        Some(mut set) => {
            // The surviving values decide everything: subtract the
            // exclusions, then let every leftover matcher veto values.
            set.retain(|v| !excluded.contains(v));
            set.retain(|v| residual.iter().all(|m| m.matches(v)));
            if set.is_empty() {
                return GroupResult::Unsatisfiable;
            }
            GroupResult::Matchers(vec![ValueMatcher::in_set(set)])
        }
        None => {
            let mut packed = Vec::new();
            if !excluded.is_empty() {
                packed.push(ValueMatcher::not_in(excluded));
            }
            packed.extend(residual);
            GroupResult::Matchers(packed)
        }
    }
}

fn intersect(allowed: &mut Option<BTreeSet<Value>>, set: BTreeSet<Value>) {
    match allowed {
        None => *allowed = Some(set),
        Some(current) => {
            current.retain(|v| set.contains(v));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(filters: impl IntoIterator<Item = SliceFilter>) -> Option<BTreeSet<SliceFilter>> {
        match pack_columns(filters.into_iter().collect()) {
            Packed::Operands(ops) => Some(ops),
            Packed::Unsatisfiable => None,
        }
    }

    #[test]
    fn test_equals_conflict_is_unsatisfiable() {
        let packed = pack([
            SliceFilter::equals("a", "a1"),
            SliceFilter::equals("a", "a2"),
        ]);
        assert!(packed.is_none());
    }

    #[test]
    fn test_equals_agreement_is_kept() {
        let packed = pack([
            SliceFilter::equals("a", "a1"),
            SliceFilter::equals("a", "a1"),
        ])
        .unwrap();
        assert_eq!(packed, BTreeSet::from([SliceFilter::equals("a", "a1")]));
    }

    #[test]
    fn test_in_sets_intersect() {
        let packed = pack([
            SliceFilter::column("c", ValueMatcher::in_set(["a", "b", "c"])),
            SliceFilter::column("c", ValueMatcher::in_set(["b", "c", "d"])),
        ])
        .unwrap();
        assert_eq!(
            packed,
            BTreeSet::from([SliceFilter::column("c", ValueMatcher::in_set(["b", "c"]))])
        );
    }

    #[test]
    fn test_not_in_subtracts() {
        let packed = pack([
            SliceFilter::column("c", ValueMatcher::in_set(["a", "b", "c"])),
            SliceFilter::column("c", ValueMatcher::not_in(["b"])),
        ])
        .unwrap();
        assert_eq!(
            packed,
            BTreeSet::from([SliceFilter::column("c", ValueMatcher::in_set(["a", "c"]))])
        );
    }

    #[test]
    fn test_residual_matcher_shrinks_set() {
        // LIKE 'a%' keeps only values starting with 'a'.
        let packed = pack([
            SliceFilter::column("c", ValueMatcher::in_set(["a1", "b1"])),
            SliceFilter::column("c", ValueMatcher::Like("a%".to_string())),
        ])
        .unwrap();
        assert_eq!(packed, BTreeSet::from([SliceFilter::equals("c", "a1")]));
    }

    #[test]
    fn test_unconstrained_exclusions_merge() {
        let packed = pack([
            SliceFilter::not_equals("c", "a"),
            SliceFilter::not_equals("c", "b"),
        ])
        .unwrap();
        assert_eq!(
            packed,
            BTreeSet::from([SliceFilter::column("c", ValueMatcher::not_in(["a", "b"]))])
        );
    }

    #[test]
    fn test_strict_match_all_survives_packing() {
        // "Column present", not "anything": must not be dropped.
        let present = SliceFilter::column_filter(
            ColumnFilter::new("c", ValueMatcher::MatchAll).with_null_if_absent(false),
        );
        let packed = pack([present.clone()]).unwrap();
        assert_eq!(packed, BTreeSet::from([present]));
    }

    #[test]
    fn test_different_columns_untouched() {
        let a = SliceFilter::equals("a", "a1");
        let b = SliceFilter::equals("b", "b1");
        let packed = pack([a.clone(), b.clone()]).unwrap();
        assert_eq!(packed, BTreeSet::from([a, b]));
    }
}
