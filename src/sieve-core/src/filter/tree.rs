//! The slice filter tree.

use std::collections::BTreeSet;

use common_error::SieveResult;
use serde::{Deserialize, Serialize};

use crate::types::{Slice, Value};

use super::ValueMatcher;

/// A filter on a single named column.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnFilter {
    /// The column this filter applies to.
    pub column: String,
    /// The predicate over the column's value.
    pub matcher: ValueMatcher,
    /// Treat an absent column as carrying the null value. When false, a
    /// slice without the column never matches, whatever the matcher.
    pub null_if_absent: bool,
}

impl ColumnFilter {
    /// Create a column filter with null-as-absent semantics.
    ///
    /// These are the semantics under which leaf negation is exact
    /// (`!matches` of the matcher equals `matches` of the negated
    /// matcher for every slice), which the optimizer relies on when it
    /// pushes NOT down to the leaves.
    pub fn new(column: impl Into<String>, matcher: ValueMatcher) -> Self {
        Self {
            column: column.into(),
            matcher,
            null_if_absent: true,
        }
    }

    /// Override the absent-column behaviour.
    pub fn with_null_if_absent(mut self, null_if_absent: bool) -> Self {
        self.null_if_absent = null_if_absent;
        self
    }

    /// Test a slice against this filter.
    pub fn matches(&self, slice: &Slice) -> bool {
        match slice.get(&self.column) {
            Some(value) => self.matcher.matches(value),
            None if self.null_if_absent => self.matcher.matches(&Value::Null),
            None => false,
        }
    }
}

impl std::fmt::Display for ColumnFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.matcher.fmt_with_column(&self.column, f)
    }
}

/// A boolean predicate tree over named columns.
///
/// The variant set is closed. AND/OR operand sets are `BTreeSet`s and are
/// never empty or singleton: the [`and_of`](Self::and_of) and
/// [`or_of`](Self::or_of) constructors collapse degenerate cases and
/// flatten same-kind nesting, so structurally-equal filters always hash
/// identically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SliceFilter {
    /// Matches every slice.
    MatchAll,
    /// Matches no slice.
    MatchNone,
    /// A predicate on a single column.
    Column(ColumnFilter),
    /// Conjunction of at least two operands.
    And(BTreeSet<SliceFilter>),
    /// Disjunction of at least two operands.
    Or(BTreeSet<SliceFilter>),
    /// Negation of a sub-filter.
    Not(Box<SliceFilter>),
}

impl SliceFilter {
    /// Conjunction. Collapses at construction: a `MatchNone` operand kills
    /// the AND, `MatchAll` operands are dropped, nested ANDs are flattened
    /// one level, an empty set becomes `MatchAll` and a singleton the lone
    /// operand.
    pub fn and_of(operands: impl IntoIterator<Item = SliceFilter>) -> SliceFilter {
        let mut set = BTreeSet::new();
        for op in operands {
            match op {
                Self::MatchNone => return Self::MatchNone,
                Self::MatchAll => {}
                Self::And(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        match set.len() {
            0 => Self::MatchAll,
            1 => set.into_iter().next().unwrap(),
            _ => Self::And(set),
        }
    }

    /// Disjunction, symmetric to [`and_of`](Self::and_of).
    pub fn or_of(operands: impl IntoIterator<Item = SliceFilter>) -> SliceFilter {
        let mut set = BTreeSet::new();
        for op in operands {
            match op {
                Self::MatchAll => return Self::MatchAll,
                Self::MatchNone => {}
                Self::Or(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        match set.len() {
            0 => Self::MatchNone,
            1 => set.into_iter().next().unwrap(),
            _ => Self::Or(set),
        }
    }

    /// Column filter with null-as-absent semantics. A `MatchNone` matcher
    /// collapses to `MatchNone`, a `MatchAll` matcher to `MatchAll`.
    pub fn column(column: impl Into<String>, matcher: ValueMatcher) -> SliceFilter {
        Self::column_filter(ColumnFilter::new(column, matcher))
    }

    /// Wrap a [`ColumnFilter`], collapsing degenerate matchers.
    pub fn column_filter(filter: ColumnFilter) -> SliceFilter {
        match &filter.matcher {
            ValueMatcher::MatchNone => Self::MatchNone,
            ValueMatcher::MatchAll if filter.null_if_absent => Self::MatchAll,
            _ => Self::Column(filter),
        }
    }

    /// Shorthand for a column equality filter.
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> SliceFilter {
        Self::column(column, ValueMatcher::equals(value))
    }

    /// Shorthand for a column inequality filter.
    pub fn not_equals(column: impl Into<String>, value: impl Into<Value>) -> SliceFilter {
        Self::column(column, ValueMatcher::equals(value).negate())
    }

    /// Structural negation helper. This is *not* the optimizer's `not`:
    /// it only collapses the trivial cases and otherwise wraps.
    pub fn negated(self) -> SliceFilter {
        match self {
            Self::MatchAll => Self::MatchNone,
            Self::MatchNone => Self::MatchAll,
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Test a slice against this filter.
    pub fn matches(&self, slice: &Slice) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Column(cf) => cf.matches(slice),
            Self::And(ops) => ops.iter().all(|op| op.matches(slice)),
            Self::Or(ops) => ops.iter().any(|op| op.matches(slice)),
            Self::Not(inner) => !inner.matches(slice),
        }
    }

    /// All column names referenced by this filter.
    pub fn referenced_columns(&self) -> BTreeSet<&str> {
        let mut columns = BTreeSet::new();
        self.collect_columns(&mut columns);
        columns
    }

    fn collect_columns<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Self::MatchAll | Self::MatchNone => {}
            Self::Column(cf) => {
                out.insert(cf.column.as_str());
            }
            Self::And(ops) | Self::Or(ops) => {
                for op in ops {
                    op.collect_columns(out);
                }
            }
            Self::Not(inner) => inner.collect_columns(out),
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> SieveResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a JSON string. The result may violate the
    /// construction invariants; run [`validate_filter`] before trusting it.
    ///
    /// [`validate_filter`]: super::validate_filter
    pub fn from_json(json: &str) -> SieveResult<SliceFilter> {
        Ok(serde_json::from_str(json)?)
    }
}

impl std::fmt::Display for SliceFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MatchAll => write!(f, "*"),
            Self::MatchNone => write!(f, "!*"),
            Self::Column(cf) => write!(f, "{cf}"),
            Self::And(ops) => {
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, "&")?;
                    }
                    // Parenthesize an OR nested in an AND.
                    if matches!(op, Self::Or(_)) {
                        write!(f, "({op})")?;
                    } else {
                        write!(f, "{op}")?;
                    }
                }
                Ok(())
            }
            Self::Or(ops) => {
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    // Parenthesize an AND nested in an OR.
                    if matches!(op, Self::And(_)) {
                        write!(f, "({op})")?;
                    } else {
                        write!(f, "{op}")?;
                    }
                }
                Ok(())
            }
            Self::Not(inner) => write!(f, "!({inner})"),
        }
    }
}
