//! Per-column value matchers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// A predicate over a single column's value.
///
/// The variant set is closed: the optimizer reasons about matchers only
/// through [`matches`](Self::matches), [`negate`](Self::negate) and
/// structural equality, never about their internals.
///
/// Structural equality doubles as the hash identity, so matchers keep
/// their operand sets in `BTreeSet`s and are normalized at construction
/// (see [`in_set`](Self::in_set), [`any_of`](Self::any_of)).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ValueMatcher {
    /// Matches every value.
    MatchAll,
    /// Matches no value.
    MatchNone,
    /// Matches a single non-null value.
    Equals(Value),
    /// Matches any non-null value in the set.
    In(BTreeSet<Value>),
    /// SQL LIKE pattern over string values (`%` any sequence, `_` one char).
    Like(String),
    /// Matches the null value.
    Null,
    /// Null-safe equality: matches the value structurally, null included.
    Same(Value),
    /// Negation of the inner matcher.
    Not(Box<ValueMatcher>),
    /// Disjunction of matchers.
    AnyOf(BTreeSet<ValueMatcher>),
}

impl ValueMatcher {
    /// Equality matcher. A null operand can never compare equal, so it
    /// collapses to `MatchNone` at construction.
    pub fn equals(value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            Self::MatchNone
        } else {
            Self::Equals(value)
        }
    }

    /// Set-membership matcher. Nulls are dropped from the set (they never
    /// match), an empty set collapses to `MatchNone` and a singleton to
    /// `Equals`.
    pub fn in_set<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        let set: BTreeSet<Value> = values
            .into_iter()
            .map(Into::into)
            .filter(|v| !v.is_null())
            .collect();
        match set.len() {
            0 => Self::MatchNone,
            1 => Self::Equals(set.into_iter().next().unwrap()),
            _ => Self::In(set),
        }
    }

    /// Negated set-membership ("not in"). An empty set collapses to
    /// `MatchAll`, a singleton to `Not(Equals)`.
    pub fn not_in<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        match Self::in_set(values) {
            Self::MatchNone => Self::MatchAll,
            other => Self::Not(Box::new(other)),
        }
    }

    /// Null-safe equality. `same(null)` is the null check, `same(v)` for a
    /// non-null `v` is plain equality (a non-null operand can only compare
    /// equal to a non-null value).
    pub fn same(value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.is_null() {
            Self::Null
        } else {
            Self::Equals(value)
        }
    }

    /// Disjunction of matchers. Empty collapses to `MatchNone`, a
    /// singleton to the lone matcher.
    pub fn any_of(matchers: impl IntoIterator<Item = ValueMatcher>) -> Self {
        let mut set = BTreeSet::new();
        for m in matchers {
            match m {
                Self::MatchAll => return Self::MatchAll,
                Self::MatchNone => {}
                Self::AnyOf(inner) => set.extend(inner),
                other => {
                    set.insert(other);
                }
            }
        }
        match set.len() {
            0 => Self::MatchNone,
            1 => set.into_iter().next().unwrap(),
            _ => Self::AnyOf(set),
        }
    }

    /// Test a value against this matcher.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Self::MatchAll => true,
            Self::MatchNone => false,
            Self::Equals(v) => !value.is_null() && value == v,
            Self::In(set) => !value.is_null() && set.contains(value),
            Self::Like(pattern) => value.as_str().is_some_and(|s| like_match(pattern, s)),
            Self::Null => value.is_null(),
            Self::Same(v) => value == v,
            Self::Not(inner) => !inner.matches(value),
            Self::AnyOf(set) => set.iter().any(|m| m.matches(value)),
        }
    }

    /// Negate this matcher.
    ///
    /// Involution holds semantically: `m.negate().negate()` matches
    /// exactly the values `m` matches, though the structure may differ.
    pub fn negate(&self) -> ValueMatcher {
        match self {
            Self::MatchAll => Self::MatchNone,
            Self::MatchNone => Self::MatchAll,
            Self::Not(inner) => (**inner).clone(),
            other => Self::Not(Box::new(other.clone())),
        }
    }

    /// Render this matcher in the diagnostic grammar, prefixed by the
    /// column it applies to: `c==v`, `c!=v`, `c=in=(a,b)`, `c=out=(a,b)`.
    pub(crate) fn fmt_with_column(
        &self,
        column: &str,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            Self::MatchAll => write!(f, "{column}==*"),
            Self::MatchNone => write!(f, "{column}=none="),
            Self::Equals(v) => write!(f, "{column}=={v}"),
            Self::In(set) => {
                write!(f, "{column}=in=(")?;
                fmt_value_list(set, f)?;
                write!(f, ")")
            }
            Self::Like(pattern) => write!(f, "{column}=like={pattern}"),
            Self::Null => write!(f, "{column}==null"),
            Self::Same(v) => write!(f, "{column}=same={v}"),
            Self::Not(inner) => match inner.as_ref() {
                Self::Equals(v) => write!(f, "{column}!={v}"),
                Self::In(set) => {
                    write!(f, "{column}=out=(")?;
                    fmt_value_list(set, f)?;
                    write!(f, ")")
                }
                Self::Null => write!(f, "{column}!=null"),
                other => {
                    write!(f, "!(")?;
                    other.fmt_with_column(column, f)?;
                    write!(f, ")")
                }
            },
            Self::AnyOf(set) => {
                write!(f, "(")?;
                for (i, m) in set.iter().enumerate() {
                    if i > 0 {
                        write!(f, "|")?;
                    }
                    m.fmt_with_column(column, f)?;
                }
                write!(f, ")")
            }
        }
    }
}

fn fmt_value_list(values: &BTreeSet<Value>, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            write!(f, ",")?;
        }
        write!(f, "{v}")?;
    }
    Ok(())
}

/// SQL LIKE matching with `%` (any sequence) and `_` (exactly one char).
///
/// Iterative two-pointer scan with single-level backtracking on `%`.
fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last % absorb one more character.
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '%' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equals_matches_non_null_only() {
        let m = ValueMatcher::equals("a1");
        assert!(m.matches(&Value::from("a1")));
        assert!(!m.matches(&Value::from("a2")));
        assert!(!m.matches(&Value::Null));
    }

    #[test]
    fn test_equals_null_collapses() {
        assert_eq!(ValueMatcher::equals(Value::Null), ValueMatcher::MatchNone);
    }

    #[test]
    fn test_in_set_collapses() {
        assert_eq!(ValueMatcher::in_set::<Value>([]), ValueMatcher::MatchNone);
        assert_eq!(ValueMatcher::in_set(["a"]), ValueMatcher::equals("a"));
        let m = ValueMatcher::in_set(["a", "b"]);
        assert!(m.matches(&Value::from("b")));
        assert!(!m.matches(&Value::from("c")));
        assert!(!m.matches(&Value::Null));
    }

    #[test]
    fn test_not_in_collapses() {
        assert_eq!(ValueMatcher::not_in::<Value>([]), ValueMatcher::MatchAll);
        let m = ValueMatcher::not_in(["a"]);
        assert_eq!(
            m,
            ValueMatcher::Not(Box::new(ValueMatcher::equals("a")))
        );
        assert!(m.matches(&Value::from("b")));
        assert!(m.matches(&Value::Null));
    }

    #[test]
    fn test_same_normalizes() {
        assert_eq!(ValueMatcher::same(Value::Null), ValueMatcher::Null);
        assert_eq!(ValueMatcher::same("x"), ValueMatcher::equals("x"));
    }

    #[test]
    fn test_negate_involution() {
        let m = ValueMatcher::in_set([1i64, 2i64]);
        assert_eq!(m.negate().negate(), m);
        assert_eq!(ValueMatcher::MatchAll.negate(), ValueMatcher::MatchNone);
    }

    #[test]
    fn test_negate_semantics() {
        let m = ValueMatcher::equals(5i64);
        let n = m.negate();
        for v in [Value::Int64(5), Value::Int64(6), Value::Null] {
            assert_eq!(m.matches(&v), !n.matches(&v));
        }
    }

    #[test]
    fn test_like_patterns() {
        let m = ValueMatcher::Like("a%_1".to_string());
        assert!(m.matches(&Value::from("abc1")));
        assert!(m.matches(&Value::from("ax1")));
        assert!(!m.matches(&Value::from("a1")));
        assert!(!m.matches(&Value::Int64(1)));
        assert!(ValueMatcher::Like("%".to_string()).matches(&Value::from("")));
        assert!(ValueMatcher::Like("a_c".to_string()).matches(&Value::from("abc")));
        assert!(!ValueMatcher::Like("a_c".to_string()).matches(&Value::from("abbc")));
    }

    #[test]
    fn test_any_of_collapses() {
        let m = ValueMatcher::any_of([ValueMatcher::equals("a"), ValueMatcher::MatchNone]);
        assert_eq!(m, ValueMatcher::equals("a"));
        let all = ValueMatcher::any_of([ValueMatcher::equals("a"), ValueMatcher::MatchAll]);
        assert_eq!(all, ValueMatcher::MatchAll);
    }
}
