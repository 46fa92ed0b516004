//! Core data model for the Sieve filter-normalization engine.
//!
//! `sieve-core` provides the value, slice and filter-tree types that the
//! optimizer crate rewrites into canonical form:
//!
//! - **Values and slices**: a [`Slice`] is an assignment of [`Value`]s to
//!   named columns; it is the unit a filter matches or rejects.
//! - **Value matchers**: a [`ValueMatcher`] is a predicate over a single
//!   column's value, with structural equality and cheap negation.
//! - **Filter trees**: a [`SliceFilter`] is a boolean combination
//!   (AND/OR/NOT) of per-column matchers over a closed variant set.
//!
//! # Key Design Principles
//!
//! 1. **Immutability**: filters are value objects; every rewrite returns a
//!    new tree, never mutates in place.
//! 2. **Hash-stable structure**: operand sets are `BTreeSet`s, so
//!    structurally-equal filters compare equal and hash identically
//!    regardless of construction order. This is what makes canonical
//!    filters usable as cache/DAG keys.
//! 3. **No degenerate nodes**: smart constructors collapse empty and
//!    singleton operand sets at construction time, so AND/OR nodes always
//!    carry at least two operands.
//!
//! # Example
//!
//! ```rust
//! use sieve_core::{Slice, SliceFilter, ValueMatcher};
//!
//! let filter = SliceFilter::and_of([
//!     SliceFilter::equals("region", "emea"),
//!     SliceFilter::column("tier", ValueMatcher::in_set([1i64, 2i64])),
//! ]);
//!
//! let slice = Slice::new().with("region", "emea").with("tier", 1i64);
//! assert!(filter.matches(&slice));
//! assert_eq!(filter.to_string(), "region==emea&tier=in=(1,2)");
//! ```

pub mod filter;
pub mod types;

#[cfg(test)]
mod proptest_utils;

// Re-export commonly used types at the crate root for convenience.
pub use filter::{validate_filter, ColumnFilter, SliceFilter, ValueMatcher};
pub use types::{Slice, Value};
