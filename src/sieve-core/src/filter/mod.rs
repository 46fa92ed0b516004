//! Value matchers and the slice filter tree.

mod matcher;
mod tree;
mod validate;

pub use matcher::ValueMatcher;
pub use tree::{ColumnFilter, SliceFilter};
pub use validate::validate_filter;
