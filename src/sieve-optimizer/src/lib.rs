//! Canonicalizing, cost-minimized rewriting of slice filters.
//!
//! Filters built through a [`FilterOptimizer`] are eagerly normalized:
//! logically-equal combinations of AND, OR and NOT converge to one
//! canonical tree, so equality and hashing of optimized filters are
//! semantic for free. The rewriting itself is driven by a structural
//! [cost model](crate::cost) that prefers AND-shaped trees, which the
//! downstream planner handles best.
//!
//! ```
//! use sieve_core::SliceFilter;
//! use sieve_optimizer::{FilterOptimizer, SliceFilterOptimizer};
//!
//! let optimizer = SliceFilterOptimizer::default();
//! let filter = optimizer.or_pair(
//!     SliceFilter::equals("env", "prod"),
//!     SliceFilter::equals("env", "staging"),
//! );
//! assert_eq!(filter.to_string(), "env=in=(prod,staging)");
//! ```

pub mod cost;
pub mod relations;

mod cache;
mod optimizer;
mod packing;

pub use cache::{CachingFilterOptimizer, IntraCallCacheFilterOptimizer};
pub use optimizer::{optimize_filter, FilterOptimizer, OptimizerConfig, SliceFilterOptimizer};
pub use relations::{is_laxer_than, is_stricter_than, split_and, split_or, strip_where};
