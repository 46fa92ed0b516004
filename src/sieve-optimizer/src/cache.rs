//! Memoizing decorators over the core optimizer.
//!
//! Filter optimization is recursive and the same sub-conjunctions come up
//! repeatedly, both inside a single call and across the many filters of
//! one compilation. [`CachingFilterOptimizer`] memoizes every `and`/`or`/
//! `not` result for its lifetime; [`IntraCallCacheFilterOptimizer`] scopes
//! a fresh cache to each top-level call for workloads where filters do
//! not repeat across calls.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

use sieve_core::SliceFilter;

use crate::optimizer::{FilterOptimizer, OptimizerConfig, SliceFilterOptimizer};

/// Memoization key. Operand sets are order/duplicate-insensitive, so
/// logically-equal requests share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CacheKey {
    And(BTreeSet<SliceFilter>, bool),
    Or(BTreeSet<SliceFilter>),
    Not(SliceFilter),
}

/// An optimizer that memoizes every result for its own lifetime.
///
/// Intended to live for one compilation: the cache only grows. Single
/// threaded by construction (`RefCell`); each worker owns its own
/// instance.
#[derive(Debug, Default)]
pub struct CachingFilterOptimizer {
    inner: SliceFilterOptimizer,
    cache: RefCell<HashMap<CacheKey, SliceFilter>>,
}

impl CachingFilterOptimizer {
    /// Create a caching optimizer with the given configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            inner: SliceFilterOptimizer::new(config),
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of memoized results.
    pub fn cached_results(&self) -> usize {
        self.cache.borrow().len()
    }

    fn lookup(&self, key: &CacheKey) -> Option<SliceFilter> {
        self.cache.borrow().get(key).cloned()
    }

    fn store(&self, key: CacheKey, result: SliceFilter) -> SliceFilter {
        self.cache.borrow_mut().insert(key, result.clone());
        result
    }
}

impl FilterOptimizer for CachingFilterOptimizer {
    fn and(&self, operands: &BTreeSet<SliceFilter>, will_be_negated: bool) -> SliceFilter {
        let key = CacheKey::And(operands.clone(), will_be_negated);
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }
        // Recursion re-enters through `self`, memoizing sub-results.
        let result = self.inner.and_with(self, operands, will_be_negated);
        self.store(key, result)
    }

    fn or(&self, operands: &BTreeSet<SliceFilter>) -> SliceFilter {
        let key = CacheKey::Or(operands.clone());
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }
        let result = self.inner.or_with(self, operands);
        self.store(key, result)
    }

    fn not(&self, filter: &SliceFilter) -> SliceFilter {
        let key = CacheKey::Not(filter.clone());
        if let Some(hit) = self.lookup(&key) {
            return hit;
        }
        let result = self.inner.not_with(self, filter);
        self.store(key, result)
    }
}

/// An optimizer that builds a fresh memoization cache per top-level call.
///
/// The cache still deduplicates the heavy shared sub-problems within one
/// call (an OR and the AND it negates through, the combinations of a
/// cartesian expansion) without accumulating state across calls.
#[derive(Debug, Clone, Default)]
pub struct IntraCallCacheFilterOptimizer {
    config: OptimizerConfig,
}

impl IntraCallCacheFilterOptimizer {
    /// Create an intra-call caching optimizer with the given
    /// configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    fn scoped(&self) -> CachingFilterOptimizer {
        CachingFilterOptimizer::new(self.config.clone())
    }
}

impl FilterOptimizer for IntraCallCacheFilterOptimizer {
    fn and(&self, operands: &BTreeSet<SliceFilter>, will_be_negated: bool) -> SliceFilter {
        self.scoped().and(operands, will_be_negated)
    }

    fn or(&self, operands: &BTreeSet<SliceFilter>) -> SliceFilter {
        self.scoped().or(operands)
    }

    fn not(&self, filter: &SliceFilter) -> SliceFilter {
        self.scoped().not(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_hit_returns_same_result() {
        let optimizer = CachingFilterOptimizer::default();
        let ops = BTreeSet::from([
            SliceFilter::equals("a", "a1"),
            SliceFilter::equals("b", "b1"),
        ]);
        let first = optimizer.and(&ops, false);
        let populated = optimizer.cached_results();
        assert!(populated > 0);
        let second = optimizer.and(&ops, false);
        assert_eq!(first, second);
        // The repeat request is answered from the cache.
        assert_eq!(optimizer.cached_results(), populated);
    }

    #[test]
    fn test_cache_agrees_with_uncached() {
        let ops = BTreeSet::from([
            SliceFilter::equals("a", "a1"),
            SliceFilter::not_equals("a", "a2"),
            SliceFilter::equals("b", "b1"),
        ]);
        let uncached = SliceFilterOptimizer::default().and(&ops, false);
        let cached = CachingFilterOptimizer::default().and(&ops, false);
        let intra = IntraCallCacheFilterOptimizer::default().and(&ops, false);
        assert_eq!(uncached, cached);
        assert_eq!(uncached, intra);
    }

    #[test]
    fn test_intra_call_cache_does_not_accumulate() {
        let optimizer = IntraCallCacheFilterOptimizer::default();
        let a = optimizer.not(&SliceFilter::equals("c", "v"));
        let b = optimizer.not(&SliceFilter::equals("c", "v"));
        assert_eq!(a, b);
        assert_eq!(a, SliceFilter::not_equals("c", "v"));
    }
}
