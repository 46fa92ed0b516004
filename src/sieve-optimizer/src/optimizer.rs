//! The canonicalizing filter optimizer.
//!
//! `and`, `or` and `not` each eagerly rewrite their result into the
//! canonical, cost-minimized form, so that logically-equal filters built
//! through any call path compare structurally equal and hash identically.
//!
//! All boolean reasoning is concentrated in the AND pipeline:
//! `or(fs) = not(and(map(fs, not), will_be_negated = true))`. The
//! pipeline recurses through the [`FilterOptimizer`] it was entered
//! from, so a caching decorator memoizes every sub-result.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;

use common_error::{ensure, SieveResult};
use sieve_core::SliceFilter;

use crate::cost::filter_cost;
use crate::packing::{pack_columns, Packed};
use crate::relations::{is_stricter_than, split_or, strip_where};

/// Configuration for the optimizer.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Upper bound on the cartesian product of OR-branch counts the AND
    /// pipeline is willing to materialize. Over the limit the expansion
    /// pass degrades to its (correct, unexpanded) input.
    pub max_cartesian_product: u64,
    /// Bounded number of refinement sweeps (contextual simplification,
    /// column packing, redundancy removal) per AND call.
    pub max_refine_passes: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_cartesian_product: 128,
            max_refine_passes: 3,
        }
    }
}

impl OptimizerConfig {
    /// Set the cartesian-product guard limit.
    pub fn with_max_cartesian_product(mut self, limit: u64) -> SieveResult<Self> {
        ensure!(limit >= 1, InvalidParameter: "max_cartesian_product must be at least 1");
        self.max_cartesian_product = limit;
        Ok(self)
    }

    /// Set the refinement sweep bound.
    pub fn with_max_refine_passes(mut self, passes: usize) -> SieveResult<Self> {
        ensure!(passes >= 1, InvalidParameter: "max_refine_passes must be at least 1");
        self.max_refine_passes = passes;
        Ok(self)
    }
}

/// A normalizing builder for filter conjunctions, disjunctions and
/// negations.
///
/// Every method is total over the closed filter variant set, pure, and
/// eager: the returned filter is fully canonical. Implementations are not
/// required to be `Sync`; parallel compilations own their own instance.
pub trait FilterOptimizer {
    /// Canonical conjunction of an order/duplicate-insensitive operand
    /// set. `will_be_negated` marks a result the caller is about to wrap
    /// in NOT; it only influences the final cost-based choice of shape.
    fn and(&self, operands: &BTreeSet<SliceFilter>, will_be_negated: bool) -> SliceFilter;

    /// Canonical disjunction of an operand set.
    fn or(&self, operands: &BTreeSet<SliceFilter>) -> SliceFilter;

    /// Canonical negation.
    fn not(&self, filter: &SliceFilter) -> SliceFilter;

    /// Convenience: conjunction of two filters.
    fn and_pair(&self, a: SliceFilter, b: SliceFilter) -> SliceFilter {
        self.and(&BTreeSet::from([a, b]), false)
    }

    /// Convenience: disjunction of two filters.
    fn or_pair(&self, a: SliceFilter, b: SliceFilter) -> SliceFilter {
        self.or(&BTreeSet::from([a, b]))
    }
}

/// Re-normalize an arbitrary filter tree through an optimizer.
pub fn optimize_filter(optimizer: &dyn FilterOptimizer, filter: &SliceFilter) -> SliceFilter {
    match filter {
        SliceFilter::And(ops) => optimizer.and(ops, false),
        SliceFilter::Or(ops) => optimizer.or(ops),
        SliceFilter::Not(inner) => optimizer.not(inner),
        leaf => leaf.clone(),
    }
}

/// The core, uncached optimizer.
#[derive(Debug, Clone, Default)]
pub struct SliceFilterOptimizer {
    config: OptimizerConfig,
}

impl SliceFilterOptimizer {
    /// Create an optimizer with the given configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }
}

impl FilterOptimizer for SliceFilterOptimizer {
    fn and(&self, operands: &BTreeSet<SliceFilter>, will_be_negated: bool) -> SliceFilter {
        self.and_with(self, operands, will_be_negated)
    }

    fn or(&self, operands: &BTreeSet<SliceFilter>) -> SliceFilter {
        self.or_with(self, operands)
    }

    fn not(&self, filter: &SliceFilter) -> SliceFilter {
        self.not_with(self, filter)
    }
}

/// Outcome of a pipeline pass over an operand set.
enum Refined {
    /// The (possibly rewritten) operand set.
    Operands(BTreeSet<SliceFilter>),
    /// The whole conjunction collapsed.
    Collapsed(SliceFilter),
}

impl SliceFilterOptimizer {
    /// The AND pipeline, recursing through `ctx` so decorators can
    /// memoize sub-results.
    pub(crate) fn and_with(
        &self,
        ctx: &dyn FilterOptimizer,
        operands: &BTreeSet<SliceFilter>,
        will_be_negated: bool,
    ) -> SliceFilter {
        // Passes 1+2: optimize every operand, flatten nested ANDs.
        let mut ops: BTreeSet<SliceFilter> = BTreeSet::new();
        for op in operands {
            match optimize_filter(ctx, op) {
                SliceFilter::MatchNone => return SliceFilter::MatchNone,
                SliceFilter::MatchAll => {}
                SliceFilter::And(inner) => ops.extend(inner),
                other => {
                    ops.insert(other);
                }
            }
        }

        // Passes 3-5 refine until a fixpoint or the configured bound;
        // the raw operand set is the fallback when the bound trips.
        for _ in 0..self.config.max_refine_passes {
            let before = ops.clone();
            ops = match self.simplify_pairwise(ctx, ops) {
                Refined::Collapsed(f) => return f,
                Refined::Operands(o) => o,
            };
            ops = match pack_columns(ops) {
                Packed::Unsatisfiable => return SliceFilter::MatchNone,
                Packed::Operands(o) => o,
            };
            ops = drop_implied(ops);
            if ops == before {
                break;
            }
        }

        // Pass 6: cartesian branch pruning.
        ops = match self.prune_cartesian(ctx, ops) {
            Refined::Collapsed(f) => return f,
            Refined::Operands(o) => o,
        };

        // Pass 7: common-OR factoring.
        if let Some(factored) = self.factor_common_or(ctx, &ops) {
            return factored;
        }

        // Pass 8: collapse degenerates, then pick the cheaper of the
        // AND shape and its De Morgan dual.
        match ops.len() {
            0 => SliceFilter::MatchAll,
            1 => ops.into_iter().next().unwrap(),
            _ => self.choose_form(ctx, ops, will_be_negated),
        }
    }

    /// OR is defined entirely via De Morgan through AND.
    pub(crate) fn or_with(
        &self,
        ctx: &dyn FilterOptimizer,
        operands: &BTreeSet<SliceFilter>,
    ) -> SliceFilter {
        let negated: BTreeSet<SliceFilter> = operands.iter().map(|op| ctx.not(op)).collect();
        let conjunction = ctx.and(&negated, true);
        ctx.not(&conjunction)
    }

    /// Canonical negation. A double negation unwraps; negation of a
    /// null-as-absent column filter is pushed into the leaf matcher; a
    /// strict column filter wraps; OR negates through De Morgan; AND is
    /// normalized, then wrapped.
    pub(crate) fn not_with(
        &self,
        ctx: &dyn FilterOptimizer,
        filter: &SliceFilter,
    ) -> SliceFilter {
        match filter {
            SliceFilter::MatchAll => SliceFilter::MatchNone,
            SliceFilter::MatchNone => SliceFilter::MatchAll,
            SliceFilter::Not(inner) => (**inner).clone(),
            // The negated leaf matcher is the exact complement of the
            // leaf only under null-as-absent semantics. A strict leaf
            // has no leaf complement (a slice lacking the column fails
            // both), so it stays wrapped.
            SliceFilter::Column(cf) if cf.null_if_absent => {
                SliceFilter::column(&cf.column, cf.matcher.negate())
            }
            SliceFilter::Column(_) => SliceFilter::Not(Box::new(filter.clone())),
            SliceFilter::Or(ops) => {
                let negated: BTreeSet<SliceFilter> = ops.iter().map(|op| ctx.not(op)).collect();
                ctx.and(&negated, false)
            }
            SliceFilter::And(ops) => match ctx.and(ops, true) {
                normalized @ SliceFilter::And(_) => SliceFilter::Not(Box::new(normalized)),
                normalized => ctx.not(&normalized),
            },
        }
    }

    /// Pass 3: strip every operand against the conjunction of the
    /// others, re-optimizing each residual and keeping it only when it
    /// does not regress the cost.
    fn simplify_pairwise(&self, ctx: &dyn FilterOptimizer, ops: BTreeSet<SliceFilter>) -> Refined {
        if ops.len() < 2 {
            return Refined::Operands(ops);
        }
        let mut list: Vec<SliceFilter> = ops.into_iter().collect();
        let mut i = 0;
        while i < list.len() {
            let context = SliceFilter::and_of(
                list.iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, f)| f.clone()),
            );
            let residual = strip_where(&context, &list[i]);
            if residual == list[i] {
                i += 1;
                continue;
            }
            let reoptimized = optimize_filter(ctx, &residual);
            if filter_cost(&reoptimized) > filter_cost(&list[i]) {
                i += 1;
                continue;
            }
            match reoptimized {
                SliceFilter::MatchNone => return Refined::Collapsed(SliceFilter::MatchNone),
                SliceFilter::MatchAll => {
                    list.remove(i);
                }
                SliceFilter::And(inner) => {
                    list.remove(i);
                    list.extend(inner);
                }
                other => {
                    list[i] = other;
                    i += 1;
                }
            }
        }
        Refined::Operands(list.into_iter().collect())
    }

    /// Pass 6: partition the operands into OR-shaped and the rest, prune
    /// OR branches dead under the rest, and materialize the cartesian
    /// product of the surviving branches when it is small enough and
    /// cheaper than the input.
    fn prune_cartesian(&self, ctx: &dyn FilterOptimizer, ops: BTreeSet<SliceFilter>) -> Refined {
        let or_ops: BTreeSet<SliceFilter> = ops
            .iter()
            .filter(|f| matches!(f, SliceFilter::Or(_)))
            .cloned()
            .collect();
        if or_ops.is_empty() {
            return Refined::Operands(ops);
        }
        let rest: BTreeSet<SliceFilter> = ops.difference(&or_ops).cloned().collect();
        let common_and = SliceFilter::and_of(rest.iter().cloned());

        let mut branch_lists: Vec<Vec<SliceFilter>> = Vec::new();
        for or_op in &or_ops {
            let mut branches = Vec::new();
            let mut implied = false;
            for branch in split_or(or_op) {
                match strip_where(&common_and, &branch) {
                    SliceFilter::MatchNone => {}
                    SliceFilter::MatchAll => {
                        implied = true;
                        break;
                    }
                    stripped => branches.push(stripped),
                }
            }
            if implied {
                // The whole OR is true under the rest of the AND.
                continue;
            }
            if branches.is_empty() {
                return Refined::Collapsed(SliceFilter::MatchNone);
            }
            branch_lists.push(branches);
        }
        if branch_lists.is_empty() {
            return Refined::Operands(rest);
        }

        let mut product: u64 = 1;
        for list in &branch_lists {
            product = product.saturating_mul(list.len() as u64);
        }
        if product > self.config.max_cartesian_product {
            debug!(
                "skipping cartesian expansion: {product} combinations exceed the limit of {}",
                self.config.max_cartesian_product
            );
            return Refined::Operands(ops);
        }

        // Materialize the product, re-strip each combination against the
        // common AND, and drop the dead ones.
        let mut combos: BTreeSet<SliceFilter> = BTreeSet::new();
        let mut indices = vec![0usize; branch_lists.len()];
        'product: loop {
            let combo: BTreeSet<SliceFilter> = indices
                .iter()
                .zip(&branch_lists)
                .map(|(&i, list)| list[i].clone())
                .collect();
            match strip_where(&common_and, &ctx.and(&combo, false)) {
                SliceFilter::MatchNone => {}
                stripped => {
                    combos.insert(stripped);
                }
            }
            let mut k = branch_lists.len() - 1;
            loop {
                indices[k] += 1;
                if indices[k] < branch_lists[k].len() {
                    break;
                }
                indices[k] = 0;
                if k == 0 {
                    break 'product;
                }
                k -= 1;
            }
        }
        if combos.is_empty() {
            return Refined::Collapsed(SliceFilter::MatchNone);
        }

        let mut candidate = rest;
        match ctx.or(&combos) {
            SliceFilter::MatchNone => return Refined::Collapsed(SliceFilter::MatchNone),
            SliceFilter::MatchAll => {}
            SliceFilter::And(inner) => candidate.extend(inner),
            other => {
                candidate.insert(other);
            }
        }

        let original_cost = filter_cost(&SliceFilter::and_of(ops.iter().cloned()));
        let candidate_cost = filter_cost(&SliceFilter::and_of(candidate.iter().cloned()));
        if candidate_cost < original_cost {
            Refined::Operands(candidate)
        } else {
            Refined::Operands(ops)
        }
    }

    /// Pass 7: factor a disjunction common to every operand:
    /// `AND(x|a, x|b)` becomes `x | AND(a, b)`.
    fn factor_common_or(
        &self,
        ctx: &dyn FilterOptimizer,
        ops: &BTreeSet<SliceFilter>,
    ) -> Option<SliceFilter> {
        if ops.len() < 2 {
            return None;
        }
        let mut iter = ops.iter();
        let first = iter.next()?;
        let mut common = split_or(first);
        for op in iter {
            let branches = split_or(op);
            common.retain(|b| branches.contains(b));
            if common.is_empty() {
                return None;
            }
        }
        let common_or = SliceFilter::or_of(common.iter().cloned());
        // An operand made entirely of common branches is equivalent to
        // the factored disjunction, and so is the whole conjunction.
        if ops.iter().any(|op| split_or(op) == common) {
            return Some(common_or);
        }

        // Simplify every operand under the assumption that the common
        // disjunction is false, then re-attach it.
        let not_common = ctx.not(&common_or);
        let mut simplified: BTreeSet<SliceFilter> = BTreeSet::new();
        for op in ops {
            match strip_where(&not_common, op) {
                SliceFilter::MatchAll => {}
                SliceFilter::MatchNone => return Some(common_or),
                SliceFilter::And(inner) => simplified.extend(inner),
                other => {
                    simplified.insert(other);
                }
            }
        }
        let and_part = SliceFilter::and_of(simplified);
        if and_part == SliceFilter::MatchAll {
            return Some(SliceFilter::MatchAll);
        }
        Some(ctx.or(&BTreeSet::from([common_or, and_part])))
    }

    /// Pass 8: build both the AND shape and its De Morgan dual, cost
    /// them as they will actually be used, and keep the cheaper; ties
    /// favor AND.
    fn choose_form(
        &self,
        ctx: &dyn FilterOptimizer,
        ops: BTreeSet<SliceFilter>,
        will_be_negated: bool,
    ) -> SliceFilter {
        let negated: BTreeSet<SliceFilter> = ops.iter().map(|op| ctx.not(op)).collect();
        let and_form = SliceFilter::and_of(ops);
        let or_form = SliceFilter::or_of(negated);
        let (and_cost, or_cost) = if will_be_negated {
            (2 * filter_cost(&and_form), filter_cost(&or_form))
        } else {
            (filter_cost(&and_form), 2 * filter_cost(&or_form))
        };
        if or_cost < and_cost {
            or_form.negated()
        } else {
            and_form
        }
    }
}

/// Pass 5: drop operands implied by another. A linear "current hardest"
/// scan first, then an all-pairs sweep restricted to operands touching a
/// column used by more than one operand (operands over disjoint
/// single-use columns cannot imply each other).
fn drop_implied(ops: BTreeSet<SliceFilter>) -> BTreeSet<SliceFilter> {
    if ops.len() < 2 {
        return ops;
    }
    let mut hardest: Option<SliceFilter> = None;
    let mut kept: Vec<SliceFilter> = Vec::new();
    for op in ops {
        match &hardest {
            None => hardest = Some(op),
            Some(h) => {
                if is_stricter_than(h, &op) {
                    continue;
                }
                if is_stricter_than(&op, h) {
                    hardest = Some(op);
                } else {
                    kept.push(op);
                }
            }
        }
    }
    let result: Vec<SliceFilter> = hardest.into_iter().chain(kept).collect();

    let mut column_uses: BTreeMap<&str, usize> = BTreeMap::new();
    for op in &result {
        for column in op.referenced_columns() {
            *column_uses.entry(column).or_default() += 1;
        }
    }
    let candidates: Vec<usize> = result
        .iter()
        .enumerate()
        .filter(|(_, op)| {
            op.referenced_columns()
                .iter()
                .any(|c| column_uses.get(c).copied().unwrap_or(0) > 1)
        })
        .map(|(i, _)| i)
        .collect();

    let mut removed = vec![false; result.len()];
    for &i in &candidates {
        if removed[i] {
            continue;
        }
        for &j in &candidates {
            if i != j && !removed[j] && is_stricter_than(&result[i], &result[j]) {
                removed[j] = true;
            }
        }
    }
    result
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !removed[*i])
        .map(|(_, f)| f)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sieve_core::ValueMatcher;

    fn opt() -> SliceFilterOptimizer {
        SliceFilterOptimizer::default()
    }

    #[test]
    fn test_and_drops_match_all() {
        let optimizer = opt();
        let result = optimizer.and_pair(SliceFilter::MatchAll, SliceFilter::equals("a", "a1"));
        assert_eq!(result, SliceFilter::equals("a", "a1"));
    }

    #[test]
    fn test_and_conflicting_equals_is_match_none() {
        let optimizer = opt();
        let result = optimizer.and_pair(
            SliceFilter::equals("a", "a1"),
            SliceFilter::equals("a", "a2"),
        );
        assert_eq!(result, SliceFilter::MatchNone);
    }

    #[test]
    fn test_not_pushes_to_leaf() {
        let optimizer = opt();
        let result = optimizer.not(&SliceFilter::equals("c", "v"));
        assert_eq!(result, SliceFilter::not_equals("c", "v"));
        assert_eq!(result.to_string(), "c!=v");
    }

    #[test]
    fn test_double_negation_unwraps() {
        let optimizer = opt();
        let filter = SliceFilter::equals("a", "a1");
        let negated = optimizer.not(&filter);
        assert_eq!(optimizer.not(&negated), filter);
    }

    #[test]
    fn test_config_rejects_invalid_limits() {
        assert!(OptimizerConfig::default()
            .with_max_cartesian_product(0)
            .is_err());
        assert!(OptimizerConfig::default().with_max_refine_passes(0).is_err());
        let config = OptimizerConfig::default()
            .with_max_cartesian_product(16)
            .unwrap();
        assert_eq!(config.max_cartesian_product, 16);
    }

    #[test]
    fn test_or_of_same_column_equals_packs_to_in() {
        let optimizer = opt();
        let result = optimizer.or_pair(
            SliceFilter::equals("c", "c1"),
            SliceFilter::equals("c", "c2"),
        );
        assert_eq!(
            result,
            SliceFilter::column("c", ValueMatcher::in_set(["c1", "c2"]))
        );
    }

    #[test]
    fn test_drop_implied_keeps_hardest() {
        let a = SliceFilter::equals("c", "a");
        let lax = SliceFilter::column("c", ValueMatcher::in_set(["a", "b"]));
        let ops = BTreeSet::from([a.clone(), lax]);
        assert_eq!(drop_implied(ops), BTreeSet::from([a]));
    }
}
