//! The memoization cache shared between the analyzer and the compile-time
//! evaluator (§4.3, §4.4): each expression node caches its most recent
//! analysis result, keyed by the node's stable address for the lifetime of
//! the held AST. The cache is bypassed whenever a scope disables it (alias
//! indexing, static-for unrolling, macro expansion) to avoid one
//! instantiation's folded result leaking into another's.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::ast::Expr;
use crate::value::MultiPValue;

/// RAII guard incrementing a per-analysis disable counter on construction and
/// decrementing it on `Drop`; nested disablers compose by count rather than
/// by last-writer-wins, matching the original `AnalysisCachingDisabler`.
pub struct CacheGuard<'a> {
    counter: &'a Cell<u32>,
}

impl<'a> CacheGuard<'a> {
    fn enter(counter: &'a Cell<u32>) -> Self {
        counter.set(counter.get() + 1);
        CacheGuard { counter }
    }
}

impl Drop for CacheGuard<'_> {
    fn drop(&mut self) {
        self.counter.set(self.counter.get() - 1);
    }
}

fn node_key(expr: &Expr) -> usize {
    expr as *const Expr as usize
}

#[derive(Default)]
pub struct AnalysisCache {
    disable_counter: Cell<u32>,
    entries: RefCell<HashMap<usize, MultiPValue>>,
}

impl AnalysisCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled(&self) -> bool {
        self.disable_counter.get() > 0
    }

    pub fn disable(&self) -> CacheGuard<'_> {
        CacheGuard::enter(&self.disable_counter)
    }

    pub fn get(&self, expr: &Expr) -> Option<MultiPValue> {
        if self.disabled() {
            return None;
        }
        self.entries.borrow().get(&node_key(expr)).cloned()
    }

    pub fn store(&self, expr: &Expr, value: MultiPValue) {
        if self.disabled() {
            return;
        }
        self.entries.borrow_mut().insert(node_key(expr), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;
    use crate::value::PValue;
    use crate::types::{Primitive, TypeRegistry};

    #[test]
    fn stores_and_retrieves_by_node_identity() {
        let cache = AnalysisCache::new();
        let registry = TypeRegistry::new();
        let expr = Expr::BoolLit(true, Span::dummy());
        let ty = registry.primitive(Primitive::Bool);
        assert!(cache.get(&expr).is_none());
        cache.store(&expr, MultiPValue::single(PValue::owned(ty)));
        assert!(cache.get(&expr).is_some());
    }

    #[test]
    fn disabled_cache_neither_stores_nor_serves_hits() {
        let cache = AnalysisCache::new();
        let registry = TypeRegistry::new();
        let expr = Expr::BoolLit(false, Span::dummy());
        let ty = registry.primitive(Primitive::Bool);
        cache.store(&expr, MultiPValue::single(PValue::owned(ty.clone())));

        let _guard = cache.disable();
        assert!(cache.get(&expr).is_none());
        cache.store(&expr, MultiPValue::single(PValue::owned(ty)));
        drop(_guard);
        // the store attempted while disabled must not have overwritten the
        // cache, since it was rejected; but the pre-existing entry survives
        assert!(cache.get(&expr).is_some());
    }

    #[test]
    fn nested_disablers_compose_by_count() {
        let counter = std::cell::Cell::new(0u32);
        let outer = CacheGuard::enter(&counter);
        assert_eq!(counter.get(), 1);
        let inner = CacheGuard::enter(&counter);
        assert_eq!(counter.get(), 2);
        drop(inner);
        assert_eq!(counter.get(), 1);
        drop(outer);
        assert_eq!(counter.get(), 0);
    }
}
