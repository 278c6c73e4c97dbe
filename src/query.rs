// 🧮 Query Evaluator - Catalog + filter state + ownership → result list
//
// A stable filter over catalog order. Nothing is cached between calls, so
// identical inputs always produce the identical list.

use crate::catalog::{CatalogEntry, CatalogStore};
use crate::filter::{FacetFilterEngine, FilterState};
use crate::ownership::OwnershipTracker;

pub struct QueryEvaluator;

impl QueryEvaluator {
    /// Entries passing every facet, in catalog order
    pub fn evaluate<'c>(
        catalog: &'c CatalogStore,
        state: &FilterState,
        tracker: &OwnershipTracker,
    ) -> Vec<&'c CatalogEntry> {
        Self::evaluate_with(catalog, state, |name| tracker.is_owned(name))
    }

    /// Same as `evaluate`, with ownership supplied as a plain capability
    pub fn evaluate_with<'c, F>(
        catalog: &'c CatalogStore,
        state: &FilterState,
        is_owned: F,
    ) -> Vec<&'c CatalogEntry>
    where
        F: Fn(&str) -> bool,
    {
        let engine = FacetFilterEngine::new(state);
        catalog
            .entries()
            .iter()
            .filter(|entry| engine.matches(entry, &is_owned))
            .collect()
    }

    /// Names of the matching entries, for callers that only need identity
    pub fn names<'c>(
        catalog: &'c CatalogStore,
        state: &FilterState,
        tracker: &OwnershipTracker,
    ) -> Vec<&'c str> {
        Self::evaluate(catalog, state, tracker)
            .into_iter()
            .map(|e| e.name.as_str())
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
