//! Execution Comparator
//!
//! Scores two executed result sets as 1.0 (same relation) or 0.0.

use crate::config::EvalConfig;
use crate::error::Result;
use crate::permutation::PermutationSearch;
use crate::relation::{to_canonical_rows, ColumnOrder, Row};
use tracing::debug;

pub struct ExecutionComparator {
    search: PermutationSearch,
    column_order: ColumnOrder,
    unorder_nested_lists: bool,
}

impl ExecutionComparator {
    pub fn new(config: &EvalConfig) -> Self {
        Self {
            search: PermutationSearch::from_config(config),
            column_order: config.column_order,
            unorder_nested_lists: config.unorder_nested_lists,
        }
    }

    /// Compare a predicted result against the reference result.
    ///
    /// Schema and canonicalization errors are returned to the caller, which
    /// decides how to score them.
    pub fn score(&mut self, pred_rows: &[Row], target_rows: &[Row], order_matters: bool) -> Result<f64> {
        if pred_rows.is_empty() && target_rows.is_empty() {
            return Ok(1.0);
        }
        if pred_rows.is_empty() || target_rows.is_empty() {
            debug!(
                "Empty vs non-empty result ({} predicted rows, {} reference rows)",
                pred_rows.len(),
                target_rows.len()
            );
            return Ok(0.0);
        }

        let target = to_canonical_rows(target_rows, self.column_order, self.unorder_nested_lists)?;
        let pred = to_canonical_rows(pred_rows, self.column_order, self.unorder_nested_lists)?;

        let equivalent = self.search.find_equivalence(&target, &pred, order_matters);
        Ok(if equivalent { 1.0 } else { 0.0 })
    }
}

impl Default for ExecutionComparator {
    fn default() -> Self {
        Self::new(&EvalConfig::default())
    }
}
