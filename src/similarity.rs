//! Provenance Similarity
//!
//! Scores how much of the graph two queries touch in common: each query is
//! rewritten into its provenance query, both are executed, and the Jaccard
//! index of the returned element identifiers is the score.

use crate::cypher::provenance::ProvenanceQueryBuilder;
use crate::error::{EvalError, Result};
use crate::executor::Executor;
use crate::metrics::log_failure;
use crate::relation::Row;
use crate::value::{canonicalize, CanonicalValue, Cell};
use std::collections::HashSet;
use std::hash::Hash;
use std::time::Duration;
use tracing::debug;

/// Provenance column of the reference query
pub const TARGET_ID_COLUMN: &str = "elemId1";
/// Provenance column of the predicted query
pub const PRED_ID_COLUMN: &str = "elemId2";

/// `|a ∩ b| / |a ∪ b|`, 0.0 when both sets are empty
pub fn jaccard_index<T: Eq + Hash>(a: &HashSet<T>, b: &HashSet<T>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity of the provenance of two queries.
///
/// Textually identical queries score 1.0 without touching the executor.
/// The reference query runs without a deadline, the prediction with
/// `timeout`. Any failure scores 0.0.
pub fn jaccard_similarity<E: Executor + ?Sized>(
    pred_query: &str,
    target_query: &str,
    executor: &E,
    timeout: Duration,
) -> f64 {
    if pred_query == target_query {
        return 1.0;
    }

    match provenance_jaccard(pred_query, target_query, executor, timeout) {
        Ok(score) => score,
        Err(e) => {
            log_failure("jaccard_similarity", &e);
            0.0
        }
    }
}

fn provenance_jaccard<E: Executor + ?Sized>(
    pred_query: &str,
    target_query: &str,
    executor: &E,
    timeout: Duration,
) -> Result<f64> {
    let target_builder = ProvenanceQueryBuilder::new(TARGET_ID_COLUMN);
    let pred_builder = ProvenanceQueryBuilder::new(PRED_ID_COLUMN);

    let target_rows = executor.run(&target_builder.build(target_query, true), None)?;
    let target_ids = collect_ids(&target_rows, TARGET_ID_COLUMN)?;

    let pred_rows = executor.run(&pred_builder.build(pred_query, true), Some(timeout))?;
    let pred_ids = collect_ids(&pred_rows, PRED_ID_COLUMN)?;

    let score = jaccard_index(&pred_ids, &target_ids);
    debug!(
        "Provenance overlap: {} predicted ids, {} reference ids, jaccard {:.3}",
        pred_ids.len(),
        target_ids.len(),
        score
    );
    Ok(score)
}

fn collect_ids(rows: &[Row], column: &str) -> Result<HashSet<CanonicalValue>> {
    rows.iter()
        .map(|row| {
            let cell = row.get(column).ok_or_else(|| {
                EvalError::SchemaMismatch(format!("provenance row is missing column '{}'", column))
            })?;
            canonicalize(cell, true)
        })
        .collect()
}

/// Graph elements matched by a query, as returned by the full-mode
/// provenance query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvenanceSubgraph {
    pub nodes: Vec<Cell>,
    pub relationships: Vec<Cell>,
}

impl ProvenanceSubgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.relationships.is_empty()
    }

    /// Jaccard index over the combined node and relationship sets
    pub fn jaccard(&self, other: &ProvenanceSubgraph) -> Result<f64> {
        Ok(jaccard_index(&self.element_set()?, &other.element_set()?))
    }

    fn element_set(&self) -> Result<HashSet<CanonicalValue>> {
        let nodes = self.nodes.iter().map(|n| tagged("node", n));
        let rels = self.relationships.iter().map(|r| tagged("relationship", r));
        nodes.chain(rels).collect()
    }
}

/// Tag elements by kind so a node and a relationship never collide
fn tagged(kind: &str, cell: &Cell) -> Result<CanonicalValue> {
    Ok(CanonicalValue::Tuple(vec![
        CanonicalValue::Text(kind.to_string()),
        canonicalize(cell, true)?,
    ]))
}

/// Run the full-mode provenance query of `query` and gather the matched
/// nodes and relationships across all UNION branches
pub fn provenance_subgraph<E: Executor + ?Sized>(
    query: &str,
    executor: &E,
    timeout: Option<Duration>,
) -> Result<ProvenanceSubgraph> {
    let provenance_query = ProvenanceQueryBuilder::default().build(query, false);
    let rows = executor.run(&provenance_query, timeout)?;

    let mut subgraph = ProvenanceSubgraph::default();
    for row in &rows {
        subgraph.nodes.extend(list_column(row, "nodes")?);
        subgraph.relationships.extend(list_column(row, "relationships")?);
    }
    Ok(subgraph)
}

fn list_column(row: &Row, column: &str) -> Result<Vec<Cell>> {
    match row.get(column) {
        Some(Cell::List(items)) | Some(Cell::Set(items)) => Ok(items.clone()),
        Some(Cell::Null) => Ok(Vec::new()),
        Some(other) => Err(EvalError::SchemaMismatch(format!(
            "provenance column '{}' holds a {}, expected a list",
            column,
            other.kind()
        ))),
        None => Err(EvalError::SchemaMismatch(format!(
            "provenance row is missing column '{}'",
            column
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutorError, InMemoryExecutor};
    use serde_json::json;

    const TARGET: &str = "MATCH (p:Player)-[:playsFor]->(t:Team) RETURN p.name";
    const PRED: &str = "MATCH (p:Player) RETURN p.name";

    fn ids(column: &str, values: &[&str]) -> Vec<Row> {
        values.iter().map(|v| Row::new().with(column, *v)).collect()
    }

    #[test]
    fn test_jaccard_index() {
        let a: HashSet<i32> = [1, 2, 3].into_iter().collect();
        let b: HashSet<i32> = [2, 3, 4].into_iter().collect();
        assert_eq!(jaccard_index(&a, &b), 0.5);
        assert_eq!(jaccard_index(&a, &a), 1.0);
        assert_eq!(jaccard_index(&HashSet::<i32>::new(), &HashSet::new()), 0.0);
    }

    #[test]
    fn test_identical_queries_skip_executor() {
        let executor = InMemoryExecutor::new();
        assert_eq!(jaccard_similarity(TARGET, TARGET, &executor, Duration::from_secs(1)), 1.0);
        assert_eq!(executor.calls(), 0);
    }

    #[test]
    fn test_overlapping_provenance() {
        let target_q = ProvenanceQueryBuilder::new(TARGET_ID_COLUMN).build(TARGET, true);
        let pred_q = ProvenanceQueryBuilder::new(PRED_ID_COLUMN).build(PRED, true);
        let executor = InMemoryExecutor::new()
            .with_rows(&target_q, ids(TARGET_ID_COLUMN, &["4:p1", "4:p2", "4:t1"]))
            .with_rows(&pred_q, ids(PRED_ID_COLUMN, &["4:p1", "4:p2", "4:p3"]));

        let score = jaccard_similarity(PRED, TARGET, &executor, Duration::from_secs(1));
        assert_eq!(score, 0.5);
    }

    #[test]
    fn test_empty_union_and_failures_score_zero() {
        let target_q = ProvenanceQueryBuilder::new(TARGET_ID_COLUMN).build(TARGET, true);
        let pred_q = ProvenanceQueryBuilder::new(PRED_ID_COLUMN).build(PRED, true);

        let empty = InMemoryExecutor::new()
            .with_rows(&target_q, Vec::new())
            .with_rows(&pred_q, Vec::new());
        assert_eq!(jaccard_similarity(PRED, TARGET, &empty, Duration::from_secs(1)), 0.0);

        let failing = InMemoryExecutor::new()
            .with_rows(&target_q, ids(TARGET_ID_COLUMN, &["4:p1"]))
            .with_error(&pred_q, ExecutorError::Syntax("Invalid input".to_string()));
        assert_eq!(jaccard_similarity(PRED, TARGET, &failing, Duration::from_secs(1)), 0.0);

        let wrong_column = InMemoryExecutor::new()
            .with_rows(&target_q, ids("id", &["4:p1"]))
            .with_rows(&pred_q, ids(PRED_ID_COLUMN, &["4:p1"]));
        assert_eq!(jaccard_similarity(PRED, TARGET, &wrong_column, Duration::from_secs(1)), 0.0);
    }

    #[test]
    fn test_provenance_subgraph() {
        let full_target = ProvenanceQueryBuilder::default().build(TARGET, false);
        let full_pred = ProvenanceQueryBuilder::default().build(PRED, false);
        let row = |nodes: serde_json::Value, rels: serde_json::Value| {
            Row::new()
                .with("nodes", Cell::from_json(&nodes))
                .with("relationships", Cell::from_json(&rels))
        };
        let executor = InMemoryExecutor::new()
            .with_rows(
                &full_target,
                vec![row(json!([{"id": "p1"}, {"id": "t1"}]), json!([{"id": "r1"}]))],
            )
            .with_rows(&full_pred, vec![row(json!([{"id": "p1"}]), json!([]))]);

        let target = provenance_subgraph(TARGET, &executor, None).unwrap();
        let pred = provenance_subgraph(PRED, &executor, None).unwrap();
        assert_eq!(target.nodes.len(), 2);
        assert_eq!(target.relationships.len(), 1);
        assert!(!pred.is_empty());
        assert!((pred.jaccard(&target).unwrap() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_subgraph_rejects_scalar_columns() {
        let full = ProvenanceQueryBuilder::default().build(PRED, false);
        let executor = InMemoryExecutor::new().with_rows(
            &full,
            vec![Row::new().with("nodes", 1i64).with("relationships", Cell::List(vec![]))],
        );
        assert!(matches!(
            provenance_subgraph(PRED, &executor, None),
            Err(EvalError::SchemaMismatch(_))
        ));
    }
}
