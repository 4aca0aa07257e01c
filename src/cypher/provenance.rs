//! Provenance Query Builder
//!
//! Rewrites a query into one that returns the graph elements its MATCH
//! patterns touched: either their element identifiers, one per row, or the
//! collected nodes and relationships.

use crate::cypher::pattern::{
    bind_fresh_identifiers, extract_bound_identifiers, extract_pattern_prefix, ElementKind,
};
use crate::cypher::segmenter::split_union_branches;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

pub const DEFAULT_ID_COLUMN: &str = "elemId";

lazy_static! {
    static ref PLAIN_IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvenanceQueryBuilder {
    id_column: String,
}

impl ProvenanceQueryBuilder {
    /// Builder returning identifiers under `id_column`. Names that are not
    /// plain identifiers are backtick-quoted.
    pub fn new(id_column: impl Into<String>) -> Self {
        let id_column = id_column.into();
        let id_column = if PLAIN_IDENTIFIER.is_match(&id_column) {
            id_column
        } else {
            format!("`{}`", id_column.replace('`', "``"))
        };
        Self { id_column }
    }

    pub fn id_column(&self) -> &str {
        &self.id_column
    }

    /// Provenance query for `query`.
    ///
    /// Each UNION branch with a usable MATCH prefix yields one sub-query and
    /// the sub-queries are joined with UNION. When no branch has one, the
    /// result is a query returning an empty provenance.
    pub fn build(&self, query: &str, identity_only: bool) -> String {
        let parts: Vec<String> = split_union_branches(query)
            .iter()
            .filter_map(|branch| {
                let prefix = extract_pattern_prefix(branch)?;
                Some(self.build_branch(&bind_fresh_identifiers(&prefix), identity_only))
            })
            .collect();

        if parts.is_empty() {
            debug!("No MATCH pattern to trace in query");
            return self.empty_query(identity_only);
        }

        parts.join(" UNION ")
    }

    fn build_branch(&self, pattern: &str, identity_only: bool) -> String {
        let nodes = extract_bound_identifiers(pattern, ElementKind::Node);

        if identity_only {
            let ids = collect_expression(&nodes, |v| format!("collect(distinct elementId({}))", v));
            return format!(
                "{} WITH {} AS elemIds UNWIND elemIds AS elemId RETURN elemId AS {}",
                pattern, ids, self.id_column
            );
        }

        let rels = extract_bound_identifiers(pattern, ElementKind::Relationship);
        let node_expr = collect_expression(&nodes, |v| format!("collect(distinct {})", v));
        let rel_expr = collect_expression(&rels, |v| format!("collect(distinct {})", v));
        format!(
            "{} RETURN {} AS nodes, {} AS relationships",
            pattern, node_expr, rel_expr
        )
    }

    fn empty_query(&self, identity_only: bool) -> String {
        if identity_only {
            format!("UNWIND [] AS elemId RETURN elemId AS {}", self.id_column)
        } else {
            "RETURN [] AS nodes, [] AS relationships".to_string()
        }
    }
}

impl Default for ProvenanceQueryBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ID_COLUMN)
    }
}

/// `collect(..) + collect(..)` over the variables, or `[]` when there are none
fn collect_expression<F: Fn(&str) -> String>(vars: &[String], render: F) -> String {
    if vars.is_empty() {
        return "[]".to_string();
    }
    vars.iter()
        .map(|v| render(v))
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Provenance query returning element identifiers in the `elemId` column
pub fn build_provenance_query(query: &str, identity_only: bool) -> String {
    ProvenanceQueryBuilder::default().build(query, identity_only)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAYERS: &str = "MATCH (p:Player)-[:playsFor]->(t:Team) RETURN p.name";

    #[test]
    fn test_identity_query() {
        assert_eq!(
            build_provenance_query(PLAYERS, true),
            "MATCH (p:Player)-[rtmp0:playsFor]->(t:Team) \
             WITH collect(distinct elementId(p)) + collect(distinct elementId(t)) AS elemIds \
             UNWIND elemIds AS elemId RETURN elemId AS elemId"
        );
    }

    #[test]
    fn test_full_query() {
        assert_eq!(
            build_provenance_query(PLAYERS, false),
            "MATCH (p:Player)-[rtmp0:playsFor]->(t:Team) \
             RETURN collect(distinct p) + collect(distinct t) AS nodes, \
             collect(distinct rtmp0) AS relationships"
        );
    }

    #[test]
    fn test_custom_column() {
        let builder = ProvenanceQueryBuilder::new("elemId2");
        assert!(builder.build(PLAYERS, true).ends_with("RETURN elemId AS elemId2"));
        assert_eq!(ProvenanceQueryBuilder::new("elem id").id_column(), "`elem id`");
    }

    #[test]
    fn test_union_branches() {
        let query = "MATCH (a:A) RETURN a.name AS n UNION MATCH (:B)-->(c) RETURN c.name AS n";
        let built = build_provenance_query(query, false);
        assert_eq!(
            built,
            "MATCH (a:A) RETURN collect(distinct a) AS nodes, [] AS relationships \
             UNION \
             MATCH (ntmp0:B)-[rtmp0]->(c) RETURN collect(distinct c) + collect(distinct ntmp0) AS nodes, \
             collect(distinct rtmp0) AS relationships"
        );
    }

    #[test]
    fn test_branch_without_pattern_is_skipped() {
        let query = "MATCH (a:A) RETURN a.x AS x UNION RETURN 1 AS x";
        let built = build_provenance_query(query, true);
        assert!(!built.contains("UNION"));
        assert!(built.starts_with("MATCH (a:A) WITH collect(distinct elementId(a)) AS elemIds"));
    }

    #[test]
    fn test_no_pattern() {
        assert_eq!(
            build_provenance_query("RETURN 1", true),
            "UNWIND [] AS elemId RETURN elemId AS elemId"
        );
        assert_eq!(
            build_provenance_query("CREATE (n:X) RETURN n", false),
            "RETURN [] AS nodes, [] AS relationships"
        );
    }
}
