//! Clause Segmenter
//!
//! Splits a Cypher query into its top-level clauses and UNION branches.
//! Keywords inside brackets, string literals and comments are ignored.

use crate::cypher::scanner::ScannedText;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Clause keywords recognized by the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClauseKind {
    Match,
    OptionalMatch,
    Where,
    With,
    Return,
    Union,
    Create,
    Set,
    Delete,
    Merge,
    Unwind,
    OrderBy,
    Limit,
    Skip,
    Foreach,
    Call,
    Yield,
}

/// Keyword spellings, multi-word forms first where they share a prefix
const KEYWORDS: &[(&[&str], ClauseKind)] = &[
    (&["OPTIONAL", "MATCH"], ClauseKind::OptionalMatch),
    (&["MATCH"], ClauseKind::Match),
    (&["WHERE"], ClauseKind::Where),
    (&["WITH"], ClauseKind::With),
    (&["RETURN"], ClauseKind::Return),
    (&["UNION"], ClauseKind::Union),
    (&["CREATE"], ClauseKind::Create),
    (&["SET"], ClauseKind::Set),
    (&["DETACH", "DELETE"], ClauseKind::Delete),
    (&["DELETE"], ClauseKind::Delete),
    (&["MERGE"], ClauseKind::Merge),
    (&["UNWIND"], ClauseKind::Unwind),
    (&["ORDER", "BY"], ClauseKind::OrderBy),
    (&["LIMIT"], ClauseKind::Limit),
    (&["SKIP"], ClauseKind::Skip),
    (&["FOREACH"], ClauseKind::Foreach),
    (&["CALL"], ClauseKind::Call),
    (&["YIELD"], ClauseKind::Yield),
];

impl ClauseKind {
    pub fn keyword(&self) -> &'static str {
        match self {
            ClauseKind::Match => "MATCH",
            ClauseKind::OptionalMatch => "OPTIONAL MATCH",
            ClauseKind::Where => "WHERE",
            ClauseKind::With => "WITH",
            ClauseKind::Return => "RETURN",
            ClauseKind::Union => "UNION",
            ClauseKind::Create => "CREATE",
            ClauseKind::Set => "SET",
            ClauseKind::Delete => "DELETE",
            ClauseKind::Merge => "MERGE",
            ClauseKind::Unwind => "UNWIND",
            ClauseKind::OrderBy => "ORDER BY",
            ClauseKind::Limit => "LIMIT",
            ClauseKind::Skip => "SKIP",
            ClauseKind::Foreach => "FOREACH",
            ClauseKind::Call => "CALL",
            ClauseKind::Yield => "YIELD",
        }
    }

    /// MATCH or OPTIONAL MATCH
    pub fn is_pattern_match(&self) -> bool {
        matches!(self, ClauseKind::Match | ClauseKind::OptionalMatch)
    }
}

impl fmt::Display for ClauseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// One clause of a query, from its keyword up to the next keyword
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub kind: ClauseKind,
    /// Clause text including its keyword, trimmed
    pub text: String,
    /// Half-open byte span in the source query (untrimmed)
    pub span: Range<usize>,
    keyword_len: usize,
}

impl Clause {
    /// Text after the keyword
    pub fn body(&self) -> &str {
        self.text.get(self.keyword_len..).unwrap_or("").trim()
    }
}

/// Split a query into top-level clauses, in source order.
///
/// Text before the first recognized keyword is not part of any clause.
pub fn split_into_clauses(query: &str) -> Vec<Clause> {
    let scanned = ScannedText::new(query);

    // (start char, keyword end char, kind)
    let mut hits: Vec<(usize, usize, ClauseKind)> = Vec::new();
    let mut idx = 0;
    while idx < scanned.len() {
        if scanned.is_top_level(idx) {
            if let Some((end, kind)) = keyword_at(&scanned, idx) {
                hits.push((idx, end, kind));
                idx = end;
                continue;
            }
        }
        idx += 1;
    }

    hits.iter()
        .enumerate()
        .map(|(i, &(start, kw_end, kind))| {
            let next = hits.get(i + 1).map(|h| h.0).unwrap_or(scanned.len());
            let span = scanned.byte_offset(start)..scanned.byte_offset(next);
            let keyword_len = scanned.byte_offset(kw_end) - span.start;
            Clause {
                kind,
                text: query[span.clone()].trim().to_string(),
                span,
                keyword_len,
            }
        })
        .collect()
}

fn keyword_at(scanned: &ScannedText<'_>, idx: usize) -> Option<(usize, ClauseKind)> {
    KEYWORDS
        .iter()
        .find_map(|(words, kind)| scanned.keyword_at(idx, words).map(|end| (end, *kind)))
}

/// Split a query into its UNION branches.
///
/// A query opening with a `CALL { ... }` block followed by WITH, RETURN,
/// WHERE or UNWIND contributes the branches of the block body instead.
pub fn split_union_branches(query: &str) -> Vec<String> {
    let query = query.trim();
    let scanned = ScannedText::new(query);

    if let Some(call_end) = scanned.keyword_at(0, &["CALL"]) {
        if let Some(body) = call_block_body(&scanned, call_end) {
            return split_on_union(body);
        }
        return vec![query.to_string()];
    }

    split_on_union(query)
}

/// Body of the block opened right after `CALL`, if the block is followed by
/// a projection or filtering clause
fn call_block_body<'a>(scanned: &ScannedText<'a>, call_end: usize) -> Option<&'a str> {
    let open = scanned.skip_whitespace(call_end);
    if scanned.get(open)?.ch != '{' || !scanned.is_top_level(open) {
        return None;
    }
    let close = scanned.matching_close(open)?;
    let after = scanned.skip_whitespace(close + 1);
    let followed = ["WITH", "RETURN", "WHERE", "UNWIND"]
        .iter()
        .any(|kw| scanned.keyword_at(after, &[kw]).is_some());
    if !followed {
        return None;
    }
    let text = scanned.text();
    Some(&text[scanned.byte_offset(open + 1)..scanned.byte_offset(close)])
}

fn split_on_union(query: &str) -> Vec<String> {
    let scanned = ScannedText::new(query);
    let mut branches = Vec::new();
    let mut branch_start = 0;
    let mut idx = 0;

    while idx < scanned.len() {
        if scanned.is_top_level(idx) {
            if let Some(end) = scanned.keyword_at(idx, &["UNION"]) {
                branches.push(query[scanned.byte_offset(branch_start)..scanned.byte_offset(idx)].trim().to_string());
                let after = scanned.skip_whitespace(end);
                branch_start = scanned.keyword_at(after, &["ALL"]).unwrap_or(end);
                idx = branch_start;
                continue;
            }
        }
        idx += 1;
    }

    branches.push(query[scanned.byte_offset(branch_start)..].trim().to_string());
    branches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(query: &str) -> Vec<ClauseKind> {
        split_into_clauses(query).iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_split_simple_query() {
        let query = "MATCH (p:Player)-[:playsFor]->(t:Team) WHERE t.name = 'Chicago Bulls' RETURN p.name, t.name";
        let clauses = split_into_clauses(query);
        let texts: Vec<&str> = clauses.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            vec![
                "MATCH (p:Player)-[:playsFor]->(t:Team)",
                "WHERE t.name = 'Chicago Bulls'",
                "RETURN p.name, t.name",
            ]
        );
        assert_eq!(clauses[1].body(), "t.name = 'Chicago Bulls'");
        assert_eq!(&query[clauses[2].span.clone()], "RETURN p.name, t.name");
    }

    #[test]
    fn test_multi_word_keywords() {
        assert_eq!(
            kinds("MATCH (a) OPTIONAL  MATCH (a)-->(b) RETURN a ORDER BY a.x SKIP 1 LIMIT 2"),
            vec![
                ClauseKind::Match,
                ClauseKind::OptionalMatch,
                ClauseKind::Return,
                ClauseKind::OrderBy,
                ClauseKind::Skip,
                ClauseKind::Limit,
            ]
        );
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(
            kinds("match (n) where n.x > 1 return n"),
            vec![ClauseKind::Match, ClauseKind::Where, ClauseKind::Return]
        );
    }

    #[test]
    fn test_keywords_inside_literals_ignored() {
        let query = "MATCH (n {title: 'WHERE to RETURN'}) WITH n, [x IN n.tags WHERE x <> ''] AS t RETURN t";
        assert_eq!(
            kinds(query),
            vec![ClauseKind::Match, ClauseKind::With, ClauseKind::Return]
        );
    }

    #[test]
    fn test_identifiers_containing_keywords() {
        assert_eq!(
            kinds("MATCH (matches:Game) RETURN matches.settled"),
            vec![ClauseKind::Match, ClauseKind::Return]
        );
    }

    #[test]
    fn test_keyword_named_label() {
        assert_eq!(
            kinds("MATCH (n) WHERE n:Set OR n:Return RETURN n"),
            vec![ClauseKind::Match, ClauseKind::Where, ClauseKind::Return]
        );
        let clauses = split_into_clauses("MATCH (n) WHERE n:Set RETURN n");
        assert_eq!(clauses[1].text, "WHERE n:Set");
    }

    #[test]
    fn test_detach_delete() {
        let clauses = split_into_clauses("MATCH (n) DETACH DELETE n");
        assert_eq!(clauses[1].kind, ClauseKind::Delete);
        assert_eq!(clauses[1].body(), "n");
    }

    #[test]
    fn test_split_union() {
        let branches = split_union_branches("MATCH (a:A) RETURN a.name AS n UNION ALL MATCH (b:B) RETURN b.name AS n");
        assert_eq!(
            branches,
            vec!["MATCH (a:A) RETURN a.name AS n", "MATCH (b:B) RETURN b.name AS n"]
        );
    }

    #[test]
    fn test_no_union() {
        assert_eq!(split_union_branches("  MATCH (n) RETURN n "), vec!["MATCH (n) RETURN n"]);
    }

    #[test]
    fn test_call_block_union() {
        let query = "CALL { MATCH (a:A) RETURN a AS x UNION MATCH (b:B) RETURN b AS x } WITH x RETURN count(x)";
        assert_eq!(
            split_union_branches(query),
            vec!["MATCH (a:A) RETURN a AS x", "MATCH (b:B) RETURN b AS x"]
        );
    }

    #[test]
    fn test_call_without_projection_kept_whole() {
        let query = "CALL db.labels() YIELD label RETURN label";
        assert_eq!(split_union_branches(query), vec![query.to_string()]);
    }
}
