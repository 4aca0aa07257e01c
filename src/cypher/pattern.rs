//! Match Subgraph Extractor
//!
//! Isolates the graph-pattern prefix of a query (the leading MATCH,
//! OPTIONAL MATCH, WHERE and pass-through WITH clauses), binds anonymous
//! pattern elements to fresh variables and lists the bound variables.

use crate::cypher::scanner::{blank_property_maps, identifier, is_ident_char, ScannedText};
use crate::cypher::segmenter::{split_into_clauses, Clause, ClauseKind};
use std::collections::BTreeSet;
use tracing::debug;

pub const NODE_VAR_PREFIX: &str = "ntmp";
pub const REL_VAR_PREFIX: &str = "rtmp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Relationship,
}

/// Leading pattern-matching clauses of a query.
///
/// The query must start with MATCH. WITH clauses are kept only when they do
/// not alias anything (they become `WITH *`); an aliasing WITH or any other
/// clause ends the prefix. Trailing WITH clauses are dropped.
pub fn extract_pattern_prefix(query: &str) -> Option<String> {
    let query = query.trim();
    let clauses = split_into_clauses(query);

    let first = clauses.first()?;
    if first.kind != ClauseKind::Match || first.span.start != 0 {
        return None;
    }

    let mut accepted: Vec<(ClauseKind, String)> = Vec::new();
    for clause in &clauses {
        match clause.kind {
            ClauseKind::Match | ClauseKind::OptionalMatch | ClauseKind::Where => {
                accepted.push((clause.kind, clause.text.clone()));
            }
            ClauseKind::With if has_alias(clause.body()) => break,
            ClauseKind::With => accepted.push((ClauseKind::With, "WITH *".to_string())),
            _ => break,
        }
    }

    while matches!(accepted.last(), Some((ClauseKind::With, _))) {
        accepted.pop();
    }

    if accepted.is_empty() {
        return None;
    }

    let prefix = accepted
        .into_iter()
        .map(|(_, text)| text)
        .collect::<Vec<_>>()
        .join(" ");
    debug!("Pattern prefix: {}", prefix);
    Some(prefix)
}

/// Whether a WITH body introduces an alias (`... AS name`)
fn has_alias(body: &str) -> bool {
    let scanned = ScannedText::new(body);
    (0..scanned.len()).any(|idx| scanned.keyword_at(idx, &["AS"]).is_some())
}

/// Give every anonymous relationship, then every anonymous node, in the
/// MATCH / OPTIONAL MATCH clauses a fresh `rtmp<N>` / `ntmp<N>` variable.
///
/// Counters start at zero on each call. Untyped variable-length
/// relationships (`[*..]`) are left anonymous.
pub fn bind_fresh_identifiers(pattern: &str) -> String {
    let mut rel_counter = 0usize;
    let mut node_counter = 0usize;

    split_into_clauses(pattern)
        .iter()
        .map(|clause| {
            if !clause.kind.is_pattern_match() {
                return clause.text.clone();
            }
            let body = bind_elements(clause.body(), ElementKind::Relationship, &mut rel_counter);
            let body = bind_elements(&body, ElementKind::Node, &mut node_counter);
            format!("{} {}", keyword_text(clause), body)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Distinct variables bound to pattern elements of one kind in the MATCH /
/// OPTIONAL MATCH clauses, sorted
pub fn extract_bound_identifiers(pattern: &str, kind: ElementKind) -> Vec<String> {
    let blanked = blank_property_maps(pattern);
    let mut vars = BTreeSet::new();

    for clause in split_into_clauses(&blanked) {
        if !clause.kind.is_pattern_match() {
            continue;
        }
        for site in pattern_sites(clause.body()) {
            if site.kind == kind {
                if let Some(var) = site.variable {
                    vars.insert(var);
                }
            }
        }
    }

    vars.into_iter().collect()
}

fn keyword_text(clause: &Clause) -> &str {
    let body_len = clause.body().len();
    clause.text[..clause.text.len() - body_len].trim_end()
}

/// A node or relationship pattern found in a MATCH body
#[derive(Debug, Clone, PartialEq, Eq)]
struct PatternSite {
    kind: ElementKind,
    /// Byte offset of the opening `(` / `[`, or of the first `-` of a bare `--`
    offset: usize,
    /// Bare `--` relationship without brackets
    bare: bool,
    variable: Option<String>,
    /// Untyped variable-length relationship such as `[*1..3]`
    var_length: bool,
}

impl PatternSite {
    fn bindable(&self) -> bool {
        self.variable.is_none() && !self.var_length
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frame {
    Element,
    /// Function call such as `shortestPath(`
    Call,
    /// Parenthesized path pattern, optionally quantified
    Group,
    Other,
}

/// Walk a MATCH body and record its node and relationship patterns.
///
/// A `(` directly after an identifier is a function call (e.g.
/// `shortestPath(`) and a `(` opening another `(` groups a path; both stay
/// transparent. A `[` after `-` opens a relationship. Anything nested inside
/// an element, list or map is skipped.
fn pattern_sites(body: &str) -> Vec<PatternSite> {
    let scanned = ScannedText::new(body);
    let mut sites = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut prev_sig: Option<char> = None;
    let mut idx = 0;

    while idx < scanned.len() {
        let Some(info) = scanned.get(idx).copied() else {
            break;
        };
        if !info.code {
            idx += 1;
            continue;
        }

        let in_pattern = stack.iter().all(|f| matches!(f, Frame::Call | Frame::Group));
        match info.ch {
            '(' => {
                let called = idx > 0
                    && scanned
                        .get(idx - 1)
                        .map(|p| p.code && is_ident_char(p.ch))
                        .unwrap_or(false);
                let grouped = scanned
                    .get(scanned.skip_whitespace(idx + 1))
                    .map(|n| n.code && n.ch == '(')
                    .unwrap_or(false);
                let frame = if !in_pattern {
                    Frame::Other
                } else if called {
                    Frame::Call
                } else if grouped {
                    Frame::Group
                } else {
                    let (variable, _) = element_variable(&scanned, idx);
                    sites.push(PatternSite {
                        kind: ElementKind::Node,
                        offset: info.offset,
                        bare: false,
                        variable,
                        var_length: false,
                    });
                    Frame::Element
                };
                stack.push(frame);
            }
            '[' => {
                let frame = if in_pattern && prev_sig == Some('-') {
                    let (variable, var_length) = element_variable(&scanned, idx);
                    sites.push(PatternSite {
                        kind: ElementKind::Relationship,
                        offset: info.offset,
                        bare: false,
                        variable,
                        var_length,
                    });
                    Frame::Element
                } else {
                    Frame::Other
                };
                stack.push(frame);
            }
            '{' => stack.push(Frame::Other),
            ')' | ']' | '}' => {
                stack.pop();
            }
            '-' if in_pattern
                && scanned
                    .get(idx + 1)
                    .map(|n| n.code && n.ch == '-')
                    .unwrap_or(false) =>
            {
                sites.push(PatternSite {
                    kind: ElementKind::Relationship,
                    offset: info.offset,
                    bare: true,
                    variable: None,
                    var_length: false,
                });
                prev_sig = Some('-');
                idx += 2;
                continue;
            }
            _ => {}
        }

        if !info.ch.is_whitespace() {
            prev_sig = Some(info.ch);
        }
        idx += 1;
    }

    sites
}

/// Variable named right after the opening bracket at `open`, and whether the
/// element instead starts with `*` (variable-length relationship)
fn element_variable(scanned: &ScannedText<'_>, open: usize) -> (Option<String>, bool) {
    let start = scanned.skip_whitespace(open + 1);
    let Some(first) = scanned.get(start) else {
        return (None, false);
    };

    match identifier(&scanned.text()[first.offset..]) {
        Ok((_, name)) => (Some(name.to_string()), false),
        Err(_) => (None, first.code && first.ch == '*'),
    }
}

/// Insert fresh variables into the anonymous elements of one kind
fn bind_elements(body: &str, kind: ElementKind, counter: &mut usize) -> String {
    let prefix = match kind {
        ElementKind::Node => NODE_VAR_PREFIX,
        ElementKind::Relationship => REL_VAR_PREFIX,
    };

    let mut out = String::with_capacity(body.len() + 16);
    let mut cursor = 0;
    for site in pattern_sites(body) {
        if site.kind != kind || !site.bindable() {
            continue;
        }
        let var = format!("{}{}", prefix, *counter);
        *counter += 1;

        if site.bare {
            // `--` becomes `-[var]-`; arrow heads stay where they are
            out.push_str(&body[cursor..site.offset]);
            out.push_str(&format!("-[{}]-", var));
            cursor = site.offset + 2;
        } else {
            // right after the opening bracket
            out.push_str(&body[cursor..site.offset + 1]);
            out.push_str(&var);
            cursor = site.offset + 1;
        }
    }
    out.push_str(&body[cursor..]);
    out
}
