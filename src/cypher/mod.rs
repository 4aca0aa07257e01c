//! Cypher Text Processing
//!
//! Lexical clause segmentation and MATCH-pattern rewriting used to derive
//! provenance queries. No full grammar: a depth-tracking scanner is enough
//! to find top-level clause keywords and pattern elements.

pub mod pattern;
pub mod provenance;
pub mod scanner;
pub mod segmenter;

pub use pattern::*;
pub use provenance::*;
pub use segmenter::*;
