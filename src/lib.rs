pub mod comparator;
pub mod config;
pub mod cypher;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod permutation;
pub mod relation;
pub mod report;
pub mod similarity;
pub mod value;

pub use comparator::ExecutionComparator;
pub use config::EvalConfig;
pub use cypher::{build_provenance_query, ProvenanceQueryBuilder};
pub use error::{EvalError, Result};
pub use executor::{DeadlineExecutor, Executor, ExecutorError, InMemoryExecutor, QueryOutcome};
pub use metrics::{exact_match_rows, Diagnosis, Evaluator};
pub use permutation::PermutationSearch;
pub use relation::{ColumnOrder, Row};
pub use report::{summarize, EvaluationRecord, RecordWriter};
pub use similarity::{jaccard_similarity, provenance_subgraph, ProvenanceSubgraph};
pub use value::{CanonicalValue, Cell};
