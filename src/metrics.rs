//! Evaluation Metrics
//!
//! Scores a predicted query against a reference query. Every metric returns
//! a number: failures of any kind are logged and score 0.0.

use crate::comparator::ExecutionComparator;
use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use crate::executor::{Executor, ExecutorError};
use crate::relation::Row;
use crate::report::EvaluationRecord;
use crate::similarity;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Marker of leaked model reasoning in a prediction
pub const THINK_MARKER: &str = "<think>";

lazy_static! {
    static ref ORDER_BY: Regex = Regex::new(r"(?i)\border\s+by\b").unwrap();
}

/// Whether row order is significant for a reference query
pub fn is_order_sensitive(target_query: &str) -> bool {
    ORDER_BY.is_match(target_query)
}

/// Log a scoring failure. Invalid queries are an expected outcome of
/// evaluating generated text; anything else points at the infrastructure.
pub(crate) fn log_failure(metric: &str, err: &EvalError) {
    match err {
        EvalError::QueryInvalid(_) => debug!("{}: query invalid: {}", metric, err),
        _ => warn!("{}: scoring failed: {}", metric, err),
    }
}

fn settle(metric: &str, result: Result<f64>) -> f64 {
    result.unwrap_or_else(|e| {
        log_failure(metric, &e);
        0.0
    })
}

/// Failure category of a prediction.
///
/// A prediction that runs but draws an engine notification is labelled with
/// the first notification code. Serialized as its display label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Diagnosis {
    NoError,
    Overthink,
    SyntaxError,
    TypeError,
    ClientError,
    Timeout,
    Unavailable,
    Unknown,
    Notification(String),
}

impl From<&ExecutorError> for Diagnosis {
    fn from(err: &ExecutorError) -> Self {
        match err {
            ExecutorError::Syntax(_) => Diagnosis::SyntaxError,
            ExecutorError::Type(_) => Diagnosis::TypeError,
            ExecutorError::Client(_) => Diagnosis::ClientError,
            ExecutorError::Timeout(_) => Diagnosis::Timeout,
            ExecutorError::Unavailable(_) => Diagnosis::Unavailable,
            ExecutorError::Unknown(_) => Diagnosis::Unknown,
        }
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Diagnosis::NoError => "NoError",
            Diagnosis::Overthink => "Overthink",
            Diagnosis::SyntaxError => "SyntaxError",
            Diagnosis::TypeError => "TypeError",
            Diagnosis::ClientError => "ClientError",
            Diagnosis::Timeout => "Timeout",
            Diagnosis::Unavailable => "Unavailable",
            Diagnosis::Unknown => "Unknown",
            Diagnosis::Notification(code) => code.as_str(),
        };
        write!(f, "{}", label)
    }
}

impl FromStr for Diagnosis {
    type Err = Infallible;

    /// Any label that is not a fixed category reads back as a notification code
    fn from_str(label: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match label {
            "NoError" => Diagnosis::NoError,
            "Overthink" => Diagnosis::Overthink,
            "SyntaxError" => Diagnosis::SyntaxError,
            "TypeError" => Diagnosis::TypeError,
            "ClientError" => Diagnosis::ClientError,
            "Timeout" => Diagnosis::Timeout,
            "Unavailable" => Diagnosis::Unavailable,
            "Unknown" => Diagnosis::Unknown,
            code => Diagnosis::Notification(code.to_string()),
        })
    }
}

impl Serialize for Diagnosis {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Diagnosis {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(label.parse().unwrap_or(Diagnosis::Unknown))
    }
}

/// Compare two already-executed results, ignoring row order
pub fn exact_match_rows(pred_rows: &[Row], target_rows: &[Row], config: &EvalConfig) -> f64 {
    if pred_rows == target_rows {
        return 1.0;
    }
    settle(
        "exact_match_rows",
        ExecutionComparator::new(config).score(pred_rows, target_rows, false),
    )
}

/// Scores queries by running them on one executor
pub struct Evaluator<'a, E: Executor + ?Sized> {
    executor: &'a E,
    config: EvalConfig,
}

impl<'a, E: Executor + ?Sized> Evaluator<'a, E> {
    pub fn new(executor: &'a E, config: EvalConfig) -> Self {
        Self { executor, config }
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// 1.0 when both queries return the same relation, rows unordered
    pub fn exact_match(&self, pred_query: &str, target_query: &str) -> f64 {
        if pred_query == target_query {
            return 1.0;
        }
        if pred_query.contains(THINK_MARKER) {
            return 0.0;
        }
        settle("exact_match", self.try_exact_match(pred_query, target_query))
    }

    fn try_exact_match(&self, pred_query: &str, target_query: &str) -> Result<f64> {
        let timeout = Some(self.config.timeout());
        let pred_rows = self.executor.run(pred_query, timeout)?;
        let target_rows = self.executor.run(target_query, timeout)?;
        ExecutionComparator::new(&self.config).score(&pred_rows, &target_rows, false)
    }

    /// Like `exact_match`, but row order counts when the reference query
    /// sorts its output
    pub fn execution_accuracy(&self, pred_query: &str, target_query: &str) -> f64 {
        if pred_query == target_query {
            return 1.0;
        }
        settle(
            "execution_accuracy",
            self.try_execution_accuracy(pred_query, target_query),
        )
    }

    fn try_execution_accuracy(&self, pred_query: &str, target_query: &str) -> Result<f64> {
        // Step 1: reference result, unbounded
        let started = Instant::now();
        let target_rows = self.executor.run(target_query, None)?;
        let elapsed = started.elapsed();
        if elapsed > self.config.timeout() {
            warn!(
                "Reference query took {:?}, longer than the {:?} timeout",
                elapsed,
                self.config.timeout()
            );
        }

        // Step 2: prediction under the deadline
        let pred_rows = self.executor.run(pred_query, Some(self.config.timeout()))?;

        // Step 3: compare
        let order_matters = is_order_sensitive(target_query);
        ExecutionComparator::new(&self.config).score(&pred_rows, &target_rows, order_matters)
    }

    /// 1.0 when the prediction runs without error
    pub fn executable(&self, pred_query: &str) -> f64 {
        match self.executor.run(pred_query, Some(self.config.timeout())) {
            Ok(_) => 1.0,
            Err(e) => {
                log_failure("executable", &EvalError::from(e));
                0.0
            }
        }
    }

    pub fn jaccard_similarity(&self, pred_query: &str, target_query: &str) -> f64 {
        similarity::jaccard_similarity(pred_query, target_query, self.executor, self.config.timeout())
    }

    /// Why a prediction fails to run, if it does
    pub fn diagnose(&self, pred_query: &str, target_query: &str) -> Diagnosis {
        if pred_query == target_query {
            return Diagnosis::NoError;
        }
        if pred_query.contains(THINK_MARKER) {
            return Diagnosis::Overthink;
        }
        match self
            .executor
            .run_with_notifications(pred_query, Some(self.config.timeout()))
        {
            Ok(outcome) => match outcome.notifications.into_iter().next() {
                Some(code) => {
                    debug!("Prediction ran with notification {}", code);
                    Diagnosis::Notification(code)
                }
                None => Diagnosis::NoError,
            },
            Err(e) => Diagnosis::from(&e),
        }
    }

    /// Run every metric for one prediction
    pub fn evaluate(&self, id: &str, pred_query: &str, target_query: &str) -> EvaluationRecord {
        let target_ok = self.executor.run(target_query, None).is_ok();
        if !target_ok {
            warn!("Reference query of {} does not execute", id);
        }

        let record = EvaluationRecord {
            id: id.to_string(),
            pred_query: pred_query.to_string(),
            target_query: target_query.to_string(),
            target_ok,
            executable: self.executable(pred_query),
            exact_match: self.exact_match(pred_query, target_query),
            execution_accuracy: self.execution_accuracy(pred_query, target_query),
            jaccard: self.jaccard_similarity(pred_query, target_query),
            diagnosis: self.diagnose(pred_query, target_query),
        };
        info!(
            "Evaluated {}: exact_match={} execution_accuracy={} jaccard={:.3} ({})",
            id, record.exact_match, record.execution_accuracy, record.jaccard, record.diagnosis
        );
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::InMemoryExecutor;
    use serde_json::json;

    const TARGET: &str = "MATCH (t:Team) RETURN t.name ORDER BY t.name";
    const PRED_SAME: &str = "MATCH (x:Team) RETURN x.name AS name ORDER BY name";
    const PRED_UNSORTED: &str = "MATCH (x:Team) RETURN x.name";
    const PRED_BROKEN: &str = "MATCH (x:Team RETURN x";

    fn rows(value: serde_json::Value) -> Vec<Row> {
        crate::relation::rows_from_json(&value).unwrap()
    }

    fn executor() -> InMemoryExecutor {
        InMemoryExecutor::new()
            .with_rows(TARGET, rows(json!([{"t.name": "Bulls"}, {"t.name": "Kings"}])))
            .with_rows(PRED_SAME, rows(json!([{"name": "Bulls"}, {"name": "Kings"}])))
            .with_rows(PRED_UNSORTED, rows(json!([{"x.name": "Kings"}, {"x.name": "Bulls"}])))
            .with_error(PRED_BROKEN, ExecutorError::Syntax("Invalid input".to_string()))
    }

    fn config() -> EvalConfig {
        EvalConfig {
            seed: Some(7),
            ..EvalConfig::default()
        }
    }

    #[test]
    fn test_order_sensitivity() {
        assert!(is_order_sensitive("MATCH (n) RETURN n order  by n.x"));
        assert!(!is_order_sensitive("MATCH (n:Border) RETURN n.bylaw"));
    }

    #[test]
    fn test_exact_match() {
        let executor = executor();
        let evaluator = Evaluator::new(&executor, config());
        assert_eq!(evaluator.exact_match(TARGET, TARGET), 1.0);
        assert_eq!(executor.calls(), 0);
        assert_eq!(evaluator.exact_match(PRED_UNSORTED, TARGET), 1.0);
        assert_eq!(evaluator.exact_match(PRED_BROKEN, TARGET), 0.0);
        assert_eq!(evaluator.exact_match("<think>hmm</think> MATCH (n) RETURN n", TARGET), 0.0);
    }

    #[test]
    fn test_execution_accuracy_respects_order_by() {
        let executor = executor();
        let evaluator = Evaluator::new(&executor, config());
        assert_eq!(evaluator.execution_accuracy(PRED_SAME, TARGET), 1.0);
        assert_eq!(evaluator.execution_accuracy(PRED_UNSORTED, TARGET), 0.0);
        assert_eq!(evaluator.execution_accuracy(PRED_BROKEN, TARGET), 0.0);
    }

    #[test]
    fn test_executable_and_diagnose() {
        let executor = executor().with_error(
            "MATCH (n) RETURN n",
            ExecutorError::Unavailable("connection refused".to_string()),
        );
        let evaluator = Evaluator::new(&executor, config());
        assert_eq!(evaluator.executable(PRED_SAME), 1.0);
        assert_eq!(evaluator.executable(PRED_BROKEN), 0.0);
        assert_eq!(evaluator.diagnose(PRED_SAME, TARGET), Diagnosis::NoError);
        assert_eq!(evaluator.diagnose(PRED_BROKEN, TARGET), Diagnosis::SyntaxError);
        assert_eq!(evaluator.diagnose("<think>", TARGET), Diagnosis::Overthink);
        assert_eq!(evaluator.diagnose("MATCH (n) RETURN n", TARGET), Diagnosis::Unavailable);
    }

    #[test]
    fn test_diagnose_reports_first_notification() {
        const CARTESIAN: &str = "MATCH (a:Team), (b:Team) RETURN a.name";
        let executor = executor()
            .with_rows(CARTESIAN, rows(json!([{"a.name": "Bulls"}])))
            .with_notification(CARTESIAN, "Neo.ClientNotification.Statement.CartesianProduct")
            .with_notification(CARTESIAN, "Neo.ClientNotification.Statement.UnknownLabelWarning");
        let evaluator = Evaluator::new(&executor, config());

        let diagnosis = evaluator.diagnose(CARTESIAN, TARGET);
        assert_eq!(
            diagnosis,
            Diagnosis::Notification("Neo.ClientNotification.Statement.CartesianProduct".to_string())
        );
        assert_eq!(diagnosis.to_string(), "Neo.ClientNotification.Statement.CartesianProduct");
        assert_eq!(evaluator.executable(CARTESIAN), 1.0);
    }

    #[test]
    fn test_diagnosis_labels_read_back() {
        for diagnosis in [
            Diagnosis::NoError,
            Diagnosis::Timeout,
            Diagnosis::Notification("Neo.ClientNotification.Statement.CartesianProduct".to_string()),
        ] {
            let label = diagnosis.to_string();
            assert_eq!(label.parse::<Diagnosis>().unwrap(), diagnosis);
        }
    }

    #[test]
    fn test_exact_match_rows() {
        let a = rows(json!([{"a": 1, "b": "x"}]));
        let b = rows(json!([{"a": "x", "b": 1}]));
        let ragged = rows(json!([{"a": 1}, {"b": 2}]));
        assert_eq!(exact_match_rows(&a, &a, &config()), 1.0);
        assert_eq!(exact_match_rows(&a, &b, &config()), 1.0);
        assert_eq!(exact_match_rows(&ragged, &a, &config()), 0.0);
    }

    #[test]
    fn test_evaluate_record() {
        let executor = executor();
        let evaluator = Evaluator::new(&executor, config());
        let record = evaluator.evaluate("q1", PRED_BROKEN, TARGET);
        assert!(record.target_ok);
        assert_eq!(record.executable, 0.0);
        assert_eq!(record.exact_match, 0.0);
        assert_eq!(record.diagnosis, Diagnosis::SyntaxError);
    }
}
