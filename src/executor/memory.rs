//! In-memory executor with canned responses, for offline evaluation runs
//! (results recorded ahead of time) and tests.

use crate::error::Result;
use crate::executor::{Executor, ExecutorError, QueryOutcome};
use crate::relation::{rows_from_json, Row};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Maps query text (whitespace-trimmed) to a fixed outcome
#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    responses: HashMap<String, std::result::Result<QueryOutcome, ExecutorError>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, query: &str, rows: Vec<Row>) -> Self {
        self.responses
            .insert(query.trim().to_string(), Ok(QueryOutcome::new(rows)));
        self
    }

    /// Attach a notification code to the recorded answer of `query`. A query
    /// with no recorded rows answers with none.
    pub fn with_notification(mut self, query: &str, code: &str) -> Self {
        let entry = self
            .responses
            .entry(query.trim().to_string())
            .or_insert_with(|| Ok(QueryOutcome::default()));
        if let Ok(outcome) = entry {
            outcome.notifications.push(code.to_string());
        }
        self
    }

    pub fn with_error(mut self, query: &str, error: ExecutorError) -> Self {
        self.responses.insert(query.trim().to_string(), Err(error));
        self
    }

    /// Sleep this long before answering each query
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Load responses from a JSON object mapping query text to an array of
    /// row objects, to `{"rows": [...], "notifications": [...]}`, or to
    /// `{"error": {"code": ..., "message": ...}}`. Notifications are codes,
    /// either plain strings or objects with a `code` field.
    pub fn from_json(value: &Value) -> Result<Self> {
        let mut executor = Self::new();
        let Some(entries) = value.as_object() else {
            return Err(crate::error::EvalError::Config(
                "recorded responses must be a JSON object keyed by query".to_string(),
            ));
        };

        for (query, response) in entries {
            executor = match response.get("error") {
                Some(error) => {
                    let code = error.get("code").and_then(Value::as_str).unwrap_or("");
                    let message = error.get("message").and_then(Value::as_str).unwrap_or("");
                    executor.with_error(query, ExecutorError::from_status_code(code, message))
                }
                None => match response.get("rows") {
                    Some(rows) => {
                        let mut recorded = executor.with_rows(query, rows_from_json(rows)?);
                        for code in notification_codes(response) {
                            recorded = recorded.with_notification(query, code);
                        }
                        recorded
                    }
                    None => executor.with_rows(query, rows_from_json(response)?),
                },
            };
        }

        Ok(executor)
    }

    /// Number of `run` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn notification_codes(response: &Value) -> Vec<&str> {
    response
        .get("notifications")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().or_else(|| item.get("code").and_then(Value::as_str)))
                .collect()
        })
        .unwrap_or_default()
}

impl Executor for InMemoryExecutor {
    fn run(&self, query: &str, timeout: Option<Duration>) -> std::result::Result<Vec<Row>, ExecutorError> {
        self.run_with_notifications(query, timeout).map(|outcome| outcome.rows)
    }

    fn run_with_notifications(
        &self,
        query: &str,
        _timeout: Option<Duration>,
    ) -> std::result::Result<QueryOutcome, ExecutorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }

        match self.responses.get(query.trim()) {
            Some(response) => response.clone(),
            None => {
                debug!("No recorded response for query: {}", query);
                Err(ExecutorError::Client(format!("no recorded response for query: {}", query.trim())))
            }
        }
    }
}
