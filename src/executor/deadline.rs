//! Deadline enforcement for executors that cannot cancel on their own.

use crate::executor::{Executor, ExecutorError, QueryOutcome};
use crate::relation::Row;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Runs each query with a timeout on a worker thread and gives up waiting
/// once the timeout elapses. The abandoned worker finishes in the background
/// and its result is discarded.
pub struct DeadlineExecutor<E> {
    inner: Arc<E>,
}

impl<E> DeadlineExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn inner(&self) -> &E {
        &self.inner
    }
}

impl<E: Executor + Send + Sync + 'static> Executor for DeadlineExecutor<E> {
    fn run(&self, query: &str, timeout: Option<Duration>) -> Result<Vec<Row>, ExecutorError> {
        self.run_with_notifications(query, timeout).map(|outcome| outcome.rows)
    }

    fn run_with_notifications(
        &self,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryOutcome, ExecutorError> {
        let Some(limit) = timeout else {
            return self.inner.run_with_notifications(query, None);
        };

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let owned_query = query.to_string();
        thread::Builder::new()
            .name("cypher-eval-query".to_string())
            .spawn(move || {
                // receiver may be gone after a timeout
                let _ = tx.send(inner.run_with_notifications(&owned_query, Some(limit)));
            })
            .map_err(|e| ExecutorError::Unavailable(format!("Failed to spawn query worker: {}", e)))?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                warn!("Query exceeded {:?}, abandoning it", limit);
                Err(ExecutorError::Timeout(format!("no result within {:?}", limit)))
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExecutorError::Unknown(
                "query worker exited without a result".to_string(),
            )),
        }
    }
}
