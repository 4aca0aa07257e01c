//! Query Executor Boundary
//!
//! The evaluator never talks to a graph engine directly. It goes through
//! [`Executor`], and adapters translate engine failures into the closed
//! [`ExecutorError`] taxonomy.

pub mod deadline;
pub mod frame;
pub mod memory;

pub use deadline::DeadlineExecutor;
pub use frame::rows_from_dataframe;
pub use memory::InMemoryExecutor;

use crate::relation::Row;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure reported by an executor
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutorError {
    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Client error: {0}")]
    Client(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown executor error: {0}")]
    Unknown(String),
}

impl ExecutorError {
    /// The query itself is at fault (as opposed to the engine or transport)
    pub fn is_query_invalid(&self) -> bool {
        matches!(
            self,
            ExecutorError::Syntax(_)
                | ExecutorError::Type(_)
                | ExecutorError::Client(_)
                | ExecutorError::Timeout(_)
        )
    }

    /// Classify a Neo4j status code such as
    /// `Neo.ClientError.Statement.SyntaxError`.
    pub fn from_status_code(code: &str, message: impl Into<String>) -> Self {
        let message = message.into();

        if code.ends_with("SyntaxError") {
            return ExecutorError::Syntax(message);
        }
        if code.ends_with("TypeError") {
            return ExecutorError::Type(message);
        }
        if code.contains("TransactionTimedOut") || code.contains("Timeout") {
            return ExecutorError::Timeout(message);
        }
        if code.starts_with("Neo.ClientError") || code.starts_with("Neo.DatabaseError") {
            return ExecutorError::Client(message);
        }
        if code.starts_with("Neo.TransientError") {
            return ExecutorError::Unavailable(message);
        }

        ExecutorError::Unknown(format!("{}: {}", code, message))
    }
}

/// Rows of a successful query plus the notification codes the engine raised
/// while planning or running it, e.g.
/// `Neo.ClientNotification.Statement.CartesianProduct`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub notifications: Vec<String>,
}

impl QueryOutcome {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            notifications: Vec::new(),
        }
    }
}

/// Runs a query text against a graph and returns its rows.
///
/// `timeout` of `None` means no limit. Implementations honoring a timeout
/// report [`ExecutorError::Timeout`] when it elapses; wrap any executor in
/// [`DeadlineExecutor`] to enforce one from the outside.
pub trait Executor {
    fn run(&self, query: &str, timeout: Option<Duration>) -> Result<Vec<Row>, ExecutorError>;

    /// Like [`Executor::run`], keeping the engine's notifications. Executors
    /// that cannot observe notifications report none.
    fn run_with_notifications(
        &self,
        query: &str,
        timeout: Option<Duration>,
    ) -> Result<QueryOutcome, ExecutorError> {
        self.run(query, timeout).map(QueryOutcome::new)
    }
}

macro_rules! forward_executor {
    ($wrapper:ty) => {
        impl<E: Executor + ?Sized> Executor for $wrapper {
            fn run(&self, query: &str, timeout: Option<Duration>) -> Result<Vec<Row>, ExecutorError> {
                (**self).run(query, timeout)
            }

            fn run_with_notifications(
                &self,
                query: &str,
                timeout: Option<Duration>,
            ) -> Result<QueryOutcome, ExecutorError> {
                (**self).run_with_notifications(query, timeout)
            }
        }
    };
}

forward_executor!(&E);
forward_executor!(Box<E>);
forward_executor!(Arc<E>);
