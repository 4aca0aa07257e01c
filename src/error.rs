use crate::executor::ExecutorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Unhashable value: {0}")]
    UnhashableValue(String),

    #[error("Query invalid: {0}")]
    QueryInvalid(ExecutorError),

    #[error("Executor unavailable: {0}")]
    ExecutorUnavailable(ExecutorError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Polars error: {0}")]
    Polars(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl From<ExecutorError> for EvalError {
    fn from(err: ExecutorError) -> Self {
        if err.is_query_invalid() {
            EvalError::QueryInvalid(err)
        } else {
            EvalError::ExecutorUnavailable(err)
        }
    }
}

impl From<polars::prelude::PolarsError> for EvalError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        EvalError::Polars(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
