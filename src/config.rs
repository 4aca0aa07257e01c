//! Evaluation Configuration
//!
//! Settings shared by the metrics: executor timeout, permutation-search
//! limits and the canonicalization policy. Loaded from a JSON file or from
//! `CYPHER_EVAL_*` environment variables (a `.env` file is honored).

use crate::error::{EvalError, Result};
use crate::permutation::{DEFAULT_EXHAUSTIVE_COLUMN_LIMIT, DEFAULT_SAMPLE_ROWS};
use crate::relation::ColumnOrder;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const ENV_PREFIX: &str = "CYPHER_EVAL_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Deadline handed to the executor for generated queries
    pub timeout_secs: u64,

    /// Rows sampled to prune column candidates on wide relations
    pub sample_rows: usize,

    /// Relations up to this many columns get an exhaustive search
    pub exhaustive_column_limit: usize,

    /// Treat list cells as unordered collections
    pub unorder_nested_lists: bool,

    pub column_order: ColumnOrder,

    /// Seed for the sampling step; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            exhaustive_column_limit: DEFAULT_EXHAUSTIVE_COLUMN_LIMIT,
            unorder_nested_lists: true,
            column_order: ColumnOrder::Sorted,
            seed: None,
        }
    }
}

impl EvalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EvalConfig = serde_json::from_str(&content)?;
        debug!("Loaded evaluation config from {}", path.display());
        Ok(config)
    }

    /// Load from `CYPHER_EVAL_*` environment variables
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup (unset keys keep their defaults)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(v) = get("TIMEOUT_SECS") {
            config.timeout_secs = parse_setting("TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("SAMPLE_ROWS") {
            config.sample_rows = parse_setting("SAMPLE_ROWS", &v)?;
        }
        if let Some(v) = get("EXHAUSTIVE_COLUMN_LIMIT") {
            config.exhaustive_column_limit = parse_setting("EXHAUSTIVE_COLUMN_LIMIT", &v)?;
        }
        if let Some(v) = get("UNORDER_NESTED_LISTS") {
            config.unorder_nested_lists = parse_setting("UNORDER_NESTED_LISTS", &v)?;
        }
        if let Some(v) = get("COLUMN_ORDER") {
            config.column_order = match v.trim().to_lowercase().as_str() {
                "sorted" => ColumnOrder::Sorted,
                "first_row" | "first-row" => ColumnOrder::FirstRow,
                other => {
                    return Err(EvalError::Config(format!(
                        "{}COLUMN_ORDER: unknown policy '{}'",
                        ENV_PREFIX, other
                    )))
                }
            };
        }
        if let Some(v) = get("SEED") {
            config.seed = Some(parse_setting("SEED", &v)?);
        }

        Ok(config)
    }
}

fn parse_setting<T: FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        EvalError::Config(format!("{}{}: invalid value '{}': {}", ENV_PREFIX, name, raw, e))
    })
}
