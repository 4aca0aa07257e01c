use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cypher_eval::cypher::split_into_clauses;
use cypher_eval::relation::rows_from_json;
use cypher_eval::report::read_records_from_path;
use cypher_eval::{
    build_provenance_query, exact_match_rows, summarize, DeadlineExecutor, EvalConfig, Evaluator,
    InMemoryExecutor, RecordWriter,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cypher-eval")]
#[command(about = "Result-equivalence and provenance-similarity scoring for Cypher queries")]
struct Args {
    /// JSON config file (default: CYPHER_EVAL_* environment variables)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compare two executed results, each a JSON array of row objects
    Compare {
        pred: PathBuf,
        target: PathBuf,
        /// Row order must match
        #[arg(long)]
        ordered: bool,
    },
    /// Print the provenance query of a Cypher query
    Provenance {
        query: String,
        /// Return full nodes and relationships instead of element ids
        #[arg(long)]
        full: bool,
    },
    /// Print the top-level clauses of a Cypher query
    Clauses { query: String },
    /// Score prediction/reference pairs against recorded query responses
    Evaluate {
        /// CSV with columns id, pred_query, target_query
        pairs: PathBuf,
        /// JSON object mapping query text to its rows or error
        #[arg(short, long)]
        responses: PathBuf,
        /// Output CSV of evaluation records
        #[arg(short, long, default_value = "scores.csv")]
        out: PathBuf,
    },
    /// Summarize a CSV of evaluation records
    Summarize { records: PathBuf },
}

#[derive(Deserialize)]
struct QueryPair {
    id: String,
    pred_query: String,
    target_query: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EvalConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EvalConfig::from_env()?,
    };

    match args.command {
        Command::Compare { pred, target, ordered } => {
            let pred_rows = rows_from_json(&read_json(&pred)?)?;
            let target_rows = rows_from_json(&read_json(&target)?)?;
            let score = if ordered {
                cypher_eval::ExecutionComparator::new(&config)
                    .score(&pred_rows, &target_rows, true)?
            } else {
                exact_match_rows(&pred_rows, &target_rows, &config)
            };
            println!("{}", score);
        }
        Command::Provenance { query, full } => {
            println!("{}", build_provenance_query(&query, !full));
        }
        Command::Clauses { query } => {
            for clause in split_into_clauses(&query) {
                println!("{:<15} {}", clause.kind.to_string(), clause.text);
            }
        }
        Command::Evaluate { pairs, responses, out } => {
            let recorded = InMemoryExecutor::from_json(&read_json(&responses)?)?;
            let executor = DeadlineExecutor::new(recorded);
            let evaluator = Evaluator::new(&executor, config);

            let mut reader = csv::Reader::from_path(&pairs)
                .with_context(|| format!("Failed to open {}", pairs.display()))?;
            let mut writer = RecordWriter::create(&out)?;
            let mut records = Vec::new();
            for pair in reader.deserialize() {
                let pair: QueryPair = pair?;
                let record = evaluator.evaluate(&pair.id, &pair.pred_query, &pair.target_query);
                writer.write(&record)?;
                records.push(record);
            }
            writer.flush()?;

            info!("Wrote {} records to {}", records.len(), out.display());
            println!("{}", summarize(&records));
        }
        Command::Summarize { records } => {
            let records = read_records_from_path(&records)?;
            println!("{}", summarize(&records));
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(serde_json::from_str(&content)?)
}
