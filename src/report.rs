//! Evaluation Records
//!
//! One CSV row per scored prediction, and summary statistics over a run.

use crate::error::Result;
use crate::metrics::Diagnosis;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    pub pred_query: String,
    pub target_query: String,
    /// Whether the reference query itself executed
    pub target_ok: bool,
    pub executable: f64,
    pub exact_match: f64,
    pub execution_accuracy: f64,
    pub jaccard: f64,
    pub diagnosis: Diagnosis,
}

/// CSV sink for evaluation records
pub struct RecordWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl RecordWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            writer: csv::Writer::from_path(path)?,
        })
    }
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }

    pub fn write(&mut self, record: &EvaluationRecord) -> Result<()> {
        self.writer.serialize(record)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::EvalError::Io(e.into_error()))
    }
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<EvaluationRecord>> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for record in reader.deserialize() {
        records.push(record?);
    }
    Ok(records)
}

pub fn read_records_from_path(path: &Path) -> Result<Vec<EvaluationRecord>> {
    read_records(File::open(path)?)
}

/// Mean scores over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub count: usize,
    pub executable: f64,
    pub exact_match: f64,
    pub execution_accuracy: f64,
    pub jaccard: f64,
}

impl ScoreSummary {
    fn from_records<'a, I: IntoIterator<Item = &'a EvaluationRecord>>(records: I) -> Self {
        let mut summary = ScoreSummary::default();
        for record in records {
            summary.count += 1;
            summary.executable += record.executable;
            summary.exact_match += record.exact_match;
            summary.execution_accuracy += record.execution_accuracy;
            summary.jaccard += record.jaccard;
        }
        if summary.count > 0 {
            let n = summary.count as f64;
            summary.executable /= n;
            summary.exact_match /= n;
            summary.execution_accuracy /= n;
            summary.jaccard /= n;
        }
        summary
    }
}

impl fmt::Display for ScoreSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} executable={:.4} exact_match={:.4} execution_accuracy={:.4} jaccard={:.4}",
            self.count, self.executable, self.exact_match, self.execution_accuracy, self.jaccard
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub all: ScoreSummary,
    /// Only records whose reference query executed
    pub reference_ok: ScoreSummary,
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "all:          {}", self.all)?;
        write!(f, "reference ok: {}", self.reference_ok)
    }
}

pub fn summarize(records: &[EvaluationRecord]) -> EvaluationSummary {
    EvaluationSummary {
        all: ScoreSummary::from_records(records),
        reference_ok: ScoreSummary::from_records(records.iter().filter(|r| r.target_ok)),
    }
}
