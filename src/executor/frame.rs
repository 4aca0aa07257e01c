//! DataFrame adapter
//!
//! Converts a polars `DataFrame` (e.g. a result exported by a driver or read
//! from a parquet dump) into rows of cells.

use crate::error::{EvalError, Result};
use crate::relation::Row;
use crate::value::Cell;
use chrono::{DateTime, NaiveDate};
use polars::prelude::*;

pub fn rows_from_dataframe(df: &DataFrame) -> Result<Vec<Row>> {
    let names: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
    let columns = names
        .iter()
        .map(|name| df.column(name))
        .collect::<PolarsResult<Vec<_>>>()?;

    let mut rows = Vec::with_capacity(df.height());
    for row_idx in 0..df.height() {
        let mut row = Row::new();
        for (name, series) in names.iter().zip(&columns) {
            row.insert(name.clone(), cell_from_any(series.get(row_idx)?)?);
        }
        rows.push(row);
    }

    Ok(rows)
}

fn cell_from_any(value: AnyValue<'_>) -> Result<Cell> {
    let cell = match value {
        AnyValue::Null => Cell::Null,
        AnyValue::Boolean(b) => Cell::Bool(b),
        AnyValue::String(s) => Cell::Text(s.to_string()),
        AnyValue::Int8(i) => Cell::Int(i64::from(i)),
        AnyValue::Int16(i) => Cell::Int(i64::from(i)),
        AnyValue::Int32(i) => Cell::Int(i64::from(i)),
        AnyValue::Int64(i) => Cell::Int(i),
        AnyValue::UInt8(u) => Cell::Int(i64::from(u)),
        AnyValue::UInt16(u) => Cell::Int(i64::from(u)),
        AnyValue::UInt32(u) => Cell::Int(i64::from(u)),
        AnyValue::UInt64(u) => match i64::try_from(u) {
            Ok(i) => Cell::Int(i),
            Err(_) => Cell::Float(u as f64),
        },
        AnyValue::Float32(f) => Cell::Float(f64::from(f)),
        AnyValue::Float64(f) => Cell::Float(f),
        AnyValue::Date(days) => Cell::Date(date_from_epoch_days(days)?),
        AnyValue::Datetime(ts, unit, _) => datetime_from_timestamp(ts, unit)?,
        AnyValue::List(series) => {
            let items = (0..series.len())
                .map(|i| series.get(i).map_err(EvalError::from).and_then(cell_from_any))
                .collect::<Result<Vec<_>>>()?;
            Cell::List(items)
        }
        other => {
            return Err(EvalError::UnhashableValue(format!(
                "unsupported column type {}",
                other.dtype()
            )))
        }
    };
    Ok(cell)
}

fn date_from_epoch_days(days: i32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(1970, 1, 1)
        .and_then(|epoch| epoch.checked_add_signed(chrono::Duration::days(i64::from(days))))
        .ok_or_else(|| EvalError::UnhashableValue(format!("date out of range: {} days", days)))
}

fn datetime_from_timestamp(ts: i64, unit: TimeUnit) -> Result<Cell> {
    let per_second: i64 = match unit {
        TimeUnit::Nanoseconds => 1_000_000_000,
        TimeUnit::Microseconds => 1_000_000,
        TimeUnit::Milliseconds => 1_000,
    };
    let secs = ts.div_euclid(per_second);
    let nanos = ts.rem_euclid(per_second) * (1_000_000_000 / per_second);

    DateTime::from_timestamp(secs, nanos as u32)
        .map(|dt| Cell::DateTime(dt.naive_utc()))
        .ok_or_else(|| EvalError::UnhashableValue(format!("timestamp out of range: {}", ts)))
}
