use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;

use super::model::{Column, Table, Value};
use crate::error::{Result, VizError};

fn io_error(path: &Path, source: std::io::Error) -> VizError {
    VizError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn other_error(path: &Path, err: impl std::fmt::Display) -> VizError {
    io_error(path, std::io::Error::other(err.to_string()))
}

/// Write a table as comma-separated text with a header row.
pub fn write_csv(table: &Table, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| other_error(path, e))?;
    writer
        .write_record(table.column_names())
        .map_err(|e| other_error(path, e))?;
    for row in 0..table.len() {
        writer
            .write_record(table.columns().iter().map(|c| c.values[row].to_string()))
            .map_err(|e| other_error(path, e))?;
    }
    writer.flush().map_err(|e| io_error(path, e))
}

// ---------------------------------------------------------------------------
// Parquet writer
// ---------------------------------------------------------------------------

/// Narrowest Arrow type able to hold every non-null cell of a column.
fn arrow_type(column: &Column) -> DataType {
    let present = || column.values.iter().filter(|v| !v.is_null());
    if present().all(|v| matches!(v, Value::Integer(_))) {
        DataType::Int64
    } else if present().all(|v| matches!(v, Value::Integer(_) | Value::Float(_))) {
        DataType::Float64
    } else if present().all(|v| matches!(v, Value::Bool(_))) {
        DataType::Boolean
    } else if present().all(|v| matches!(v, Value::Date(_))) {
        DataType::Date32
    } else {
        DataType::Utf8
    }
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

fn to_array(column: &Column, data_type: &DataType) -> ArrayRef {
    let vals = &column.values;
    match data_type {
        DataType::Int64 => Arc::new(Int64Array::from(
            vals.iter()
                .map(|v| match v {
                    Value::Integer(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Float64 => Arc::new(Float64Array::from(
            vals.iter().map(Value::as_f64).collect::<Vec<_>>(),
        )),
        DataType::Boolean => Arc::new(BooleanArray::from(
            vals.iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        )),
        DataType::Date32 => Arc::new(Date32Array::from(
            vals.iter()
                .map(|v| v.as_date().map(|d| (d - epoch()).num_days() as i32))
                .collect::<Vec<_>>(),
        )),
        _ => Arc::new(StringArray::from(
            vals.iter()
                .map(|v| (!v.is_null()).then(|| v.to_string()))
                .collect::<Vec<_>>(),
        )),
    }
}

/// Write a table as a single-row-group Parquet file.
pub fn write_parquet(table: &Table, path: &Path) -> Result<()> {
    let types: Vec<DataType> = table.columns().iter().map(arrow_type).collect();
    let schema = Arc::new(Schema::new(
        table
            .columns()
            .iter()
            .zip(&types)
            .map(|(c, t)| Field::new(c.name.clone(), t.clone(), true))
            .collect::<Vec<_>>(),
    ));
    let arrays: Vec<ArrayRef> = table
        .columns()
        .iter()
        .zip(&types)
        .map(|(c, t)| to_array(c, t))
        .collect();

    let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(|e| other_error(path, e))?;
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).map_err(|e| other_error(path, e))?;
    writer.write(&batch).map_err(|e| other_error(path, e))?;
    writer.close().map_err(|e| other_error(path, e))?;
    Ok(())
}
