use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Date32Array, Date64Array, Float32Array, Float64Array,
    Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use chrono::{NaiveDate, NaiveDateTime};
use log::{info, warn};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{Column, Table, Value};
use super::synthetic::SyntheticDataset;
use crate::error::{Result, VizError};

// ---------------------------------------------------------------------------
// Loader abstraction
// ---------------------------------------------------------------------------

/// Something that can produce a table for a pipeline run.
pub trait Loader {
    /// Human-readable description for log lines.
    fn describe(&self) -> String;

    fn load(&self) -> Result<Table>;
}

/// Read a table from a file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    pub path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl Loader for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn load(&self) -> Result<Table> {
        if !self.path.is_file() {
            return Err(VizError::SourceUnavailable(format!(
                "{} does not exist",
                self.path.display()
            )));
        }
        load_file(&self.path)
    }
}

/// Ask the user to pick a file through the native file dialog.
#[derive(Debug, Clone)]
pub struct InteractiveSource {
    pub title: String,
}

impl Loader for InteractiveSource {
    fn describe(&self) -> String {
        format!("file dialog \"{}\"", self.title)
    }

    fn load(&self) -> Result<Table> {
        let file = rfd::FileDialog::new()
            .set_title(&self.title)
            .add_filter("Supported files", &["csv", "txt", "json", "parquet", "pq"])
            .add_filter("CSV", &["csv", "txt"])
            .add_filter("JSON", &["json"])
            .add_filter("Parquet", &["parquet", "pq"])
            .pick_file();

        match file {
            Some(path) => {
                info!("selected {}", path.display());
                FileSource::new(path).load()
            }
            None => Err(VizError::SourceUnavailable(
                "file selection was cancelled".to_string(),
            )),
        }
    }
}

/// Deterministic generated sample data.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    pub dataset: SyntheticDataset,
    pub rows: usize,
    pub seed: u64,
}

impl Loader for SyntheticSource {
    fn describe(&self) -> String {
        format!(
            "synthetic {:?} sample ({} rows, seed {})",
            self.dataset, self.rows, self.seed
        )
    }

    fn load(&self) -> Result<Table> {
        self.dataset.generate(self.rows, self.seed)
    }
}

/// Load from `primary`; only when it reports the source as unavailable,
/// try `fallback`. Any other error is returned as is.
pub fn load_with_fallback(primary: &dyn Loader, fallback: Option<&dyn Loader>) -> Result<Table> {
    info!("loading from {}", primary.describe());
    match primary.load() {
        Err(VizError::SourceUnavailable(reason)) => match fallback {
            Some(fb) => {
                warn!("{reason}; falling back to {}", fb.describe());
                fb.load()
            }
            None => Err(VizError::SourceUnavailable(reason)),
        },
        other => other,
    }
}

// ---------------------------------------------------------------------------
// File dispatch
// ---------------------------------------------------------------------------

/// Load a table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv` / `.txt` – header row, delimiter detected from the header line
/// * `.json`         – `[{ "column": value, ... }, ...]`
/// * `.parquet`      – flat scalar columns
pub fn load_file(path: &Path) -> Result<Table> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" | "txt" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(VizError::parse(
            path.display().to_string(),
            format!("unsupported file extension: .{other}"),
        )),
    }?;
    info!(
        "loaded {} rows with columns {:?}",
        table.len(),
        table.column_names()
    );
    Ok(table)
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        VizError::SourceUnavailable(format!("cannot open {}: {e}", path.display()))
    })
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

const DELIMITERS: [u8; 4] = [b',', b';', b'\t', b'|'];

/// Pick the candidate delimiter occurring most often in the header line.
/// Ties go to the earlier candidate, so a single-column file reads as CSV.
pub fn sniff_delimiter(header_line: &str) -> u8 {
    let mut best = (b',', 0usize);
    for d in DELIMITERS {
        let n = header_line.bytes().filter(|b| *b == d).count();
        if n > best.1 {
            best = (d, n);
        }
    }
    best.0
}

fn load_csv(path: &Path) -> Result<Table> {
    let context = path.display().to_string();

    let mut header_line = String::new();
    BufReader::new(open(path)?)
        .read_line(&mut header_line)
        .map_err(|e| VizError::parse(&context, e))?;
    let delimiter = sniff_delimiter(&header_line);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(open(path)?);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| VizError::parse(&context, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| VizError::parse(format!("{context} row {row_no}"), e))?;
        for (col_idx, values) in columns.iter_mut().enumerate() {
            values.push(guess_value_type(record.get(col_idx).unwrap_or("")));
        }
    }

    Table::from_columns(
        headers
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )
}

/// Infer a cell's type from its text.
pub fn guess_value_type(s: &str) -> Value {
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("na") {
        return Value::Null;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = s.parse::<f64>() {
        return Value::Float(f);
    }
    if s == "true" || s == "false" || s == "True" || s == "False" {
        return Value::Bool(s.eq_ignore_ascii_case("true"));
    }
    if let Some(d) = parse_date(s) {
        return Value::Date(d);
    }
    Value::String(s.to_string())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, the default `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "date": "2016-05-09", "value": 1201 },
///   ...
/// ]
/// ```
///
/// Columns are taken in first-seen order; keys missing from a record are null.
fn load_json(path: &Path) -> Result<Table> {
    let context = path.display().to_string();
    let root: JsonValue =
        serde_json::from_reader(BufReader::new(open(path)?)).map_err(|e| VizError::parse(&context, e))?;

    let records = root
        .as_array()
        .ok_or_else(|| VizError::parse(&context, "expected top-level JSON array"))?;

    let mut order: Vec<String> = Vec::new();
    let mut rows: Vec<BTreeMap<String, Value>> = Vec::with_capacity(records.len());
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| VizError::parse(&context, format!("row {i} is not a JSON object")))?;
        let mut row = BTreeMap::new();
        for (key, val) in obj {
            if !order.contains(key) {
                order.push(key.clone());
            }
            row.insert(key.clone(), json_to_value(val));
        }
        rows.push(row);
    }

    Table::from_columns(
        order
            .into_iter()
            .map(|name| {
                let values = rows
                    .iter_mut()
                    .map(|r| r.remove(&name).unwrap_or(Value::Null))
                    .collect();
                Column::new(name, values)
            })
            .collect(),
    )
}

fn json_to_value(val: &JsonValue) -> Value {
    match val {
        JsonValue::String(s) => parse_date(s)
            .map(Value::Date)
            .unwrap_or_else(|| Value::String(s.clone())),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        JsonValue::Bool(b) => Value::Bool(*b),
        JsonValue::Null => Value::Null,
        other => Value::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of flat scalar columns.
///
/// Works with files written by **Pandas** (`df.to_parquet()`), **Polars**
/// (`df.write_parquet()`) and [`crate::data::writer::write_parquet`].
fn load_parquet(path: &Path) -> Result<Table> {
    let context = path.display().to_string();
    let builder = ParquetRecordBatchReaderBuilder::try_new(open(path)?)
        .map_err(|e| VizError::parse(&context, e))?;
    let names: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().map_err(|e| VizError::parse(&context, e))?;

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for batch_result in reader {
        let batch = batch_result.map_err(|e| VizError::parse(&context, e))?;
        for (col_idx, values) in columns.iter_mut().enumerate() {
            let col = batch.column(col_idx);
            for row in 0..batch.num_rows() {
                values.push(extract_value(col, row));
            }
        }
    }

    Table::from_columns(
        names
            .into_iter()
            .zip(columns)
            .map(|(name, values)| Column::new(name, values))
            .collect(),
    )
}

/// Extract a single cell from an Arrow column at a given row.
fn extract_value(col: &Arc<dyn Array>, row: usize) -> Value {
    if col.is_null(row) {
        return Value::Null;
    }
    let any = col.as_any();
    match col.data_type() {
        DataType::Utf8 => any
            .downcast_ref::<StringArray>()
            .map_or(Value::Null, |s| Value::String(s.value(row).to_string())),
        DataType::LargeUtf8 => Value::String(col.as_string::<i64>().value(row).to_string()),
        DataType::Int32 => any
            .downcast_ref::<Int32Array>()
            .map_or(Value::Null, |a| Value::Integer(i64::from(a.value(row)))),
        DataType::Int64 => any
            .downcast_ref::<Int64Array>()
            .map_or(Value::Null, |a| Value::Integer(a.value(row))),
        DataType::Float32 => any
            .downcast_ref::<Float32Array>()
            .map_or(Value::Null, |a| Value::Float(f64::from(a.value(row)))),
        DataType::Float64 => any
            .downcast_ref::<Float64Array>()
            .map_or(Value::Null, |a| Value::Float(a.value(row))),
        DataType::Boolean => any
            .downcast_ref::<BooleanArray>()
            .map_or(Value::Null, |a| Value::Bool(a.value(row))),
        DataType::Date32 => any
            .downcast_ref::<Date32Array>()
            .and_then(|a| a.value_as_date(row))
            .map_or(Value::Null, Value::Date),
        DataType::Date64 => any
            .downcast_ref::<Date64Array>()
            .and_then(|a| a.value_as_date(row))
            .map_or(Value::Null, Value::Date),
        other => Value::String(format!("{other:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn sniffs_semicolons() {
        assert_eq!(sniff_delimiter("Year;CSIRO Adjusted Sea Level"), b';');
        assert_eq!(sniff_delimiter("Year,CSIRO Adjusted Sea Level"), b',');
        assert_eq!(sniff_delimiter("value"), b',');
    }

    #[test]
    fn guesses_cell_types() {
        assert_eq!(guess_value_type("170"), Value::Integer(170));
        assert_eq!(guess_value_type("62.5"), Value::Float(62.5));
        assert_eq!(guess_value_type(""), Value::Null);
        assert_eq!(
            guess_value_type("2016-05-09"),
            Value::Date(NaiveDate::from_ymd_opt(2016, 5, 9).unwrap())
        );
        assert_eq!(guess_value_type("A"), Value::String("A".into()));
    }

    #[test]
    fn loads_semicolon_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "sea.csv", "Year;CSIRO Adjusted Sea Level\n1880;0.0\n1881;0.22\n");
        let t = FileSource::new(&path).load().unwrap();
        assert_eq!(t.column_names(), vec!["Year", "CSIRO Adjusted Sea Level"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.column("Year").unwrap().values[1], Value::Integer(1881));
    }

    #[test]
    fn loads_json_records_with_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "pv.json",
            r#"[{"date": "2016-05-09", "value": 1201}, {"date": "2016-05-10"}]"#,
        );
        let t = load_file(&path).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.column("value").unwrap().values[1], Value::Null);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let err = FileSource::new("/definitely/not/here.csv").load().unwrap_err();
        assert!(matches!(err, VizError::SourceUnavailable(_)));
    }

    #[test]
    fn fallback_only_on_unavailable() {
        let missing = FileSource::new("/definitely/not/here.csv");
        let synthetic = SyntheticSource {
            dataset: SyntheticDataset::PageViews,
            rows: 10,
            seed: 1,
        };
        let t = load_with_fallback(&missing, Some(&synthetic)).unwrap();
        assert_eq!(t.len(), 10);

        let err = load_with_fallback(&missing, None).unwrap_err();
        assert!(matches!(err, VizError::SourceUnavailable(_)));

        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "data.xlsx", "");
        let err = load_with_fallback(&FileSource::new(bad), Some(&synthetic)).unwrap_err();
        assert!(matches!(err, VizError::Parse { .. }));
    }
}
