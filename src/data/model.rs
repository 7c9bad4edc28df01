use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};
use std::fmt;

use chrono::NaiveDate;

use crate::error::{Result, SchemaError};

// ---------------------------------------------------------------------------
// Value – a single cell of a table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes a CSV column can take.
///
/// Cells are totally ordered so they can key the `BTreeMap`s used for
/// grouping: first by kind (null < bool < integer < float < date < text),
/// then by value, with floats compared by `total_cmp`.
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    String(String),
    Null,
}

impl Value {
    fn kind_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Integer(_) => 2,
            Value::Float(_) => 3,
            Value::Date(_) => 4,
            Value::String(_) => 5,
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// equality follows the ordering, so NaN cells group together
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{s}"),
            Value::Integer(i) => write!(f, "{i}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Null => Ok(()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl Value {
    /// Interpret the value as an `f64`. Booleans count as 0/1.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(i) => Some(*i as f64),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

// ---------------------------------------------------------------------------
// Column – a named sequence of cells
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Column {
            name: name.into(),
            values,
        }
    }

    /// Convenience constructor for numeric test and synthetic data.
    pub fn from_f64(name: impl Into<String>, values: impl IntoIterator<Item = f64>) -> Self {
        Column::new(name, values.into_iter().map(Value::Float).collect())
    }

    pub fn from_i64(name: impl Into<String>, values: impl IntoIterator<Item = i64>) -> Self {
        Column::new(name, values.into_iter().map(Value::Integer).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Whether every non-null cell is numeric (and at least one is present).
    pub fn is_numeric(&self) -> bool {
        let mut seen = false;
        for v in &self.values {
            if v.is_null() {
                continue;
            }
            if v.as_f64().is_none() {
                return false;
            }
            seen = true;
        }
        seen
    }
}

// ---------------------------------------------------------------------------
// Table – ordered, equal-length, uniquely named columns
// ---------------------------------------------------------------------------

/// An immutable-by-convention table. Every transformation returns a new
/// `Table`; nothing mutates the table it was given.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    /// Build a table, checking that names are unique and lengths agree.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map_or(0, Column::len);
        let mut names = HashSet::new();
        for col in &columns {
            if !names.insert(col.name.as_str()) {
                return Err(SchemaError::DuplicateColumn(col.name.clone()).into());
            }
            if col.len() != rows {
                return Err(SchemaError::LengthMismatch {
                    column: col.name.clone(),
                    expected: rows,
                    found: col.len(),
                }
                .into());
            }
        }
        Ok(Table { columns, rows })
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> std::result::Result<&Column, SchemaError> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SchemaError::MissingColumn(name.to_string()))
    }

    /// Fail with the first of `names` that is not present.
    pub fn require(&self, names: &[&str]) -> std::result::Result<(), SchemaError> {
        for name in names {
            self.column(name)?;
        }
        Ok(())
    }

    /// Numeric view of a column: `None` for nulls, an error for text cells.
    pub fn numeric(&self, name: &str) -> std::result::Result<Vec<Option<f64>>, SchemaError> {
        let col = self.column(name)?;
        col.values
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                Value::Null => Ok(None),
                other => other.as_f64().map(Some).ok_or_else(|| SchemaError::NonNumeric {
                    column: name.to_string(),
                    row,
                    value: other.to_string(),
                }),
            })
            .collect()
    }

    /// Names of the columns whose non-null cells are all numeric.
    pub fn numeric_column_names(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.is_numeric())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Return a new table with `column` replacing the same-named column in
    /// place, or appended when the name is new.
    pub fn with_column(&self, column: Column) -> Result<Table> {
        let mut columns = self.columns.clone();
        match columns.iter().position(|c| c.name == column.name) {
            Some(idx) => columns[idx] = column,
            None => columns.push(column),
        }
        if self.columns.is_empty() {
            return Table::from_columns(columns);
        }
        let expected = self.rows;
        if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
            return Err(SchemaError::LengthMismatch {
                column: bad.name.clone(),
                expected,
                found: bad.len(),
            }
            .into());
        }
        Ok(Table {
            columns,
            rows: expected,
        })
    }

    /// Return a new table holding only the rows at `indices`, in that order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: indices.iter().map(|&i| c.values[i].clone()).collect(),
            })
            .collect();
        Table {
            columns,
            rows: indices.len(),
        }
    }

    /// Sorted set of distinct values in a column.
    pub fn unique_values(&self, name: &str) -> std::result::Result<BTreeSet<Value>, SchemaError> {
        Ok(self.column(name)?.values.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VizError;

    fn sample() -> Table {
        Table::from_columns(vec![
            Column::from_i64("a", [1, 2, 3]),
            Column::new("b", vec!["x".into(), Value::Null, "z".into()]),
        ])
        .unwrap()
    }

    #[test]
    fn rejects_unequal_lengths() {
        let err = Table::from_columns(vec![
            Column::from_i64("a", [1, 2]),
            Column::from_i64("b", [1]),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            VizError::Schema(SchemaError::LengthMismatch { ref column, .. }) if column == "b"
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = Table::from_columns(vec![
            Column::from_i64("a", [1]),
            Column::from_i64("a", [2]),
        ])
        .unwrap_err();
        assert!(matches!(err, VizError::Schema(SchemaError::DuplicateColumn(_))));
    }

    #[test]
    fn with_column_leaves_source_untouched() {
        let t = sample();
        let t2 = t.with_column(Column::from_i64("a", [7, 8, 9])).unwrap();
        assert_eq!(t.column("a").unwrap().values[0], Value::Integer(1));
        assert_eq!(t2.column("a").unwrap().values[0], Value::Integer(7));
        assert_eq!(t2.column_names(), vec!["a", "b"]);

        let t3 = t.with_column(Column::from_f64("c", [0.5, 0.5, 0.5])).unwrap();
        assert_eq!(t3.column_names(), vec!["a", "b", "c"]);
    }

    #[test]
    fn numeric_view_reports_text_cells() {
        let t = sample();
        assert_eq!(t.numeric("a").unwrap(), vec![Some(1.0), Some(2.0), Some(3.0)]);
        let err = t.numeric("b").unwrap_err();
        assert_eq!(
            err,
            SchemaError::NonNumeric {
                column: "b".into(),
                row: 0,
                value: "x".into()
            }
        );
        assert_eq!(t.numeric_column_names(), vec!["a"]);
    }

    #[test]
    fn take_rows_keeps_order() {
        let t = sample().take_rows(&[2, 0]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.column("a").unwrap().values, vec![Value::Integer(3), Value::Integer(1)]);
    }

    #[test]
    fn values_order_across_variants() {
        let mut v = vec![Value::from("b"), Value::Integer(2), Value::Null, Value::Float(0.5)];
        v.sort();
        assert_eq!(
            v,
            vec![Value::Null, Value::Integer(2), Value::Float(0.5), Value::from("b")]
        );
    }

    #[test]
    fn nan_cells_group_together() {
        let set: BTreeSet<Value> = [Value::Float(f64::NAN), Value::Float(f64::NAN), Value::Float(1.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
    }
}
