use std::collections::BTreeMap;

use log::{debug, warn};

use super::model::Table;
use crate::error::SchemaError;

// ---------------------------------------------------------------------------
// Column detection: logical field → physical column
// ---------------------------------------------------------------------------

/// Resolve a logical field to the first header containing `pattern`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRule {
    pub logical: &'static str,
    pub pattern: &'static str,
}

/// Rules for the sea-level dataset (`Year`, `CSIRO Adjusted Sea Level`, ...).
pub const SEA_LEVEL_RULES: [ColumnRule; 2] = [
    ColumnRule {
        logical: "year",
        pattern: "year",
    },
    ColumnRule {
        logical: "measurement",
        pattern: "adjusted",
    },
];

/// Header names are compared trimmed and lowercased.
pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Fixed mapping from logical names to physical column names, resolved
/// once per loaded table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    resolved: BTreeMap<&'static str, String>,
}

impl ColumnMapping {
    /// Physical column for a logical name.
    pub fn get(&self, logical: &str) -> Result<&str, SchemaError> {
        self.resolved
            .get(logical)
            .map(String::as_str)
            .ok_or_else(|| SchemaError::MissingColumn(logical.to_string()))
    }
}

/// Evaluate every rule against the table's headers.
///
/// The first header in column order wins. Further matches are logged and
/// ignored; no match at all is a schema error.
pub fn resolve(table: &Table, rules: &[ColumnRule]) -> Result<ColumnMapping, SchemaError> {
    let mut resolved = BTreeMap::new();
    for rule in rules {
        let candidates: Vec<&str> = table
            .column_names()
            .into_iter()
            .filter(|name| normalize_header(name).contains(rule.pattern))
            .collect();

        let Some(first) = candidates.first() else {
            return Err(SchemaError::NoMatchingColumn {
                logical: rule.logical.to_string(),
                pattern: rule.pattern.to_string(),
            });
        };
        if candidates.len() > 1 {
            warn!(
                "{} columns match '{}' for {}: {:?}; using '{}'",
                candidates.len(),
                rule.pattern,
                rule.logical,
                candidates,
                first
            );
        }
        debug!("{} -> '{}'", rule.logical, first);
        resolved.insert(rule.logical, first.to_string());
    }
    Ok(ColumnMapping { resolved })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::Column;

    fn epa_headers() -> Table {
        Table::from_columns(vec![
            Column::from_i64(" Year ", [1880]),
            Column::from_f64("CSIRO Adjusted Sea Level", [0.0]),
            Column::from_f64("Lower Error Bound", [-0.9]),
            Column::from_f64("NOAA Adjusted Sea Level", [0.1]),
        ])
        .unwrap()
    }

    #[test]
    fn first_match_in_column_order_wins() {
        let m = resolve(&epa_headers(), &SEA_LEVEL_RULES).unwrap();
        assert_eq!(m.get("year").unwrap(), " Year ");
        assert_eq!(m.get("measurement").unwrap(), "CSIRO Adjusted Sea Level");
    }

    #[test]
    fn no_candidate_is_a_schema_error() {
        let t = Table::from_columns(vec![Column::from_i64("Year", [1880])]).unwrap();
        let err = resolve(&t, &SEA_LEVEL_RULES).unwrap_err();
        assert_eq!(
            err,
            SchemaError::NoMatchingColumn {
                logical: "measurement".into(),
                pattern: "adjusted".into()
            }
        );
    }
}
