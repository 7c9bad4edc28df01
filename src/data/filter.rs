use log::debug;

use super::model::Table;
use crate::error::{Result, VizError};
use crate::stats;

// ---------------------------------------------------------------------------
// Row rules: predicates a row must satisfy to survive cleaning
// ---------------------------------------------------------------------------

/// A single row-level rule. Rules are always combined with AND.
#[derive(Debug, Clone, PartialEq)]
pub enum RowRule {
    /// Keep rows whose `column` lies within the inclusive quantile band
    /// `[quantile(lower_q), quantile(upper_q)]` of the table being filtered.
    QuantileBand {
        column: String,
        lower_q: f64,
        upper_q: f64,
    },
    /// Keep rows where `lower <= upper` (e.g. diastolic <= systolic).
    NotGreaterThan { lower: String, upper: String },
}

impl RowRule {
    pub fn quantile_band(column: &str, lower_q: f64, upper_q: f64) -> Self {
        RowRule::QuantileBand {
            column: column.to_string(),
            lower_q,
            upper_q,
        }
    }

    pub fn not_greater_than(lower: &str, upper: &str) -> Self {
        RowRule::NotGreaterThan {
            lower: lower.to_string(),
            upper: upper.to_string(),
        }
    }
}

/// A rule with its data-dependent bounds resolved against one table.
enum Resolved {
    Band {
        values: Vec<Option<f64>>,
        low: f64,
        high: f64,
    },
    Ordered {
        lower: Vec<Option<f64>>,
        upper: Vec<Option<f64>>,
    },
}

impl Resolved {
    fn passes(&self, row: usize) -> bool {
        match self {
            Resolved::Band { values, low, high } => {
                matches!(values[row], Some(v) if v >= *low && v <= *high)
            }
            Resolved::Ordered { lower, upper } => {
                matches!((lower[row], upper[row]), (Some(a), Some(b)) if a <= b)
            }
        }
    }
}

/// Inclusive `(low, high)` bounds of a quantile band over the current
/// values of `column`. Nulls are ignored.
pub fn quantile_bounds(table: &Table, column: &str, lower_q: f64, upper_q: f64) -> Result<(f64, f64)> {
    check_quantiles(lower_q, upper_q)?;
    let present: Vec<f64> = table.numeric(column)?.into_iter().flatten().collect();
    if present.is_empty() {
        return Err(VizError::insufficient(
            "quantile trim",
            format!("column '{column}' has no numeric values"),
        ));
    }
    let mut sorted = present;
    sorted.sort_by(f64::total_cmp);
    Ok((
        stats::quantile_sorted(&sorted, lower_q),
        stats::quantile_sorted(&sorted, upper_q),
    ))
}

fn check_quantiles(lower_q: f64, upper_q: f64) -> Result<()> {
    let in_unit = |q: f64| (0.0..=1.0).contains(&q);
    if !in_unit(lower_q) || !in_unit(upper_q) || lower_q > upper_q {
        return Err(VizError::Config(format!(
            "quantile band ({lower_q}, {upper_q}) must satisfy 0 <= lower <= upper <= 1"
        )));
    }
    Ok(())
}

fn resolve(table: &Table, rule: &RowRule) -> Result<Resolved> {
    match rule {
        RowRule::QuantileBand {
            column,
            lower_q,
            upper_q,
        } => {
            let (low, high) = quantile_bounds(table, column, *lower_q, *upper_q)?;
            debug!("{column}: keeping [{low}, {high}]");
            Ok(Resolved::Band {
                values: table.numeric(column)?,
                low,
                high,
            })
        }
        RowRule::NotGreaterThan { lower, upper } => Ok(Resolved::Ordered {
            lower: table.numeric(lower)?,
            upper: table.numeric(upper)?,
        }),
    }
}

/// Return indices of rows that pass every rule.
///
/// All bounds are computed on `table` before any row is dropped, so the
/// order of `rules` does not change the outcome.
pub fn filtered_indices(table: &Table, rules: &[RowRule]) -> Result<Vec<usize>> {
    let resolved = rules
        .iter()
        .map(|r| resolve(table, r))
        .collect::<Result<Vec<_>>>()?;

    Ok((0..table.len())
        .filter(|&row| resolved.iter().all(|r| r.passes(row)))
        .collect())
}

/// Apply `rules` and return the surviving rows as a new table.
pub fn apply_rules(table: &Table, rules: &[RowRule]) -> Result<Table> {
    let keep = filtered_indices(table, rules)?;
    debug!("row filter kept {} of {} rows", keep.len(), table.len());
    Ok(table.take_rows(&keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{Column, Value};
    use crate::error::SchemaError;

    fn table() -> Table {
        Table::from_columns(vec![
            Column::from_f64("v", (0..=100).map(f64::from)),
            Column::from_i64("lo", (0..=100).map(|i| if i % 10 == 0 { 200 } else { 80 })),
            Column::from_i64("hi", std::iter::repeat(120).take(101)),
        ])
        .unwrap()
    }

    #[test]
    fn trim_stays_within_original_bounds() {
        let t = table();
        let (low, high) = quantile_bounds(&t, "v", 0.025, 0.975).unwrap();
        let out = apply_rules(&t, &[RowRule::quantile_band("v", 0.025, 0.975)]).unwrap();
        assert!(out.len() <= t.len());
        let kept: Vec<f64> = out.numeric("v").unwrap().into_iter().flatten().collect();
        let min = kept.iter().copied().fold(f64::INFINITY, f64::min);
        let max = kept.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(min >= low && max <= high);
        // 2.5 and 97.5 are the bounds; 3..=97 survive
        assert_eq!(out.len(), 95);
    }

    #[test]
    fn rules_are_anded() {
        let t = table();
        let rules = [
            RowRule::not_greater_than("lo", "hi"),
            RowRule::quantile_band("v", 0.025, 0.975),
        ];
        let out = apply_rules(&t, &rules).unwrap();
        // 3..=97 minus the multiples of ten in that range (10..=90 → 9 rows)
        assert_eq!(out.len(), 95 - 9);
        assert!(out
            .column("lo")
            .unwrap()
            .values
            .iter()
            .all(|v| *v == Value::Integer(80)));
    }

    #[test]
    fn rule_order_does_not_matter() {
        let t = table();
        let a = filtered_indices(
            &t,
            &[
                RowRule::not_greater_than("lo", "hi"),
                RowRule::quantile_band("v", 0.1, 0.9),
            ],
        )
        .unwrap();
        let b = filtered_indices(
            &t,
            &[
                RowRule::quantile_band("v", 0.1, 0.9),
                RowRule::not_greater_than("lo", "hi"),
            ],
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_column_is_named() {
        let err = apply_rules(&table(), &[RowRule::quantile_band("height", 0.0, 1.0)]).unwrap_err();
        assert!(matches!(
            err,
            VizError::Schema(SchemaError::MissingColumn(ref c)) if c == "height"
        ));
    }

    #[test]
    fn inverted_band_is_rejected() {
        let err = apply_rules(&table(), &[RowRule::quantile_band("v", 0.9, 0.1)]).unwrap_err();
        assert!(matches!(err, VizError::Config(_)));
    }

    #[test]
    fn null_cells_fail_rules() {
        let t = Table::from_columns(vec![Column::new(
            "v",
            vec![Value::Integer(1), Value::Null, Value::Integer(3)],
        )])
        .unwrap();
        let out = filtered_indices(&t, &[RowRule::quantile_band("v", 0.0, 1.0)]).unwrap();
        assert_eq!(out, vec![0, 2]);
    }

    #[test]
    fn band_over_all_null_column_is_insufficient() {
        let t = Table::from_columns(vec![Column::new("v", vec![Value::Null, Value::Null])]).unwrap();
        assert!(matches!(
            quantile_bounds(&t, "v", 0.1, 0.9),
            Err(VizError::InsufficientData { .. })
        ));
    }
}
