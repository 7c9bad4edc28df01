use log::debug;

use crate::data::model::{Column, Table, Value};
use crate::error::{Result, SchemaError};

/// BMI above which a subject counts as overweight.
pub const OVERWEIGHT_BMI: f64 = 25.0;

/// Columns re-encoded to 0 (normal) / 1 (above normal).
pub const BINARY_ENCODED: [&str; 2] = ["cholesterol", "gluc"];

fn required_numbers(table: &Table, name: &str) -> Result<Vec<f64>> {
    table
        .numeric(name)?
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.ok_or_else(|| {
                SchemaError::NonNumeric {
                    column: name.to_string(),
                    row,
                    value: "null".to_string(),
                }
                .into()
            })
        })
        .collect()
}

/// Add `overweight` = 1 when `weight / (height / 100)^2 > 25`, else 0.
///
/// `height` is in centimetres and `weight` in kilograms. The BMI itself is
/// not kept.
pub fn add_overweight(table: &Table) -> Result<Table> {
    table.require(&["height", "weight"])?;
    let height = required_numbers(table, "height")?;
    let weight = required_numbers(table, "weight")?;

    let flags = height.iter().zip(&weight).map(|(h, w)| {
        let metres = h / 100.0;
        let bmi = w / (metres * metres);
        i64::from(bmi > OVERWEIGHT_BMI)
    });
    table.with_column(Column::from_i64("overweight", flags))
}

/// Map each named column through `v -> 1 if v > 1 else 0`.
///
/// Already-encoded columns ({0, 1}) come back unchanged. Nulls and text
/// are rejected rather than guessed.
pub fn reencode_binary(table: &Table, columns: &[&str]) -> Result<Table> {
    table.require(columns)?;
    let mut out = table.clone();
    for name in columns {
        let encoded = required_numbers(table, name)?
            .into_iter()
            .map(|v| Value::Integer(i64::from(v > 1.0)))
            .collect();
        out = out.with_column(Column::new(*name, encoded))?;
    }
    Ok(out)
}

/// Medical survey normalization: derive `overweight`, then encode
/// cholesterol and glucose as good (0) / bad (1).
pub fn normalize_medical(table: &Table) -> Result<Table> {
    let with_flag = add_overweight(table)?;
    let normalized = reencode_binary(&with_flag, &BINARY_ENCODED)?;
    debug!(
        "normalized {} rows, columns {:?}",
        normalized.len(),
        normalized.column_names()
    );
    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VizError;

    fn survey() -> Table {
        Table::from_columns(vec![
            Column::from_i64("height", [170, 180, 160]),
            Column::from_i64("weight", [70, 90, 50]),
            Column::from_i64("cholesterol", [1, 2, 3]),
            Column::from_i64("gluc", [1, 1, 2]),
        ])
        .unwrap()
    }

    #[test]
    fn overweight_flag_from_bmi() {
        let t = add_overweight(&survey()).unwrap();
        // BMIs: 24.2, 27.8, 19.5
        assert_eq!(
            t.column("overweight").unwrap().values,
            vec![Value::Integer(0), Value::Integer(1), Value::Integer(0)]
        );
        assert!(!t.has_column("bmi"));
        assert!(!t.has_column("BMI"));
    }

    #[test]
    fn reencoding_is_idempotent() {
        let once = reencode_binary(&survey(), &BINARY_ENCODED).unwrap();
        let twice = reencode_binary(&once, &BINARY_ENCODED).unwrap();
        assert_eq!(once, twice);
        assert_eq!(
            once.column("cholesterol").unwrap().values,
            vec![Value::Integer(0), Value::Integer(1), Value::Integer(1)]
        );
    }

    #[test]
    fn source_table_is_not_mutated() {
        let source = survey();
        let _ = normalize_medical(&source).unwrap();
        assert_eq!(source, survey());
    }

    #[test]
    fn missing_height_is_named() {
        let t = Table::from_columns(vec![
            Column::from_i64("weight", [70]),
            Column::from_i64("cholesterol", [1]),
            Column::from_i64("gluc", [1]),
        ])
        .unwrap();
        let err = normalize_medical(&t).unwrap_err();
        match err {
            VizError::Schema(e) => assert_eq!(e.column(), Some("height")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn null_levels_are_rejected() {
        let t = Table::from_columns(vec![Column::new(
            "cholesterol",
            vec![Value::Integer(1), Value::Null],
        )])
        .unwrap();
        let err = reencode_binary(&t, &["cholesterol"]).unwrap_err();
        assert!(matches!(
            err,
            VizError::Schema(SchemaError::NonNumeric { row: 1, .. })
        ));
    }
}
