use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use log::debug;

use crate::data::filter::{apply_rules, RowRule};
use crate::data::model::{Column, Table, Value};
use crate::error::{Result, SchemaError, VizError};
use crate::stats::{self, BoxStats};

// ---------------------------------------------------------------------------
// (a) Categorical tally: melt + group + count
// ---------------------------------------------------------------------------

pub const VARIABLE_COLUMN: &str = "variable";
pub const VALUE_COLUMN: &str = "value";
pub const TOTAL_COLUMN: &str = "total";

/// Reshape to long form: one `(identity, variable, value)` row per
/// `(row, variable)` pair, rows major and variables in the given order.
pub fn melt(table: &Table, identity: &str, variables: &[&str]) -> Result<Table> {
    table.require(&[identity])?;
    table.require(variables)?;

    let ids = &table.column(identity)?.values;
    let sources = variables
        .iter()
        .map(|v| table.column(v).map(|c| &c.values))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let n = table.len() * variables.len();
    let mut id_out = Vec::with_capacity(n);
    let mut var_out = Vec::with_capacity(n);
    let mut val_out = Vec::with_capacity(n);
    for row in 0..table.len() {
        for (name, values) in variables.iter().zip(&sources) {
            id_out.push(ids[row].clone());
            var_out.push(Value::from(*name));
            val_out.push(values[row].clone());
        }
    }

    Table::from_columns(vec![
        Column::new(identity, id_out),
        Column::new(VARIABLE_COLUMN, var_out),
        Column::new(VALUE_COLUMN, val_out),
    ])
}

/// Count occurrences of each `(identity, variable, value)` triple.
///
/// Output columns: `identity`, `variable`, `value`, `total`. Rows are
/// ordered by identity, then variable in the order given, then value.
/// Triples that never occur are left out, not reported with a zero total.
pub fn tally(table: &Table, identity: &str, variables: &[&str]) -> Result<Table> {
    let long = melt(table, identity, variables)?;
    let ids = &long.column(identity)?.values;
    let vals = &long.column(VALUE_COLUMN)?.values;

    let mut counts: BTreeMap<(Value, usize, Value), i64> = BTreeMap::new();
    for (i, (id, val)) in ids.iter().zip(vals).enumerate() {
        let var_idx = i % variables.len();
        *counts.entry((id.clone(), var_idx, val.clone())).or_default() += 1;
    }

    let mut id_out = Vec::with_capacity(counts.len());
    let mut var_out = Vec::with_capacity(counts.len());
    let mut val_out = Vec::with_capacity(counts.len());
    let mut total_out = Vec::with_capacity(counts.len());
    for ((id, var_idx, val), total) in counts {
        id_out.push(id);
        var_out.push(Value::from(variables[var_idx]));
        val_out.push(val);
        total_out.push(Value::Integer(total));
    }
    debug!("tally over {identity}: {} groups", total_out.len());

    Table::from_columns(vec![
        Column::new(identity, id_out),
        Column::new(VARIABLE_COLUMN, var_out),
        Column::new(VALUE_COLUMN, val_out),
        Column::new(TOTAL_COLUMN, total_out),
    ])
}

// ---------------------------------------------------------------------------
// (b) Correlation matrix with trimming
// ---------------------------------------------------------------------------

/// Symmetric Pearson correlation matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw coefficient; `NaN` when undefined (zero variance).
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i][j]
    }

    /// Upper triangle including the diagonal carries no extra information.
    pub fn is_masked(&self, i: usize, j: usize) -> bool {
        j >= i
    }

    /// Unmasked cells as `(row, col, coefficient)`; undefined coefficients
    /// come back as `None` so they can be left blank.
    pub fn visible_cells(&self) -> impl Iterator<Item = (usize, usize, Option<f64>)> + '_ {
        (0..self.len()).flat_map(move |i| {
            (0..i).map(move |j| {
                let v = self.values[i][j];
                (i, j, (!v.is_nan()).then_some(v))
            })
        })
    }
}

/// Pairwise Pearson correlation over every numeric column of `table`.
pub fn correlation_matrix(table: &Table) -> Result<CorrelationMatrix> {
    if table.len() < 2 {
        return Err(VizError::insufficient(
            "correlation",
            format!("{} row(s), need at least 2", table.len()),
        ));
    }
    let columns: Vec<String> = table
        .numeric_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let data = columns
        .iter()
        .map(|c| table.numeric(c))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let n = columns.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = stats::pearson(&data[i], &data[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }
    Ok(CorrelationMatrix { columns, values })
}

/// Rows kept for the medical heatmap: diastolic not above systolic, height
/// and weight inside the `[lower_q, upper_q]` quantile band.
pub fn medical_heat_rules(lower_q: f64, upper_q: f64) -> Vec<RowRule> {
    vec![
        RowRule::not_greater_than("ap_lo", "ap_hi"),
        RowRule::quantile_band("height", lower_q, upper_q),
        RowRule::quantile_band("weight", lower_q, upper_q),
    ]
}

/// Apply `rules`, then correlate what is left.
pub fn trimmed_correlation(table: &Table, rules: &[RowRule]) -> Result<CorrelationMatrix> {
    let trimmed = apply_rules(table, rules)?;
    debug!("correlating {} of {} rows", trimmed.len(), table.len());
    correlation_matrix(&trimmed)
}

// ---------------------------------------------------------------------------
// (c) Dual-window linear regression
// ---------------------------------------------------------------------------

/// A fitted line and the integer year range it is drawn over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegressionResult {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
    pub domain_start: i32,
    pub domain_end: i32,
}

impl RegressionResult {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }

    /// Predictions at every integer year of the domain, ends included.
    pub fn line(&self) -> Vec<(f64, f64)> {
        (self.domain_start..=self.domain_end)
            .map(|year| {
                let x = f64::from(year);
                (x, self.predict(x))
            })
            .collect()
    }
}

/// Independent fits over all observations and over `year >= cutoff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualFit {
    pub all: RegressionResult,
    pub recent: RegressionResult,
    pub cutoff: i32,
}

/// `(year, measurement)` pairs with nulls in either field dropped.
pub fn observations(table: &Table, year: &str, measurement: &str) -> Result<Vec<(f64, f64)>> {
    let xs = table.numeric(year)?;
    let ys = table.numeric(measurement)?;
    Ok(xs
        .into_iter()
        .zip(ys)
        .filter_map(|(x, y)| Some((x?, y?)))
        .collect())
}

fn fit_window(points: &[(f64, f64)], start: i32, end: i32, window: &str) -> Result<RegressionResult> {
    let fit = stats::linear_fit(points).map_err(|e| match e {
        VizError::InsufficientData { operation, detail } => VizError::InsufficientData {
            operation,
            detail: format!("{window}: {detail}"),
        },
        other => other,
    })?;
    Ok(RegressionResult {
        slope: fit.slope,
        intercept: fit.intercept,
        r_value: fit.r_value,
        domain_start: start,
        domain_end: end,
    })
}

/// Fit the full series (drawn from its first year) and the recent window
/// `year >= cutoff` (drawn from `cutoff`), both extrapolated to
/// `forecast_end`.
pub fn dual_fit(points: &[(f64, f64)], cutoff: i32, forecast_end: i32) -> Result<DualFit> {
    let first_year = points
        .iter()
        .map(|p| p.0)
        .fold(f64::INFINITY, f64::min)
        .floor();
    let first_year = if first_year.is_finite() {
        first_year as i32
    } else {
        cutoff
    };
    let all = fit_window(points, first_year, forecast_end, "full window")?;

    let recent_points: Vec<(f64, f64)> = points
        .iter()
        .copied()
        .filter(|p| p.0 >= f64::from(cutoff))
        .collect();
    let recent = fit_window(
        &recent_points,
        cutoff,
        forecast_end,
        &format!("window from {cutoff}"),
    )?;

    debug!(
        "full fit slope {:.4}, recent fit slope {:.4} ({} points)",
        all.slope,
        recent.slope,
        recent_points.len()
    );
    Ok(DualFit {
        all,
        recent,
        cutoff,
    })
}

// ---------------------------------------------------------------------------
// Calendar helpers
// ---------------------------------------------------------------------------

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

/// Calendar month, ordered January → December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month(u32);

impl Month {
    /// `number` in 1..=12.
    pub fn new(number: u32) -> Option<Self> {
        (1..=12).contains(&number).then_some(Month(number))
    }

    pub fn of(date: NaiveDate) -> Self {
        Month(date.month())
    }

    pub fn number(self) -> u32 {
        self.0
    }

    pub fn name(self) -> &'static str {
        MONTH_NAMES[(self.0 - 1) as usize]
    }

    /// Three-letter label, e.g. `Jan`.
    pub fn abbrev(self) -> &'static str {
        &self.name()[..3]
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abbrev())
    }
}

/// `(date, value)` pairs in table order, skipping rows with a null value.
pub fn dated_values(table: &Table, date_col: &str, value_col: &str) -> Result<Vec<(NaiveDate, f64)>> {
    let dates = &table.column(date_col)?.values;
    let values = table.numeric(value_col)?;
    let mut out = Vec::with_capacity(values.len());
    for (row, (d, v)) in dates.iter().zip(values).enumerate() {
        let Some(v) = v else { continue };
        let date = d.as_date().ok_or_else(|| SchemaError::NotADate {
            column: date_col.to_string(),
            row,
            value: d.to_string(),
        })?;
        out.push((date, v));
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// (d) Monthly/yearly grouped mean
// ---------------------------------------------------------------------------

/// Mean value per (year, month), pivoted with years as rows.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyMeans {
    pub years: Vec<i32>,
    /// Months observed anywhere in the data, calendar order.
    pub months: Vec<Month>,
    /// `cells[y][m]` for `years[y]`, `months[m]`; `None` where no rows fell.
    pub cells: Vec<Vec<Option<f64>>>,
}

impl MonthlyMeans {
    pub fn get(&self, year: i32, month: Month) -> Option<f64> {
        let y = self.years.iter().position(|&v| v == year)?;
        let m = self.months.iter().position(|&v| v == month)?;
        self.cells[y][m]
    }

    /// Largest defined mean, for axis scaling.
    pub fn max(&self) -> Option<f64> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .copied()
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

pub fn monthly_means(table: &Table, date_col: &str, value_col: &str) -> Result<MonthlyMeans> {
    let mut groups: BTreeMap<(i32, Month), Vec<f64>> = BTreeMap::new();
    for (date, v) in dated_values(table, date_col, value_col)? {
        groups.entry((date.year(), Month::of(date))).or_default().push(v);
    }

    let mut years: Vec<i32> = groups.keys().map(|k| k.0).collect();
    years.dedup();
    let mut months: Vec<Month> = groups.keys().map(|k| k.1).collect();
    months.sort();
    months.dedup();

    let cells = years
        .iter()
        .map(|&y| {
            months
                .iter()
                .map(|&m| groups.get(&(y, m)).and_then(|vals| stats::mean(vals)))
                .collect()
        })
        .collect();

    Ok(MonthlyMeans {
        years,
        months,
        cells,
    })
}

// ---------------------------------------------------------------------------
// (e) Year-wise and month-wise distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Distributions {
    pub by_year: Vec<(i32, BoxStats)>,
    /// Always in calendar order, whatever order the rows came in.
    pub by_month: Vec<(Month, BoxStats)>,
}

pub fn distributions(table: &Table, date_col: &str, value_col: &str) -> Result<Distributions> {
    let mut years: BTreeMap<i32, Vec<f64>> = BTreeMap::new();
    let mut months: BTreeMap<Month, Vec<f64>> = BTreeMap::new();
    for (date, v) in dated_values(table, date_col, value_col)? {
        years.entry(date.year()).or_default().push(v);
        months.entry(Month::of(date)).or_default().push(v);
    }

    Ok(Distributions {
        by_year: years
            .into_iter()
            .filter_map(|(y, vals)| Some((y, BoxStats::compute(&vals)?)))
            .collect(),
        by_month: months
            .into_iter()
            .filter_map(|(m, vals)| Some((m, BoxStats::compute(&vals)?)))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn survey() -> Table {
        Table::from_columns(vec![
            Column::from_i64("cardio", [0, 1, 0, 1]),
            Column::from_i64("smoke", [0, 0, 1, 0]),
            Column::from_i64("alco", [0, 0, 0, 0]),
        ])
        .unwrap()
    }

    #[test]
    fn melt_has_one_row_per_pair() {
        let long = melt(&survey(), "cardio", &["smoke", "alco"]).unwrap();
        assert_eq!(long.len(), 8);
        assert_eq!(long.column_names(), vec!["cardio", "variable", "value"]);
        assert_eq!(long.column("variable").unwrap().values[1], Value::from("alco"));
    }

    #[test]
    fn tally_counts_every_pair_once() {
        let vars = ["smoke", "alco"];
        let t = tally(&survey(), "cardio", &vars).unwrap();
        let sum: i64 = t
            .column(TOTAL_COLUMN)
            .unwrap()
            .values
            .iter()
            .filter_map(|v| v.as_f64())
            .map(|v| v as i64)
            .sum();
        assert_eq!(sum as usize, survey().len() * vars.len());
    }

    #[test]
    fn tally_omits_absent_triples_and_keeps_variable_order() {
        let t = tally(&survey(), "cardio", &["smoke", "alco"]).unwrap();
        // cardio=0: smoke 0/1, alco 0 ; cardio=1: smoke 0, alco 0
        assert_eq!(t.len(), 5);
        let vars: Vec<String> = t
            .column(VARIABLE_COLUMN)
            .unwrap()
            .values
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(vars, ["smoke", "smoke", "alco", "smoke", "alco"]);
        let totals: Vec<Value> = t.column(TOTAL_COLUMN).unwrap().values.clone();
        assert_eq!(
            totals,
            [1, 1, 2, 2, 2].map(Value::Integer).to_vec()
        );
    }

    #[test]
    fn tally_names_missing_variable() {
        let err = tally(&survey(), "cardio", &["gluc"]).unwrap_err();
        assert!(matches!(
            err,
            VizError::Schema(SchemaError::MissingColumn(ref c)) if c == "gluc"
        ));
    }

    #[test]
    fn correlation_is_symmetric_with_unit_diagonal() {
        let t = Table::from_columns(vec![
            Column::from_f64("a", [1.0, 2.0, 3.0, 4.0]),
            Column::from_f64("b", [2.0, 1.0, 4.0, 3.0]),
            Column::from_f64("c", [9.0, 9.0, 9.0, 9.0]),
            Column::new("label", vec!["w".into(), "x".into(), "y".into(), "z".into()]),
        ])
        .unwrap();
        let m = correlation_matrix(&t).unwrap();
        assert_eq!(m.columns, vec!["a", "b", "c"]);
        for i in 0..m.len() {
            for j in 0..m.len() {
                let (x, y) = (m.get(i, j), m.get(j, i));
                assert!(x == y || (x.is_nan() && y.is_nan()));
            }
        }
        assert!((m.get(0, 0) - 1.0).abs() < 1e-12);
        assert!((m.get(1, 1) - 1.0).abs() < 1e-12);
        assert!(m.get(2, 2).is_nan());
    }

    #[test]
    fn mask_hides_upper_triangle_and_blanks_nan() {
        let t = Table::from_columns(vec![
            Column::from_f64("a", [1.0, 2.0, 3.0]),
            Column::from_f64("b", [3.0, 2.0, 1.0]),
            Column::from_f64("c", [5.0, 5.0, 5.0]),
        ])
        .unwrap();
        let m = correlation_matrix(&t).unwrap();
        assert!(m.is_masked(0, 0) && m.is_masked(0, 2) && !m.is_masked(2, 0));
        let cells: Vec<_> = m.visible_cells().collect();
        assert_eq!(cells.len(), 3);
        assert_eq!(cells[0].0, 1);
        assert!((cells[0].2.unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(cells[1], (2, 0, None));
    }

    #[test]
    fn correlation_needs_two_rows() {
        let t = Table::from_columns(vec![Column::from_f64("a", [1.0])]).unwrap();
        assert!(matches!(
            correlation_matrix(&t),
            Err(VizError::InsufficientData { .. })
        ));
    }

    #[test]
    fn dual_fit_cutoff_is_inclusive() {
        let points = [(2000.0, 0.0), (2010.0, 5.0), (2020.0, 10.0)];
        let fit = dual_fit(&points, 2000, 2050).unwrap();
        assert_eq!(fit.all.slope, 0.5);
        assert_eq!(fit.all.intercept, -1000.0);
        assert_eq!(fit.recent.slope, fit.all.slope);
        assert_eq!(fit.recent.intercept, fit.all.intercept);
        assert_eq!(fit.all.domain_start, 2000);
        assert_eq!(fit.all.line().last(), Some(&(2050.0, 25.0)));
        // a perfectly linear series is perfectly correlated in both windows
        assert!((fit.all.r_value - 1.0).abs() < 1e-9);
        assert!((fit.recent.r_value - 1.0).abs() < 1e-9);
    }

    #[test]
    fn dual_fit_is_deterministic() {
        let points: Vec<(f64, f64)> = (1880..2014)
            .map(|y| (f64::from(y), (f64::from(y) * 0.37).sin() + 0.06 * f64::from(y - 1880)))
            .collect();
        let a = dual_fit(&points, 2000, 2050).unwrap();
        let b = dual_fit(&points, 2000, 2050).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.all.line().len(), (1880..=2050).count());
        assert_eq!(a.recent.line().len(), (2000..=2050).count());
    }

    #[test]
    fn sparse_recent_window_is_insufficient() {
        let points = [(1990.0, 1.0), (1995.0, 2.0), (2001.0, 3.0)];
        let err = dual_fit(&points, 2000, 2050).unwrap_err();
        match err {
            VizError::InsufficientData { detail, .. } => assert!(detail.contains("2000")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn page_views(rows: &[(NaiveDate, i64)]) -> Table {
        Table::from_columns(vec![
            Column::new("date", rows.iter().map(|r| Value::Date(r.0)).collect()),
            Column::from_i64("value", rows.iter().map(|r| r.1)),
        ])
        .unwrap()
    }

    #[test]
    fn monthly_means_leave_gaps_undefined() {
        let t = page_views(&[
            (d(2017, 1, 1), 10),
            (d(2017, 1, 2), 20),
            (d(2016, 5, 9), 4),
            (d(2017, 5, 1), 8),
        ]);
        let m = monthly_means(&t, "date", "value").unwrap();
        assert_eq!(m.years, vec![2016, 2017]);
        assert_eq!(m.months, vec![Month(1), Month(5)]);
        assert_eq!(m.get(2017, Month(1)), Some(15.0));
        assert_eq!(m.get(2016, Month(5)), Some(4.0));
        assert_eq!(m.get(2016, Month(1)), None);
        assert_eq!(m.max(), Some(15.0));
    }

    #[test]
    fn month_distribution_follows_calendar() {
        let rows: Vec<(NaiveDate, i64)> = (1..=12).rev().map(|m| (d(2018, m, 15), i64::from(m))).collect();
        let dist = distributions(&page_views(&rows), "date", "value").unwrap();
        let labels: Vec<&str> = dist.by_month.iter().map(|(m, _)| m.abbrev()).collect();
        assert_eq!(
            labels,
            ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"]
        );
        assert_eq!(dist.by_year.len(), 1);
        assert_eq!(dist.by_year[0].1.count, 12);
    }

    #[test]
    fn text_in_date_column_is_rejected() {
        let t = Table::from_columns(vec![
            Column::new("date", vec!["soon".into()]),
            Column::from_i64("value", [1]),
        ])
        .unwrap();
        assert!(matches!(
            monthly_means(&t, "date", "value"),
            Err(VizError::Schema(SchemaError::NotADate { .. }))
        ));
    }
}
