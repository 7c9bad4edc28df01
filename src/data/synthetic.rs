use chrono::{Days, NaiveDate};

use super::model::{Column, Table, Value};
use crate::error::Result;

// ---------------------------------------------------------------------------
// Deterministic sample data for the three pipelines
// ---------------------------------------------------------------------------

/// Which dataset shape to synthesise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticDataset {
    Medical,
    SeaLevel,
    PageViews,
}

impl SyntheticDataset {
    pub fn default_rows(self) -> usize {
        match self {
            SyntheticDataset::Medical => 2000,
            SyntheticDataset::SeaLevel => 134,
            SyntheticDataset::PageViews => 1304,
        }
    }

    /// File stem used when the sample is written to disk.
    pub fn file_stem(self) -> &'static str {
        match self {
            SyntheticDataset::Medical => "medical_examination",
            SyntheticDataset::SeaLevel => "epa-sea-level",
            SyntheticDataset::PageViews => "fcc-forum-pageviews",
        }
    }

    pub fn generate(self, rows: usize, seed: u64) -> Result<Table> {
        let mut rng = SimpleRng::new(seed);
        match self {
            SyntheticDataset::Medical => medical(rows, &mut rng),
            SyntheticDataset::SeaLevel => sea_level(rows, &mut rng),
            SyntheticDataset::PageViews => page_views(rows, &mut rng),
        }
    }
}

/// Minimal deterministic PRNG (xoshiro256**)
pub struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    pub fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    /// Bernoulli draw returning 0 or 1.
    fn flag(&mut self, p: f64) -> i64 {
        i64::from(self.next_f64() < p)
    }

    /// Category 1, 2 or 3 with the given probabilities for 2 and 3.
    fn level(&mut self, p2: f64, p3: f64) -> i64 {
        let u = self.next_f64();
        if u < p3 {
            3
        } else if u < p3 + p2 {
            2
        } else {
            1
        }
    }
}

fn medical(rows: usize, rng: &mut SimpleRng) -> Result<Table> {
    let mut cols: Vec<(&str, Vec<Value>)> = [
        "id", "age", "sex", "height", "weight", "ap_hi", "ap_lo", "cholesterol", "gluc", "smoke",
        "alco", "active", "cardio",
    ]
    .into_iter()
    .map(|name| (name, Vec::with_capacity(rows)))
    .collect();

    for id in 0..rows {
        let age_days = rng.gauss(19_500.0, 2_400.0).round() as i64;
        let sex = 1 + rng.flag(0.35);
        let height = rng.gauss(if sex == 2 { 170.0 } else { 161.0 }, 8.0).round() as i64;
        let weight = (rng.gauss(74.0, 14.0) * 10.0).round() / 10.0;
        let ap_hi = rng.gauss(127.0, 17.0).round() as i64;
        let mut ap_lo = rng.gauss(81.0, 10.0).round() as i64;
        // a few transposed readings, as in field data
        if rng.next_f64() < 0.02 {
            ap_lo = ap_hi + 10;
        }
        let cholesterol = rng.level(0.14, 0.11);
        let gluc = rng.level(0.07, 0.08);
        let smoke = rng.flag(if sex == 2 { 0.22 } else { 0.02 });
        let alco = rng.flag(0.05);
        let active = rng.flag(0.8);
        let risk = 0.25
            + 0.02 * (ap_hi - 120) as f64 / 5.0
            + 0.1 * (cholesterol - 1) as f64
            + 0.05 * (age_days - 19_500) as f64 / 2_400.0;
        let cardio = rng.flag(risk.clamp(0.02, 0.98));

        let row = [
            id as i64, age_days, sex, height, 0, ap_hi, ap_lo, cholesterol, gluc, smoke, alco, active,
            cardio,
        ];
        for (i, (name, values)) in cols.iter_mut().enumerate() {
            if *name == "weight" {
                values.push(Value::Float(weight));
            } else {
                values.push(Value::Integer(row[i]));
            }
        }
    }

    Table::from_columns(cols.into_iter().map(|(n, v)| Column::new(n, v)).collect())
}

fn sea_level(rows: usize, rng: &mut SimpleRng) -> Result<Table> {
    let mut year = Vec::with_capacity(rows);
    let mut csiro = Vec::with_capacity(rows);
    let mut lower = Vec::with_capacity(rows);
    let mut upper = Vec::with_capacity(rows);
    let mut noaa = Vec::with_capacity(rows);

    for i in 0..rows {
        let y = 1880 + i as i64;
        let t = i as f64;
        // slow rise that steepens towards the end of the record
        let level = 0.055 * t + 0.000_12 * t * t + rng.gauss(0.0, 0.15);
        let err = (0.95 - 0.006 * t).max(0.1);
        year.push(Value::Integer(y));
        csiro.push(Value::Float(level));
        lower.push(Value::Float(level - err));
        upper.push(Value::Float(level + err));
        noaa.push(if y >= 1993 {
            Value::Float(level + rng.gauss(0.0, 0.05))
        } else {
            Value::Null
        });
    }

    Table::from_columns(vec![
        Column::new("Year", year),
        Column::new("CSIRO Adjusted Sea Level", csiro),
        Column::new("Lower Error Bound", lower),
        Column::new("Upper Error Bound", upper),
        Column::new("NOAA Adjusted Sea Level", noaa),
    ])
}

fn page_views(rows: usize, rng: &mut SimpleRng) -> Result<Table> {
    let start = NaiveDate::from_ymd_opt(2016, 5, 9).unwrap_or_default();
    let mut dates = Vec::with_capacity(rows);
    let mut values = Vec::with_capacity(rows);

    for i in 0..rows {
        let Some(date) = start.checked_add_days(Days::new(i as u64)) else {
            break;
        };
        let t = i as f64;
        let trend = 18_000.0 + 110.0 * t.min(600.0) + 25.0 * (t - 600.0).max(0.0);
        let season = 1.0 + 0.15 * (2.0 * std::f64::consts::PI * t / 365.25).cos();
        let mut value = trend * season + rng.gauss(0.0, 4_000.0);
        // occasional viral spikes and outages
        if rng.next_f64() < 0.01 {
            value *= 5.0;
        } else if rng.next_f64() < 0.01 {
            value *= 0.1;
        }
        dates.push(Value::Date(date));
        values.push(Value::Integer(value.max(0.0).round() as i64));
    }

    Table::from_columns(vec![Column::new("date", dates), Column::new("value", values)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = SyntheticDataset::Medical.generate(50, 7).unwrap();
        let b = SyntheticDataset::Medical.generate(50, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert_eq!(a.column_names().len(), 13);
    }

    #[test]
    fn sea_level_has_detectable_headers() {
        let t = SyntheticDataset::SeaLevel.generate(20, 1).unwrap();
        assert_eq!(t.len(), 20);
        assert!(t.has_column("CSIRO Adjusted Sea Level"));
        assert!(t.column("NOAA Adjusted Sea Level").unwrap().values[0].is_null());
    }

    #[test]
    fn page_views_are_daily() {
        let t = SyntheticDataset::PageViews.generate(40, 3).unwrap();
        let dates: Vec<_> = t
            .column("date")
            .unwrap()
            .values
            .iter()
            .filter_map(Value::as_date)
            .collect();
        assert_eq!(dates.len(), 40);
        assert!(dates.windows(2).all(|w| (w[1] - w[0]).num_days() == 1));
    }
}
