//! Descriptive statistics over plain `f64` slices.
//!
//! Nulls are represented as `Option::None` by the table layer and are
//! dropped (or dropped pairwise) before any of these functions run.

use crate::error::{Result, VizError};

/// Sample quantile of sorted, non-empty input, interpolating linearly
/// between closest ranks (`pos = q * (n - 1)`, the pandas default).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Pearson correlation over pairwise-complete observations.
///
/// Returns `NaN` when fewer than two complete pairs exist or either side
/// has zero variance.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(a, b) in &pairs {
        let dx = a - mx;
        let dy = b - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx == 0.0 || syy == 0.0 {
        return f64::NAN;
    }
    (sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Ordinary least squares
// ---------------------------------------------------------------------------

/// Slope, intercept and correlation of a simple OLS fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
}

/// Fit `y = slope * x + intercept` by least squares.
///
/// Fails with `InsufficientData` unless at least two distinct `x` values
/// are present.
pub fn linear_fit(points: &[(f64, f64)]) -> Result<LinearFit> {
    let distinct = {
        let mut xs: Vec<f64> = points.iter().map(|p| p.0).collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        xs.len()
    };
    if distinct < 2 {
        return Err(VizError::insufficient(
            "linear regression",
            format!("{distinct} distinct x value(s), need at least 2"),
        ));
    }

    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.0).sum::<f64>() / n;
    let my = points.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for &(x, y) in points {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let slope = sxy / sxx;
    let r_value = if syy == 0.0 {
        0.0
    } else {
        sxy / (sxx.sqrt() * syy.sqrt())
    };
    Ok(LinearFit {
        slope,
        intercept: my - slope * mx,
        r_value,
    })
}

// ---------------------------------------------------------------------------
// Box-plot summary
// ---------------------------------------------------------------------------

/// Five-number summary with Tukey whiskers (1.5 × IQR), as drawn by a
/// standard box plot.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    pub count: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest observation within `q1 - 1.5 * iqr`.
    pub whisker_low: f64,
    /// Largest observation within `q3 + 1.5 * iqr`.
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    /// Summarise `values`, ignoring non-finite entries. `None` when empty.
    pub fn compute(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);

        let q1 = quantile_sorted(&sorted, 0.25);
        let median = quantile_sorted(&sorted, 0.5);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;
        let lo_fence = q1 - 1.5 * iqr;
        let hi_fence = q3 + 1.5 * iqr;

        let inside: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| *v >= lo_fence && *v <= hi_fence)
            .collect();
        let whisker_low = inside.first().copied().unwrap_or(q1);
        let whisker_high = inside.last().copied().unwrap_or(q3);
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < lo_fence || *v > hi_fence)
            .collect();

        Some(BoxStats {
            count: sorted.len(),
            q1,
            median,
            q3,
            whisker_low,
            whisker_high,
            outliers,
        })
    }
}
