// src/analytics/mod.rs
//
// Return, volatility and correlation features over normalized OHLCV tables.
// All rolling computations use trailing windows re-evaluated at every row;
// NaN marks both missing inputs and insufficient history.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::normalize::RawTable;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;
pub const VOL_WINDOW: usize = 30;
pub const VOL_MIN_PERIODS: usize = 10;
pub const CORR_WINDOW: usize = 30;

/// A RawTable augmented with its derived feature columns, all parallel to
/// `raw.dates`.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTable {
    pub raw: RawTable,
    pub daily_return: Vec<f64>,
    pub vol_30d: Vec<f64>,
    pub vol_30d_ann: Vec<f64>,
    pub price_norm: Vec<f64>,
}

/// Rolling cross-symbol correlation, indexed by the dates the two input
/// series share.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSeries {
    pub dates: Vec<NaiveDate>,
    pub rolling_corr_30d: Vec<f64>,
}

/// `r[t] = p[t]/p[t-1] - 1`, NaN for the first row and wherever either
/// operand is NaN.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    let mut out = vec![f64::NAN; prices.len()];
    for t in 1..prices.len() {
        out[t] = prices[t] / prices[t - 1] - 1.0;
    }
    out
}

/// Trailing sample standard deviation over up to `window` observations.
/// NaN values inside the window are skipped; fewer than `min_periods`
/// usable observations (or fewer than two) yields NaN.
pub fn rolling_std(values: &[f64], window: usize, min_periods: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    for t in 0..values.len() {
        let start = (t + 1).saturating_sub(window);
        let obs: Vec<f64> = values[start..=t].iter().copied().filter(|v| !v.is_nan()).collect();
        if obs.len() < min_periods.max(2) {
            continue;
        }
        let n = obs.len() as f64;
        let mean = obs.iter().sum::<f64>() / n;
        let var = obs.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        out[t] = var.sqrt();
    }
    out
}

/// Rebase a price series to 100 at its first row. A NaN first price poisons
/// the whole column, deliberately.
pub fn price_norm(prices: &[f64]) -> Vec<f64> {
    match prices.first() {
        Some(&base) => prices.iter().map(|p| p / base * 100.0).collect(),
        None => Vec::new(),
    }
}

/// Compute every per-symbol derived column over a normalized table.
pub fn derive(raw: RawTable) -> DerivedTable {
    let daily_return = daily_returns(&raw.adj_close);
    let vol_30d = rolling_std(&daily_return, VOL_WINDOW, VOL_MIN_PERIODS);
    let vol_30d_ann = vol_30d
        .iter()
        .map(|v| v * TRADING_DAYS_PER_YEAR.sqrt())
        .collect();
    let price_norm = price_norm(&raw.adj_close);
    DerivedTable {
        raw,
        daily_return,
        vol_30d,
        vol_30d_ann,
        price_norm,
    }
}

fn pearson(pairs: &[(f64, f64)]) -> f64 {
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in pairs {
        let da = a - mean_a;
        let db = b - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return f64::NAN;
    }
    cov / (var_a.sqrt() * var_b.sqrt())
}

/// Pearson correlation of two symbols' daily returns over a trailing
/// `window`, after inner-joining the series by date. Rows present in only
/// one series do not contribute. The window must be pairwise complete
/// (`window` non-NaN pairs) to produce a value.
pub fn rolling_correlation(a: &DerivedTable, b: &DerivedTable, window: usize) -> CorrelationSeries {
    // inner join by date; both indexes are sorted and unique
    let mut dates = Vec::new();
    let mut ra = Vec::new();
    let mut rb = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.raw.dates.len() && j < b.raw.dates.len() {
        match a.raw.dates[i].cmp(&b.raw.dates[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dates.push(a.raw.dates[i]);
                ra.push(a.daily_return[i]);
                rb.push(b.daily_return[j]);
                i += 1;
                j += 1;
            }
        }
    }

    let mut corr = vec![f64::NAN; dates.len()];
    for t in 0..dates.len() {
        let start = (t + 1).saturating_sub(window);
        let pairs: Vec<(f64, f64)> = (start..=t)
            .filter(|&k| !ra[k].is_nan() && !rb[k].is_nan())
            .map(|k| (ra[k], rb[k]))
            .collect();
        if pairs.len() < window {
            continue;
        }
        corr[t] = pearson(&pairs);
    }

    CorrelationSeries {
        dates,
        rolling_corr_30d: corr,
    }
}

/// Sum of non-NaN daily returns per calendar year. Reported, never persisted.
pub fn annual_returns(dates: &[NaiveDate], daily_return: &[f64]) -> BTreeMap<i32, f64> {
    let mut out = BTreeMap::new();
    for (date, r) in dates.iter().zip(daily_return) {
        let entry = out.entry(date.year()).or_insert(0.0);
        if !r.is_nan() {
            *entry += r;
        }
    }
    out
}
