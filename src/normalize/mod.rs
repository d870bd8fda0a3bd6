// src/normalize/mod.rs
use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use tracing::debug;

use crate::ingest::SourceTable;

/// Candidate names for the date column, tried in order against the
/// normalized header lookup. Case folding makes `DATE` hit the first entry.
pub const DATE_CANDIDATES: &[&str] = &["date", "observation_date"];

/// Priority-ordered candidates for the Close column. First present wins;
/// list order is the whole resolution policy, so keep it auditable here
/// rather than spreading it over conditionals.
pub const CLOSE_PRIORITY: &[&str] = &[
    "close", "adj_close", "price", "value", "sp500", "spx", "gold", "xauusd", "usd_(pm)",
    "usd_(am)", "usd",
];

/// Date formats accepted after the ISO fast path fails, tried in order.
const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%m/%d/%Y", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// The canonical time-indexed OHLCV table every source is normalized into.
/// Columns are parallel vectors; missing numerics are NaN. After
/// [`normalize`] the date index is strictly ascending with no duplicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub dates: Vec<NaiveDate>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub adj_close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl RawTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    fn push(
        &mut self,
        date: NaiveDate,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        adj_close: f64,
        volume: f64,
    ) {
        self.dates.push(date);
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.adj_close.push(adj_close);
        self.volume.push(volume);
    }
}

/// Normalize a header name for lookup: trim, lowercase, spaces → underscores.
pub fn norm_key(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "_")
}

/// Coerce one cell to f64. Empty or unparseable cells become NaN; a bad
/// value is a missing observation, never an abort.
pub fn parse_cell(cell: &str) -> f64 {
    let t = cell.trim();
    if t.is_empty() {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// Fast parse of `YYYY-MM-DD`, ignoring any trailing time component.
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let b = s.as_bytes();
    if b.len() < 10 || b[4] != b'-' || b[7] != b'-' {
        return None;
    }
    if !b[0..4].iter().all(u8::is_ascii_digit)
        || !b[5..7].iter().all(u8::is_ascii_digit)
        || !b[8..10].iter().all(u8::is_ascii_digit)
    {
        return None;
    }
    let y: i32 = s[0..4].parse().ok()?;
    let m: u32 = s[5..7].parse().ok()?;
    let d: u32 = s[8..10].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Parse a date cell, trying the ISO fast path first and then the known
/// slash/day-first and datetime formats. Returns None when nothing matches.
pub fn parse_date(cell: &str) -> Option<NaiveDate> {
    let s = cell.trim().trim_matches('"');
    if let Some(d) = parse_iso_date(s) {
        return Some(d);
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Build the normalized-header lookup: key → column index, last occurrence
/// winning on duplicate keys.
fn header_lookup(headers: &[String]) -> HashMap<String, usize> {
    let mut map = HashMap::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        map.insert(norm_key(name), idx);
    }
    map
}

/// Column indices whose non-empty cells all parse as f64 (and at least one
/// cell does). This is the fallback pool for Close resolution and the
/// "numeric column" test of the loose selection heuristic.
pub fn numeric_columns(src: &SourceTable) -> Vec<usize> {
    let mut out = Vec::new();
    for idx in 0..src.headers.len() {
        let mut seen = false;
        let mut ok = true;
        for row in &src.rows {
            let cell = match row.get(idx) {
                Some(c) => c.trim(),
                None => continue,
            };
            if cell.is_empty() {
                continue;
            }
            if cell.parse::<f64>().is_ok() {
                seen = true;
            } else {
                ok = false;
                break;
            }
        }
        if seen && ok {
            out.push(idx);
        }
    }
    out
}

fn resolve_date_column(lookup: &HashMap<String, usize>) -> Option<usize> {
    DATE_CANDIDATES.iter().find_map(|k| lookup.get(*k).copied())
}

/// Map an arbitrary source table onto the canonical OHLCV schema.
///
/// Resolution rules, in order:
/// - date column: `date`/`DATE` → `observation_date`, missing is fatal;
/// - Close: first hit in [`CLOSE_PRIORITY`], else the first numeric
///   non-date column, no numeric column at all is fatal;
/// - Open/High/Low: own column if present, else the resolved Close per row;
/// - Adj_Close: own column if present, else Close;
/// - Volume: own column if present, else the literal 0 (not Close — a
///   volume-free source must not pretend to have traded volume).
///
/// For `GSPC`, a literal `SP500` column next to a date column is renamed to
/// `Close` before generic resolution so the priority list matches it
/// deterministically.
///
/// The result is sorted ascending by date; duplicate dates keep the last
/// occurrence (sources re-publish overlapping ranges).
pub fn normalize(symbol: &str, src: &SourceTable) -> Result<RawTable> {
    let mut lookup = header_lookup(&src.headers);

    if symbol == "GSPC" {
        if let Some(idx) = lookup.remove("sp500") {
            if resolve_date_column(&lookup).is_some() {
                lookup.insert("close".to_string(), idx);
            } else {
                lookup.insert("sp500".to_string(), idx);
            }
        }
    }

    let date_idx = resolve_date_column(&lookup).with_context(|| {
        format!(
            "missing date column (Date/DATE/observation_date) in {:?}",
            src.headers
        )
    })?;

    let close_idx = match CLOSE_PRIORITY.iter().find_map(|k| lookup.get(*k).copied()) {
        Some(idx) => idx,
        None => {
            let numeric = numeric_columns(src);
            match numeric.into_iter().find(|&i| i != date_idx) {
                Some(idx) => idx,
                None => bail!("no usable price column in {:?}", src.headers),
            }
        }
    };

    let open_idx = lookup.get("open").copied();
    let high_idx = lookup.get("high").copied();
    let low_idx = lookup.get("low").copied();
    let adj_idx = lookup.get("adj_close").copied();
    let vol_idx = lookup.get("volume").copied();

    debug!(
        date = %src.headers[date_idx],
        close = %src.headers[close_idx],
        "resolved source columns"
    );

    let mut table = RawTable::default();
    for (row_no, row) in src.rows.iter().enumerate() {
        let date_cell = row.get(date_idx).map(String::as_str).unwrap_or("");
        let date = parse_date(date_cell)
            .with_context(|| format!("unparseable date {:?} at row {}", date_cell, row_no))?;

        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");
        let close = parse_cell(cell(close_idx));
        let open = open_idx.map(|i| parse_cell(cell(i))).unwrap_or(close);
        let high = high_idx.map(|i| parse_cell(cell(i))).unwrap_or(close);
        let low = low_idx.map(|i| parse_cell(cell(i))).unwrap_or(close);
        let adj_close = adj_idx.map(|i| parse_cell(cell(i))).unwrap_or(close);
        let volume = vol_idx.map(|i| parse_cell(cell(i))).unwrap_or(0.0);

        table.push(date, open, high, low, close, adj_close, volume);
    }

    Ok(sort_dedup_last(table))
}

/// Stable-sort by date ascending, then collapse duplicate dates keeping the
/// last occurrence (which, with a stable sort, is the later-in-file row).
fn sort_dedup_last(table: RawTable) -> RawTable {
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&i| table.dates[i]);

    let mut out = RawTable::default();
    for (pos, &i) in order.iter().enumerate() {
        if let Some(&next) = order.get(pos + 1) {
            if table.dates[next] == table.dates[i] {
                continue;
            }
        }
        out.push(
            table.dates[i],
            table.open[i],
            table.high[i],
            table.low[i],
            table.close[i],
            table.adj_close[i],
            table.volume[i],
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(headers: &[&str], rows: &[&[&str]]) -> SourceTable {
        SourceTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn single_price_source_fills_ohlc_from_close() {
        let table = normalize(
            "GC_F",
            &src(
                &["Date", "Price"],
                &[&["2021-03-01", "1720.5"], &["2021-03-02", "1731.0"]],
            ),
        )
        .unwrap();
        for i in 0..table.len() {
            assert_eq!(table.open[i], table.close[i]);
            assert_eq!(table.high[i], table.close[i]);
            assert_eq!(table.low[i], table.close[i]);
            assert_eq!(table.adj_close[i], table.close[i]);
            assert_eq!(table.volume[i], 0.0);
        }
    }

    #[test]
    fn sp500_override_renames_to_close() {
        let table = normalize(
            "GSPC",
            &src(
                &["DATE", "SP500"],
                &[&["2020-01-01", "100"], &["2020-01-02", "102"]],
            ),
        )
        .unwrap();
        assert_eq!(table.dates, vec![d("2020-01-01"), d("2020-01-02")]);
        assert_eq!(table.close, vec![100.0, 102.0]);
        assert_eq!(table.open, vec![100.0, 102.0]);
        assert_eq!(table.adj_close, vec![100.0, 102.0]);
        assert_eq!(table.volume, vec![0.0, 0.0]);
    }

    #[test]
    fn close_priority_prefers_close_over_price() {
        let table = normalize(
            "GC_F",
            &src(&["Date", "Price", "Close"], &[&["2020-01-01", "5", "7"]]),
        )
        .unwrap();
        assert_eq!(table.close, vec![7.0]);
    }

    #[test]
    fn usd_pm_column_matches_after_space_normalization() {
        let table = normalize(
            "GC_F",
            &src(&["Date", "USD (PM)"], &[&["2020-01-01", "1500.25"]]),
        )
        .unwrap();
        assert_eq!(table.close, vec![1500.25]);
    }

    #[test]
    fn falls_back_to_first_numeric_column() {
        let table = normalize(
            "GC_F",
            &src(
                &["Date", "Series", "Level"],
                &[&["2020-01-01", "AU", "42.5"], &["2020-01-02", "AU", "43.0"]],
            ),
        )
        .unwrap();
        assert_eq!(table.close, vec![42.5, 43.0]);
    }

    #[test]
    fn no_numeric_column_is_fatal() {
        let err = normalize(
            "GC_F",
            &src(&["Date", "Notes"], &[&["2020-01-01", "hello"]]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("no usable price column"));
    }

    #[test]
    fn missing_date_column_is_fatal() {
        let err = normalize("GC_F", &src(&["Close"], &[&["5"]])).unwrap_err();
        assert!(err.to_string().contains("missing date column"));
    }

    #[test]
    fn observation_date_is_accepted() {
        let table = normalize(
            "GSPC",
            &src(&["observation_date", "SP500"], &[&["2019-06-03", "2744.45"]]),
        )
        .unwrap();
        assert_eq!(table.dates, vec![d("2019-06-03")]);
        assert_eq!(table.close, vec![2744.45]);
    }

    #[test]
    fn bad_numeric_cells_become_nan() {
        let table = normalize(
            "GC_F",
            &src(
                &["Date", "Close"],
                &[&["2020-01-01", "."], &["2020-01-02", "9"]],
            ),
        )
        .unwrap();
        assert!(table.close[0].is_nan());
        assert_eq!(table.close[1], 9.0);
    }

    #[test]
    fn unparseable_date_is_fatal() {
        let err = normalize(
            "GC_F",
            &src(&["Date", "Close"], &[&["not-a-date", "9"]]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("unparseable date"));
    }

    #[test]
    fn duplicate_dates_keep_last_occurrence() {
        let table = normalize(
            "GC_F",
            &src(
                &["Date", "Close"],
                &[
                    &["2020-01-02", "10"],
                    &["2020-01-01", "1"],
                    &["2020-01-02", "11"],
                ],
            ),
        )
        .unwrap();
        assert_eq!(table.dates, vec![d("2020-01-01"), d("2020-01-02")]);
        assert_eq!(table.close, vec![1.0, 11.0]);
    }

    #[test]
    fn output_is_sorted_strictly_ascending() {
        let table = normalize(
            "GC_F",
            &src(
                &["Date", "Close"],
                &[
                    &["2020-03-01", "3"],
                    &["2020-01-01", "1"],
                    &["2020-02-01", "2"],
                ],
            ),
        )
        .unwrap();
        assert!(table.dates.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn volume_column_is_used_when_present() {
        let table = normalize(
            "GC_F",
            &src(
                &["Date", "Close", "Volume"],
                &[&["2020-01-01", "5", "12345"]],
            ),
        )
        .unwrap();
        assert_eq!(table.volume, vec![12345.0]);
    }

    #[test]
    fn parse_date_accepts_known_formats() {
        for s in [
            "2020-01-31",
            "2020/01/31",
            "01/31/2020",
            "31-01-2020",
            "2020-01-31 00:00:00",
        ] {
            assert_eq!(parse_date(s), Some(d("2020-01-31")), "format {s}");
        }
        assert_eq!(parse_date("31st Jan"), None);
    }
}
