// src/ingest/select.rs
use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{read_csv_any, scan_csvs, SourceTable};
use crate::normalize::{norm_key, numeric_columns, DATE_CANDIDATES};

/// Filename keywords per symbol, matched case-insensitively as substrings.
pub const SYMBOL_KEYWORDS: &[(&str, &[&str])] =
    &[("GSPC", &["sp500"]), ("GC_F", &["gold", "xau"])];

fn filename_matches(path: &Path, keywords: &[&str]) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    keywords.iter().any(|k| name.contains(k))
}

fn normalized_header(table: &SourceTable) -> Vec<String> {
    table.headers.iter().map(|h| norm_key(h)).collect()
}

/// Strict content test: the header carries a full OHLC set plus a date.
pub fn has_ohlc_header(table: &SourceTable) -> bool {
    let keys = normalized_header(table);
    ["open", "high", "low", "close", "date"]
        .iter()
        .all(|k| keys.iter().any(|h| h == k))
}

/// Loose content test: some date-like column plus at least one numeric
/// column that is not the date column itself.
pub fn has_loose_header(table: &SourceTable) -> bool {
    let keys = normalized_header(table);
    let date_idx = DATE_CANDIDATES
        .iter()
        .find_map(|k| keys.iter().position(|h| h == k));
    let date_idx = match date_idx {
        Some(i) => i,
        None => return false,
    };
    numeric_columns(table).into_iter().any(|i| i != date_idx)
}

/// Pick one source CSV for `symbol` under `root`.
///
/// Two tiers: a symbol-specific filename keyword first, then the loose
/// content heuristic over the remaining files in scan order. Files that fail
/// to parse are skipped; they only become an error when nothing is left.
pub fn pick_source(root: &Path, symbol: &str) -> Result<(PathBuf, SourceTable)> {
    let csvs = scan_csvs(root)?;
    if csvs.is_empty() {
        bail!("no CSV files under {}", root.display());
    }

    let keywords = SYMBOL_KEYWORDS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, k)| *k)
        .unwrap_or(&[]);

    for path in &csvs {
        if filename_matches(path, keywords) {
            let table = read_csv_any(path)?;
            return Ok((path.clone(), table));
        }
    }

    for path in &csvs {
        let table = match read_csv_any(path) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), "skipping unparseable CSV: {e:#}");
                continue;
            }
        };
        if has_loose_header(&table) {
            return Ok((path.clone(), table));
        }
    }

    bail!(
        "no suitable source found for {} under {}",
        symbol,
        root.display()
    )
}

/// Strict variant of [`pick_source`]: first file in scan order whose header
/// carries the full OHLC set plus a date, regardless of symbol.
pub fn pick_source_ohlc(root: &Path) -> Result<(PathBuf, SourceTable)> {
    let csvs = scan_csvs(root)?;
    if csvs.is_empty() {
        bail!("no CSV files under {}", root.display());
    }

    for path in &csvs {
        let table = match read_csv_any(path) {
            Ok(t) => t,
            Err(e) => {
                debug!(path = %path.display(), "skipping unparseable CSV: {e:#}");
                continue;
            }
        };
        if has_ohlc_header(&table) {
            return Ok((path.clone(), table));
        }
    }

    bail!(
        "no suitable CSV with OHLC columns found under {}",
        root.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn filename_keyword_wins_over_scan_order() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a_first.csv"), "Date,Close\n2020-01-01,1\n")?;
        fs::write(
            dir.path().join("sp500_daily.csv"),
            "DATE,SP500\n2020-01-01,100\n",
        )?;

        let (path, table) = pick_source(dir.path(), "GSPC")?;
        assert!(path.ends_with("sp500_daily.csv"));
        assert_eq!(table.headers, vec!["DATE", "SP500"]);
        Ok(())
    }

    #[test]
    fn loose_heuristic_takes_first_date_plus_numeric() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a_notes.csv"), "Name,Comment\nx,y\n")?;
        fs::write(
            dir.path().join("b_prices.csv"),
            "Date,Value\n2020-01-01,3.5\n",
        )?;

        let (path, _) = pick_source(dir.path(), "GC_F")?;
        assert!(path.ends_with("b_prices.csv"));
        Ok(())
    }

    #[test]
    fn gold_keyword_matches_for_commodity() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("annual_gold_rate.csv"), "Date,Price\n")?;
        fs::write(dir.path().join("silver.csv"), "Date,Price\n")?;

        let (path, _) = pick_source(dir.path(), "GC_F")?;
        assert!(path.ends_with("annual_gold_rate.csv"));
        Ok(())
    }

    #[test]
    fn empty_root_is_fatal() {
        let dir = tempdir().unwrap();
        let err = pick_source(dir.path(), "GSPC").unwrap_err();
        assert!(err.to_string().contains("no CSV files"));
    }

    #[test]
    fn no_candidate_satisfying_heuristics_is_fatal() -> Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("names.csv"), "Name,Comment\nx,y\n")?;

        let err = pick_source(dir.path(), "GSPC").unwrap_err();
        assert!(err.to_string().contains("no suitable source"));
        Ok(())
    }

    #[test]
    fn strict_variant_requires_full_ohlc() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("a_level.csv"),
            "Date,Value\n2020-01-01,3.5\n",
        )?;
        fs::write(
            dir.path().join("b_ohlc.csv"),
            "Date,Open,High,Low,Close\n2020-01-01,1,2,0.5,1.5\n",
        )?;

        let (path, _) = pick_source_ohlc(dir.path())?;
        assert!(path.ends_with("b_ohlc.csv"));
        Ok(())
    }

    #[test]
    fn strict_variant_accepts_spaced_adj_close_headers() -> Result<()> {
        let dir = tempdir()?;
        fs::write(
            dir.path().join("yahoo.csv"),
            "Date,Open,High,Low,Close,Adj Close,Volume\n2020-01-01,1,2,0.5,1.5,1.5,100\n",
        )?;

        let (_, table) = pick_source_ohlc(dir.path())?;
        assert!(has_ohlc_header(&table));
        Ok(())
    }
}
