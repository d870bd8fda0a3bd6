// src/ingest/mod.rs
use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

pub mod select;

/// A source CSV as read from disk: the header row plus every data row as
/// strings. Typing happens later, during normalization.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// All `*.csv` files under `root`, recursively, in lexicographic order so
/// that "first match wins" selection is deterministic across platforms.
pub fn scan_csvs(root: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/**/*.csv", root.display());
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .with_context(|| format!("invalid scan pattern for {}", root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

fn parse_with_delimiter(data: &[u8], delimiter: u8) -> Result<SourceTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(data));

    let headers: Vec<String> = rdr
        .headers()
        .context("reading CSV header")?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut rows = Vec::new();
    for (idx, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("CSV parse error at record {}", idx))?;
        rows.push(record.iter().map(|s| s.to_string()).collect());
    }

    Ok(SourceTable { headers, rows })
}

/// Read a CSV with comma delimiter; if the header degenerates to a single
/// cell containing `;`, the file is semicolon-delimited and gets reparsed.
pub fn read_csv_any(path: &Path) -> Result<SourceTable> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;

    let table = parse_with_delimiter(&data, b',')?;
    if table.headers.len() == 1 && table.headers[0].contains(';') {
        return parse_with_delimiter(&data, b';');
    }
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scan_finds_nested_csvs_in_sorted_order() -> Result<()> {
        let dir = tempdir()?;
        fs::create_dir_all(dir.path().join("b"))?;
        fs::write(dir.path().join("b/later.csv"), "Date,Close\n")?;
        fs::write(dir.path().join("a.csv"), "Date,Close\n")?;
        fs::write(dir.path().join("notes.txt"), "not a csv")?;

        let found = scan_csvs(dir.path())?;
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("a.csv"));
        assert!(found[1].ends_with("b/later.csv"));
        Ok(())
    }

    #[test]
    fn comma_delimited_parses_directly() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("plain.csv");
        fs::write(&path, "Date,Close\n2020-01-01,5\n")?;

        let table = read_csv_any(&path)?;
        assert_eq!(table.headers, vec!["Date", "Close"]);
        assert_eq!(table.rows, vec![vec!["2020-01-01", "5"]]);
        Ok(())
    }

    #[test]
    fn semicolon_fallback_kicks_in() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("semi.csv");
        fs::write(&path, "Date;Close\n2020-01-01;5\n2020-01-02;6\n")?;

        let table = read_csv_any(&path)?;
        assert_eq!(table.headers, vec!["Date", "Close"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1], vec!["2020-01-02", "6"]);
        Ok(())
    }

    #[test]
    fn short_rows_are_tolerated() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("ragged.csv");
        fs::write(&path, "Date,Close,Volume\n2020-01-01,5\n")?;

        let table = read_csv_any(&path)?;
        assert_eq!(table.rows[0].len(), 2);
        Ok(())
    }
}
