// src/store/raw_csv.rs
use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use std::{fs, path::Path, path::PathBuf};
use tracing::info;

use super::{split_by_year, year_dir};
use crate::normalize::{parse_cell, parse_date, RawTable};

pub const RAW_HEADER: [&str; 7] = [
    "Date",
    "Open",
    "High",
    "Low",
    "Close",
    "Adj_Close",
    "Volume",
];

/// NaN serializes as an empty cell, everything else via the shortest
/// round-trip float format.
fn num_field(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        format!("{}", v)
    }
}

/// Write one `data.csv` per `(symbol, year)` partition under `raw_root`,
/// overwriting whatever was there. Each file is written to a temp sibling
/// first and renamed into place.
pub fn write_raw_partitions(raw_root: &Path, symbol: &str, table: &RawTable) -> Result<()> {
    for (year, part) in split_by_year(table) {
        let dir = year_dir(raw_root, symbol, year);
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

        let path = dir.join("data.csv");
        let tmp = dir.join(".data.csv.tmp");
        let mut wtr = WriterBuilder::new()
            .from_path(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        wtr.write_record(RAW_HEADER)?;
        for i in 0..part.len() {
            wtr.write_record([
                part.dates[i].format("%Y-%m-%d").to_string(),
                num_field(part.open[i]),
                num_field(part.high[i]),
                num_field(part.low[i]),
                num_field(part.close[i]),
                num_field(part.adj_close[i]),
                num_field(part.volume[i]),
            ])?;
        }
        wtr.flush()?;
        drop(wtr);
        fs::rename(&tmp, &path)
            .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;

        info!("[WRITE] {} {} -> {}", symbol, year, path.display());
    }
    Ok(())
}

/// Read back every raw partition of `symbol`, concatenate in year order and
/// sort by date. Fails if the symbol has no partitions at all.
pub fn load_symbol(raw_root: &Path, symbol: &str) -> Result<RawTable> {
    let pattern = format!(
        "{}/symbol={}/year=*/data.csv",
        raw_root.display(),
        symbol
    );
    let mut paths: Vec<PathBuf> = glob::glob(&pattern)
        .context("invalid raw partition pattern")?
        .filter_map(|e| e.ok())
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!(
            "no raw partitions for {} under {}",
            symbol,
            raw_root.display()
        );
    }

    let mut table = RawTable::default();
    for path in &paths {
        read_partition(path, &mut table)
            .with_context(|| format!("reading {}", path.display()))?;
    }
    Ok(sort_by_date(table))
}

fn read_partition(path: &Path, table: &mut RawTable) -> Result<()> {
    let mut rdr = ReaderBuilder::new().from_path(path)?;
    let headers = rdr.headers()?.clone();
    let col = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == name)
            .with_context(|| format!("partition missing column {}", name))
    };
    let idx: Vec<usize> = RAW_HEADER
        .iter()
        .map(|&name| col(name))
        .collect::<Result<_>>()?;

    for (row_no, record) in rdr.records().enumerate() {
        let record = record?;
        let cell = |i: usize| record.get(idx[i]).unwrap_or("");
        let date = parse_date(cell(0))
            .with_context(|| format!("unparseable Date {:?} at row {}", cell(0), row_no))?;
        table.dates.push(date);
        table.open.push(parse_cell(cell(1)));
        table.high.push(parse_cell(cell(2)));
        table.low.push(parse_cell(cell(3)));
        table.close.push(parse_cell(cell(4)));
        table.adj_close.push(parse_cell(cell(5)));
        table.volume.push(parse_cell(cell(6)));
    }
    Ok(())
}

fn sort_by_date(table: RawTable) -> RawTable {
    let mut order: Vec<usize> = (0..table.len()).collect();
    order.sort_by_key(|&i| table.dates[i]);
    let pick = |v: &[f64]| order.iter().map(|&i| v[i]).collect();
    RawTable {
        dates: order.iter().map(|&i| table.dates[i]).collect(),
        open: pick(&table.open),
        high: pick(&table.high),
        low: pick(&table.low),
        close: pick(&table.close),
        adj_close: pick(&table.adj_close),
        volume: pick(&table.volume),
    }
}
