// src/store/mod.rs
//
// Partitioned persistence. All stages communicate exclusively through this
// layout:
//
//   data/raw/symbol=<SYM>/year=<YYYY>/data.csv
//   data/processed/symbol=<SYM>/year=<YYYY>/data.parquet
//   data/processed/correlation/year=<YYYY>/data.parquet
//
// Re-running a stage overwrites its own partitions; there is no merge.

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::analytics::{CorrelationSeries, DerivedTable};
use crate::normalize::RawTable;

pub mod parquet;
pub mod raw_csv;

/// A table that can be sliced into contiguous per-year partitions.
/// `dates()` must be sorted ascending, which every normalized table is.
pub trait YearPartition: Sized {
    fn dates(&self) -> &[NaiveDate];
    fn slice(&self, start: usize, end: usize) -> Self;
}

impl YearPartition for RawTable {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        RawTable {
            dates: self.dates[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            adj_close: self.adj_close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }
}

impl YearPartition for DerivedTable {
    fn dates(&self) -> &[NaiveDate] {
        &self.raw.dates
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        DerivedTable {
            raw: self.raw.slice(start, end),
            daily_return: self.daily_return[start..end].to_vec(),
            vol_30d: self.vol_30d[start..end].to_vec(),
            vol_30d_ann: self.vol_30d_ann[start..end].to_vec(),
            price_norm: self.price_norm[start..end].to_vec(),
        }
    }
}

impl YearPartition for CorrelationSeries {
    fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        CorrelationSeries {
            dates: self.dates[start..end].to_vec(),
            rolling_corr_30d: self.rolling_corr_30d[start..end].to_vec(),
        }
    }
}

/// Split a date-sorted table into one sub-table per calendar year.
pub fn split_by_year<T: YearPartition>(table: &T) -> BTreeMap<i32, T> {
    let dates = table.dates();
    let mut out = BTreeMap::new();
    let mut start = 0;
    while start < dates.len() {
        let year = dates[start].year();
        let mut end = start + 1;
        while end < dates.len() && dates[end].year() == year {
            end += 1;
        }
        out.insert(year, table.slice(start, end));
        start = end;
    }
    out
}

pub fn symbol_dir(root: &Path, symbol: &str) -> PathBuf {
    root.join(format!("symbol={}", symbol))
}

pub fn year_dir(root: &Path, symbol: &str, year: i32) -> PathBuf {
    symbol_dir(root, symbol).join(format!("year={}", year))
}

/// Provenance of one symbol's raw partitions: which source file produced
/// them and what range it covered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRecord {
    pub symbol: String,
    pub source_file: String,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl SourceRecord {
    pub fn new(symbol: &str, source_file: &Path, table: &RawTable) -> Self {
        SourceRecord {
            symbol: symbol.to_string(),
            source_file: source_file.display().to_string(),
            rows: table.len(),
            first_date: table.dates.first().copied(),
            last_date: table.dates.last().copied(),
        }
    }
}

/// Write `_source.json` next to a symbol's raw partitions, atomically
/// (temp file, then rename over the old record).
pub fn write_source_record(raw_root: &Path, record: &SourceRecord) -> Result<()> {
    let dir = symbol_dir(raw_root, &record.symbol);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;

    let path = dir.join("_source.json");
    let tmp = dir.join("._source.json.tmp");
    let mut file = fs::File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    serde_json::to_writer_pretty(&mut file, record).context("serializing source record")?;
    file.write_all(b"\n")?;
    fs::rename(&tmp, &path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

pub fn read_source_record(raw_root: &Path, symbol: &str) -> Result<SourceRecord> {
    let path = symbol_dir(raw_root, symbol).join("_source.json");
    let file = fs::File::open(&path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(file).with_context(|| format!("parsing {}", path.display()))
}
