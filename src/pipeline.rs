// src/pipeline.rs
//
// Stage orchestration. The stages only talk through the partition layout on
// disk, so each function here is independently re-runnable.

use anyhow::Result;
use reqwest::Client;
use std::path::Path;
use tracing::info;

use crate::analytics::{self, CORR_WINDOW};
use crate::fetch;
use crate::ingest::select;
use crate::normalize;
use crate::store::{self, raw_csv, SourceRecord};

/// The fixed symbol universe: equity index and commodity.
pub const SYMBOLS: [&str; 2] = ["GSPC", "GC_F"];

/// Select, normalize and partition one symbol from an already-materialized
/// directory of candidate CSVs.
pub fn ingest_from_dir(symbol: &str, dataset_dir: &Path, raw_root: &Path) -> Result<()> {
    let (path, src) = select::pick_source(dataset_dir, symbol)?;
    info!("[CSV] {}: {}", symbol, path.display());

    let table = normalize::normalize(symbol, &src)?;
    raw_csv::write_raw_partitions(raw_root, symbol, &table)?;
    store::write_source_record(raw_root, &SourceRecord::new(symbol, &path, &table))?;
    Ok(())
}

/// Full acquire-and-ingest for one symbol: fetch the mapped dataset (or
/// reuse a populated local directory), then normalize and partition.
pub async fn ingest_symbol(
    client: &Client,
    symbol: &str,
    downloads_root: &Path,
    raw_root: &Path,
) -> Result<()> {
    let dataset_dir = fetch::acquire(client, symbol, downloads_root).await?;
    ingest_from_dir(symbol, &dataset_dir, raw_root)
}

/// The strict local-directory variant: for each symbol, take the first CSV
/// in scan order that carries a full OHLC header. With a single OHLC file
/// present, both symbols ingest the same source.
pub fn ingest_local(scan_root: &Path, raw_root: &Path) -> Result<()> {
    for symbol in SYMBOLS {
        let (path, src) = select::pick_source_ohlc(scan_root)?;
        info!("[CSV] {}: {}", symbol, path.display());

        let table = normalize::normalize(symbol, &src)?;
        raw_csv::write_raw_partitions(raw_root, symbol, &table)?;
        store::write_source_record(raw_root, &SourceRecord::new(symbol, &path, &table))?;
    }
    info!("[DONE] local ingestion normalized to {}", raw_root.display());
    Ok(())
}

/// The analytics stage: read back both symbols' raw partitions, derive the
/// per-symbol feature columns and the cross-symbol correlation, and persist
/// everything under `processed_root`.
pub fn transform(raw_root: &Path, processed_root: &Path) -> Result<()> {
    let gspc = raw_csv::load_symbol(raw_root, "GSPC")?;
    let gold = raw_csv::load_symbol(raw_root, "GC_F")?;

    let gspc = analytics::derive(gspc);
    let gold = analytics::derive(gold);
    let corr = analytics::rolling_correlation(&gspc, &gold, CORR_WINDOW);

    // reported only, never persisted
    let annual = analytics::annual_returns(&gspc.raw.dates, &gspc.daily_return);
    for (year, ret) in annual.iter().rev().take(5).collect::<Vec<_>>().into_iter().rev() {
        info!("[INFO] annual return GSPC {}: {:.4}", year, ret);
    }

    store::parquet::write_correlation_partitions(processed_root, &corr)?;
    store::parquet::write_derived_partitions(processed_root, "GSPC", &gspc)?;
    store::parquet::write_derived_partitions(processed_root, "GC_F", &gold)?;

    info!("[DONE] local transforms completed");
    Ok(())
}
