// Ingest from a pre-populated local directory of CSVs, taking the first file
// with a full OHLC header for each symbol. No download involved.
use anyhow::Result;
use findata::{init_tracing, pipeline};
use std::{env, path::PathBuf};
use tracing::info;

fn main() -> Result<()> {
    init_tracing();

    let scan_root = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("incoming"));
    let raw_root = PathBuf::from("data/raw");
    info!("scanning {}", scan_root.display());

    pipeline::ingest_local(&scan_root, &raw_root)
}
