use anyhow::Result;
use findata::{init_tracing, pipeline};
use reqwest::Client;
use std::{fs, path::PathBuf};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    info!("startup");

    let downloads_root = PathBuf::from("downloads");
    let raw_root = PathBuf::from("data/raw");
    let processed_root = PathBuf::from("data/processed");
    for d in [&downloads_root, &raw_root, &processed_root] {
        fs::create_dir_all(d)?;
    }

    let client = Client::new();
    for symbol in pipeline::SYMBOLS {
        pipeline::ingest_symbol(&client, symbol, &downloads_root, &raw_root).await?;
    }
    info!("[DONE] ingestion normalized to {}", raw_root.display());

    pipeline::transform(&raw_root, &processed_root)?;
    Ok(())
}
