// src/fetch/mod.rs
use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use reqwest::Client;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Read,
    path::{Path, PathBuf},
};
use tracing::info;
use url::Url;
use zip::ZipArchive;

use crate::ingest::scan_csvs;

/// Symbol → dataset slug. Extending the symbol set starts here (and possibly
/// in the filename keywords of `ingest::select`).
pub static DATASETS: Lazy<BTreeMap<&'static str, &'static str>> = Lazy::new(|| {
    BTreeMap::from([
        (
            "GSPC",
            "joebeachcapital/dow-jones-and-s-and-p500-indices-daily-update",
        ),
        ("GC_F", "lbronchal/gold-and-silver-prices-dataset"),
    ])
});

const DOWNLOAD_BASE: &str = "https://www.kaggle.com/api/v1/datasets/download";

/// Download the archive for `slug` and save it under `dest_dir`, named after
/// the last path segment of the download URL.
async fn download_archive(client: &Client, slug: &str, dest_dir: &Path) -> Result<PathBuf> {
    let url = Url::parse(&format!("{}/{}", DOWNLOAD_BASE, slug))
        .with_context(|| format!("bad dataset slug {:?}", slug))?;
    let filename = url
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|name| !name.is_empty())
        .unwrap_or("dataset");
    let archive_path = dest_dir.join(format!("{}.zip", filename));

    tokio::fs::create_dir_all(dest_dir).await?;
    let resp = client
        .get(url.as_str())
        .send()
        .await?
        .error_for_status()
        .with_context(|| format!("downloading {}", slug))?;
    let bytes = resp.bytes().await?;
    tokio::fs::write(&archive_path, &bytes).await?;

    Ok(archive_path)
}

/// Extract every `.csv` member of `archive_path` into `dest_dir`, flattening
/// the entry paths. Returns how many files were written.
pub fn extract_csvs(archive_path: &Path, dest_dir: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("opening {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .with_context(|| format!("reading archive {}", archive_path.display()))?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .with_context(|| format!("archive entry #{}", i))?;
        let name = entry.name().to_string();
        if !entry.is_file() || !name.to_lowercase().ends_with(".csv") {
            continue;
        }

        let out_name = Path::new(&name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| format!("entry_{}.csv", i));
        let out_path = dest_dir.join(out_name);

        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .with_context(|| format!("reading {} from archive", name))?;
        fs::write(&out_path, &buf).with_context(|| format!("writing {}", out_path.display()))?;
        written += 1;
    }
    Ok(written)
}

/// Materialize the dataset for `symbol` as a local directory of CSV files.
///
/// If `downloads_root/<symbol>` already holds CSVs they are reused as-is —
/// that is the local-directory input mode, and what makes re-runs cheap.
/// Otherwise the mapped dataset archive is downloaded and its CSV members
/// extracted there. A downloaded archive with no CSVs is fatal.
pub async fn acquire(client: &Client, symbol: &str, downloads_root: &Path) -> Result<PathBuf> {
    let slug = match DATASETS.get(symbol) {
        Some(s) => *s,
        None => bail!("no dataset mapped for symbol {}", symbol),
    };
    let dest_dir = downloads_root.join(symbol);

    if dest_dir.is_dir() && !scan_csvs(&dest_dir)?.is_empty() {
        info!("[DL] {} reusing {}", symbol, dest_dir.display());
        return Ok(dest_dir);
    }

    info!("[DL] {} <- {}", symbol, slug);
    let archive_path = download_archive(client, slug, &dest_dir).await?;
    let written = extract_csvs(&archive_path, &dest_dir)?;
    if written == 0 {
        bail!(
            "no CSV files in dataset {} (archive {})",
            slug,
            archive_path.display()
        );
    }
    info!("[DL] {} extracted {} CSV files", symbol, written);

    Ok(dest_dir)
}
