// src/store/parquet.rs
use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Date32Array, Float64Array};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::basic::{BrotliLevel, Compression};
use parquet::file::properties::WriterProperties;
use std::{fs, fs::File, path::Path, sync::Arc};
use tracing::info;

use super::{split_by_year, year_dir};
use crate::analytics::{CorrelationSeries, DerivedTable};

fn date_array(dates: &[NaiveDate]) -> ArrayRef {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let days: Vec<i32> = dates
        .iter()
        .map(|d| d.signed_duration_since(epoch).num_days() as i32)
        .collect();
    Arc::new(Date32Array::from(days))
}

/// NaN becomes a Parquet null; downstream readers see missing, not a
/// sentinel float.
fn float_array(values: &[f64]) -> ArrayRef {
    Arc::new(
        values
            .iter()
            .map(|v| if v.is_nan() { None } else { Some(*v) })
            .collect::<Float64Array>(),
    )
}

fn writer_props() -> WriterProperties {
    WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5).unwrap()))
        .set_dictionary_enabled(true)
        .build()
}

fn write_batch(batch: &RecordBatch, out_path: &Path) -> Result<()> {
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = out_path.with_extension("parquet.tmp");
    let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(writer_props()))
        .context("opening parquet writer")?;
    writer.write(batch).context("writing record batch")?;
    writer.close().context("closing parquet writer")?;
    fs::rename(&tmp, out_path)
        .with_context(|| format!("renaming {} -> {}", tmp.display(), out_path.display()))?;
    Ok(())
}

fn derived_schema() -> Arc<ArrowSchema> {
    let mut fields = vec![Field::new("Date", DataType::Date32, false)];
    for name in [
        "Open",
        "High",
        "Low",
        "Close",
        "Adj_Close",
        "Volume",
        "daily_return",
        "vol_30d",
        "vol_30d_ann",
        "price_norm",
    ] {
        fields.push(Field::new(name, DataType::Float64, true));
    }
    Arc::new(ArrowSchema::new(fields))
}

fn derived_batch(part: &DerivedTable) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        date_array(&part.raw.dates),
        float_array(&part.raw.open),
        float_array(&part.raw.high),
        float_array(&part.raw.low),
        float_array(&part.raw.close),
        float_array(&part.raw.adj_close),
        float_array(&part.raw.volume),
        float_array(&part.daily_return),
        float_array(&part.vol_30d),
        float_array(&part.vol_30d_ann),
        float_array(&part.price_norm),
    ];
    RecordBatch::try_new(derived_schema(), columns).context("building derived record batch")
}

/// Write the augmented table, one Parquet file per `(symbol, year)` under
/// `processed_root`.
pub fn write_derived_partitions(
    processed_root: &Path,
    symbol: &str,
    table: &DerivedTable,
) -> Result<()> {
    for (year, part) in split_by_year(table) {
        let path = year_dir(processed_root, symbol, year).join("data.parquet");
        write_batch(&derived_batch(&part)?, &path)?;
        info!("[WRITE] {} {} -> {}", symbol, year, path.display());
    }
    Ok(())
}

fn correlation_batch(part: &CorrelationSeries) -> Result<RecordBatch> {
    let schema = Arc::new(ArrowSchema::new(vec![
        Field::new("Date", DataType::Date32, false),
        Field::new("rolling_corr_30d", DataType::Float64, true),
    ]));
    let columns: Vec<ArrayRef> = vec![
        date_array(&part.dates),
        float_array(&part.rolling_corr_30d),
    ];
    RecordBatch::try_new(schema, columns).context("building correlation record batch")
}

/// Write the cross-symbol correlation series, one Parquet file per year,
/// under `processed_root/correlation/`.
pub fn write_correlation_partitions(
    processed_root: &Path,
    series: &CorrelationSeries,
) -> Result<()> {
    let corr_root = processed_root.join("correlation");
    for (year, part) in split_by_year(series) {
        let path = corr_root.join(format!("year={}", year)).join("data.parquet");
        write_batch(&correlation_batch(&part)?, &path)?;
        info!("[WRITE] CORR {} -> {}", year, path.display());
    }
    Ok(())
}
