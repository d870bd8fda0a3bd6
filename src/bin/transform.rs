// Analytics stage alone: reads back data/raw/ and writes data/processed/.
use anyhow::Result;
use findata::{init_tracing, pipeline};
use std::path::Path;

fn main() -> Result<()> {
    init_tracing();
    pipeline::transform(Path::new("data/raw"), Path::new("data/processed"))
}
