// src/lib.rs
//
// findata: ingest heterogeneous financial time-series CSV exports, normalize
// them onto a canonical OHLCV schema, partition by (symbol, year), and derive
// return/volatility/correlation features.

use tracing_subscriber::{fmt, EnvFilter};

pub mod analytics;
pub mod fetch;
pub mod ingest;
pub mod normalize;
pub mod pipeline;
pub mod store;

/// Initialize the fmt subscriber with `RUST_LOG` support, defaulting to
/// `info`. Called once at the top of every binary.
pub fn init_tracing() {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_span_events(fmt::format::FmtSpan::CLOSE)
        .init();
}
