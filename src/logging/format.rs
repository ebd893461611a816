//! Log output: JSON lines (one object per line) for ingestion, or human-readable text.

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub struct StructuredLogger;

impl StructuredLogger {
    /// Install the global subscriber on stdout. `RUST_LOG` takes precedence over `default_level`.
    /// Returns false if a subscriber was already installed.
    pub fn init(json: bool, default_level: &str) -> bool {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
        if json {
            let fmt = tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_events(FmtSpan::NONE)
                .with_writer(std::io::stdout);
            tracing_subscriber::registry().with(filter).with(fmt).try_init().is_ok()
        } else {
            let fmt = tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stdout);
            tracing_subscriber::registry().with(filter).with(fmt).try_init().is_ok()
        }
    }
}
