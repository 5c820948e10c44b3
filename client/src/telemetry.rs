use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::settings::LogSettings;

/// Filter from `RUST_LOG`, else the configured one, else plain `info`
fn filter(log: &LogSettings) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Send logs to stderr so they never mix with match output.
///
/// Returns false if a subscriber was already installed.
pub fn init_tracing(log: &LogSettings) -> bool {
    let json = log.json.then(|| fmt::layer().json().with_writer(std::io::stderr));
    let text = (!log.json).then(|| fmt::layer().with_writer(std::io::stderr));
    tracing_subscriber::registry()
        .with(filter(log))
        .with(json)
        .with(text)
        .try_init()
        .is_ok()
}
