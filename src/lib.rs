pub mod config;
pub mod correlate;
pub mod db;
pub mod ingest;
pub mod lifecycle;
pub mod models;
pub mod pipeline;
pub mod queue;
pub mod reminders;
pub mod routing;
pub mod service;
pub mod storage;

#[cfg(test)]
pub mod test_support;

use tracing_subscriber::EnvFilter;

/// Initialize tracing from RUST_LOG, falling back to the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER)),
        )
        .init();

    tracing::info!("Docflow starting v{}", config::APP_VERSION);
}
