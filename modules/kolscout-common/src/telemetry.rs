use tracing_subscriber::EnvFilter;

/// Initialise structured logging for a host process. Honors `RUST_LOG`,
/// defaulting to info-level output for kolscout crates.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kolscout=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
