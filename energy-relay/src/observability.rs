use tracing_subscriber::EnvFilter;

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
///
/// Logs go to stderr; `backlog_export` owns stdout.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,energy_relay=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
