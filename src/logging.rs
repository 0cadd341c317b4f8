use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. RUST_LOG takes precedence over `default_level`.
/// Log lines go to stderr so stdout stays clean for JSON output.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    // A second init (tests, embedding) is not an error
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
