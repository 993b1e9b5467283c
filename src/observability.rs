use tracing_subscriber::{fmt, EnvFilter};

/// Embedder-facing helper: this crate is a library and never installs a
/// subscriber itself, so binaries embedding it call this once at startup.
/// Logs go to stderr so they never interleave with any stdout protocol
/// traffic.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
