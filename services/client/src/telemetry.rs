use tracing::Level;

/// Installs the global fmt subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();
}
