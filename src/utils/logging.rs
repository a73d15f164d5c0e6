use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directive.
pub const LOG_ENV_VAR: &str = "JARVIS_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Install the global tracing subscriber.
///
/// Output goes to stderr so command output on stdout stays machine readable.
/// Calling this twice is harmless; the second install is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
