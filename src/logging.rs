use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "KETCHUP_LOG";

/// Human-readable logs on stderr; stdout is reserved for command reports.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact();
    let _ = subscriber.try_init();
}
