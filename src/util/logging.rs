use tracing_subscriber::{fmt, EnvFilter};

/// Initializes tracing/logging based on environment variables.
///
/// `RUST_LOG` picks the filter; `NL_LEDGER_LOG_FORMAT=json` switches to JSON lines.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false);

    if json_requested(std::env::var("NL_LEDGER_LOG_FORMAT").ok().as_deref()) {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn json_requested(format: Option<&str>) -> bool {
    format.is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
}
