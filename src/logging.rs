//! Tracing initialization, matching the teacher's `tracing-subscriber`
//! env-filter idiom. Host binaries call this once at startup; library
//! code never installs a subscriber.

use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
