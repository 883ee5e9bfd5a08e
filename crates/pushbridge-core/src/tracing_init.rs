//! Tracing/logging initialization for the bridge.
//!
//! Same shape as every other binary in the workspace: an env-filter plus
//! either the human-readable or the JSON formatter. Output goes to stderr so
//! that stdout stays free for relayed events.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Initialise the global tracing subscriber from the resolved logging config.
///
/// `RUST_LOG`, when set, takes precedence over `logging.level`.
pub fn init_tracing(logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter(&logging.level)),
    );
    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Filter directive for `level`, scoped to the bridge crates.
pub fn default_filter(level: &str) -> String {
    format!("pushbridge={level},pushbridge_core={level}")
}
