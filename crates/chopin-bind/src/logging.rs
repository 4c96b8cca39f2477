//! Logging initialization for services built on chopin-bind.
//!
//! Registration and binding emit `tracing` events: argument kinds at
//! `debug`, binding failures at `warn`, dispatch outcomes at `trace` and
//! aborted registrations at `error`. Nothing is printed until a subscriber
//! is installed, typically with [`init_for`].
//!
//! ```bash
//! # Show binding failures and registrations
//! RUST_LOG=chopin_bind=debug cargo run
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Settings;

/// Initialize logging with an `info` default.
///
/// The log level is controlled by the `RUST_LOG` environment variable.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging() {
    init_logging_with_level("info");
}

/// Initialize logging with `level` unless `RUST_LOG` is set.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_logging_with_level(level: &str) {
    tracing_subscriber::registry()
        .with(filter(level))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Pretty, multi-line output for development.
pub fn init_logging_pretty() {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_line_number(true)
                .with_thread_ids(true)
                .with_target(true),
        )
        .init();
}

/// JSON output for log aggregation.
pub fn init_logging_json() {
    tracing_subscriber::registry()
        .with(filter("info"))
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Pretty output in development, JSON everywhere else.
pub fn init_for(settings: &Settings) {
    if settings.is_dev() {
        init_logging_pretty();
    } else {
        init_logging_json();
    }
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
