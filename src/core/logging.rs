//! Structured logging setup.
//!
//! A server has no terminal to protect, so this is a single `tracing-subscriber`
//! registry with an `EnvFilter`, unlike the TUI build this crate grew out of
//! (which split file/stdout layers to avoid corrupting the raw-mode screen).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize process-wide tracing. Safe to call once at startup.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,caes=debug"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
