//! Tracing subscriber setup for the `forge` binary.
//!
//! Logs go to stderr so command output on stdout stays clean. The filter is
//! picked in this order: a non-empty `RUST_LOG`, then `intelliforge=debug`
//! when `verbose` is set, then the configured directive.

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_logging(filter: &str, verbose: bool) -> Result<()> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = select_filter(filter, verbose, from_env.as_deref())?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .try_init()?;
    Ok(())
}

fn select_filter(configured: &str, verbose: bool, from_env: Option<&str>) -> Result<EnvFilter> {
    let directive = match from_env.map(str::trim).filter(|d| !d.is_empty()) {
        Some(from_env) => from_env,
        None if verbose => "intelliforge=debug",
        None => configured,
    };
    EnvFilter::try_new(directive).with_context(|| format!("Invalid log filter: {}", directive))
}
