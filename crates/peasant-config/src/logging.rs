//! Structured logging setup via `tracing`, in the same shape as this
//! lineage's other tools: env-filter first, a sensible per-binary default
//! second, plain-text output to stderr.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global `tracing` subscriber. Safe to call once per
/// process; a second call returns without error but has no effect.
pub fn init_tracing(verbose: bool) -> Result<()> {
    let default_directive = if verbose { "peasant=debug,info" } else { "peasant=info,warn" };

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_level(true));

    // try_init rather than init: a second call (e.g. in tests that also
    // exercise a binary's main) should not panic.
    let _ = registry.try_init();

    Ok(())
}
