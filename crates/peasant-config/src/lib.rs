//! Ambient configuration and logging. Neither module changes anything about
//! C1-C11's specified behavior — they exist because a runnable system needs
//! somewhere to read `max_concurrency` from and somewhere to send log lines.

mod config;
mod logging;

pub use config::{Config, CONFIG_FILE, config_path, find_config, load_config, resolve_token};
pub use logging::init_tracing;
